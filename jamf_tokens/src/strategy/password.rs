//! The username and password flow

use async_trait::async_trait;
use http::header;
use jamf_clock::UnixTime;
use url::Url;

use super::{authorization, bearer, dto, AuthMethod, Authority, RenewalStrategy};
use crate::{
    time, AccessTokenRef, AuthError, BasicToken, IssuedToken, PasswordRef, TransportRequest,
    UsernameRef,
};

/// Obtains session tokens with a username and password
///
/// The current token can be extended through the keep-alive endpoint, which
/// is cheaper for the server than a full exchange.
#[derive(Debug)]
pub struct PasswordStrategy {
    authority: Authority,
    basic: BasicToken,
}

impl PasswordStrategy {
    /// Constructs a new strategy from a username and password
    pub fn new(authority: Authority, username: &UsernameRef, password: &PasswordRef) -> Self {
        Self::from_basic_token(authority, BasicToken::encode(username, password))
    }

    /// Constructs a new strategy from already encoded basic credentials
    pub fn from_basic_token(authority: Authority, basic: BasicToken) -> Self {
        Self { authority, basic }
    }

    #[tracing::instrument(err, skip(self), fields(credentials.grant_type = "basic"))]
    async fn request_token(&self, now: UnixTime) -> Result<IssuedToken, AuthError> {
        tracing::trace!("requesting token from authority");

        let auth = authorization("Basic", self.basic.as_str())?;
        let url = self.authority.endpoints().basic_token.clone();

        let token = self.session_exchange(url, auth, now).await?;

        tracing::info!(
            lifetime = token.lifetime().0,
            expiry = token.expiry().0,
            "received new token"
        );

        Ok(token)
    }

    #[tracing::instrument(err, skip(self, current))]
    async fn keep_alive(
        &self,
        current: &AccessTokenRef,
        now: UnixTime,
    ) -> Result<IssuedToken, AuthError> {
        tracing::trace!("requesting token extension from authority");

        let auth = bearer(current)?;
        let url = self.authority.endpoints().keep_alive.clone();

        let token = self.session_exchange(url, auth, now).await?;

        tracing::info!(
            lifetime = token.lifetime().0,
            expiry = token.expiry().0,
            replaced = (token.access_token() != current),
            "extended token"
        );

        Ok(token)
    }

    async fn session_exchange(
        &self,
        url: Url,
        auth: header::HeaderValue,
        now: UnixTime,
    ) -> Result<IssuedToken, AuthError> {
        let request = TransportRequest::post(url, self.authority.timeout())
            .with_header(header::AUTHORIZATION, auth);

        let body = self.authority.exchange(request).await?;
        let resp: dto::SessionTokenResponse = serde_json::from_slice(&body)?;

        let expiry = time::parse_expiry(&resp.expires).map_err(|source| {
            AuthError::InvalidExpiry {
                value: resp.expires.clone(),
                source,
            }
        })?;

        Ok(IssuedToken::new(
            resp.token,
            now,
            time::to_unix_time(expiry),
        ))
    }
}

#[async_trait]
impl RenewalStrategy for PasswordStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::PasswordDerived
    }

    fn supports_extend(&self) -> bool {
        true
    }

    fn authority(&self) -> &Authority {
        &self.authority
    }

    async fn renew(&self, now: UnixTime) -> Result<IssuedToken, AuthError> {
        self.request_token(now).await
    }

    async fn extend(
        &self,
        current: &AccessTokenRef,
        now: UnixTime,
    ) -> Result<IssuedToken, AuthError> {
        self.keep_alive(current, now).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        transport::mock::MockTransport, AccessToken, AuthEndpoints, Password, TransportError,
        Username,
    };

    // 2024-01-01T10:00:00Z
    const TEN_AM: UnixTime = UnixTime(1_704_103_200);

    fn strategy(transport: &Arc<MockTransport>) -> PasswordStrategy {
        let server = Url::parse("https://example.jamfcloud.com").unwrap();
        let authority =
            Authority::new(transport.clone(), AuthEndpoints::for_server(&server).unwrap());
        PasswordStrategy::new(
            authority,
            &Username::from_static("user"),
            &Password::from_static("pass"),
        )
    }

    #[tokio::test]
    async fn renew_sends_basic_credentials_without_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({ "token": "abc", "expires": "2024-01-01T10:00:00.5Z" }),
        );

        strategy(&transport).renew(UnixTime(0)).await.unwrap();

        let req = transport.last_request();
        assert_eq!(
            req.url.as_str(),
            "https://example.jamfcloud.com/api/v1/auth/token"
        );
        assert_eq!(req.headers[header::AUTHORIZATION], "Basic dXNlcjpwYXNz");
        assert!(req.headers[header::AUTHORIZATION].is_sensitive());
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn renew_parses_absolute_expiry_with_short_fraction() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({ "token": "abc", "expires": "2024-01-01T10:00:00.5+00:00" }),
        );

        let token = strategy(&transport)
            .renew(TEN_AM - jamf_clock::DurationSecs(1_800))
            .await
            .unwrap();

        assert_eq!(token.access_token().as_str(), "abc");
        assert_eq!(token.expiry(), TEN_AM);
        assert_eq!(token.lifetime(), jamf_clock::DurationSecs(1_800));
    }

    #[tokio::test]
    async fn renew_rejects_unparseable_expiry() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "token": "abc", "expires": "tomorrow" }));

        let err = strategy(&transport).renew(UnixTime(0)).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidExpiry { value, .. } if value == "tomorrow"));
    }

    #[tokio::test]
    async fn renew_surfaces_rejection() {
        let transport = Arc::new(MockTransport::new());
        transport.push_raw(401, "");

        let err = strategy(&transport).renew(UnixTime(0)).await.unwrap_err();

        assert!(matches!(err, AuthError::Rejected { status, .. } if status.as_u16() == 401));
    }

    #[tokio::test]
    async fn precomputed_basic_token_is_sent_as_is() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({ "token": "abc", "expires": "2024-01-01T10:00:00.5Z" }),
        );
        let server = Url::parse("https://example.jamfcloud.com").unwrap();
        let authority =
            Authority::new(transport.clone(), AuthEndpoints::for_server(&server).unwrap());
        let strategy =
            PasswordStrategy::from_basic_token(authority, BasicToken::from_static("cHJlOmNvbXB1dGVk"));

        strategy.renew(UnixTime(0)).await.unwrap();

        assert_eq!(
            transport.last_request().headers[header::AUTHORIZATION],
            "Basic cHJlOmNvbXB1dGVk"
        );
    }

    mod extend {
        use super::*;

        #[tokio::test]
        async fn uses_current_token_as_bearer_against_keep_alive() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(
                200,
                json!({ "token": "new123", "expires": "2024-01-01T10:30:00.25Z" }),
            );

            let token = strategy(&transport)
                .extend(&AccessToken::from_static("old"), TEN_AM)
                .await
                .unwrap();

            let req = transport.last_request();
            assert_eq!(
                req.url.as_str(),
                "https://example.jamfcloud.com/api/v1/auth/keep-alive"
            );
            assert_eq!(req.headers[header::AUTHORIZATION], "Bearer old");
            assert!(req.body.is_none());

            assert_eq!(token.access_token().as_str(), "new123");
            assert_eq!(token.expiry(), TEN_AM + jamf_clock::DurationSecs(1_800));
        }

        #[tokio::test]
        async fn failure_does_not_fall_back_to_renewal() {
            let transport = Arc::new(MockTransport::new());
            transport.push_error(TransportError::Timeout);

            let err = strategy(&transport)
                .extend(&AccessToken::from_static("old"), TEN_AM)
                .await
                .unwrap_err();

            assert!(matches!(err, AuthError::Transport(TransportError::Timeout)));
            assert_eq!(transport.calls(), 1);
        }

        #[test]
        fn is_advertised() {
            let transport = Arc::new(MockTransport::new());
            assert!(strategy(&transport).supports_extend());
        }
    }
}
