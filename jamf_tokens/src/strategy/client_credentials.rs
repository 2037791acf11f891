//! The client credentials flow

use async_trait::async_trait;
use jamf_clock::UnixTime;

use super::{dto, AuthMethod, Authority, RenewalStrategy};
use crate::{AuthError, ClientIdRef, IssuedToken, TransportRequest};

/// Obtains OAuth access tokens with an API client ID and secret
///
/// Tokens obtained this way cannot be extended, only replaced.
#[derive(Debug)]
pub struct ClientCredentialsStrategy {
    authority: Authority,
    credentials: dto::ClientCredentials,
}

impl ClientCredentialsStrategy {
    /// Constructs a new client credentials strategy
    pub fn new(authority: Authority, credentials: dto::ClientCredentials) -> Self {
        Self {
            authority,
            credentials,
        }
    }

    /// The client ID tokens are requested for
    pub fn client_id(&self) -> &ClientIdRef {
        &self.credentials.client_id
    }

    #[tracing::instrument(
        err,
        skip(self),
        fields(
            credentials.grant_type = "client_credentials",
            credentials.client_id = %self.client_id(),
        ),
    )]
    async fn request_token(&self, now: UnixTime) -> Result<IssuedToken, AuthError> {
        tracing::trace!("requesting token from authority");

        let form = serde_urlencoded::to_string(&self.credentials)?;
        let request = TransportRequest::post(
            self.authority.endpoints().oauth_token.clone(),
            self.authority.timeout(),
        )
        .with_body("application/x-www-form-urlencoded", form);

        let body = self.authority.exchange(request).await?;
        let resp: dto::OAuthTokenResponse = serde_json::from_slice(&body)?;

        let token = IssuedToken::new(resp.access_token, now, now + resp.expires_in);

        tracing::info!(
            lifetime = token.lifetime().0,
            expiry = token.expiry().0,
            "received new token"
        );

        Ok(token)
    }
}

#[async_trait]
impl RenewalStrategy for ClientCredentialsStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::ClientCredentials
    }

    fn authority(&self) -> &Authority {
        &self.authority
    }

    async fn renew(&self, now: UnixTime) -> Result<IssuedToken, AuthError> {
        self.request_token(now).await
    }
}
