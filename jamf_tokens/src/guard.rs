use std::error;

use jamf_clock::{Clock, System, UnixTime};
use tokio::sync::Mutex;

use crate::{
    policy::TokenStatus, strategy::RenewalStrategy, AccessToken, AuthError, AuthMethod,
    CredentialStore, IssuedToken, TokenLifetimeConfig,
};

/// What a pass through the guard had to do to produce a usable token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewOutcome {
    /// The current token was fresh and is used as-is
    Unchanged,
    /// A new token was obtained through a full credential exchange
    Renewed,
    /// The current session was prolonged through the keep-alive endpoint
    Extended,
}

/// The gate every outbound request passes through before attaching a token
///
/// The guard owns the credential store for one client. Each call to
/// [`token()`][Self::token()] judges the current token against a single
/// reading of the clock and then does exactly one of:
///
/// * nothing, if the token is fresh
/// * a full renewal, if there is no token or it has expired
/// * an extension, if the token is inside its buffer window and the strategy
///   supports extending, or otherwise a full renewal
///
/// Whatever was obtained must itself be outside of the buffer window, or the
/// configuration is rejected as unusable with
/// [`AuthError::BufferExceedsLifetime`].
///
/// The store lock is held for the whole decision, including the round trip
/// to the authority, so at most one renewal is in flight per guard. Callers
/// that arrive meanwhile wait and then find a fresh token.
///
/// When a renewal or extension fails, the current token is discarded. The
/// error is returned to the caller as-is, and the next call starts over with
/// a full renewal; the guard never retries on its own.
#[derive(Debug)]
pub struct TokenGuard<S, C = System> {
    strategy: S,
    lifetime: TokenLifetimeConfig<C>,
    store: Mutex<CredentialStore>,
}

impl<S, C> TokenGuard<S, C> {
    /// Constructs a guard with an empty credential store
    ///
    /// Call [`acquire()`][Self::acquire()] before first use to surface
    /// credential problems early.
    pub fn new(strategy: S, lifetime: TokenLifetimeConfig<C>) -> Self {
        Self {
            strategy,
            lifetime,
            store: Mutex::new(CredentialStore::new()),
        }
    }
}

impl<S, C> TokenGuard<S, C>
where
    S: RenewalStrategy,
    C: Clock + Send + Sync,
{
    /// The kind of credential the guard manages
    pub fn method(&self) -> AuthMethod {
        self.strategy.method()
    }

    /// Performs a full credential exchange regardless of the current token
    pub async fn acquire(&self) -> Result<(), AuthError> {
        let mut store = self.store.lock().await;
        self.obtain(&mut store, true).await.map(|_| ())
    }

    /// Returns a token that will remain valid for at least the configured
    /// buffer, renewing or extending it first if needed
    pub async fn token(&self) -> Result<AccessToken, AuthError> {
        let mut store = self.store.lock().await;
        self.obtain(&mut store, false)
            .await
            .map(|(_, token)| token)
    }

    /// Makes sure the current token will remain valid for at least the
    /// configured buffer, reporting what that took
    pub async fn ensure_valid(&self) -> Result<RenewOutcome, AuthError> {
        let mut store = self.store.lock().await;
        self.obtain(&mut store, false)
            .await
            .map(|(outcome, _)| outcome)
    }

    /// Revokes the current token and retires the credential
    ///
    /// Returns whether the authority confirmed the revocation. Failures are
    /// logged, not returned. Regardless of the outcome, any later attempt to
    /// obtain a token fails with [`AuthError::Invalidated`].
    pub async fn invalidate(&self) -> bool {
        let mut store = self.store.lock().await;

        if store.is_closed() {
            tracing::debug!("credential already invalidated");
            return false;
        }

        match store.close() {
            Some(token) => self.strategy.invalidate(token.access_token()).await,
            None => {
                tracing::debug!("no token held, nothing to invalidate");
                false
            }
        }
    }

    /// Whether the credential has been invalidated
    pub async fn is_closed(&self) -> bool {
        self.store.lock().await.is_closed()
    }

    /// The status of the current token, if one is held
    ///
    /// Waits for any renewal in flight.
    pub async fn status(&self) -> Option<TokenStatus> {
        let store = self.store.lock().await;
        store
            .current()
            .map(|token| self.lifetime.token_status(token))
    }

    async fn obtain(
        &self,
        store: &mut CredentialStore,
        force: bool,
    ) -> Result<(RenewOutcome, AccessToken), AuthError> {
        if store.is_closed() {
            tracing::warn!("attempted to use an invalidated credential");
            return Err(AuthError::Invalidated);
        }

        let now = self.lifetime.clock().now();
        let buffer = self.lifetime.buffer();

        let current = store
            .current()
            .map(|token| (token.token_status_at(now, buffer), token));

        let attempt = match current {
            Some((TokenStatus::Fresh, token)) if !force => {
                tracing::trace!(
                    expiry = token.expiry().0,
                    until_expired = token.until_expired_at(now).0,
                    "token fresh"
                );
                return Ok((RenewOutcome::Unchanged, token.access_token().to_owned()));
            }
            Some((TokenStatus::Stale, token)) if !force && self.strategy.supports_extend() => {
                tracing::debug!(
                    expiry = token.expiry().0,
                    until_expired = token.until_expired_at(now).0,
                    buffer = buffer.0,
                    "token in buffer, extending"
                );
                self.strategy
                    .extend(token.access_token(), now)
                    .await
                    .map(|t| (RenewOutcome::Extended, t))
            }
            Some((status, token)) => {
                tracing::debug!(
                    ?status,
                    expiry = token.expiry().0,
                    forced = force,
                    "renewing token"
                );
                self.strategy
                    .renew(now)
                    .await
                    .map(|t| (RenewOutcome::Renewed, t))
            }
            None => {
                tracing::debug!("no token held, acquiring");
                self.strategy
                    .renew(now)
                    .await
                    .map(|t| (RenewOutcome::Renewed, t))
            }
        };

        let (outcome, token) = match attempt {
            Ok(ok) => ok,
            Err(error) => {
                store.clear();
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "unable to obtain a valid token"
                );
                return Err(error);
            }
        };

        if let Err(error) = self.check_outside_buffer(&token, now) {
            store.clear();
            tracing::error!(
                error = (&error as &dyn error::Error),
                lifetime = token.lifetime().0,
                buffer = buffer.0,
                "new token already inside its buffer"
            );
            return Err(error);
        }

        let access_token = token.access_token().to_owned();
        store.replace(token);

        tracing::debug!(?outcome, "stored new token");

        Ok((outcome, access_token))
    }

    fn check_outside_buffer(&self, token: &IssuedToken, now: UnixTime) -> Result<(), AuthError> {
        let buffer = self.lifetime.buffer();
        match token.token_status_at(now, buffer) {
            TokenStatus::Fresh => Ok(()),
            TokenStatus::Stale | TokenStatus::Expired => Err(AuthError::BufferExceedsLifetime {
                buffer,
                remaining: token.until_expired_at(now),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jamf_clock::{DurationSecs, SharedTestClock};
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::{
        strategy::{dto, Authority, ClientCredentialsStrategy, PasswordStrategy, Strategy},
        transport::mock::MockTransport,
        AuthEndpoints, ClientId, ClientSecret, Password, TransportError, Username,
    };

    const BUFFER: DurationSecs = DurationSecs(120);

    fn authority(transport: &Arc<MockTransport>) -> Authority {
        let server = Url::parse("https://example.jamfcloud.com").unwrap();
        Authority::new(transport.clone(), AuthEndpoints::for_server(&server).unwrap())
    }

    fn client_credentials_guard(
        transport: &Arc<MockTransport>,
        clock: &SharedTestClock,
        buffer: DurationSecs,
    ) -> TokenGuard<ClientCredentialsStrategy, SharedTestClock> {
        let strategy = ClientCredentialsStrategy::new(
            authority(transport),
            dto::ClientCredentials {
                client_id: ClientId::from_static("x"),
                client_secret: ClientSecret::from_static("y"),
            },
        );
        TokenGuard::new(
            strategy,
            TokenLifetimeConfig::new(buffer).with_clock(clock.clone()),
        )
    }

    fn password_guard(
        transport: &Arc<MockTransport>,
        clock: &SharedTestClock,
    ) -> TokenGuard<PasswordStrategy, SharedTestClock> {
        let strategy = PasswordStrategy::new(
            authority(transport),
            &Username::from_static("user"),
            &Password::from_static("pass"),
        );
        TokenGuard::new(
            strategy,
            TokenLifetimeConfig::new(BUFFER).with_clock(clock.clone()),
        )
    }

    fn oauth_response(token: &str, expires_in: u64) -> serde_json::Value {
        json!({ "access_token": token, "expires_in": expires_in })
    }

    // 2024-01-01T10:00:00Z
    const TEN_AM: UnixTime = UnixTime(1_704_103_200);

    fn session_response(token: &str, expires: &str) -> serde_json::Value {
        json!({ "token": token, "expires": expires })
    }

    mod with_client_credentials {
        use super::*;

        #[tokio::test]
        async fn first_call_acquires_and_second_is_a_no_op() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            assert_eq!(guard.token().await.unwrap().as_str(), "abc");
            assert_eq!(guard.token().await.unwrap().as_str(), "abc");

            assert_eq!(transport.calls(), 1);
        }

        #[tokio::test]
        async fn fresh_token_reports_unchanged() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Unchanged);
            assert_eq!(guard.status().await, Some(TokenStatus::Fresh));
            assert_eq!(transport.calls(), 1);
        }

        #[tokio::test]
        async fn token_inside_buffer_is_renewed() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_json(200, oauth_response("def", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            assert_eq!(guard.token().await.unwrap().as_str(), "abc");
            assert_eq!(transport.calls(), 1);

            // 50s remain, less than the 120s buffer
            clock.set(UnixTime(250));
            assert_eq!(guard.status().await, Some(TokenStatus::Stale));
            assert_eq!(guard.token().await.unwrap().as_str(), "def");
            assert_eq!(transport.calls(), 2);
        }

        #[tokio::test]
        async fn token_with_exactly_the_buffer_remaining_is_kept() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            clock.set(UnixTime(180));
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Unchanged);
            assert_eq!(transport.calls(), 1);
        }

        #[tokio::test]
        async fn expired_token_is_renewed() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_json(200, oauth_response("def", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            clock.set(UnixTime(300));
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Renewed);
            assert_eq!(guard.token().await.unwrap().as_str(), "def");
            assert_eq!(transport.calls(), 2);
        }

        #[tokio::test]
        async fn returned_tokens_always_outlive_the_buffer() {
            let transport = Arc::new(MockTransport::new());
            for i in 0..20 {
                transport.push_json(200, oauth_response(&format!("t{}", i), 300));
            }
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            for _ in 0..40 {
                guard.token().await.unwrap();
                let store = guard.store.lock().await;
                let token = store.current().unwrap();
                assert!(token.expiry() >= clock.now() + BUFFER);
                drop(store);
                clock.inc(37);
            }
        }

        #[tokio::test]
        async fn buffer_longer_than_lifetime_is_fatal() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 60));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            let err = guard.token().await.unwrap_err();

            assert!(matches!(
                err,
                AuthError::BufferExceedsLifetime {
                    buffer: BUFFER,
                    remaining: DurationSecs(60),
                }
            ));
            assert!(err.is_configuration_error());
            assert_eq!(transport.calls(), 1);
            assert_eq!(guard.status().await, None);
        }

        #[tokio::test]
        async fn buffer_just_over_lifetime_is_fatal() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 120));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, DurationSecs(121));

            let err = guard.acquire().await.unwrap_err();

            assert!(matches!(err, AuthError::BufferExceedsLifetime { .. }));
            assert_eq!(transport.calls(), 1);
        }

        #[tokio::test]
        async fn failed_renewal_surfaces_and_next_call_starts_over() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_raw(500, "unavailable");
            transport.push_json(200, oauth_response("def", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            clock.set(UnixTime(250));

            let err = guard.token().await.unwrap_err();
            assert!(matches!(err, AuthError::Rejected { .. }));
            assert_eq!(guard.status().await, None);

            assert_eq!(guard.token().await.unwrap().as_str(), "def");
            assert_eq!(transport.calls(), 3);
        }

        #[tokio::test]
        async fn transport_errors_propagate_unwrapped() {
            let transport = Arc::new(MockTransport::new());
            transport.push_error(TransportError::Timeout);
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            let err = guard.token().await.unwrap_err();

            assert!(matches!(err, AuthError::Transport(TransportError::Timeout)));
        }

        #[tokio::test]
        async fn acquire_always_exchanges_credentials() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_json(200, oauth_response("def", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            guard.acquire().await.unwrap();

            assert_eq!(guard.token().await.unwrap().as_str(), "def");
            assert_eq!(transport.calls(), 2);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_callers_share_one_renewal() {
            let transport = Arc::new(
                MockTransport::new().with_delay(std::time::Duration::from_millis(50)),
            );
            transport.push_json(200, oauth_response("abc", 300));
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = Arc::new(client_credentials_guard(&transport, &clock, BUFFER));

            let tasks: Vec<_> = (0..16)
                .map(|_| {
                    let guard = guard.clone();
                    tokio::spawn(async move { guard.token().await })
                })
                .collect();

            for task in tasks {
                assert_eq!(task.await.unwrap().unwrap().as_str(), "abc");
            }
            assert_eq!(transport.calls(), 1);
        }
    }

    mod with_password {
        use super::*;

        #[tokio::test]
        async fn token_inside_buffer_is_extended_not_renewed() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:00.5Z"));
            transport.push_json(200, session_response("new123", "2024-01-01T11:00:00.52Z"));
            let clock = SharedTestClock::new(TEN_AM);
            let guard = password_guard(&transport, &clock);

            assert_eq!(guard.token().await.unwrap().as_str(), "abc");

            // 60s remain of the first token
            clock.set(TEN_AM + DurationSecs(1_740));
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Extended);
            assert_eq!(guard.token().await.unwrap().as_str(), "new123");

            let requests = transport.requests();
            assert_eq!(requests.len(), 2);
            assert!(requests[1].url.path().ends_with("/keep-alive"));
            assert_eq!(requests[1].headers[http::header::AUTHORIZATION], "Bearer abc");
        }

        #[tokio::test]
        async fn expired_token_is_renewed_not_extended() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:00.5Z"));
            transport.push_json(200, session_response("def", "2024-01-01T11:30:00.5Z"));
            let clock = SharedTestClock::new(TEN_AM);
            let guard = password_guard(&transport, &clock);

            guard.acquire().await.unwrap();
            clock.set(TEN_AM + DurationSecs(1_800));

            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Renewed);
            let requests = transport.requests();
            assert!(requests[1].url.path().ends_with("/auth/token"));
        }

        #[tokio::test]
        async fn failed_extension_is_fatal_then_next_call_renews() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:00.5Z"));
            transport.push_raw(401, "expired session");
            transport.push_json(200, session_response("def", "2024-01-01T11:00:00.5Z"));
            let clock = SharedTestClock::new(TEN_AM);
            let guard = password_guard(&transport, &clock);

            guard.acquire().await.unwrap();
            clock.set(TEN_AM + DurationSecs(1_740));

            let err = guard.token().await.unwrap_err();
            assert!(matches!(err, AuthError::Rejected { .. }));
            assert_eq!(transport.calls(), 2);

            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Renewed);
            assert!(transport.requests()[2].url.path().ends_with("/auth/token"));
        }

        #[tokio::test]
        async fn extension_still_inside_buffer_is_fatal() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:00.5Z"));
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:30Z"));
            let clock = SharedTestClock::new(TEN_AM);
            let guard = password_guard(&transport, &clock);

            guard.acquire().await.unwrap();
            clock.set(TEN_AM + DurationSecs(1_740));

            let err = guard.token().await.unwrap_err();
            assert!(matches!(
                err,
                AuthError::BufferExceedsLifetime {
                    remaining: DurationSecs(90),
                    ..
                }
            ));
        }
    }

    mod after_invalidation {
        use super::*;

        #[tokio::test]
        async fn invalidate_revokes_then_token_fails_fast() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_raw(200, "");
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            assert!(guard.invalidate().await);
            assert!(guard.is_closed().await);

            let revoke = transport.last_request();
            assert!(revoke.url.path().ends_with("/invalidate-token"));
            assert_eq!(revoke.headers[http::header::AUTHORIZATION], "Bearer abc");

            let err = guard.token().await.unwrap_err();
            assert!(matches!(err, AuthError::Invalidated));
            assert!(matches!(
                guard.acquire().await.unwrap_err(),
                AuthError::Invalidated
            ));
            assert_eq!(transport.calls(), 2);
        }

        #[tokio::test]
        async fn refused_invalidation_still_retires_the_credential() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_raw(401, "");
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            assert!(!guard.invalidate().await);
            assert!(matches!(
                guard.token().await.unwrap_err(),
                AuthError::Invalidated
            ));
        }

        #[tokio::test]
        async fn second_invalidation_is_a_no_op() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_raw(204, "");
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            guard.acquire().await.unwrap();
            assert!(guard.invalidate().await);
            assert!(!guard.invalidate().await);
            assert_eq!(transport.calls(), 2);
        }

        #[tokio::test]
        async fn invalidating_without_a_token_sends_nothing() {
            let transport = Arc::new(MockTransport::new());
            let clock = SharedTestClock::new(UnixTime(0));
            let guard = client_credentials_guard(&transport, &clock, BUFFER);

            assert!(!guard.invalidate().await);
            assert_eq!(transport.calls(), 0);
            assert!(guard.is_closed().await);
        }
    }

    mod with_runtime_strategy {
        use super::*;

        #[tokio::test]
        async fn dispatches_extension_by_variant() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, session_response("abc", "2024-01-01T10:30:00.5Z"));
            transport.push_json(200, session_response("new123", "2024-01-01T11:00:00.5Z"));
            let clock = SharedTestClock::new(TEN_AM);

            let strategy: Strategy = PasswordStrategy::new(
                authority(&transport),
                &Username::from_static("user"),
                &Password::from_static("pass"),
            )
            .into();
            let guard = TokenGuard::new(
                strategy,
                TokenLifetimeConfig::new(BUFFER).with_clock(clock.clone()),
            );

            assert_eq!(guard.method(), AuthMethod::PasswordDerived);
            guard.acquire().await.unwrap();
            clock.set(TEN_AM + DurationSecs(1_740));
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Extended);
        }

        #[tokio::test]
        async fn client_credentials_variant_falls_back_to_renewal() {
            let transport = Arc::new(MockTransport::new());
            transport.push_json(200, oauth_response("abc", 300));
            transport.push_json(200, oauth_response("def", 300));
            let clock = SharedTestClock::new(UnixTime(0));

            let strategy: Strategy = ClientCredentialsStrategy::new(
                authority(&transport),
                dto::ClientCredentials {
                    client_id: ClientId::from_static("x"),
                    client_secret: ClientSecret::from_static("y"),
                },
            )
            .into();
            let guard = TokenGuard::new(
                strategy,
                TokenLifetimeConfig::new(BUFFER).with_clock(clock.clone()),
            );

            assert_eq!(guard.method(), AuthMethod::ClientCredentials);
            guard.acquire().await.unwrap();
            clock.set(UnixTime(250));
            assert_eq!(guard.ensure_valid().await.unwrap(), RenewOutcome::Renewed);
        }
    }
}
