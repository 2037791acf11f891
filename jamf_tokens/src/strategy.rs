//! Credential renewal strategies
//!
//! A strategy knows how to exchange long-lived secret material for a bearer
//! token. Both kinds of credential can be fully renewed; only password-derived
//! credentials can have their current token extended through the keep-alive
//! endpoint. Strategies never hold the current token themselves, they hand
//! back an [`IssuedToken`] for the [`TokenGuard`][crate::TokenGuard] to store.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use http::{header, HeaderValue};
use jamf_clock::UnixTime;
use serde::{Deserialize, Serialize};

use crate::{
    AccessTokenRef, AuthEndpoints, AuthError, HttpTransport, IssuedToken, TransportRequest,
};

pub mod client_credentials;
pub mod dto;
pub mod password;

pub use client_credentials::ClientCredentialsStrategy;
pub use password::PasswordStrategy;

/// The kind of credential a token was obtained with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// A client ID and secret exchanged for an OAuth access token
    ClientCredentials,
    /// A username and password exchanged for a session token
    PasswordDerived,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientCredentials => "client-credentials",
            Self::PasswordDerived => "password-derived",
        })
    }
}

/// Operations for obtaining and disposing of tokens for one kind of credential
#[async_trait]
pub trait RenewalStrategy: fmt::Debug + Send + Sync {
    /// The kind of credential this strategy exchanges
    fn method(&self) -> AuthMethod;

    /// Whether [`extend()`][Self::extend()] is offered
    fn supports_extend(&self) -> bool {
        false
    }

    /// The authority tokens are requested from
    fn authority(&self) -> &Authority;

    /// Obtains a brand new token through a full credential exchange
    ///
    /// `now` is the instant the caller judged the previous token against; it
    /// is used as the issue time of the new token.
    async fn renew(&self, now: UnixTime) -> Result<IssuedToken, AuthError>;

    /// Prolongs the session behind `current`
    ///
    /// The authority may hand back a different token string. Strategies that do
    /// not support extension return [`AuthError::Unsupported`] and never fall
    /// back to a renewal on their own.
    async fn extend(
        &self,
        current: &AccessTokenRef,
        now: UnixTime,
    ) -> Result<IssuedToken, AuthError> {
        let _ = (current, now);
        Err(AuthError::Unsupported {
            method: self.method(),
        })
    }

    /// Revokes `current` at the authority, reporting whether it succeeded
    async fn invalidate(&self, current: &AccessTokenRef) -> bool {
        self.authority().invalidate(current).await
    }
}

/// A connection to the token authority
///
/// Shared plumbing for the strategies: where to send requests, how long to
/// wait for them, and how to interpret the response status.
#[derive(Clone, Debug)]
pub struct Authority {
    transport: Arc<dyn HttpTransport>,
    endpoints: AuthEndpoints,
    timeout: Duration,
}

impl Authority {
    /// The time allowed for an authority request when none is configured
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    /// Constructs an authority reachable through `transport`
    pub fn new(transport: impl HttpTransport + 'static, endpoints: AuthEndpoints) -> Self {
        Self::from_shared(Arc::new(transport), endpoints)
    }

    /// Constructs an authority from a transport shared with other components
    pub fn from_shared(transport: Arc<dyn HttpTransport>, endpoints: AuthEndpoints) -> Self {
        Self {
            transport,
            endpoints,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the time allowed for each authority request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The authority's endpoints
    #[inline]
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// The time allowed for each authority request
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(
        err,
        skip(self, request),
        fields(
            url = %request.url,
            method = %request.method,
        ),
    )]
    pub(crate) async fn exchange(&self, request: TransportRequest) -> Result<Bytes, AuthError> {
        tracing::trace!("sending request to authority");

        let resp = self.transport.send(request).await?;

        tracing::debug!(
            response.status = resp.status.as_u16(),
            "received response from authority"
        );

        if !resp.is_success() {
            return Err(AuthError::Rejected {
                status: resp.status,
                body: resp.text(),
            });
        }

        Ok(resp.body)
    }

    /// Revokes `token`, reporting whether the authority accepted the request
    ///
    /// Failures are logged rather than returned.
    pub async fn invalidate(&self, token: &AccessTokenRef) -> bool {
        let auth = match bearer(token) {
            Ok(auth) => auth,
            Err(_) => {
                tracing::warn!("token cannot be sent in a header, not invalidating");
                return false;
            }
        };

        let request = TransportRequest::post(self.endpoints.invalidate.clone(), self.timeout)
            .with_header(header::AUTHORIZATION, auth);

        match self.transport.send(request).await {
            Ok(resp) if resp.is_success() => {
                tracing::info!(response.status = resp.status.as_u16(), "token invalidated");
                true
            }
            Ok(resp) => {
                tracing::warn!(
                    response.status = resp.status.as_u16(),
                    "authority refused to invalidate token"
                );
                false
            }
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn std::error::Error),
                    "unable to reach authority to invalidate token"
                );
                false
            }
        }
    }
}

/// Builds an `Authorization` header value for `scheme` and `credential`
pub(crate) fn authorization(
    scheme: &str,
    credential: &str,
) -> Result<HeaderValue, header::InvalidHeaderValue> {
    let mut header_value = BytesMut::with_capacity(scheme.len() + credential.len() + 1);
    header_value.put_slice(scheme.as_bytes());
    header_value.put_u8(b' ');
    header_value.put_slice(credential.as_bytes());
    let mut value = HeaderValue::from_maybe_shared(header_value.freeze())?;
    value.set_sensitive(true);
    Ok(value)
}

/// Builds a `Bearer` authorization header for `token`
pub fn bearer(token: &AccessTokenRef) -> Result<HeaderValue, header::InvalidHeaderValue> {
    authorization("Bearer", token.as_str())
}

/// A strategy picked at runtime
#[derive(Debug)]
pub enum Strategy {
    /// Client credentials exchange, renewal only
    ClientCredentials(ClientCredentialsStrategy),
    /// Username and password exchange, with keep-alive extension
    Password(PasswordStrategy),
}

impl From<ClientCredentialsStrategy> for Strategy {
    fn from(s: ClientCredentialsStrategy) -> Self {
        Self::ClientCredentials(s)
    }
}

impl From<PasswordStrategy> for Strategy {
    fn from(s: PasswordStrategy) -> Self {
        Self::Password(s)
    }
}

#[async_trait]
impl RenewalStrategy for Strategy {
    fn method(&self) -> AuthMethod {
        match self {
            Self::ClientCredentials(s) => s.method(),
            Self::Password(s) => s.method(),
        }
    }

    fn supports_extend(&self) -> bool {
        match self {
            Self::ClientCredentials(s) => s.supports_extend(),
            Self::Password(s) => s.supports_extend(),
        }
    }

    fn authority(&self) -> &Authority {
        match self {
            Self::ClientCredentials(s) => s.authority(),
            Self::Password(s) => s.authority(),
        }
    }

    async fn renew(&self, now: UnixTime) -> Result<IssuedToken, AuthError> {
        match self {
            Self::ClientCredentials(s) => s.renew(now).await,
            Self::Password(s) => s.renew(now).await,
        }
    }

    async fn extend(
        &self,
        current: &AccessTokenRef,
        now: UnixTime,
    ) -> Result<IssuedToken, AuthError> {
        match self {
            Self::ClientCredentials(s) => s.extend(current, now).await,
            Self::Password(s) => s.extend(current, now).await,
        }
    }
}
