use http::StatusCode;
use jamf_clock::DurationSecs;
use thiserror::Error;

use crate::{AuthMethod, TransportError};

/// An error while obtaining, extending or using a credential
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authority refused the request
    #[error("authority rejected token request with status {status}: {body}")]
    Rejected {
        /// The status returned by the authority
        status: StatusCode,
        /// The body of the response
        body: String,
    },
    /// A freshly obtained token was already inside its buffer window
    ///
    /// The configured buffer is at least as long as the lifetime of the tokens
    /// the authority issues, so renewing again would not help.
    #[error("buffer longer than token lifetime: buffer is {buffer}, but only {remaining} remains on a new token")]
    BufferExceedsLifetime {
        /// The configured buffer
        buffer: DurationSecs,
        /// The validity remaining on the new token
        remaining: DurationSecs,
    },
    /// The operation is not offered for this kind of credential
    #[error("action not available with this credential type ({method})")]
    Unsupported {
        /// The credential type the operation was attempted with
        method: AuthMethod,
    },
    /// The credential was invalidated and may no longer be used
    #[error("credential has been invalidated")]
    Invalidated,
    /// A credential contains bytes that cannot be sent in a header
    #[error("credential cannot be sent in an authorization header")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    /// Unable to encode the token request
    #[error("error encoding token request")]
    Encode(#[from] serde_urlencoded::ser::Error),
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBody(#[from] serde_json::Error),
    /// The authority reported an expiry that could not be understood
    #[error("unable to parse token expiry {value:?}")]
    InvalidExpiry {
        /// The expiry as reported
        value: String,
        /// The underlying parse failure
        source: chrono::ParseError,
    },
    /// Unable to exchange messages with the authority
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AuthError {
    /// Whether the error is fatal for the credential regardless of how often
    /// the operation is retried
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::BufferExceedsLifetime { .. } | Self::Unsupported { .. } | Self::Invalidated
        )
    }
}
