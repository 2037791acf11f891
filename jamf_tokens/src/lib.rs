//! Bearer token lifecycle management for the Jamf Pro API
//!
//! Every request to a Jamf Pro server must carry a short-lived bearer token.
//! This crate obtains those tokens, keeps them valid, and retires them when a
//! client is done, so that consumers only ever ask for "a token that is good
//! right now".
//!
//! Two kinds of credential are supported:
//!
//! * An API client ID and secret, exchanged for an OAuth access token. These
//!   tokens can only be replaced by a new exchange.
//! * A username and password, exchanged for a session token. These tokens can
//!   also be prolonged through the keep-alive endpoint.
//!
//! # General Flow
//!
//! A [`TokenGuard`] pairs a [`RenewalStrategy`] with a [`TokenLifetimeConfig`].
//! The lifetime configuration holds a _buffer_: a token with less than the
//! buffer remaining before its expiry is considered _stale_ and is extended or
//! renewed before it is handed out again. A token past its expiry is always
//! renewed.
//!
//! ```
//! use jamf_clock::DurationSecs;
//! use jamf_tokens::{
//!     strategy::dto, AuthEndpoints, Authority, ClientCredentialsStrategy, ClientId,
//!     ClientSecret, ReqwestTransport, TokenGuard, TokenLifetimeConfig,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = url::Url::parse("https://example.jamfcloud.com")?;
//! let authority = Authority::new(
//!     ReqwestTransport::new(reqwest::Client::new()),
//!     AuthEndpoints::for_server(&server)?,
//! );
//!
//! let strategy = ClientCredentialsStrategy::new(
//!     authority,
//!     dto::ClientCredentials {
//!         client_id: ClientId::from_static("client"),
//!         client_secret: ClientSecret::from_static("secret"),
//!     },
//! );
//!
//! let guard = TokenGuard::new(strategy, TokenLifetimeConfig::new(DurationSecs::from_mins(2)));
//!
//! guard.acquire().await?;
//! let token = guard.token().await?;
//!
//! tracing::info!(token = format_args!("{:#?}", token), "access token");
//!
//! guard.invalidate().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `reqwest` (default): Provides [`ReqwestTransport`], an [`HttpTransport`]
//!   backed by a [`reqwest::Client`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
pub mod endpoints;
mod error;
mod guard;
pub mod policy;
mod store;
pub mod strategy;
pub mod time;
mod tokens;
pub mod transport;

pub use braids::*;
pub use endpoints::AuthEndpoints;
pub use error::AuthError;
pub use guard::{RenewOutcome, TokenGuard};
pub use policy::TokenStatus;
pub use store::CredentialStore;
pub use strategy::{
    AuthMethod, Authority, ClientCredentialsStrategy, PasswordStrategy, RenewalStrategy, Strategy,
};
pub use tokens::{IssuedToken, TokenLifetimeConfig};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpTransport, TransportError, TransportRequest, TransportResponse};
