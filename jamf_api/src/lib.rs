//! Client for the Jamf Pro Classic and Pro APIs
//!
//! A [`Tenant`] connects to a server with one credential and exposes the
//! Classic API, the Pro API, or both. Requests sent through an [`Api`] carry
//! a bearer token from a [`TokenGuard`][jamf_tokens::TokenGuard] shared by
//! every surface of the tenant, so the token is renewed or extended
//! transparently as it nears expiry.
//!
//! ```no_run
//! use jamf_api::{ClientConfig, Credentials, Format, HttpConfig, Operation, Tenant};
//! use jamf_tokens::{ClientId, ClientSecret};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(
//!     HttpConfig::cloud_url("acme")?,
//!     Credentials::ClientCredentials {
//!         client_id: ClientId::from_static("client"),
//!         client_secret: ClientSecret::from_static("secret"),
//!     },
//! );
//!
//! let tenant = Tenant::connect(config).await?;
//! let classic = tenant.classic().expect("classic api enabled by default");
//!
//! let req = classic
//!     .get(classic.endpoint("computers")?)
//!     .headers(classic.headers(Operation::Read, Format::Json))
//!     .build()?;
//! let computers = classic.execute(req).await?.text().await?;
//!
//! tracing::info!(%computers, "listed computers");
//!
//! tenant.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `rustls-tls` (default): Enables TLS for the underlying [`reqwest`] client
//!   through `rustls`.

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

pub mod api;
mod config;
mod tenant;

pub use api::{Api, ApiError, ApiVersion, Format, Operation};
pub use config::{ClientConfig, ConfigError, Credentials, HttpConfig, Mode, RequestTimeouts};
pub use jamf_tokens;
pub use tenant::Tenant;
