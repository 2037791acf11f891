//! A connected tenant

use std::{sync::Arc, time::Duration};

use jamf_tokens::{
    strategy::dto, AuthMethod, Authority, ClientCredentialsStrategy, PasswordStrategy,
    ReqwestTransport, Strategy, TokenGuard, TokenLifetimeConfig,
};
use url::Url;

use crate::{Api, ApiError, ApiVersion, ClientConfig, Credentials};

/// A server connection holding one credential and the API surfaces using it
///
/// ```no_run
/// use jamf_api::{ClientConfig, Tenant};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ClientConfig::from_json_file("jamf.json")?;
/// let tenant = Tenant::connect(config).await?;
///
/// if let Some(pro) = tenant.pro() {
///     let url = pro.endpoint("v1/jamf-pro-version")?;
///     let resp = pro.execute(pro.get(url).build()?).await?;
///     println!("{}", resp.text().await?);
/// }
///
/// tenant.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tenant {
    url: Url,
    guard: Arc<TokenGuard<Strategy>>,
    classic: Option<Api>,
    pro: Option<Api>,
}

impl Tenant {
    /// Connects using a default HTTP client
    pub async fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().build()?;
        Self::connect_with_client(config, client).await
    }

    /// Connects using `client` for both token and API requests
    ///
    /// A token is acquired before this returns, so bad credentials or an
    /// unusable buffer surface here rather than on the first request.
    ///
    /// TLS settings live on `client`. A server that wants a client certificate
    /// or trusts a private CA is reached by building the client with
    /// [`identity()`][reqwest::ClientBuilder::identity()] or
    /// [`add_root_certificate()`][reqwest::ClientBuilder::add_root_certificate()].
    #[tracing::instrument(
        err,
        skip(config, client),
        fields(url = %config.url, mode = ?config.mode),
    )]
    pub async fn connect_with_client(
        config: ClientConfig,
        client: reqwest::Client,
    ) -> Result<Self, ApiError> {
        config.validate()?;

        let endpoints = config.http.auth_endpoints(&config.url)?;
        let authority = Authority::new(ReqwestTransport::new(client.clone()), endpoints)
            .with_timeout(config.request_timeout_secs.auth.into());

        let strategy: Strategy = match config.credentials {
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => ClientCredentialsStrategy::new(
                authority,
                dto::ClientCredentials {
                    client_id,
                    client_secret,
                },
            )
            .into(),
            Credentials::Password { username, password } => {
                PasswordStrategy::new(authority, &username, &password).into()
            }
            Credentials::BasicToken { basic_token } => {
                PasswordStrategy::from_basic_token(authority, basic_token).into()
            }
        };

        let guard = Arc::new(TokenGuard::new(
            strategy,
            TokenLifetimeConfig::new(config.token_buffer_secs),
        ));

        guard.acquire().await?;

        let api_timeout: Duration = config.request_timeout_secs.api.into();
        let surface = |version, root| {
            Api::new(
                version,
                root,
                client.clone(),
                guard.clone(),
                api_timeout,
                config.safe_mode,
            )
        };

        let classic = if config.mode.classic() {
            Some(surface(
                ApiVersion::Classic,
                config.http.classic_url(&config.url)?,
            ))
        } else {
            None
        };

        let pro = if config.mode.pro() {
            Some(surface(ApiVersion::Pro, config.http.pro_url(&config.url)?))
        } else {
            None
        };

        let tenant = Self {
            url: config.url,
            guard,
            classic,
            pro,
        };

        tracing::info!(
            tenant = tenant.name(),
            method = %tenant.method(),
            "connected to tenant"
        );

        Ok(tenant)
    }

    /// The Classic API, if enabled
    #[inline]
    pub fn classic(&self) -> Option<&Api> {
        self.classic.as_ref()
    }

    /// The Pro API, if enabled
    #[inline]
    pub fn pro(&self) -> Option<&Api> {
        self.pro.as_ref()
    }

    /// The server URL
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The kind of credential in use
    pub fn method(&self) -> AuthMethod {
        self.guard.method()
    }

    /// The tenant's short name, the first label of the server's host
    ///
    /// For `https://acme.jamfcloud.com` this is `acme`.
    pub fn name(&self) -> &str {
        tenant_name(&self.url)
    }

    /// The guard shared by all API surfaces
    #[inline]
    pub fn guard(&self) -> &Arc<TokenGuard<Strategy>> {
        &self.guard
    }

    /// Invalidates the credential, closing every API surface
    ///
    /// Returns whether the server confirmed the invalidation. Only the first
    /// call contacts the server.
    pub async fn close(&self) -> bool {
        tracing::info!(tenant = self.name(), "closing tenant");
        self.guard.invalidate().await
    }
}

fn tenant_name(url: &Url) -> &str {
    url.host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or_default()
}
