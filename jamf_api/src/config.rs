//! Client configuration

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use jamf_clock::DurationSecs;
use jamf_tokens::{
    endpoints, AuthEndpoints, BasicToken, ClientId, ClientSecret, Password, TokenLifetimeConfig,
    Username,
};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// An error while loading or validating a [`ClientConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("unable to read configuration from {path}")]
    Io {
        /// The file that was being read
        path: PathBuf,
        /// The underlying failure
        source: io::Error,
    },
    /// The configuration is not well-formed
    #[error("unable to parse configuration")]
    Parse(#[from] serde_json::Error),
    /// A URL could not be built from the configuration
    #[error("invalid url in configuration")]
    InvalidUrl(#[from] url::ParseError),
    /// The token buffer cannot be used
    #[error("token buffer must be greater than zero, got {0}")]
    InvalidBuffer(DurationSecs),
    /// A credential field is empty
    #[error("credential field `{0}` must not be empty")]
    MissingCredential(&'static str),
}

/// Secret material used to obtain tokens
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// An API client ID and secret
    ClientCredentials {
        /// The client ID
        client_id: ClientId,
        /// The client secret
        client_secret: ClientSecret,
    },
    /// A user account's name and password
    Password {
        /// The account name
        username: Username,
        /// The account password
        password: Password,
    },
    /// A user account's name and password, already encoded for a `Basic`
    /// authorization header
    BasicToken {
        /// The encoded credentials
        basic_token: BasicToken,
    },
}

/// Which API surfaces a tenant exposes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Only the Classic API
    Classic,
    /// Only the Pro API
    Pro,
    /// Both surfaces, sharing one credential
    #[default]
    Both,
}

impl Credentials {
    fn check_present(&self) -> Result<(), ConfigError> {
        match self {
            Self::ClientCredentials {
                client_id,
                client_secret,
            } => {
                require("client_id", client_id.as_str())?;
                require("client_secret", client_secret.as_str())
            }
            Self::Password { username, password } => {
                require("username", username.as_str())?;
                require("password", password.as_str())
            }
            Self::BasicToken { basic_token } => require("basic_token", basic_token.as_str()),
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingCredential(field));
    }
    Ok(())
}

impl Mode {
    /// Whether the Classic API is exposed
    pub fn classic(self) -> bool {
        matches!(self, Self::Classic | Self::Both)
    }

    /// Whether the Pro API is exposed
    pub fn pro(self) -> bool {
        matches!(self, Self::Pro | Self::Both)
    }
}

/// Time allowed for requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestTimeouts {
    /// Time allowed for each request to the token endpoints
    pub auth: DurationSecs,
    /// Time allowed for each API request that does not set its own
    pub api: DurationSecs,
}

impl RequestTimeouts {
    /// The default time allowed for token requests
    pub const DEFAULT_AUTH: DurationSecs = DurationSecs(20);
    /// The default time allowed for API requests
    pub const DEFAULT_API: DurationSecs = DurationSecs(10);
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            auth: Self::DEFAULT_AUTH,
            api: Self::DEFAULT_API,
        }
    }
}

/// Paths of the server's endpoints
///
/// Every path is relative to the server URL.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Client credentials token exchange
    pub oauth_token: String,
    /// Username and password token exchange
    pub basic_token: String,
    /// Token keep-alive
    pub keep_alive: String,
    /// Token revocation
    pub invalidate: String,
    /// Root of the Classic API
    pub classic_root: String,
    /// Root of the Pro API, under which versions are addressed as `v{N}`
    pub pro_root: String,
}

impl HttpConfig {
    /// Default root of the Classic API
    pub const CLASSIC_ROOT: &'static str = "/JSSResource";
    /// Default root of the Pro API
    pub const PRO_ROOT: &'static str = "/api";

    /// The URL of a Jamf Cloud hosted tenant
    pub fn cloud_url(tenant: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://{tenant}.jamfcloud.com"))
    }

    /// Resolves the token endpoints against `server`
    pub fn auth_endpoints(&self, server: &Url) -> Result<AuthEndpoints, url::ParseError> {
        AuthEndpoints::with_paths(
            server,
            &self.oauth_token,
            &self.basic_token,
            &self.keep_alive,
            &self.invalidate,
        )
    }

    /// Resolves the Classic API root against `server`
    pub fn classic_url(&self, server: &Url) -> Result<Url, url::ParseError> {
        endpoints::join(server, &self.classic_root)
    }

    /// Resolves the Pro API root against `server`
    pub fn pro_url(&self, server: &Url) -> Result<Url, url::ParseError> {
        endpoints::join(server, &self.pro_root)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            oauth_token: AuthEndpoints::OAUTH_TOKEN_PATH.to_owned(),
            basic_token: AuthEndpoints::BASIC_TOKEN_PATH.to_owned(),
            keep_alive: AuthEndpoints::KEEP_ALIVE_PATH.to_owned(),
            invalidate: AuthEndpoints::INVALIDATE_PATH.to_owned(),
            classic_root: Self::CLASSIC_ROOT.to_owned(),
            pro_root: Self::PRO_ROOT.to_owned(),
        }
    }
}

/// Everything needed to connect to a tenant
///
/// ```
/// use jamf_api::{ClientConfig, Credentials, Mode};
///
/// let config: ClientConfig = serde_json::from_str(
///     r#"{
///         "url": "https://example.jamfcloud.com",
///         "credentials": {
///             "type": "client_credentials",
///             "client_id": "id",
///             "client_secret": "secret"
///         },
///         "mode": "pro"
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.mode, Mode::Pro);
/// assert!(config.safe_mode);
/// assert!(matches!(config.credentials, Credentials::ClientCredentials { .. }));
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// The server URL
    pub url: Url,

    /// Secret material used to obtain tokens
    pub credentials: Credentials,

    /// How long before expiry a token is replaced
    #[serde(default = "default_token_buffer")]
    pub token_buffer_secs: DurationSecs,

    /// Time allowed for requests
    #[serde(default)]
    pub request_timeout_secs: RequestTimeouts,

    /// Which API surfaces to expose
    #[serde(default)]
    pub mode: Mode,

    /// Whether request headers are left out of debug logs
    #[serde(default = "default_safe_mode")]
    pub safe_mode: bool,

    /// Endpoint path overrides
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_token_buffer() -> DurationSecs {
    TokenLifetimeConfig::<jamf_clock::System>::DEFAULT_BUFFER
}

fn default_safe_mode() -> bool {
    true
}

impl ClientConfig {
    /// Constructs a configuration with default settings
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            token_buffer_secs: default_token_buffer(),
            request_timeout_secs: RequestTimeouts::default(),
            mode: Mode::default(),
            safe_mode: default_safe_mode(),
            http: HttpConfig::default(),
        }
    }

    /// Loads and validates a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        let config: Self = serde_json::from_slice(&data)?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            url = %config.url,
            mode = ?config.mode,
            "loaded client configuration"
        );

        Ok(config)
    }

    /// Sets how long before expiry a token is replaced
    pub fn with_token_buffer(mut self, buffer: DurationSecs) -> Self {
        self.token_buffer_secs = buffer;
        self
    }

    /// Sets which API surfaces to expose
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets whether request headers are left out of debug logs
    pub fn with_safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    /// Sets the time allowed for requests
    pub fn with_timeouts(mut self, timeouts: RequestTimeouts) -> Self {
        self.request_timeout_secs = timeouts;
        self
    }

    /// Sets endpoint path overrides
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Checks that the configuration can be used to connect
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_buffer_secs == DurationSecs(0) {
            return Err(ConfigError::InvalidBuffer(self.token_buffer_secs));
        }

        self.credentials.check_present()?;

        self.http.auth_endpoints(&self.url)?;
        self.http.classic_url(&self.url)?;
        self.http.pro_url(&self.url)?;

        Ok(())
    }
}
