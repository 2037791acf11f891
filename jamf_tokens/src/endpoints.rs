//! Locations of the authority's token endpoints

use url::Url;

/// The token endpoints of a server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// Client credentials token exchange
    pub oauth_token: Url,
    /// Username and password token exchange
    pub basic_token: Url,
    /// Token keep-alive
    pub keep_alive: Url,
    /// Token revocation
    pub invalidate: Url,
}

impl AuthEndpoints {
    /// Path of the client credentials token exchange
    pub const OAUTH_TOKEN_PATH: &'static str = "/api/oauth/token";
    /// Path of the username and password token exchange
    pub const BASIC_TOKEN_PATH: &'static str = "/api/v1/auth/token";
    /// Path of the keep-alive endpoint
    pub const KEEP_ALIVE_PATH: &'static str = "/api/v1/auth/keep-alive";
    /// Path of the revocation endpoint
    pub const INVALIDATE_PATH: &'static str = "/api/v1/auth/invalidate-token";

    /// Resolves the default endpoint paths against `server`
    pub fn for_server(server: &Url) -> Result<Self, url::ParseError> {
        Self::with_paths(
            server,
            Self::OAUTH_TOKEN_PATH,
            Self::BASIC_TOKEN_PATH,
            Self::KEEP_ALIVE_PATH,
            Self::INVALIDATE_PATH,
        )
    }

    /// Resolves custom endpoint paths against `server`
    ///
    /// Paths are appended to the server URL, so a server hosted under a path
    /// prefix keeps that prefix.
    pub fn with_paths(
        server: &Url,
        oauth_token: &str,
        basic_token: &str,
        keep_alive: &str,
        invalidate: &str,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            oauth_token: join(server, oauth_token)?,
            basic_token: join(server, basic_token)?,
            keep_alive: join(server, keep_alive)?,
            invalidate: join(server, invalidate)?,
        })
    }
}

/// Appends `path` to `base`, keeping any path `base` already has
pub fn join(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
}
