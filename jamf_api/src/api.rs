//! Authenticated API surfaces

use std::{fmt, sync::Arc, time::Duration};

use http::{header, HeaderMap, HeaderValue, StatusCode};
use jamf_tokens::{strategy, AuthError, Strategy, TokenGuard};
use reqwest::{Method, Request, RequestBuilder, Response};
use thiserror::Error;
use url::Url;

use crate::ConfigError;

/// An error while sending an API request
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unable to obtain a token for the request
    #[error("unable to authenticate request")]
    Auth(#[from] AuthError),
    /// Unable to exchange messages with the server
    #[error("error sending request")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status
    #[error("server responded with status {status}: {body}")]
    Status {
        /// The status returned by the server
        status: StatusCode,
        /// The body of the response
        body: String,
    },
    /// The tenant was closed and its credential invalidated
    #[error("tenant has been closed")]
    Closed,
    /// A request URL could not be built
    #[error("invalid request url")]
    InvalidUrl(#[from] url::ParseError),
    /// The client could not be configured
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The two API surfaces a server offers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// The XML-first Classic API
    Classic,
    /// The JSON Pro API
    Pro,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Classic => "classic",
            Self::Pro => "pro",
        })
    }
}

/// The kind of operation a request performs, for picking header presets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Creating or updating a resource
    CreateUpdate,
    /// Reading a resource
    Read,
    /// Deleting a resource
    Delete,
    /// Downloading an image
    Image,
}

/// The representation exchanged with the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// `text/xml`
    Xml,
    /// `application/json`
    Json,
}

impl Format {
    fn media_type(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Xml => "text/xml",
            Self::Json => "application/json",
        })
    }
}

/// The preset headers for an operation
///
/// Writes carry both `Accept` and `Content-Type`; reads and deletes carry only
/// `Accept`. Image downloads accept any image type, whatever `format` is.
pub fn headers(op: Operation, format: Format) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(2);
    match op {
        Operation::CreateUpdate => {
            headers.insert(header::ACCEPT, format.media_type());
            headers.insert(header::CONTENT_TYPE, format.media_type());
        }
        Operation::Read | Operation::Delete => {
            headers.insert(header::ACCEPT, format.media_type());
        }
        Operation::Image => {
            headers.insert(header::ACCEPT, HeaderValue::from_static("image/*"));
        }
    }
    headers
}

/// One API surface of a tenant
///
/// Every request sent through [`execute()`][Self::execute()] carries a token
/// from the guard shared by all surfaces of the tenant. Any `Authorization`
/// header already on the request is replaced.
#[derive(Clone, Debug)]
pub struct Api {
    version: ApiVersion,
    root: Url,
    client: reqwest::Client,
    guard: Arc<TokenGuard<Strategy>>,
    timeout: Duration,
    safe_mode: bool,
}

impl Api {
    pub(crate) fn new(
        version: ApiVersion,
        root: Url,
        client: reqwest::Client,
        guard: Arc<TokenGuard<Strategy>>,
        timeout: Duration,
        safe_mode: bool,
    ) -> Self {
        tracing::debug!(%version, %root, "api surface ready");
        Self {
            version,
            root,
            client,
            guard,
            timeout,
            safe_mode,
        }
    }

    /// Which surface this is
    #[inline]
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// The root URL of this surface
    ///
    /// For the Classic API this is the resource root all endpoints hang off.
    /// For the Pro API it is unversioned; see [`pro_url()`][Self::pro_url()].
    #[inline]
    pub fn url(&self) -> &Url {
        &self.root
    }

    /// The root URL of a version of the Pro API, such as `/api/v1`
    ///
    /// Returns `None` on the Classic API, which is not versioned.
    pub fn pro_url(&self, version: u32) -> Option<Url> {
        match self.version {
            ApiVersion::Classic => None,
            ApiVersion::Pro => {
                jamf_tokens::endpoints::join(&self.root, &format!("v{version}")).ok()
            }
        }
    }

    /// Resolves `path` against the root of this surface
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(jamf_tokens::endpoints::join(&self.root, path)?)
    }

    /// The preset headers for an operation
    pub fn headers(&self, op: Operation, format: Format) -> HeaderMap {
        headers(op, format)
    }

    /// Time allowed for requests that do not set their own
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Starts a `GET` request
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Starts a `POST` request
    pub fn post(&self, url: Url) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Starts a `PUT` request
    pub fn put(&self, url: Url) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Starts a `DELETE` request
    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Starts a request with an arbitrary method
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Authenticates and sends `request`, failing on a non-success status
    pub async fn execute(&self, request: Request) -> Result<Response, ApiError> {
        let resp = self.execute_unchecked(request).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await?;
            tracing::debug!(status = status.as_u16(), "request unsuccessful");
            return Err(ApiError::Status { status, body });
        }

        Ok(resp)
    }

    /// Authenticates and sends `request`, returning whatever the server answers
    #[tracing::instrument(
        level = "debug",
        err,
        skip(self, request),
        fields(
            api = %self.version(),
            method = %request.method(),
            url = %request.url(),
        ),
    )]
    pub async fn execute_unchecked(&self, mut request: Request) -> Result<Response, ApiError> {
        let token = self.guard.token().await.map_err(|error| match error {
            AuthError::Invalidated => ApiError::Closed,
            error => ApiError::Auth(error),
        })?;

        let auth = strategy::bearer(&token).map_err(AuthError::from)?;
        request.headers_mut().insert(header::AUTHORIZATION, auth);

        if request.timeout().is_none() {
            *request.timeout_mut() = Some(self.timeout);
        }

        if self.safe_mode {
            tracing::debug!(headers = "[redacted]", "sending request");
        } else {
            tracing::debug!(headers = ?request.headers(), "sending request");
        }

        let resp = self.client.execute(request).await?;

        tracing::debug!(status = resp.status().as_u16(), "received response");

        Ok(resp)
    }
}
