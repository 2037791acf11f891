//! The HTTP seam between the token lifecycle and the network
//!
//! Everything the token guard and its strategies need from the network is
//! "send one request, get back one response". Connection pooling and TLS are
//! the transport's business.

use std::{error, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use thiserror::Error;
use url::Url;

type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A single outbound request
#[derive(Clone, Debug)]
pub struct TransportRequest {
    /// The request method
    pub method: Method,
    /// The fully-resolved target
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// The request body, if any
    pub body: Option<Bytes>,
    /// The time allowed for the whole exchange
    pub timeout: Duration,
}

impl TransportRequest {
    /// A body-less `POST` that accepts JSON
    pub fn post(url: Url, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        Self {
            method: Method::POST,
            url,
            headers,
            body: None,
            timeout,
        }
    }

    /// Sets a header, replacing any previous value
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body along with its content type
    pub fn with_body(mut self, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(body.into());
        self
    }
}

/// The response to a [`TransportRequest`]
#[derive(Clone, Debug)]
pub struct TransportResponse {
    /// The response status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// The full response body
    pub body: Bytes,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A failure to complete an exchange with the server
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("request timed out")]
    Timeout,
    /// Unable to send the request
    #[error("error sending request")]
    Send(#[source] BoxError),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] BoxError),
}

#[cfg(feature = "reqwest")]
impl TransportError {
    fn from_send(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Send(error.into())
        }
    }

    fn from_body(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::BodyRead(error.into())
        }
    }
}

/// Issues a single HTTP request
#[async_trait]
pub trait HttpTransport: fmt::Debug + Send + Sync {
    /// Sends `request` and waits for the complete response
    ///
    /// Any response received from the server, successful or not, is `Ok`.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

/// A transport backed by a [`reqwest::Client`]
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestTransport {
    /// Constructs a transport that sends requests through `client`
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().await.map_err(TransportError::from_send)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(TransportError::from_body)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
