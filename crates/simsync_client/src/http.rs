//! HTTP transport abstraction.
//!
//! The remote client never talks to an HTTP library directly. It builds typed
//! [`HttpRequest`] values and hands them to an [`HttpClient`], which allows
//! swapping `reqwest` for an in-memory server in tests.

use crate::config::ClientConfig;
use futures::future::BoxFuture;
use simsync_state::{SyncError, SyncResult};
use std::fmt;

/// HTTP methods used by the document store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read one entity or a whole collection.
    Get,
    /// Write one entity.
    Post,
    /// Remove one entity.
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Creates a JSON request with no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: None,
        }
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a bearer token.
    pub fn authorize(mut self, token: &str) -> Self {
        self.headers
            .push(("Authorization".into(), format!("Bearer {}", token)));
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the remote client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body text (possibly empty).
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a bodiless `204 No Content`.
    pub fn no_content() -> Self {
        Self::new(204, "")
    }

    /// Returns the status line, e.g. `500 Internal Server Error`.
    pub fn status_line(&self) -> String {
        match reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
        {
            Some(reason) => format!("{} {}", self.status, reason),
            None => self.status.to_string(),
        }
    }
}

/// Future resolving to the response of a submitted request.
pub type ResponseFuture = BoxFuture<'static, SyncResult<HttpResponse>>;

/// HTTP client abstraction.
///
/// A request counts as submitted when `send` returns; implementations must
/// not reorder requests they have accepted. A failure to obtain any response
/// is reported as [`SyncError::Transport`]; every status code, including
/// errors, is a successful [`HttpResponse`].
pub trait HttpClient: Send + Sync + 'static {
    /// Submits a request.
    fn send(&self, request: HttpRequest) -> ResponseFuture;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with default settings.
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Wraps an already configured `reqwest` client.
    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Creates a client honoring the request timeout and user agent of `config`.
    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let inner = builder
            .build()
            .map_err(|e| SyncError::transport(format!("failed to build http client: {}", e)))?;
        Ok(Self { inner })
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> ResponseFuture {
        let mut builder = self.inner.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let exchange = async move {
            let response = builder
                .send()
                .await
                .map_err(|e| SyncError::transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| SyncError::transport(e.to_string()))?;
            Ok(HttpResponse { status, body })
        };

        // Start the exchange right away when a runtime is available so that
        // submission order follows call order.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(exchange);
                Box::pin(async move {
                    task.await
                        .map_err(|e| SyncError::transport(format!("request task failed: {}", e)))?
                })
            }
            Err(_) => Box::pin(exchange),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_headers() {
        let request = HttpRequest::new(Method::Get, "http://db/scene/moon").authorize("t0k");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("Authorization"), Some("Bearer t0k"));
        assert!(request.body.is_none());
    }

    #[test]
    fn status_lines() {
        assert_eq!(HttpResponse::new(500, "").status_line(), "500 Internal Server Error");
        assert_eq!(HttpResponse::new(404, "").status_line(), "404 Not Found");
        assert_eq!(HttpResponse::new(599, "").status_line(), "599");
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(reqwest::Method::from(Method::Post), reqwest::Method::POST);
    }

    #[test]
    fn reqwest_client_from_config() {
        let config = ClientConfig::new("http://localhost:1")
            .with_request_timeout(std::time::Duration::from_secs(5));
        assert!(ReqwestClient::from_config(&config).is_ok());
    }
}
