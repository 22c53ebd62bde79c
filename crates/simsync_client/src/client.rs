//! Remote document store client.

use crate::config::ClientConfig;
use crate::gate::{Admission, TokenGate};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use simsync_state::{ResourceKey, SyncError, SyncResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Error payload returned by the document store.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the REST document store.
///
/// Every verb issues (or parks) its request synchronously when called and
/// returns a `'static` future for the outcome, so call order is submission
/// order.
///
/// | Verb | Request | Success |
/// |---|---|---|
/// | `get` | `GET {base}/{collection}/{id}` | 200 (404 → `None`) |
/// | `list` | `GET {base}/{collection}` | 200 |
/// | `set` | `POST {base}/{collection}/{id}` | 204 |
/// | `delete` | `DELETE {base}/{collection}/{id}` | 204 |
pub struct RemoteClient<C: HttpClient = ReqwestClient> {
    base_url: String,
    http: Arc<C>,
    gate: TokenGate,
}

impl RemoteClient<ReqwestClient> {
    /// Creates a client backed by `reqwest`.
    pub fn connect(config: ClientConfig) -> SyncResult<Self> {
        let http = ReqwestClient::from_config(&config)?;
        Ok(Self::new(config, http))
    }
}

impl<C: HttpClient> RemoteClient<C> {
    /// Creates a client over an arbitrary HTTP implementation.
    pub fn new(config: ClientConfig, http: C) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: Arc::new(http),
            gate: TokenGate::new(config.token, config.queue_capacity, config.queue_timeout),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying HTTP client.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Returns the current token.
    pub fn token(&self) -> Option<String> {
        self.gate.token()
    }

    /// Returns true if requests are currently submitted immediately.
    pub fn has_token(&self) -> bool {
        self.gate.token().is_some()
    }

    /// Returns the number of requests waiting for a token.
    pub fn pending_requests(&self) -> usize {
        self.gate.parked()
    }

    /// Sets or clears the bearer token.
    ///
    /// Setting a token while none is present submits every waiting request
    /// in the order it was issued. Clearing it makes later requests wait
    /// again. Returns the number of replayed requests.
    pub fn set_token(&self, token: Option<String>) -> usize {
        let http = Arc::clone(&self.http);
        self.gate.set_token(token, move |request| http.send(request))
    }

    /// Fetches one entity. A 404 resolves to `Ok(None)`.
    pub fn get<T>(
        &self,
        key: &ResourceKey,
    ) -> impl Future<Output = SyncResult<Option<T>>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let admission = self.issue(HttpRequest::new(Method::Get, self.entity_url(key)));
        async move {
            let response = admission.response().await?;
            match response.status {
                200 => decode(&response).map(Some),
                404 => Ok(None),
                _ => Err(classify(&response)),
            }
        }
    }

    /// Fetches a whole collection as a map of id to value.
    pub fn list<T>(
        &self,
        collection: &str,
    ) -> impl Future<Output = SyncResult<HashMap<String, T>>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let admission = self.issue(HttpRequest::new(Method::Get, self.collection_url(collection)));
        async move {
            let response = admission.response().await?;
            match response.status {
                200 => decode(&response),
                _ => Err(classify(&response)),
            }
        }
    }

    /// Writes one entity.
    pub fn set<T>(
        &self,
        key: &ResourceKey,
        value: &T,
    ) -> impl Future<Output = SyncResult<()>> + Send + 'static
    where
        T: Serialize + ?Sized,
    {
        let admission = match serde_json::to_string(value) {
            Ok(body) => {
                self.issue(HttpRequest::new(Method::Post, self.entity_url(key)).with_body(body))
            }
            Err(e) => Admission::Rejected(SyncError::decode(format!(
                "failed to encode {}: {}",
                key, e
            ))),
        };
        expect_no_content(admission)
    }

    /// Removes one entity.
    pub fn delete(
        &self,
        key: &ResourceKey,
    ) -> impl Future<Output = SyncResult<()>> + Send + 'static {
        let admission = self.issue(HttpRequest::new(Method::Delete, self.entity_url(key)));
        expect_no_content(admission)
    }

    fn issue(&self, request: HttpRequest) -> Admission {
        debug!(method = %request.method, url = %request.url, "issuing request");
        let http = Arc::clone(&self.http);
        self.gate.admit(request, move |request| http.send(request))
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(collection))
    }

    fn entity_url(&self, key: &ResourceKey) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(key.collection()),
            urlencoding::encode(key.id())
        )
    }
}

async fn expect_no_content(admission: Admission) -> SyncResult<()> {
    let response = admission.response().await?;
    match response.status {
        204 => Ok(()),
        _ => Err(classify(&response)),
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> SyncResult<T> {
    serde_json::from_str(&response.body).map_err(|e| SyncError::decode(e.to_string()))
}

/// Turns a non-success response into a [`SyncError::Db`].
///
/// The message is the `message` field of a JSON body, else the raw body,
/// else the status line.
pub fn classify(response: &HttpResponse) -> SyncError {
    let message = if response.body.trim().is_empty() {
        response.status_line()
    } else {
        match serde_json::from_str::<ErrorBody>(&response.body) {
            Ok(body) => body.message,
            Err(_) => response.body.clone(),
        }
    };
    SyncError::db(response.status, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_json_message() {
        let err = classify(&HttpResponse::new(500, r#"{"message":"db unavailable"}"#));
        assert_eq!(err, SyncError::db(500, "db unavailable"));
    }

    #[test]
    fn classify_falls_back_to_body_then_status() {
        let err = classify(&HttpResponse::new(502, "upstream exploded"));
        assert_eq!(err, SyncError::db(502, "upstream exploded"));

        let err = classify(&HttpResponse::new(400, r#"{"detail":"x"}"#));
        assert_eq!(err, SyncError::db(400, r#"{"detail":"x"}"#));

        let err = classify(&HttpResponse::new(403, ""));
        assert_eq!(err, SyncError::db(403, "403 Forbidden"));
    }

    #[test]
    fn urls_are_encoded() {
        let client = RemoteClient::new(
            ClientConfig::new("http://db/api/"),
            crate::mock::MemoryServer::new(),
        );
        assert_eq!(client.base_url(), "http://db/api");
        assert_eq!(
            client.entity_url(&ResourceKey::new("challenge", "jbc 1")),
            "http://db/api/challenge/jbc%201"
        );
        assert_eq!(client.collection_url("scene"), "http://db/api/scene");
    }
}
