//! In-memory document store for testing.
//!
//! [`MemoryServer`] implements [`HttpClient`] by answering requests the way
//! the real document store does, without a network. It records every request
//! in submission order, can be scripted to fail upcoming requests, and can
//! hold responses back so tests can interleave local edits with in-flight
//! requests.

use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, ResponseFuture};
use parking_lot::Mutex;
use serde_json::{json, Value};
use simsync_state::SyncError;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;

/// A request as received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Method.
    pub method: Method,
    /// Path relative to the server root, decoded (e.g. `challenge/jbc1`).
    pub path: String,
    /// Authorization header, if any.
    pub authorization: Option<String>,
    /// Body, if any.
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
enum Failure {
    Status { status: u16, body: String },
    Transport(String),
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    method: Option<Method>,
    failure: Failure,
}

#[derive(Default)]
struct ServerState {
    documents: BTreeMap<String, BTreeMap<String, Value>>,
    token: Option<String>,
    log: Vec<RecordedRequest>,
    failures: VecDeque<ScriptedFailure>,
    holding: bool,
    held: VecDeque<oneshot::Sender<()>>,
}

/// In-memory implementation of the document store REST contract.
///
/// Cloning yields another handle to the same server.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Creates an empty server that accepts any caller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server that only accepts `Bearer {token}`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let server = Self::new();
        server.state.lock().token = Some(token.into());
        server
    }

    /// Stores a document directly.
    pub fn insert(&self, collection: &str, id: &str, value: Value) {
        self.state
            .lock()
            .documents
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
    }

    /// Returns a stored document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .documents
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    /// Returns the number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.state
            .lock()
            .documents
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Returns every request received so far, in submission order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().log.clone()
    }

    /// Answers the next request (optionally of one method) with `status` and `body`.
    pub fn fail_next(&self, method: Option<Method>, status: u16, body: impl Into<String>) {
        self.state.lock().failures.push_back(ScriptedFailure {
            method,
            failure: Failure::Status {
                status,
                body: body.into(),
            },
        });
    }

    /// Fails the next request (optionally of one method) before any response.
    pub fn fail_transport_next(&self, method: Option<Method>, message: impl Into<String>) {
        self.state.lock().failures.push_back(ScriptedFailure {
            method,
            failure: Failure::Transport(message.into()),
        });
    }

    /// Holds every response until released.
    pub fn hold(&self) {
        self.state.lock().holding = true;
    }

    /// Stops holding and releases every held response.
    pub fn release(&self) {
        let held: Vec<_> = {
            let mut state = self.state.lock();
            state.holding = false;
            state.held.drain(..).collect()
        };
        for gate in held {
            let _ = gate.send(());
        }
    }

    /// Releases the oldest held response, keeping the hold in place.
    ///
    /// Returns false if nothing was held.
    pub fn release_next(&self) -> bool {
        let next = self.state.lock().held.pop_front();
        match next {
            Some(gate) => {
                let _ = gate.send(());
                true
            }
            None => false,
        }
    }

    /// Returns the number of held responses.
    pub fn held(&self) -> usize {
        self.state.lock().held.len()
    }
}

impl ServerState {
    fn handle(&mut self, request: &RecordedRequest) -> HttpResponse {
        if let Some(token) = &self.token {
            if request.authorization.as_deref() != Some(format!("Bearer {}", token).as_str()) {
                return error_response(401, "unauthorized");
            }
        }

        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, [collection]) => {
                let docs = self.documents.get(*collection).cloned().unwrap_or_default();
                HttpResponse::new(200, Value::Object(docs.into_iter().collect()).to_string())
            }
            (Method::Get, [collection, id]) => {
                match self.documents.get(*collection).and_then(|c| c.get(*id)) {
                    Some(doc) => HttpResponse::new(200, doc.to_string()),
                    None => error_response(404, "not found"),
                }
            }
            (Method::Post, [collection, id]) => {
                let body = request.body.as_deref().unwrap_or("");
                match serde_json::from_str::<Value>(body) {
                    Ok(doc) => {
                        self.documents
                            .entry(collection.to_string())
                            .or_default()
                            .insert(id.to_string(), doc);
                        HttpResponse::no_content()
                    }
                    Err(e) => error_response(400, &format!("invalid json: {}", e)),
                }
            }
            (Method::Delete, [collection, id]) => {
                match self.documents.get_mut(*collection).and_then(|c| c.remove(*id)) {
                    Some(_) => HttpResponse::no_content(),
                    None => error_response(404, "not found"),
                }
            }
            _ => error_response(405, "method not allowed"),
        }
    }
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(status, json!({ "message": message }).to_string())
}

/// Returns the percent-decoded path of `url` without its leading slash.
fn request_path(url: &str) -> String {
    let Ok(url) = reqwest::Url::parse(url) else {
        return url.to_string();
    };
    let Some(segments) = url.path_segments() else {
        return String::new();
    };
    segments
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl HttpClient for MemoryServer {
    fn send(&self, request: HttpRequest) -> ResponseFuture {
        let recorded = RecordedRequest {
            method: request.method,
            path: request_path(&request.url),
            authorization: request.header("Authorization").map(str::to_string),
            body: request.body.clone(),
        };

        let (outcome, hold) = {
            let mut state = self.state.lock();
            state.log.push(recorded.clone());

            let position = state
                .failures
                .iter()
                .position(|f| f.method.map_or(true, |m| m == recorded.method));
            let failure = position
                .and_then(|i| state.failures.remove(i))
                .map(|f| f.failure);

            // The store applies the request on arrival; a hold only delays
            // the response.
            let outcome = match failure {
                Some(Failure::Transport(message)) => Err(SyncError::transport(message)),
                Some(Failure::Status { status, body }) => Ok(HttpResponse::new(status, body)),
                None => Ok(state.handle(&recorded)),
            };

            let hold = if state.holding {
                let (tx, rx) = oneshot::channel();
                state.held.push_back(tx);
                Some(rx)
            } else {
                None
            };
            (outcome, hold)
        };

        Box::pin(async move {
            if let Some(rx) = hold {
                let _ = rx.await;
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> HttpRequest {
        HttpRequest::new(Method::Get, url)
    }

    #[test]
    fn paths_are_decoded() {
        assert_eq!(request_path("http://db/challenge/jbc%201"), "challenge/jbc 1");
        assert_eq!(request_path("https://db.example.com/scene"), "scene");
        assert_eq!(request_path("http://db"), "");
        assert_eq!(request_path("http://db:8080/scene/moon?fields=name"), "scene/moon");
    }

    #[tokio::test]
    async fn crud_contract() {
        let server = MemoryServer::new();

        let post = HttpRequest::new(Method::Post, "http://db/scene/moon")
            .with_body(r#"{"name":"Moon"}"#.into());
        assert_eq!(server.send(post).await.unwrap().status, 204);

        let got = server.send(get("http://db/scene/moon")).await.unwrap();
        assert_eq!(got.status, 200);
        assert_eq!(serde_json::from_str::<Value>(&got.body).unwrap()["name"], "Moon");

        let listed = server.send(get("http://db/scene")).await.unwrap();
        let listed: Value = serde_json::from_str(&listed.body).unwrap();
        assert_eq!(listed["moon"]["name"], "Moon");

        let deleted = server
            .send(HttpRequest::new(Method::Delete, "http://db/scene/moon"))
            .await
            .unwrap();
        assert_eq!(deleted.status, 204);
        assert!(server.is_empty("scene"));

        let missing = server.send(get("http://db/scene/moon")).await.unwrap();
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn token_required_when_configured() {
        let server = MemoryServer::with_token("secret");
        server.insert("scene", "moon", json!({}));

        let anonymous = server.send(get("http://db/scene/moon")).await.unwrap();
        assert_eq!(anonymous.status, 401);

        let authed = server
            .send(get("http://db/scene/moon").authorize("secret"))
            .await
            .unwrap();
        assert_eq!(authed.status, 200);
        assert_eq!(
            server.requests()[1].authorization.as_deref(),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn scripted_failures_match_method() {
        let server = MemoryServer::new();
        server.fail_next(Some(Method::Post), 500, r#"{"message":"db unavailable"}"#);

        let read = server.send(get("http://db/scene")).await.unwrap();
        assert_eq!(read.status, 200);

        let write = HttpRequest::new(Method::Post, "http://db/scene/a").with_body("{}".into());
        assert_eq!(server.send(write.clone()).await.unwrap().status, 500);
        assert_eq!(server.send(write).await.unwrap().status, 204);

        server.fail_transport_next(None, "offline");
        let err = server.send(get("http://db/scene")).await.unwrap_err();
        assert_eq!(err, SyncError::transport("offline"));
    }

    #[tokio::test]
    async fn held_responses_wait_for_release() {
        let server = MemoryServer::new();
        server.hold();

        let first = server.send(get("http://db/scene/a"));
        let second = server.send(get("http://db/scene/b"));
        assert_eq!(server.held(), 2);
        assert_eq!(server.requests().len(), 2);

        assert!(server.release_next());
        assert_eq!(first.await.unwrap().status, 404);
        assert_eq!(server.held(), 1);

        server.release();
        assert_eq!(second.await.unwrap().status, 404);
        assert!(!server.release_next());
    }
}
