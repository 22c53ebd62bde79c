//! Token gating.
//!
//! Requests issued before a bearer token exists are parked with a one-shot
//! responder. When the token arrives every parked request is submitted in
//! the order it was issued, and the resulting response future is handed back
//! to the caller still waiting on the other end of the channel.

use crate::http::{HttpRequest, ResponseFuture};
use parking_lot::Mutex;
use simsync_state::{SyncError, SyncResult};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A request waiting for a token.
struct Parked {
    request: HttpRequest,
    responder: oneshot::Sender<ResponseFuture>,
}

struct GateState {
    token: Option<String>,
    parked: VecDeque<Parked>,
}

/// Outcome of admitting a request through the gate.
pub(crate) enum Admission {
    /// The request was submitted immediately.
    Sent(ResponseFuture),
    /// The request is parked until a token arrives.
    Parked {
        waiter: oneshot::Receiver<ResponseFuture>,
        timeout: Option<Duration>,
    },
    /// The request was refused.
    Rejected(SyncError),
}

impl Admission {
    /// Waits for the response, however the request was admitted.
    pub(crate) async fn response(self) -> SyncResult<crate::http::HttpResponse> {
        match self {
            Admission::Sent(future) => future.await,
            Admission::Parked { waiter, timeout } => {
                let future = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, waiter).await {
                        Ok(received) => received,
                        Err(_) => return Err(SyncError::TokenTimeout { waited: limit }),
                    },
                    None => waiter.await,
                }
                .map_err(|_| SyncError::transport("client dropped before a token was set"))?;
                future.await
            }
            Admission::Rejected(err) => Err(err),
        }
    }
}

/// Holds the current token and the requests parked while there is none.
pub(crate) struct TokenGate {
    state: Mutex<GateState>,
    capacity: usize,
    timeout: Option<Duration>,
}

impl TokenGate {
    pub(crate) fn new(token: Option<String>, capacity: usize, timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(GateState {
                token,
                parked: VecDeque::new(),
            }),
            capacity,
            timeout,
        }
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    /// Number of parked requests whose caller is still waiting.
    pub(crate) fn parked(&self) -> usize {
        self.state
            .lock()
            .parked
            .iter()
            .filter(|p| !p.responder.is_closed())
            .count()
    }

    /// Submits `request` through `submit` if a token exists, otherwise parks it.
    pub(crate) fn admit<F>(&self, request: HttpRequest, submit: F) -> Admission
    where
        F: FnOnce(HttpRequest) -> ResponseFuture,
    {
        let mut state = self.state.lock();

        if let Some(token) = &state.token {
            return Admission::Sent(submit(request.authorize(token)));
        }

        // Callers that gave up no longer count against the capacity.
        state.parked.retain(|p| !p.responder.is_closed());
        if state.parked.len() >= self.capacity {
            warn!(capacity = self.capacity, url = %request.url, "pending request queue full");
            return Admission::Rejected(SyncError::QueueFull {
                capacity: self.capacity,
            });
        }

        debug!(method = %request.method, url = %request.url, "parking request until a token is set");
        let (responder, waiter) = oneshot::channel();
        state.parked.push_back(Parked { request, responder });

        Admission::Parked {
            waiter,
            timeout: self.timeout,
        }
    }

    /// Replaces the token.
    ///
    /// On a transition from no token to a token, every parked request is
    /// submitted through `submit` in the order it was parked. Returns the
    /// number of requests submitted.
    pub(crate) fn set_token<F>(&self, token: Option<String>, mut submit: F) -> usize
    where
        F: FnMut(HttpRequest) -> ResponseFuture,
    {
        let mut state = self.state.lock();
        let was_unset = state.token.is_none();
        state.token = token;

        let token = match (&state.token, was_unset) {
            (Some(token), true) => token.clone(),
            _ => return 0,
        };

        let mut replayed = 0;
        while let Some(parked) = state.parked.pop_front() {
            if parked.responder.is_closed() {
                continue;
            }
            let future = submit(parked.request.authorize(&token));
            // The caller may give up between the check above and here; the
            // request has been submitted either way.
            let _ = parked.responder.send(future);
            replayed += 1;
        }

        if replayed > 0 {
            debug!(replayed, "replayed parked requests");
        }
        replayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, Method};
    use std::sync::Arc;

    fn ok_future() -> ResponseFuture {
        Box::pin(async { Ok(HttpResponse::no_content()) })
    }

    fn request(path: &str) -> HttpRequest {
        HttpRequest::new(Method::Get, format!("http://db/{}", path))
    }

    #[test]
    fn admits_immediately_with_token() {
        let gate = TokenGate::new(Some("t".into()), 4, None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let admission = gate.admit(request("a/1"), |r| {
            sink.lock().push(r);
            ok_future()
        });

        assert!(matches!(admission, Admission::Sent(_)));
        let seen = seen.lock();
        assert_eq!(seen[0].header("Authorization"), Some("Bearer t"));
    }

    #[test]
    fn parks_without_token_and_replays_in_order() {
        let gate = TokenGate::new(None, 4, None);
        let mut admissions = Vec::new();
        for path in ["a/1", "a/2", "a/3"] {
            admissions.push(gate.admit(request(path), |_| panic!("must not submit")));
        }
        assert_eq!(gate.parked(), 3);

        let mut order = Vec::new();
        let replayed = gate.set_token(Some("t".into()), |r| {
            assert_eq!(r.header("Authorization"), Some("Bearer t"));
            order.push(r.url);
            ok_future()
        });

        assert_eq!(replayed, 3);
        assert_eq!(order, vec!["http://db/a/1", "http://db/a/2", "http://db/a/3"]);
        assert_eq!(gate.parked(), 0);
    }

    #[test]
    fn capacity_is_enforced() {
        let gate = TokenGate::new(None, 1, None);
        let _first = gate.admit(request("a/1"), |_| ok_future());
        let second = gate.admit(request("a/2"), |_| ok_future());
        assert!(matches!(
            second,
            Admission::Rejected(SyncError::QueueFull { capacity: 1 })
        ));
    }

    #[test]
    fn abandoned_requests_are_not_replayed() {
        let gate = TokenGate::new(None, 4, None);
        let first = gate.admit(request("a/1"), |_| ok_future());
        let _second = gate.admit(request("a/2"), |_| ok_future());
        drop(first);

        let mut order = Vec::new();
        gate.set_token(Some("t".into()), |r| {
            order.push(r.url);
            ok_future()
        });
        assert_eq!(order, vec!["http://db/a/2"]);
    }

    #[test]
    fn token_change_does_not_replay_twice() {
        let gate = TokenGate::new(None, 4, None);
        let _parked = gate.admit(request("a/1"), |_| ok_future());
        assert_eq!(gate.set_token(Some("t1".into()), |_| ok_future()), 1);
        assert_eq!(gate.set_token(Some("t2".into()), |_| ok_future()), 0);
        assert_eq!(gate.token().as_deref(), Some("t2"));
    }

    #[test]
    fn clearing_token_parks_again() {
        let gate = TokenGate::new(Some("t".into()), 4, None);
        gate.set_token(None, |_| ok_future());
        let admission = gate.admit(request("a/1"), |_| panic!("must not submit"));
        assert!(matches!(admission, Admission::Parked { .. }));
    }

    #[tokio::test]
    async fn parked_request_times_out() {
        let gate = TokenGate::new(None, 4, Some(Duration::from_millis(10)));
        let admission = gate.admit(request("a/1"), |_| ok_future());
        let result = admission.response().await;
        assert!(matches!(result, Err(SyncError::TokenTimeout { .. })));
        assert_eq!(gate.parked(), 0);
    }

    #[tokio::test]
    async fn parked_request_resolves_after_token() {
        let gate = TokenGate::new(None, 4, None);
        let admission = gate.admit(request("a/1"), |_| ok_future());
        gate.set_token(Some("t".into()), |_| {
            Box::pin(async { Ok(HttpResponse::new(200, "{}")) })
        });
        let response = admission.response().await.unwrap();
        assert_eq!(response.status, 200);
    }
}
