//! Tests for the reqwest transport against a local HTTP listener.

use serde::Deserialize;
use simsync_client::{ClientConfig, HttpClient, HttpRequest, Method, RemoteClient, ReqwestClient};
use simsync_state::{ResourceKey, SyncError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, PartialEq, Deserialize)]
struct Scene {
    name: String,
    robots: u32,
}

/// Answers one connection per reply, in order, and returns the raw requests.
async fn serve(replies: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut socket).await);
            socket.write_all(response(status, body).as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        seen
    });
    (base, handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).into_owned();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return String::from_utf8_lossy(&buf[..end + 4 + length]).into_owned();
            }
        }
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
    }
}

fn response(status: u16, body: &str) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .unwrap()
        .canonical_reason()
        .unwrap_or("");
    if status == 204 {
        return format!("HTTP/1.1 204 {}\r\nConnection: close\r\n\r\n", reason);
    }
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )
}

fn client() -> ReqwestClient {
    ReqwestClient::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

#[tokio::test]
async fn post_carries_headers_and_body() {
    let (base, server) = serve(vec![(204, "")]).await;
    let body = r#"{"name":"JBC1"}"#;
    let request = HttpRequest::new(Method::Post, format!("{}/challenge/jbc1", base))
        .authorize("t0k")
        .with_body(body.to_string());

    let response = client().send(request).await.unwrap();
    assert_eq!(response.status, 204);
    assert_eq!(response.body, "");

    let seen = server.await.unwrap();
    assert_eq!(seen.len(), 1);
    let raw = &seen[0];
    let lower = raw.to_ascii_lowercase();
    assert!(lower.starts_with("post /challenge/jbc1 http/1.1\r\n"), "{}", raw);
    assert!(lower.contains("\r\nauthorization: bearer t0k\r\n"), "{}", raw);
    assert!(lower.contains("\r\ncontent-type: application/json\r\n"), "{}", raw);
    assert!(raw.ends_with(body), "{}", raw);
}

#[tokio::test]
async fn request_is_submitted_before_it_is_polled() {
    let (base, server) = serve(vec![(200, r#"{"name":"Moon","robots":2}"#)]).await;
    let pending = client().send(HttpRequest::new(Method::Get, format!("{}/scene/moon", base)));

    let seen = server.await.unwrap();
    assert!(seen[0].to_ascii_lowercase().starts_with("get /scene/moon "));

    let response = pending.await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"name":"Moon","robots":2}"#);
}

#[tokio::test]
async fn remote_client_over_http() {
    let (base, server) = serve(vec![
        (200, r#"{"name":"Moon","robots":2}"#),
        (404, r#"{"message":"not found"}"#),
        (500, r#"{"message":"db unavailable"}"#),
        (204, ""),
    ])
    .await;
    let remote = RemoteClient::new(ClientConfig::new(base).with_token("t0k"), client());
    let moon = ResourceKey::new("scene", "moon");

    let scene = remote.get::<Scene>(&moon).await.unwrap();
    assert_eq!(
        scene,
        Some(Scene {
            name: "Moon".into(),
            robots: 2
        })
    );
    let missing = remote
        .get::<Scene>(&ResourceKey::new("scene", "mars 2"))
        .await
        .unwrap();
    assert_eq!(missing, None);
    let failed = remote.set(&moon, &serde_json::json!({"name": "Moon"})).await;
    assert_eq!(failed, Err(SyncError::db(500, "db unavailable")));
    remote.delete(&moon).await.unwrap();

    let lines: Vec<String> = server
        .await
        .unwrap()
        .iter()
        .map(|raw| raw.lines().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        lines,
        vec![
            "GET /scene/moon HTTP/1.1",
            "GET /scene/mars%202 HTTP/1.1",
            "POST /scene/moon HTTP/1.1",
            "DELETE /scene/moon HTTP/1.1",
        ]
    );
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client()
        .send(HttpRequest::new(Method::Get, format!("http://{}/scene/moon", addr)))
        .await;
    assert!(matches!(result, Err(SyncError::Transport { .. })), "{:?}", result);
}
