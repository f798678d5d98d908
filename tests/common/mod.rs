//! Shared utilities for integration tests.
//!
//! Upstreams are raw TCP servers so tests can see exactly what went over the
//! wire (header casing, reason phrases) on both sides of the proxy.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use intercept_proxy::config::ProxyConfig;
use intercept_proxy::{ProxyError, ProxyObserver, ProxyService, Request, Response};

/// A request as the upstream received it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    /// Whether a header line starts with exactly `name:`.
    pub fn has_raw_header(&self, name: &str) -> bool {
        let prefix = format!("{name}:");
        self.head.lines().skip(1).any(|line| line.starts_with(&prefix))
    }
}

/// Build a raw HTTP/1.1 response with Content-Length and `Connection: close`.
pub fn raw_response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Read one request from `socket`, decoding a chunked body if present.
pub async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        fill(socket, &mut buf).await?;
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let rest = buf.split_off(head_end + 4);
    let mut captured = CapturedRequest {
        head,
        body: Vec::new(),
    };

    let chunked = captured
        .header("transfer-encoding")
        .is_some_and(|value| value.eq_ignore_ascii_case("chunked"));
    captured.body = if chunked {
        read_chunked(socket, rest).await?
    } else {
        let length: usize = captured
            .header("content-length")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        let mut body = rest;
        while body.len() < length {
            if fill(socket, &mut body).await.is_none() {
                break;
            }
        }
        body
    };
    Some(captured)
}

async fn read_chunked(socket: &mut TcpStream, mut buf: Vec<u8>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = loop {
            if let Some(pos) = find(&buf, b"\r\n") {
                break pos;
            }
            fill(socket, &mut buf).await?;
        };
        let line = String::from_utf8_lossy(&buf[..line_end]).into_owned();
        let size_text = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16).ok()?;
        if size == 0 {
            return Some(body);
        }

        while buf.len() < line_end + 2 + size + 2 {
            fill(socket, &mut buf).await?;
        }
        body.extend_from_slice(&buf[line_end + 2..line_end + 2 + size]);
        buf.drain(..line_end + 2 + size + 2);
    }
}

async fn fill(socket: &mut TcpStream, buf: &mut Vec<u8>) -> Option<()> {
    let mut chunk = [0u8; 8192];
    let n = socket.read(&mut chunk).await.ok()?;
    if n == 0 {
        return None;
    }
    buf.extend_from_slice(&chunk[..n]);
    Some(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read a response head (status line and headers) from `socket`.
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let read = async {
        while find(&buf, b"\r\n\r\n").is_none() {
            if fill(socket, &mut buf).await.is_none() {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read).await.unwrap();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Start an upstream that captures every request and answers with `respond`.
pub async fn start_upstream<F>(respond: F) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>)
where
    F: Fn(&CapturedRequest) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                if let Some(request) = read_request(&mut socket).await {
                    let response = respond(&request);
                    let _ = tx.send(request);
                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                }
            });
        }
    });

    (addr, rx)
}

/// Start an upstream that accepts connections and never answers.
pub async fn start_silent_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start `service` on an ephemeral local port.
pub async fn start_proxy(service: ProxyService) -> (Arc<ProxyService>, SocketAddr) {
    let service = Arc::new(service);
    let addr = service.listen("127.0.0.1", 0).await.unwrap();
    (service, addr)
}

/// Configuration with short timeouts for tests.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.timeouts.upstream_ms = 5_000;
    config.timeouts.idle_ms = 5_000;
    config
}

/// HTTP client that sends every request through the proxy.
pub fn client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy}")).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Send raw bytes to the proxy and read until it closes the connection.
pub async fn send_raw(proxy: SocketAddr, request: &[u8]) -> String {
    let mut socket = TcpStream::connect(proxy).await.unwrap();
    socket.write_all(request).await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), socket.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

type RequestFn = Box<dyn Fn(&mut Request) + Send + Sync>;
type ResponseFn = Box<dyn Fn(&mut Response) + Send + Sync>;

/// Observer built from closures that also records every error it sees.
#[derive(Default)]
pub struct TestObserver {
    on_request: Option<RequestFn>,
    on_response: Option<ResponseFn>,
    errors: Mutex<Vec<(u16, String)>>,
}

impl TestObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request(mut self, f: impl Fn(&mut Request) + Send + Sync + 'static) -> Self {
        self.on_request = Some(Box::new(f));
        self
    }

    pub fn on_response(mut self, f: impl Fn(&mut Response) + Send + Sync + 'static) -> Self {
        self.on_response = Some(Box::new(f));
        self
    }

    /// `(status, message)` of every error observed so far.
    pub fn errors(&self) -> Vec<(u16, String)> {
        self.errors.lock().unwrap().clone()
    }
}

impl ProxyObserver for TestObserver {
    fn on_request(&self, request: &mut Request) {
        if let Some(f) = &self.on_request {
            f(request);
        }
    }

    fn on_response(&self, response: &mut Response) {
        if let Some(f) = &self.on_response {
            f(response);
        }
    }

    fn on_error(&self, error: &ProxyError) {
        self.errors
            .lock()
            .unwrap()
            .push((error.status_code().as_u16(), error.to_string()));
    }
}
