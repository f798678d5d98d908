//! Failure injection tests: every failure is answered on its own exchange
//! and the proxy keeps serving afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use intercept_proxy::{HookResult, Message, ProxyService};

mod common;

use common::{raw_response, TestObserver};

#[tokio::test]
async fn test_upstream_timeout_returns_504() {
    let upstream = common::start_silent_upstream().await;
    let observer = Arc::new(TestObserver::new());

    let mut config = common::test_config();
    config.timeouts.upstream_ms = 200;
    let (_service, proxy) =
        common::start_proxy(ProxyService::new(config).with_shared_observer(observer.clone())).await;

    let res = common::client(proxy)
        .get(format!("http://{upstream}/slow"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 504);
    assert_eq!(observer.errors().first().map(|e| e.0), Some(504));
}

#[tokio::test]
async fn test_unreachable_upstream_returns_502() {
    let upstream = common::closed_port().await;
    let observer = Arc::new(TestObserver::new());
    let (_service, proxy) = common::start_proxy(
        ProxyService::new(common::test_config()).with_shared_observer(observer.clone()),
    )
    .await;

    let res = common::client(proxy)
        .get(format!("http://{upstream}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.starts_with("upstream request failed"), "{}", errors[0].1);
}

#[tokio::test]
async fn test_proxy_keeps_serving_after_failure() {
    let dead = common::closed_port().await;
    let (upstream, _seen) = common::start_upstream(|_| raw_response("200 OK", &[], b"alive")).await;
    let (_service, proxy) = common::start_proxy(ProxyService::new(common::test_config())).await;
    let client = common::client(proxy);

    let failed = client.get(format!("http://{dead}/")).send().await.unwrap();
    assert_eq!(failed.status(), 502);

    let ok = client.get(format!("http://{upstream}/")).send().await.unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.unwrap(), "alive");
}

#[tokio::test]
async fn test_connect_is_not_implemented() {
    let (_service, proxy) = common::start_proxy(ProxyService::new(common::test_config())).await;

    let raw = common::send_raw(
        proxy,
        b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 501"), "{raw:?}");
}

#[tokio::test]
async fn test_missing_host_returns_400() {
    let observer = Arc::new(TestObserver::new());
    let (_service, proxy) = common::start_proxy(
        ProxyService::new(common::test_config()).with_shared_observer(observer.clone()),
    )
    .await;

    let raw = common::send_raw(proxy, b"GET /relative HTTP/1.1\r\nConnection: close\r\n\r\n").await;

    assert!(raw.starts_with("HTTP/1.1 400"), "{raw:?}");
    assert_eq!(observer.errors().first().map(|e| e.0), Some(400));
}

#[tokio::test]
async fn test_malformed_client_traffic_is_reported() {
    let observer = Arc::new(TestObserver::new());
    let (_service, proxy) = common::start_proxy(
        ProxyService::new(common::test_config()).with_shared_observer(observer.clone()),
    )
    .await;

    common::send_raw(proxy, b"NOT HTTP AT ALL\r\n\r\n").await;

    let mut reported = false;
    for _ in 0..50 {
        if observer
            .errors()
            .iter()
            .any(|(_, message)| message.starts_with("client connection error"))
        {
            reported = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reported, "errors: {:?}", observer.errors());
}

#[tokio::test]
async fn test_invalid_header_from_hook_returns_500() {
    let (upstream, mut seen) = common::start_upstream(|_| raw_response("200 OK", &[], b"ok")).await;
    let observer = Arc::new(TestObserver::new().on_response(|response| {
        response.set_responder(|_, _| {
            HookResult::respond(
                intercept_proxy::ResponseDescriptor::new().header("Bad Header", "value"),
            )
        });
    }));
    let (_service, proxy) = common::start_proxy(
        ProxyService::new(common::test_config()).with_shared_observer(observer.clone()),
    )
    .await;

    let res = common::client(proxy)
        .get(format!("http://{upstream}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    assert!(seen.recv().await.is_some());
    assert_eq!(observer.errors().first().map(|e| e.0), Some(500));
}

#[tokio::test]
async fn test_oversized_greedy_response_returns_502() {
    let (upstream, _seen) = common::start_upstream(|_| {
        raw_response("200 OK", &[], &vec![b'r'; 8 * 1024])
    })
    .await;
    let observer = Arc::new(TestObserver::new().on_response(|response| response.set_greedy(true)));

    let mut config = common::test_config();
    config.limits.max_buffered_body_bytes = 4 * 1024;
    let (_service, proxy) =
        common::start_proxy(ProxyService::new(config).with_shared_observer(observer.clone())).await;

    let res = common::client(proxy)
        .get(format!("http://{upstream}/big"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    assert_eq!(res.headers()["connection"], "close");
    assert_eq!(observer.errors().first().map(|e| e.0), Some(502));
}

#[tokio::test]
async fn test_stalled_greedy_response_body_returns_504() {
    // Head and part of the body, then nothing.
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = upstream.accept().await.unwrap();
        common::read_request(&mut socket).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let observer = Arc::new(TestObserver::new().on_response(|response| response.set_greedy(true)));
    let mut config = common::test_config();
    config.timeouts.upstream_ms = 300;
    let (_service, proxy) =
        common::start_proxy(ProxyService::new(config).with_shared_observer(observer.clone())).await;

    let started = Instant::now();
    let res = common::client(proxy)
        .get(format!("http://{upstream_addr}/stall"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 504);
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(observer.errors().first().map(|e| e.0), Some(504));
}

#[tokio::test]
async fn test_stalled_greedy_request_body_returns_504() {
    let upstream = common::closed_port().await;
    let observer = Arc::new(TestObserver::new().on_request(|request| request.set_greedy(true)));
    let mut config = common::test_config();
    config.timeouts.upstream_ms = 300;
    let (_service, proxy) =
        common::start_proxy(ProxyService::new(config).with_shared_observer(observer.clone())).await;

    let mut socket = TcpStream::connect(proxy).await.unwrap();
    socket
        .write_all(
            format!(
                "POST http://{upstream}/upload HTTP/1.1\r\nHost: {upstream}\r\nContent-Length: 10\r\n\r\nabc"
            )
            .as_bytes(),
        )
        .await
        .unwrap();

    let started = Instant::now();
    let head = common::read_head(&mut socket).await;

    assert!(head.starts_with("HTTP/1.1 504"), "{head:?}");
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(observer.errors().first().map(|e| e.0), Some(504));
}
