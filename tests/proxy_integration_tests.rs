//! Integration Tests for the Proxy Pipeline
//!
//! Drives a real proxy over loopback against local origin servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use caching_proxy::cache::{CacheKey, CacheStore, SharedCache};
use caching_proxy::proxy::ConnectionSettings;
use common::{http_response, send_raw, start_default_proxy, start_origin, start_proxy, unused_port};

fn get_line(port: u16, path: &str) -> Vec<u8> {
    format!("GET http://127.0.0.1:{port}{path} HTTP/1.0\r\n\r\n").into_bytes()
}

// == Cache Behaviour ==

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let origin = start_origin(http_response(b"<html>a</html>")).await;
    let (proxy, cache) = start_default_proxy().await;
    let request = get_line(origin.port(), "/a.html");

    let first = send_raw(proxy, &request).await;
    let second = send_raw(proxy, &request).await;

    assert_eq!(first, http_response(b"<html>a</html>"));
    assert_eq!(second, first);
    assert_eq!(origin.connections(), 1, "second request must not reach the origin");

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!(
        cache
            .contains(&CacheKey::new(format!("127.0.0.1:{}", origin.port()), "/a.html"))
            .await
    );
}

#[tokio::test]
async fn test_distinct_paths_are_cached_separately() {
    let origin = start_origin(http_response(b"same body")).await;
    let (proxy, cache) = start_default_proxy().await;

    send_raw(proxy, &get_line(origin.port(), "/one")).await;
    send_raw(proxy, &get_line(origin.port(), "/two")).await;
    send_raw(proxy, &get_line(origin.port(), "/one")).await;

    assert_eq!(origin.connections(), 2);
    assert_eq!(cache.stats().await.total_entries, 2);
}

#[tokio::test]
async fn test_oversized_response_relayed_but_not_cached() {
    let body = vec![b'z'; 150 * 1024];
    let origin = start_origin(http_response(&body)).await;
    let (proxy, cache) = start_default_proxy().await;
    let request = get_line(origin.port(), "/big.bin");

    let first = send_raw(proxy, &request).await;
    let second = send_raw(proxy, &request).await;

    assert_eq!(first, http_response(&body));
    assert_eq!(second, first);
    assert_eq!(origin.connections(), 2);

    let stats = cache.stats().await;
    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.uncacheable, 2);
}

#[tokio::test]
async fn test_small_budget_evicts_least_recent() {
    let origin = start_origin(vec![b'r'; 100]).await;
    let cache = Arc::new(SharedCache::new(CacheStore::new(250, 100)));
    let proxy = start_proxy(cache.clone(), ConnectionSettings::default()).await;
    let port = origin.port();

    send_raw(proxy, &get_line(port, "/a")).await;
    send_raw(proxy, &get_line(port, "/b")).await;
    send_raw(proxy, &get_line(port, "/c")).await;

    let paths: Vec<String> = cache
        .entries()
        .await
        .into_iter()
        .map(|entry| entry.key.path().to_string())
        .collect();
    assert_eq!(paths, vec!["/c", "/b"]);
    assert_eq!(cache.stats().await.evictions, 1);
}

// == Request Rewriting ==

#[tokio::test]
async fn test_origin_receives_rewritten_request() {
    let origin = start_origin(http_response(b"ok")).await;
    let (proxy, _cache) = start_default_proxy().await;
    let raw = format!(
        "GET http://127.0.0.1:{}/index.html?q=1 HTTP/1.1\r\n\
         Host: 127.0.0.1:{}\r\n\
         User-Agent: curl/8.0\r\n\
         Connection: keep-alive\r\n\
         Proxy-Connection: keep-alive\r\n\
         Cookie: session=42\r\n\
         \r\n",
        origin.port(),
        origin.port()
    );

    send_raw(proxy, raw.as_bytes()).await;

    let requests = origin.requests();
    assert_eq!(requests.len(), 1);
    let head = &requests[0];
    assert!(head.starts_with(&format!(
        "GET /index.html?q=1 HTTP/1.0\r\nHost: 127.0.0.1:{}\r\n",
        origin.port()
    )));
    assert!(head.contains("User-Agent: Mozilla/5.0"));
    assert!(!head.contains("curl/8.0"));
    assert!(head.contains("Connection: close\r\n"));
    assert!(!head.contains("keep-alive"));
    assert!(head.contains("Cookie: session=42\r\n"));
    assert!(head.ends_with("\r\n\r\n"));
}

// == Failure Handling ==

#[tokio::test]
async fn test_unreachable_origin_returns_error_line() {
    let (proxy, cache) = start_default_proxy().await;

    let response = send_raw(proxy, &get_line(unused_port(), "/index.html")).await;

    assert_eq!(response, b"ERROR 404 Not Found");
    assert_eq!(cache.stats().await.total_entries, 0);
}

#[tokio::test]
async fn test_malformed_requests_get_no_response() {
    let (proxy, cache) = start_default_proxy().await;

    for raw in [
        &b"POST http://example.com/ HTTP/1.0\r\n\r\n"[..],
        b"GET /relative HTTP/1.0\r\n\r\n",
        b"CONNECT example.com:443 HTTP/1.1\r\n\r\n",
        b"garbage\r\n\r\n",
    ] {
        assert!(send_raw(proxy, raw).await.is_empty());
    }
    assert_eq!(cache.stats().await.misses, 0);
}

#[tokio::test]
async fn test_proxy_survives_client_disconnect() {
    let origin = start_origin(http_response(b"still here")).await;
    let (proxy, _cache) = start_default_proxy().await;

    // Client that hangs up mid-request.
    {
        let mut stream = tokio::net::TcpStream::connect(proxy).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stream, b"GET http://127.0")
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = send_raw(proxy, &get_line(origin.port(), "/")).await;
    assert_eq!(response, http_response(b"still here"));
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let origin = start_origin(http_response(&[b'c'; 40_000])).await;
    let cache = Arc::new(SharedCache::new(CacheStore::new(200_000, 102_400)));
    let proxy = start_proxy(cache.clone(), ConnectionSettings::default()).await;
    let port = origin.port();

    let mut handles = Vec::new();
    for i in 0..24 {
        handles.push(tokio::spawn(async move {
            send_raw(proxy, &get_line(port, &format!("/item/{}", i % 8))).await
        }));
    }
    for handle in handles {
        let response = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, http_response(&[b'c'; 40_000]));
    }

    let stats = cache.stats().await;
    assert!(stats.total_size <= 200_000);
    assert_eq!(stats.hits + stats.misses, 24);
}

// == Real HTTP Client ==

#[tokio::test]
async fn test_reqwest_through_proxy() {
    let origin = start_origin(http_response(b"hello from origin")).await;
    let (proxy, cache) = start_default_proxy().await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy}")).unwrap())
        .build()
        .unwrap();
    let url = format!("http://127.0.0.1:{}/greeting.txt", origin.port());

    for _ in 0..2 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "hello from origin");
    }

    assert_eq!(origin.connections(), 1);
    assert_eq!(cache.stats().await.hits, 1);
}
