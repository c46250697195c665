//! Shared utilities for proxy integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use caching_proxy::cache::{CacheStore, SharedCache};
use caching_proxy::proxy::{ConnectionSettings, ProxyServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A local origin server returning a fixed response and recording requests.
pub struct Origin {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Origin {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections the origin has accepted.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Request heads received so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Builds a minimal HTTP/1.0 response with a body.
pub fn http_response(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Starts an origin that reads each request head, answers with `response`
/// and closes the connection.
pub async fn start_origin(response: Vec<u8>) -> Origin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let response = Arc::new(response);

    let (conn_count, seen) = (connections.clone(), requests.clone());
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            conn_count.fetch_add(1, Ordering::SeqCst);
            let (response, seen) = (response.clone(), seen.clone());

            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                seen.lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&head).into_owned());

                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Origin {
        addr,
        connections,
        requests,
    }
}

/// Starts a proxy on an ephemeral loopback port.
pub async fn start_proxy(cache: Arc<SharedCache>, settings: ConnectionSettings) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ProxyServer::from_listener(listener, cache, settings);
    tokio::spawn(server.run());
    addr
}

/// Starts a proxy with default limits, returning its address and cache.
pub async fn start_default_proxy() -> (SocketAddr, Arc<SharedCache>) {
    let cache = Arc::new(SharedCache::new(CacheStore::default()));
    let addr = start_proxy(cache.clone(), ConnectionSettings::default()).await;
    (addr, cache)
}

/// Sends raw bytes to the proxy and reads until it closes the connection.
pub async fn send_raw(proxy: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

/// A closed loopback port: bound, then released.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
