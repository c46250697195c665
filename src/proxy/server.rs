//! Connection Dispatcher
//!
//! Accepts client connections and runs each one in its own detached task:
//! parse the request, answer from the cache on a hit, otherwise fetch from
//! the origin and offer the response to the cache.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::SharedCache;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::proxy::relay;
use crate::proxy::request::read_request;

/// Source of per-connection ids for log correlation.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

// == Connection Settings ==
/// Per-connection limits copied into every worker.
///
/// The cacheable object size is not repeated here; the relay reads it from
/// the shared cache so both always agree.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub max_header_size: usize,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_header_size: config.max_header_size,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// == Connection Outcome ==
/// How a successfully handled connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Response served from the cache
    CacheHit { bytes: usize },
    /// Response fetched from the origin
    Fetched { bytes: usize, cached: bool },
}

// == Connection Handling ==
/// Serves exactly one request on `stream`.
///
/// The stream is closed when this returns, whatever the outcome. Errors are
/// scoped to this connection and never touch the cache.
pub async fn handle_connection<S>(
    stream: S,
    cache: &SharedCache,
    settings: ConnectionSettings,
) -> Result<ConnectionOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let request = read_request(&mut reader, settings.max_header_size).await?;
    let key = request.target.cache_key();
    if request.headers_truncated {
        debug!(
            %key,
            limit = settings.max_header_size,
            "Header block full, remaining client headers dropped"
        );
    }

    if let Some(payload) = cache.lookup(&key).await {
        debug!(%key, bytes = payload.len(), "Cache hit");
        writer
            .write_all(&payload)
            .await
            .map_err(ProxyError::ClientIo)?;
        writer.flush().await.map_err(ProxyError::ClientIo)?;
        cache.promote(&key).await;
        return Ok(ConnectionOutcome::CacheHit {
            bytes: payload.len(),
        });
    }

    debug!(%key, "Cache miss, fetching from origin");
    let outcome = relay::fetch(&mut writer, &request, cache.max_object_size()).await?;

    let cached = match outcome.payload {
        Some(payload) => match cache.insert(key.clone(), payload).await {
            Ok(_) => true,
            Err(e) => {
                debug!(%key, error = %e, "Response not cached");
                false
            }
        },
        None => {
            if outcome.overflowed {
                cache.record_uncacheable();
                debug!(%key, bytes = outcome.bytes_relayed, "Response too large to cache");
            }
            false
        }
    };

    Ok(ConnectionOutcome::Fetched {
        bytes: outcome.bytes_relayed,
        cached,
    })
}

fn log_connection_error(error: &ProxyError) {
    match error {
        ProxyError::EmptyRequest | ProxyError::MalformedRequest(_) => {
            debug!(%error, "Rejected request")
        }
        ProxyError::OriginUnreachable { .. } => warn!(%error, "Origin unreachable"),
        ProxyError::ClientIo(_) | ProxyError::OriginIo(_) => warn!(%error, "Relay aborted"),
    }
}

// == Proxy Server ==
/// Accept loop owning the listening socket.
pub struct ProxyServer {
    listener: TcpListener,
    cache: Arc<SharedCache>,
    settings: ConnectionSettings,
}

impl ProxyServer {
    /// Binds the configured port on all interfaces.
    pub async fn bind(config: &Config, cache: Arc<SharedCache>) -> io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, cache, ConnectionSettings::from_config(config)))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        cache: Arc<SharedCache>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            listener,
            cache,
            settings,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, spawning a detached task for each.
    ///
    /// Accept failures are logged and the loop carries on.
    pub async fn run(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            let cache = self.cache.clone();
            let settings = self.settings;
            let span = info_span!("conn", id, %peer);

            tokio::spawn(
                async move {
                    match handle_connection(stream, &cache, settings).await {
                        Ok(ConnectionOutcome::CacheHit { bytes }) => {
                            info!(bytes, "Served from cache")
                        }
                        Ok(ConnectionOutcome::Fetched { bytes, cached }) => {
                            info!(bytes, cached, "Served from origin")
                        }
                        Err(error) => log_connection_error(&error),
                    }
                }
                .instrument(span),
            );
        }
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Tasks already spawned keep running to completion on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => {
                info!("Proxy accept loop stopped");
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    async fn exchange(cache: Arc<SharedCache>, raw: &[u8]) -> (Vec<u8>, Result<ConnectionOutcome>) {
        let (mut client, server) = tokio::io::duplex(1 << 20);
        let task = tokio::spawn(async move {
            handle_connection(server, &cache, ConnectionSettings::default()).await
        });

        client.write_all(raw).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();

        (response, task.await.unwrap())
    }

    #[tokio::test]
    async fn test_cache_hit_serves_stored_bytes() {
        let cache = Arc::new(SharedCache::default());
        let key = CacheKey::new("example.com", "/a.html");
        cache
            .insert(key.clone(), Bytes::from_static(b"HTTP/1.0 200 OK\r\n\r\ncached"))
            .await
            .unwrap();

        let (response, outcome) = exchange(
            cache.clone(),
            b"GET http://example.com/a.html HTTP/1.0\r\n\r\n",
        )
        .await;

        assert_eq!(response, b"HTTP/1.0 200 OK\r\n\r\ncached");
        assert_eq!(outcome.unwrap(), ConnectionOutcome::CacheHit { bytes: 25 });
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_cache_hit_promotes_entry() {
        let cache = Arc::new(SharedCache::default());
        cache
            .insert(CacheKey::new("example.com", "/a"), Bytes::from_static(b"a"))
            .await
            .unwrap();
        cache
            .insert(CacheKey::new("example.com", "/b"), Bytes::from_static(b"b"))
            .await
            .unwrap();

        exchange(cache.clone(), b"GET http://example.com/a HTTP/1.0\r\n\r\n").await;

        let order: Vec<String> = cache
            .entries()
            .await
            .into_iter()
            .map(|entry| entry.key.to_string())
            .collect();
        assert_eq!(order, vec!["example.com /a", "example.com /b"]);
    }

    #[tokio::test]
    async fn test_malformed_request_closes_silently() {
        let cache = Arc::new(SharedCache::default());

        let (response, outcome) =
            exchange(cache.clone(), b"POST http://example.com/ HTTP/1.0\r\n\r\n").await;

        assert!(response.is_empty());
        assert!(matches!(outcome, Err(ProxyError::MalformedRequest(_))));
        assert_eq!(cache.stats().await.misses, 0);
    }

    #[tokio::test]
    async fn test_relay_buffer_follows_store_object_cap() {
        let origin = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = origin.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = origin.accept().await.unwrap();
            let mut head = [0u8; 1024];
            let _ = socket.read(&mut head).await;
            socket.write_all(b"0123456789abcdefghij").await.unwrap();
        });

        // The store only takes 10-byte objects; nothing else says so.
        let cache = Arc::new(SharedCache::new(crate::cache::CacheStore::new(1_000, 10)));
        let raw = format!("GET http://127.0.0.1:{port}/x HTTP/1.0\r\n\r\n");

        let (response, outcome) = exchange(cache.clone(), raw.as_bytes()).await;

        assert_eq!(response, b"0123456789abcdefghij");
        assert_eq!(
            outcome.unwrap(),
            ConnectionOutcome::Fetched {
                bytes: 20,
                cached: false
            }
        );
        let stats = cache.stats().await;
        assert_eq!(stats.uncacheable, 1);
        assert_eq!(stats.insertions, 0);
    }

    #[tokio::test]
    async fn test_unreachable_origin_reply() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let raw = format!("GET http://127.0.0.1:{port}/index.html HTTP/1.0\r\n\r\n");
        let cache = Arc::new(SharedCache::default());

        let (response, outcome) = exchange(cache.clone(), raw.as_bytes()).await;

        assert_eq!(response, b"ERROR 404 Not Found");
        assert!(matches!(outcome, Err(ProxyError::OriginUnreachable { .. })));
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_run_until_stops_accepting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = ProxyServer::from_listener(
            listener,
            Arc::new(SharedCache::default()),
            ConnectionSettings::default(),
        );
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server.run_until(async {
            let _ = stop_rx.await;
        }));
        stop_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // The listener was dropped with the accept loop.
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            max_header_size: 100,
            ..Config::default()
        };
        let settings = ConnectionSettings::from_config(&config);
        assert_eq!(settings.max_header_size, 100);
    }
}
