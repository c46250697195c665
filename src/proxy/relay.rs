//! Upstream Relay
//!
//! Connects to the origin, sends the rewritten request and streams the
//! response back to the client, keeping a bounded copy for the cache.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{ProxyError, Result};
use crate::proxy::request::{ProxyRequest, DEFAULT_PORT};

pub const USER_AGENT_HEADER: &str =
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3\r\n";
pub const ACCEPT_HEADER: &str =
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n";
pub const ACCEPT_ENCODING_HEADER: &str = "Accept-Encoding: gzip, deflate\r\n";
pub const CONNECTION_HEADER: &str = "Connection: close\r\n";
pub const PROXY_CONNECTION_HEADER: &str = "Proxy-Connection: close\r\n";

/// Sent to the client when the origin cannot be reached.
/// Deliberately not an HTTP status line.
pub const ORIGIN_UNREACHABLE_REPLY: &[u8] = b"ERROR 404 Not Found";

const RELAY_CHUNK_SIZE: usize = 8 * 1024;

// == Origin Request ==
/// Builds the HTTP/1.0 request sent to the origin.
pub fn build_origin_request(request: &ProxyRequest) -> Vec<u8> {
    let target = &request.target;
    let host_header = if target.port == DEFAULT_PORT {
        format!("Host: {}\r\n", target.host)
    } else {
        format!("Host: {}:{}\r\n", target.host, target.port)
    };

    let mut out = Vec::with_capacity(512 + request.forwarded_headers.len());
    out.extend_from_slice(format!("GET {} HTTP/1.0\r\n", target.path).as_bytes());
    out.extend_from_slice(host_header.as_bytes());
    out.extend_from_slice(USER_AGENT_HEADER.as_bytes());
    out.extend_from_slice(ACCEPT_HEADER.as_bytes());
    out.extend_from_slice(ACCEPT_ENCODING_HEADER.as_bytes());
    out.extend_from_slice(CONNECTION_HEADER.as_bytes());
    out.extend_from_slice(PROXY_CONNECTION_HEADER.as_bytes());
    out.extend_from_slice(&request.forwarded_headers);
    out.extend_from_slice(b"\r\n");
    out
}

// == Cache Buffer ==
/// Accumulates a response copy up to a byte cap.
///
/// The first chunk that would cross the cap discards the copy for good;
/// later chunks are ignored even if they are small.
#[derive(Debug)]
pub struct CacheBuffer {
    buf: Option<BytesMut>,
    cap: usize,
}

impl CacheBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Some(BytesMut::new()),
            cap,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if let Some(buf) = &mut self.buf {
            if buf.len() + chunk.len() > self.cap {
                self.buf = None;
            } else {
                buf.extend_from_slice(chunk);
            }
        }
    }

    pub fn overflowed(&self) -> bool {
        self.buf.is_none()
    }

    /// The buffered response, unless it overflowed or is empty.
    pub fn into_payload(self) -> Option<Bytes> {
        self.buf.filter(|b| !b.is_empty()).map(BytesMut::freeze)
    }
}

// == Relay Outcome ==
/// Result of a completed relay.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Bytes written to the client
    pub bytes_relayed: usize,
    /// Response copy eligible for caching
    pub payload: Option<Bytes>,
    /// Whether the response outgrew the cache buffer
    pub overflowed: bool,
}

// == Streaming ==
/// Copies the origin's response to the client until the origin closes.
///
/// # Errors
/// `OriginIo` on a failed read, `ClientIo` on a failed write. Either way
/// the partial copy is discarded.
pub async fn relay_response<C, O>(
    client: &mut C,
    origin: &mut O,
    max_object_size: usize,
) -> Result<RelayOutcome>
where
    C: AsyncWrite + Unpin,
    O: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; RELAY_CHUNK_SIZE];
    let mut copy = CacheBuffer::new(max_object_size);
    let mut bytes_relayed = 0;

    loop {
        let n = origin.read(&mut chunk).await.map_err(ProxyError::OriginIo)?;
        if n == 0 {
            break;
        }
        client
            .write_all(&chunk[..n])
            .await
            .map_err(ProxyError::ClientIo)?;
        copy.push(&chunk[..n]);
        bytes_relayed += n;
    }
    client.flush().await.map_err(ProxyError::ClientIo)?;

    let overflowed = copy.overflowed();
    Ok(RelayOutcome {
        bytes_relayed,
        payload: copy.into_payload(),
        overflowed,
    })
}

/// Sends the rewritten request over an open origin stream, then relays the
/// response.
pub async fn forward<C, O>(
    client: &mut C,
    origin: &mut O,
    request: &ProxyRequest,
    max_object_size: usize,
) -> Result<RelayOutcome>
where
    C: AsyncWrite + Unpin,
    O: AsyncRead + AsyncWrite + Unpin,
{
    origin
        .write_all(&build_origin_request(request))
        .await
        .map_err(ProxyError::OriginIo)?;
    origin.flush().await.map_err(ProxyError::OriginIo)?;

    relay_response(client, origin, max_object_size).await
}

/// Opens a connection to the request's origin and relays its response.
///
/// When the connection cannot be made the client receives
/// [`ORIGIN_UNREACHABLE_REPLY`]; there is no retry.
pub async fn fetch<C>(
    client: &mut C,
    request: &ProxyRequest,
    max_object_size: usize,
) -> Result<RelayOutcome>
where
    C: AsyncWrite + Unpin,
{
    let target = &request.target;
    let mut origin = match TcpStream::connect((target.host.as_str(), target.port)).await {
        Ok(stream) => stream,
        Err(source) => {
            if let Err(e) = client.write_all(ORIGIN_UNREACHABLE_REPLY).await {
                warn!(error = %e, "Failed to send error reply to client");
            }
            return Err(ProxyError::OriginUnreachable {
                authority: target.authority(),
                source,
            });
        }
    };
    debug!(origin = %target.authority(), "Connected to origin");

    forward(client, &mut origin, request, max_object_size).await
}
