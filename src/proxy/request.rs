//! Request Parser
//!
//! Reads a client's proxy request: one absolute-URI GET request line followed
//! by header lines up to a blank line. Headers the proxy supplies itself are
//! dropped; the rest are collected verbatim for forwarding.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::cache::CacheKey;
use crate::error::{ProxyError, Result};

/// Longest request or header line accepted, in bytes
pub const MAX_LINE_LENGTH: usize = 8_192;

/// Port used when the target names none
pub const DEFAULT_PORT: u16 = 80;

const SCHEME: &str = "http://";

/// Client headers replaced by the proxy's own versions
const STRIPPED_HEADERS: [&str; 5] = [
    "Host:",
    "User-Agent:",
    "Accept:",
    "Connection:",
    "Proxy-Connection:",
];

// == Request Target ==
/// Origin location extracted from the request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub host: String,
    pub port: u16,
    /// Path plus any query string; `/` when the URI has none
    pub path: String,
}

impl RequestTarget {
    /// `host` for the default port, `host:port` otherwise.
    pub fn authority(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Identity this request is cached under.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.authority(), self.path.clone())
    }
}

// == Proxy Request ==
/// A fully read client request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target: RequestTarget,
    /// Client header lines to pass through, each with its line ending
    pub forwarded_headers: Vec<u8>,
    /// Whether header lines were dropped because the block hit its cap
    pub headers_truncated: bool,
}

// == Request Line ==
/// Parses `GET http://<host>[:<port>][/<path>] HTTP/<version>`.
///
/// Line endings are ignored. Any other method, a relative target or a
/// missing version token is rejected.
pub fn parse_request_line(line: &str) -> Result<RequestTarget> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tokens = line.split(' ');

    let (Some(method), Some(target), Some(version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ProxyError::malformed(format!(
            "expected three request line tokens in {line:?}"
        )));
    };

    if method != "GET" {
        return Err(ProxyError::malformed(format!("unsupported method {method:?}")));
    }
    if !version.starts_with("HTTP/") {
        return Err(ProxyError::malformed(format!("bad version token {version:?}")));
    }

    parse_target(target)
}

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Host,
    Port { start: usize },
}

/// Splits an absolute `http://` URI into host, port and path.
///
/// Walks the bytes after the scheme once: the host runs to the first `:` or
/// `/`, a port runs from `:` to the next `/`, and the path is everything
/// from that `/` on.
pub fn parse_target(target: &str) -> Result<RequestTarget> {
    let rest = target
        .strip_prefix(SCHEME)
        .ok_or_else(|| ProxyError::malformed(format!("target {target:?} is not an http:// URI")))?;
    let bytes = rest.as_bytes();

    let mut cursor = Cursor::Host;
    let mut host_end = bytes.len();
    let mut port_bounds = None;
    let mut path_start = None;

    for (i, &b) in bytes.iter().enumerate() {
        match cursor {
            Cursor::Host => match b {
                b':' => {
                    host_end = i;
                    cursor = Cursor::Port { start: i + 1 };
                }
                b'/' => {
                    host_end = i;
                    path_start = Some(i);
                    break;
                }
                _ => {}
            },
            Cursor::Port { start } => match b {
                b'/' => {
                    port_bounds = Some((start, i));
                    path_start = Some(i);
                    break;
                }
                b'0'..=b'9' => {}
                _ => {
                    return Err(ProxyError::malformed(format!(
                        "non-digit in port of {target:?}"
                    )))
                }
            },
        }
    }
    if let (Cursor::Port { start }, None) = (cursor, port_bounds) {
        port_bounds = Some((start, bytes.len()));
    }

    let host = &rest[..host_end];
    if host.is_empty() {
        return Err(ProxyError::malformed(format!("empty host in {target:?}")));
    }

    let port = match port_bounds {
        None => DEFAULT_PORT,
        Some((start, end)) => rest
            .get(start..end)
            .and_then(|digits| digits.parse::<u16>().ok())
            .filter(|&port| port != 0)
            .ok_or_else(|| ProxyError::malformed(format!("invalid port in {target:?}")))?,
    };

    let path = match path_start {
        Some(start) => rest[start..].to_string(),
        None => "/".to_string(),
    };

    Ok(RequestTarget {
        host: host.to_string(),
        port,
        path,
    })
}

// == Header Filtering ==
/// True for header lines the proxy replaces with its own.
pub fn is_stripped_header(line: &[u8]) -> bool {
    STRIPPED_HEADERS.iter().any(|prefix| {
        line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    })
}

/// Forwarded header lines, capped in total size.
///
/// Once a line would push the block past its limit no further lines are
/// appended, even shorter ones.
#[derive(Debug)]
pub struct HeaderBlock {
    bytes: Vec<u8>,
    limit: usize,
    full: bool,
}

impl HeaderBlock {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            full: false,
        }
    }

    /// Offers one header line; returns whether it was kept.
    pub fn push_line(&mut self, line: &[u8]) -> bool {
        if self.full || is_stripped_header(line) {
            return false;
        }
        if self.bytes.len() + line.len() > self.limit {
            self.full = true;
            return false;
        }
        self.bytes.extend_from_slice(line);
        true
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// == Reading ==
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    reader
        .take(MAX_LINE_LENGTH as u64)
        .read_until(b'\n', buf)
        .await
        .map_err(ProxyError::ClientIo)
}

/// Reads the request line and headers from a client.
///
/// Header collection ends at a blank line or at end of input. Header lines
/// longer than [`MAX_LINE_LENGTH`] are drained and dropped.
///
/// # Errors
/// - `EmptyRequest` if the client sends nothing
/// - `MalformedRequest` for anything but an absolute-URI GET line
/// - `ClientIo` if reading fails
pub async fn read_request<R>(reader: &mut R, max_header_size: usize) -> Result<ProxyRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(256);

    let n = read_line(reader, &mut line).await?;
    if n == 0 {
        return Err(ProxyError::EmptyRequest);
    }
    if !line.ends_with(b"\n") {
        return Err(ProxyError::malformed(if n >= MAX_LINE_LENGTH {
            "request line too long"
        } else {
            "request line not terminated"
        }));
    }
    let text = std::str::from_utf8(&line)
        .map_err(|_| ProxyError::malformed("request line is not valid UTF-8"))?;
    let target = parse_request_line(text)?;

    let mut headers = HeaderBlock::new(max_header_size);
    let mut in_long_line = false;
    loop {
        let n = read_line(reader, &mut line).await?;
        if n == 0 {
            break;
        }
        let complete = line.ends_with(b"\n");
        if in_long_line {
            in_long_line = !complete;
            continue;
        }
        if !complete {
            in_long_line = n >= MAX_LINE_LENGTH;
            continue;
        }
        if line == b"\r\n" || line == b"\n" {
            break;
        }
        headers.push_line(&line);
    }

    Ok(ProxyRequest {
        target,
        headers_truncated: headers.is_full(),
        forwarded_headers: headers.into_bytes(),
    })
}
