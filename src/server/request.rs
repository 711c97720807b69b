//! The per-request operation object handed to the application.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::FORWARDED;
use http::{HeaderMap, Method, Uri, Version};

use super::{Config, CookiePolicy};
use crate::proto::RequestHead;
use crate::rt::Completion;

/// The scheme a request was received over, after forwarded-header
/// resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP.
    Http,
    /// A TLS stage sat earlier in the pipeline, or a proxy said so.
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URI.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved facts about the connection a request arrived on.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionInfo {
    /// Scheme, possibly rewritten from a `proto=` directive.
    pub scheme: Scheme,
    /// The server-side address.
    pub local_addr: Option<SocketAddr>,
    /// The client address, possibly rewritten from a `for=` directive.
    pub remote_addr: Option<SocketAddr>,
}

/// Rewrites connection info from proxy-added request headers.
pub trait ResolveForwarded: Send + Sync {
    /// Resolve the effective connection info for `head`, starting from
    /// the socket-derived `info`.
    ///
    /// An error here fails the request: the handler answers with a
    /// synthesized error response and stops trusting the connection.
    fn resolve(&self, head: &RequestHead, info: ConnectionInfo) -> crate::Result<ConnectionInfo>;
}

/// The built-in resolver: RFC 7239 `Forwarded` first, falling back to
/// `X-Forwarded-For` / `X-Forwarded-Proto`.
///
/// Only the first (client-most) element of each header is consulted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForwardedHeaderResolver;

impl ResolveForwarded for ForwardedHeaderResolver {
    fn resolve(&self, head: &RequestHead, mut info: ConnectionInfo) -> crate::Result<ConnectionInfo> {
        if let Some(value) = head.headers.get(FORWARDED) {
            let value = value.to_str().map_err(crate::Error::new_forwarded)?;
            let first = value.split(',').next().unwrap_or("");
            for pair in first.split(';') {
                let mut parts = pair.splitn(2, '=');
                let name = parts.next().unwrap_or("").trim();
                let val = match parts.next() {
                    Some(v) => v.trim().trim_matches('"'),
                    None => continue,
                };
                if name.eq_ignore_ascii_case("for") {
                    info.remote_addr = Some(parse_node(val)?);
                } else if name.eq_ignore_ascii_case("proto") {
                    info.scheme = parse_proto(val)?;
                }
            }
            return Ok(info);
        }

        if let Some(value) = head.headers.get("x-forwarded-for") {
            let value = value.to_str().map_err(crate::Error::new_forwarded)?;
            let first = value.split(',').next().unwrap_or("").trim();
            info.remote_addr = Some(parse_node(first)?);
        }
        if let Some(value) = head.headers.get("x-forwarded-proto") {
            let value = value.to_str().map_err(crate::Error::new_forwarded)?;
            info.scheme = parse_proto(value.trim())?;
        }
        Ok(info)
    }
}

/// Parses a forwarded node: `ip`, `ip:port`, `[v6]`, or `[v6]:port`.
fn parse_node(s: &str) -> crate::Result<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let bare = s
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(s);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, 0));
    }
    Err(crate::Error::new_forwarded(format!(
        "invalid forwarded node: {:?}",
        s
    )))
}

fn parse_proto(s: &str) -> crate::Result<Scheme> {
    if s.eq_ignore_ascii_case("https") {
        Ok(Scheme::Https)
    } else if s.eq_ignore_ascii_case("http") {
        Ok(Scheme::Http)
    } else {
        Err(crate::Error::new_forwarded(format!(
            "invalid forwarded proto: {:?}",
            s
        )))
    }
}

/// A bound request operation: the head plus everything the application
/// needs to process it — arrival time, resolved connection info, and
/// the pass-through configuration.
pub struct ServerRequest {
    head: RequestHead,
    received_at: Instant,
    info: ConnectionInfo,
    config: Arc<Config>,
    completion: Option<Completion>,
}

impl ServerRequest {
    pub(crate) fn new(
        head: RequestHead,
        received_at: Instant,
        info: ConnectionInfo,
        config: Arc<Config>,
        completion: Completion,
    ) -> ServerRequest {
        ServerRequest {
            head,
            received_at,
            info,
            config,
            completion: Some(completion),
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.head.subject.0
    }

    /// The request target.
    pub fn uri(&self) -> &Uri {
        &self.head.subject.1
    }

    /// The request's HTTP version.
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// When the request head arrived, even if it then sat in the
    /// pipeline queue behind an earlier response.
    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Resolved connection facts.
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// The resolved scheme.
    pub fn scheme(&self) -> Scheme {
        self.info.scheme
    }

    /// The resolved client address.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.info.remote_addr
    }

    /// The server-side address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.info.local_addr
    }

    /// Per-request read deadline, if configured.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.config.read_timeout
    }

    /// Per-request total deadline, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout
    }

    /// Response compression settings, if configured.
    pub fn compression(&self) -> Option<&super::CompressionOptions> {
        self.config.compression.as_ref()
    }

    /// The cookie encode/decode policy.
    pub fn cookie_policy(&self) -> CookiePolicy {
        self.config.cookie_policy
    }

    /// Form-decoder settings, if configured.
    pub fn form_decoder(&self) -> Option<&super::FormDecoderConfig> {
        self.config.form_decoder.as_ref()
    }

    /// Whether downstream codecs should validate header contents.
    pub fn validate_headers(&self) -> bool {
        self.config.validate_headers
    }

    /// Takes the completion signal: a future resolving once this
    /// request's response has fully entered the outbound path.
    ///
    /// Returns `None` if already taken.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Consumes the operation, returning the request head.
    pub fn into_head(self) -> RequestHead {
        self.head
    }
}

impl fmt::Debug for ServerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRequest")
            .field("method", self.method())
            .field("uri", self.uri())
            .field("version", &self.version())
            .field("remote_addr", &self.remote_addr())
            .finish()
    }
}
