//! HTTP/1 server traffic surface.
//!
//! A [`Builder`] captures the immutable per-connection configuration
//! and produces one [`TrafficHandler`] per accepted connection. The
//! handler is then driven by the connection's event loop through the
//! [`Channel`](crate::rt::Channel) and
//! [`Application`](crate::service::Application) seams.

pub(crate) mod conn;
mod request;

pub use self::conn::TrafficHandler;
pub use self::request::{
    ConnectionInfo, ForwardedHeaderResolver, ResolveForwarded, Scheme, ServerRequest,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::rt::Completion;

/// Observes connection-level lifecycle transitions.
pub trait ConnectionObserver: Send + Sync {
    /// Called on each state transition.
    fn on_state_change(&self, state: ConnState);
}

/// Connection lifecycle states reported to a [`ConnectionObserver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnState {
    /// A request operation was constructed and bound.
    Configured,
}

/// Response compression settings, passed through to the per-request
/// operation. This stage never compresses anything itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Responses smaller than this are not worth compressing.
    pub min_length: usize,
}

impl Default for CompressionOptions {
    fn default() -> CompressionOptions {
        CompressionOptions { min_length: 1024 }
    }
}

/// How strictly cookies are encoded and decoded downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CookiePolicy {
    /// RFC 6265 strict.
    Strict,
    /// Tolerate legacy separators and values.
    Lax,
}

impl Default for CookiePolicy {
    fn default() -> CookiePolicy {
        CookiePolicy::Strict
    }
}

/// Form-decoder settings, passed through to the per-request operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormDecoderConfig {
    /// Bytes buffered in memory before spilling.
    pub max_in_memory_size: usize,
    /// Upper bound on a decoded form, if any.
    pub max_size: Option<u64>,
    /// Whether fields are streamed rather than aggregated.
    pub streaming: bool,
}

impl Default for FormDecoderConfig {
    fn default() -> FormDecoderConfig {
        FormDecoderConfig {
            max_in_memory_size: 16 * 1024,
            max_size: None,
            streaming: false,
        }
    }
}

/// Hook wrapping the per-request completion signal.
pub type MapHandle = Arc<dyn Fn(Completion) -> Completion + Send + Sync>;

pub(crate) struct Config {
    pub(crate) keep_alive_requests: Option<usize>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) validate_headers: bool,
    pub(crate) pipeline_flush: bool,
    pub(crate) forwarded: Option<Arc<dyn ResolveForwarded>>,
    pub(crate) compression: Option<CompressionOptions>,
    pub(crate) cookie_policy: CookiePolicy,
    pub(crate) form_decoder: Option<FormDecoderConfig>,
    pub(crate) map_handle: Option<MapHandle>,
    pub(crate) observer: Option<Arc<dyn ConnectionObserver>>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            keep_alive_requests: None,
            idle_timeout: None,
            read_timeout: None,
            request_timeout: None,
            validate_headers: true,
            pipeline_flush: false,
            forwarded: None,
            compression: None,
            cookie_policy: CookiePolicy::Strict,
            form_decoder: None,
            map_handle: None,
            observer: None,
        }
    }
}

/// A builder of per-connection traffic handlers.
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Starts a builder with defaults: unlimited keep-alive requests,
    /// no timeouts, immediate flushes.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Caps how many requests a connection may serve before it is
    /// forcibly closed. `None` means unlimited.
    pub fn keep_alive_requests(&mut self, max: Option<usize>) -> &mut Self {
        self.config.keep_alive_requests = max;
        self
    }

    /// Closes the connection if it stays idle longer than this.
    ///
    /// The handler only toggles the idle-timeout stage on and off; the
    /// driver owns the timer and reads this value via
    /// [`TrafficHandler::idle_timeout`].
    pub fn idle_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Per-request read deadline, surfaced on the request operation.
    pub fn read_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Per-request total deadline, surfaced on the request operation.
    pub fn request_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Whether downstream codecs should validate header contents.
    ///
    /// Default is `true`.
    pub fn validate_headers(&mut self, enabled: bool) -> &mut Self {
        self.config.validate_headers = enabled;
        self
    }

    /// Aggregates flushes of a response's final bytes to the natural
    /// read boundary, reducing syscalls under pipelining.
    ///
    /// Default is off: every flush request passes through immediately.
    pub fn pipeline_flush(&mut self, enabled: bool) -> &mut Self {
        self.config.pipeline_flush = enabled;
        self
    }

    /// Resolves connection info from `Forwarded`/`X-Forwarded-*`
    /// request headers.
    pub fn forwarded<R>(&mut self, resolver: R) -> &mut Self
    where
        R: ResolveForwarded + 'static,
    {
        self.config.forwarded = Some(Arc::new(resolver));
        self
    }

    /// Enables response compression downstream with these settings.
    pub fn compression(&mut self, options: CompressionOptions) -> &mut Self {
        self.config.compression = Some(options);
        self
    }

    /// Sets the cookie encode/decode policy.
    pub fn cookies(&mut self, policy: CookiePolicy) -> &mut Self {
        self.config.cookie_policy = policy;
        self
    }

    /// Configures the form decoder handed to request operations.
    pub fn form_decoder(&mut self, config: FormDecoderConfig) -> &mut Self {
        self.config.form_decoder = Some(config);
        self
    }

    /// Wraps every per-request completion signal.
    pub fn map_handle<F>(&mut self, map: F) -> &mut Self
    where
        F: Fn(Completion) -> Completion + Send + Sync + 'static,
    {
        self.config.map_handle = Some(Arc::new(map));
        self
    }

    /// Registers an observer for connection lifecycle transitions.
    pub fn connection_observer<O>(&mut self, observer: O) -> &mut Self
    where
        O: ConnectionObserver + 'static,
    {
        self.config.observer = Some(Arc::new(observer));
        self
    }

    /// Builds the traffic handler for one connection.
    pub fn handler(&self) -> TrafficHandler {
        TrafficHandler::new(Arc::new(Config {
            keep_alive_requests: self.config.keep_alive_requests,
            idle_timeout: self.config.idle_timeout,
            read_timeout: self.config.read_timeout,
            request_timeout: self.config.request_timeout,
            validate_headers: self.config.validate_headers,
            pipeline_flush: self.config.pipeline_flush,
            forwarded: self.config.forwarded.clone(),
            compression: self.config.compression.clone(),
            cookie_policy: self.config.cookie_policy,
            form_decoder: self.config.form_decoder.clone(),
            map_handle: self.config.map_handle.clone(),
            observer: self.config.observer.clone(),
        }))
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("keep_alive_requests", &self.config.keep_alive_requests)
            .field("idle_timeout", &self.config.idle_timeout)
            .field("pipeline_flush", &self.config.pipeline_flush)
            .finish()
    }
}
