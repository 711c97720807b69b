//! Error and Result module.

use std::error::Error as StdError;
use std::fmt;

/// Result type often returned from methods that can have `h1-traffic` `Error`s.
pub type Result<T> = std::result::Result<T, Error>;

type Cause = Box<dyn StdError + Send + Sync>;

/// Represents errors that can occur handling HTTP/1 traffic.
pub struct Error {
    inner: Box<ErrorImpl>,
}

struct ErrorImpl {
    kind: Kind,
    cause: Option<Cause>,
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// The decoder failed mid-message; reported on an inbound part.
    Decode,
    /// A request head declared an HTTP version this stage does not speak.
    Version,
    /// The pipeline queue refused a deferred item.
    Overflow,
    /// Resolving connection info from forwarded headers failed.
    Forwarded,
    /// A write promise was dropped before ever being completed.
    Canceled,
    /// An `io::Error` surfaced by the transport while writing.
    Io,
}

impl Error {
    /// Construct a decoder-failure error, as carried by inbound message
    /// parts in their [`DecodeResult`](crate::DecodeResult).
    ///
    /// This is the constructor an HTTP decoder uses to report a framing
    /// problem into the traffic handler.
    pub fn decode<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Decode).with(cause)
    }

    /// Construct an I/O error, as completed into a write promise by the
    /// transport when the physical write fails.
    pub fn io(cause: std::io::Error) -> Error {
        Error::new(Kind::Io).with(cause)
    }

    /// Returns true if this was a decoder failure.
    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode)
    }

    /// Returns true if this was an unsupported-protocol-version error.
    pub fn is_version(&self) -> bool {
        matches!(self.inner.kind, Kind::Version)
    }

    /// Returns true if the pipeline queue overflowed.
    pub fn is_overflow(&self) -> bool {
        matches!(self.inner.kind, Kind::Overflow)
    }

    /// Returns true if forwarded-header resolution failed.
    pub fn is_forwarded(&self) -> bool {
        matches!(self.inner.kind, Kind::Forwarded)
    }

    /// Returns true if a promise was dropped before completion.
    pub fn is_canceled(&self) -> bool {
        matches!(self.inner.kind, Kind::Canceled)
    }

    /// Returns true if this was an I/O error from the transport.
    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, Kind::Io)
    }

    /// Consumes the error, returning its cause.
    pub fn into_cause(self) -> Option<Box<dyn StdError + Send + Sync>> {
        self.inner.cause
    }

    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(ErrorImpl { kind, cause: None }),
        }
    }

    pub(crate) fn with<C: Into<Cause>>(mut self, cause: C) -> Error {
        self.inner.cause = Some(cause.into());
        self
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    pub(crate) fn new_version() -> Error {
        Error::new(Kind::Version)
    }

    pub(crate) fn new_overflow() -> Error {
        Error::new(Kind::Overflow)
    }

    pub(crate) fn new_forwarded<E: Into<Cause>>(cause: E) -> Error {
        Error::new(Kind::Forwarded).with(cause)
    }

    pub(crate) fn new_canceled() -> Error {
        Error::new(Kind::Canceled)
    }

    fn description(&self) -> &str {
        match self.inner.kind {
            Kind::Decode => "message decode failed",
            Kind::Version => "unsupported protocol version",
            Kind::Overflow => "pipeline queue overflow",
            Kind::Forwarded => "forwarded header resolution failed",
            Kind::Canceled => "write was canceled",
            Kind::Io => "connection error",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("h1_traffic::Error");
        f.field(&self.inner.kind);
        if let Some(ref cause) = self.inner.cause {
            f.field(cause);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref cause) = self.inner.cause {
            write!(f, "{}: {}", self.description(), cause)
        } else {
            f.write_str(self.description())
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_ref()
            .map(|cause| &**cause as &(dyn StdError + 'static))
    }
}
