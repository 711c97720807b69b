//! Pieces pertaining to the HTTP message protocol.
//!
//! The traffic handler sits between a decoder producing these message
//! parts and an encoder consuming them; both sides speak in the tagged
//! types below rather than in raw bytes.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};

pub(crate) mod h1;

/// A message head. Includes request/status line, and headers.
#[derive(Debug, Default)]
pub struct MessageHead<S> {
    /// HTTP version of the message.
    pub version: Version,
    /// Subject (request line or status line) of the message.
    pub subject: S,
    /// Headers of the message.
    pub headers: HeaderMap,
}

/// An incoming request head.
pub type RequestHead = MessageHead<RequestLine>;

/// A request's method and target.
#[derive(Debug, Default, PartialEq)]
pub struct RequestLine(
    /// The request method.
    pub Method,
    /// The request target.
    pub Uri,
);

/// An outgoing response head.
pub type ResponseHead = MessageHead<StatusCode>;

impl<S> MessageHead<S> {
    pub(crate) fn new(subject: S) -> MessageHead<S> {
        MessageHead {
            version: Version::HTTP_11,
            subject,
            headers: HeaderMap::new(),
        }
    }
}

/// The outcome the decoder attached to an inbound message part.
#[derive(Debug)]
pub enum DecodeResult {
    /// The part was decoded cleanly.
    Success,
    /// The decoder failed mid-message; the connection cannot be trusted
    /// to stay in sync past this part.
    Failure(crate::Error),
}

impl DecodeResult {
    /// Returns true if the decoder reported a failure for this part.
    pub fn is_failure(&self) -> bool {
        matches!(*self, DecodeResult::Failure(_))
    }

    pub(crate) fn take_err(&mut self) -> Option<crate::Error> {
        match std::mem::replace(self, DecodeResult::Success) {
            DecodeResult::Success => None,
            DecodeResult::Failure(err) => Some(err),
        }
    }
}

impl Default for DecodeResult {
    fn default() -> DecodeResult {
        DecodeResult::Success
    }
}

/// A chunk of a request body.
#[derive(Debug)]
pub struct Content {
    /// The body bytes of this chunk.
    pub data: Bytes,
    /// The decoder's outcome for this chunk.
    pub decode: DecodeResult,
}

impl Content {
    /// A content part wrapping `data` with a successful decode result.
    pub fn new(data: Bytes) -> Content {
        Content {
            data,
            decode: DecodeResult::Success,
        }
    }
}

/// The final part of a request body, optionally carrying trailers.
#[derive(Debug)]
pub struct LastContent {
    /// Any final body bytes.
    pub data: Bytes,
    /// Trailer headers, if the message had any.
    pub trailers: HeaderMap,
    /// The decoder's outcome for this part.
    pub decode: DecodeResult,
}

impl LastContent {
    /// A last-content part with body bytes and a successful decode result.
    pub fn new(data: Bytes) -> LastContent {
        LastContent {
            data,
            trailers: HeaderMap::new(),
            decode: DecodeResult::Success,
        }
    }

    /// The empty end-of-message marker.
    pub fn empty() -> LastContent {
        LastContent::new(Bytes::new())
    }

    /// True for the bare end-of-message marker: no bytes, no trailers,
    /// decoded cleanly. Such a marker is always safe to forward, even
    /// after the response has already been sent.
    pub fn is_empty_marker(&self) -> bool {
        self.data.is_empty() && self.trailers.is_empty() && !self.decode.is_failure()
    }
}

/// An inbound event from the decoder.
#[derive(Debug)]
pub enum InboundMessage {
    /// A request line plus headers.
    Head {
        /// The parsed request head.
        head: RequestHead,
        /// The decoder's outcome for the head.
        decode: DecodeResult,
    },
    /// An intermediate body chunk.
    Content(Content),
    /// The final body chunk, ending the message.
    Last(LastContent),
}

/// An outbound response event from the application.
///
/// Branching on these tags replaces dispatch on concrete runtime
/// message classes; the informational/self-defined-length predicates
/// are pure functions on the head.
#[derive(Debug)]
pub enum OutboundMessage {
    /// A response head; body parts follow separately.
    Head(ResponseHead),
    /// A complete response: head, body, and end-of-message in one part.
    Full {
        /// The response head.
        head: ResponseHead,
        /// The entire response body.
        body: Bytes,
        /// Trailer headers, if any.
        trailers: HeaderMap,
    },
    /// An intermediate body chunk.
    Content(Bytes),
    /// The final body chunk of the current response.
    Last {
        /// Any final body bytes.
        data: Bytes,
        /// Trailer headers, if any.
        trailers: HeaderMap,
    },
    /// Anything else; forwarded to the encoder untouched.
    Raw(Bytes),
}
