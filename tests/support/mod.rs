#![allow(dead_code)]

use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};

use h1_traffic::rt::{Channel, Promise, Scheduled};
use h1_traffic::server::ServerRequest;
use h1_traffic::service::Application;
use h1_traffic::{
    Content, DecodeResult, Error, InboundMessage, LastContent, OutboundMessage, RequestHead,
    RequestLine, ResponseHead,
};

/// Records everything the handler asks of the transport.
pub struct MockChannel {
    pub frames: Vec<(OutboundMessage, Promise)>,
    pub flushes: usize,
    pub reads_requested: usize,
    pub scheduled: Vec<Scheduled>,
    pub idle_timeout_events: Vec<bool>,
    pub closed: bool,
    pub writable: bool,
    pub secure: bool,
    pub peer: Option<SocketAddr>,
    pub proxied_peer: Option<SocketAddr>,
    pub local: Option<SocketAddr>,
}

impl MockChannel {
    pub fn new() -> MockChannel {
        MockChannel {
            frames: Vec::new(),
            flushes: 0,
            reads_requested: 0,
            scheduled: Vec::new(),
            idle_timeout_events: Vec::new(),
            closed: false,
            writable: true,
            secure: false,
            peer: Some("127.0.0.1:5000".parse().unwrap()),
            proxied_peer: None,
            local: Some("127.0.0.1:8080".parse().unwrap()),
        }
    }

    /// Completes every buffered write successfully, honoring
    /// close-on-complete flags the way a real driver would.
    pub fn complete_writes(&mut self) {
        for (_, promise) in self.frames.drain(..) {
            if promise.is_close_on_complete() {
                self.closed = true;
            }
            promise.succeed();
        }
    }

    /// Fails every buffered write, still honoring close-on-complete.
    pub fn fail_writes(&mut self) {
        for (_, promise) in self.frames.drain(..) {
            if promise.is_close_on_complete() {
                self.closed = true;
            }
            promise.fail(Error::io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer went away",
            )));
        }
    }

    pub fn take_scheduled(&mut self) -> Vec<Scheduled> {
        std::mem::take(&mut self.scheduled)
    }

    pub fn head_frames(&self) -> Vec<&ResponseHead> {
        self.frames
            .iter()
            .filter_map(|(msg, _)| match msg {
                OutboundMessage::Head(head) => Some(head),
                OutboundMessage::Full { head, .. } => Some(head),
                _ => None,
            })
            .collect()
    }
}

impl Channel for MockChannel {
    fn write(&mut self, msg: OutboundMessage, promise: Promise) {
        self.frames.push((msg, promise));
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn request_read(&mut self) {
        self.reads_requested += 1;
    }

    fn schedule(&mut self, task: Scheduled) {
        self.scheduled.push(task);
    }

    fn set_idle_timeout(&mut self, enabled: bool) {
        self.idle_timeout_events.push(enabled);
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn proxied_peer_addr(&self) -> Option<SocketAddr> {
        self.proxied_peer
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn is_secure(&self) -> bool {
        self.secure
    }
}

/// Records everything forwarded to the application.
#[derive(Default)]
pub struct MockApp {
    pub requests: Vec<ServerRequest>,
    pub content: Vec<Content>,
    pub lasts: Vec<LastContent>,
}

impl MockApp {
    pub fn new() -> MockApp {
        MockApp::default()
    }
}

impl Application for MockApp {
    fn request(&mut self, request: ServerRequest) {
        self.requests.push(request);
    }

    fn content(&mut self, content: Content) {
        self.content.push(content);
    }

    fn last_content(&mut self, last: LastContent) {
        self.lasts.push(last);
    }
}

// ===== message builders =====

pub fn request_head(method: Method, path: &str) -> RequestHead {
    let mut head = RequestHead::default();
    head.subject = RequestLine(method, path.parse().unwrap());
    head.version = Version::HTTP_11;
    head
}

pub fn get(path: &str) -> InboundMessage {
    InboundMessage::Head {
        head: request_head(Method::GET, path),
        decode: DecodeResult::Success,
    }
}

pub fn get_with_header(path: &str, name: &'static str, value: &'static str) -> InboundMessage {
    let mut head = request_head(Method::GET, path);
    head.headers.insert(
        HeaderName::from_static(name),
        HeaderValue::from_static(value),
    );
    InboundMessage::Head {
        head,
        decode: DecodeResult::Success,
    }
}

pub fn h2_preface() -> InboundMessage {
    let mut head = request_head(Method::from_bytes(b"PRI").unwrap(), "*");
    head.version = Version::HTTP_2;
    InboundMessage::Head {
        head,
        decode: DecodeResult::Success,
    }
}

pub fn bad_head(path: &str) -> InboundMessage {
    InboundMessage::Head {
        head: request_head(Method::GET, path),
        decode: DecodeResult::Failure(Error::decode("invalid header line")),
    }
}

pub fn empty_last() -> InboundMessage {
    InboundMessage::Last(LastContent::empty())
}

pub fn last(data: &'static [u8]) -> InboundMessage {
    InboundMessage::Last(LastContent::new(Bytes::from_static(data)))
}

pub fn content(data: &'static [u8]) -> InboundMessage {
    InboundMessage::Content(Content::new(Bytes::from_static(data)))
}

pub fn bad_content() -> InboundMessage {
    InboundMessage::Content(Content {
        data: Bytes::new(),
        decode: DecodeResult::Failure(Error::decode("invalid chunk size")),
    })
}

pub fn response_head(status: StatusCode, headers: &[(&'static str, &'static str)]) -> ResponseHead {
    let mut head = ResponseHead::default();
    head.subject = status;
    head.version = Version::HTTP_11;
    for (name, value) in headers {
        head.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    head
}

/// A complete `200 OK` with `Content-Length: 0`.
pub fn ok_empty() -> OutboundMessage {
    OutboundMessage::Full {
        head: response_head(StatusCode::OK, &[("content-length", "0")]),
        body: Bytes::new(),
        trailers: HeaderMap::new(),
    }
}
