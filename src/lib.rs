#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]

//! # h1-traffic
//!
//! An HTTP/1.x **traffic handler**: the per-connection stage that sits
//! inline between a decoder producing message parts (request head,
//! content chunks, trailers) and an application-level request
//! processor.
//!
//! It enforces RFC 7230 framing and keep-alive semantics, serializes
//! responses against a pipeline of concurrently-arriving requests on
//! the same connection, and decides when the connection must close.
//!
//! This is a lower-level building block. It owns no socket, runs no
//! event loop, and parses no bytes: the surrounding connection driver
//! implements [`rt::Channel`] and feeds decoder events in, and the
//! application implements [`service::Application`] to receive bound
//! requests and write responses back.
//!
//! ## Usage
//!
//! One [`server::TrafficHandler`] is built per accepted connection from
//! a shared [`server::Builder`]:
//!
//! ```
//! use h1_traffic::server;
//!
//! let mut builder = server::Builder::new();
//! builder.keep_alive_requests(Some(100)).pipeline_flush(true);
//! let handler = builder.handler();
//! assert!(handler.is_persistent());
//! ```
//!
//! The driver then calls `on_attach`, `on_inbound`, `on_read_complete`,
//! and `on_detach` as pipeline events occur, all from the connection's
//! single executor, and routes the application's response writes
//! through `write`/`flush`.

pub mod rt;
pub mod server;
pub mod service;

mod error;
mod headers;
mod proto;

pub use crate::error::{Error, Result};
pub use crate::proto::{
    Content, DecodeResult, InboundMessage, LastContent, MessageHead, OutboundMessage, RequestHead,
    RequestLine, ResponseHead,
};
