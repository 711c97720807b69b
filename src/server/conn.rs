//! Lower-level server connection API.
//!
//! One [`TrafficHandler`] exists per live connection. The driver that
//! owns the socket constructs it at connection establishment (via
//! [`Builder::handler`](super::Builder::handler)), feeds it every
//! pipeline event from the connection's single executor, and discards
//! it at close.

use std::sync::Arc;
use std::time::Duration;

use crate::proto::h1::Dispatcher;
use crate::proto::{InboundMessage, OutboundMessage};
use crate::rt::{Channel, Promise, Scheduled};
use crate::service::Application;

use super::Config;

/// The per-connection HTTP/1 traffic stage.
///
/// Sits inline between the decoder and the application: inbound decoder
/// events go through [`on_inbound`](TrafficHandler::on_inbound), and
/// the application's response writes go through
/// [`write`](TrafficHandler::write) and
/// [`flush`](TrafficHandler::flush). The handler enforces RFC 7230
/// framing and keep-alive semantics, serializes responses against
/// pipelined requests, and decides when the connection must close.
pub struct TrafficHandler {
    dispatch: Dispatcher,
    config: Arc<Config>,
}

impl std::fmt::Debug for TrafficHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficHandler")
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl TrafficHandler {
    pub(crate) fn new(config: Arc<Config>) -> TrafficHandler {
        TrafficHandler {
            dispatch: Dispatcher::new(config.clone()),
            config,
        }
    }

    /// The handler was attached to the connection pipeline; solicits
    /// the first read.
    pub fn on_attach<C: Channel>(&mut self, channel: &mut C) {
        self.dispatch.on_attach(channel);
    }

    /// An inbound event arrived from the decoder.
    pub fn on_inbound<C, A>(&mut self, channel: &mut C, app: &mut A, msg: InboundMessage)
    where
        C: Channel,
        A: Application,
    {
        self.dispatch.on_inbound(channel, app, msg);
    }

    /// The current read batch ended.
    pub fn on_read_complete<C: Channel>(&mut self, channel: &mut C) {
        self.dispatch.on_read_complete(channel);
    }

    /// The handler is being detached; every still-deferred inbound item
    /// is released.
    pub fn on_detach(&mut self) {
        self.dispatch.on_detach();
    }

    /// The application wrote a response message.
    pub fn write<C: Channel>(&mut self, channel: &mut C, msg: OutboundMessage, promise: Promise) {
        self.dispatch.write(channel, msg, promise);
    }

    /// The application requested a flush.
    pub fn flush<C: Channel>(&mut self, channel: &mut C) {
        self.dispatch.flush(channel);
    }

    /// Runs a task previously posted through
    /// [`Channel::schedule`](crate::rt::Channel::schedule). Must be
    /// invoked on the connection's executor, serialized with inbound
    /// work.
    pub fn run_scheduled<C, A>(&mut self, channel: &mut C, app: &mut A, task: Scheduled)
    where
        C: Channel,
        A: Application,
    {
        self.dispatch.run_scheduled(channel, app, task);
    }

    /// How many accepted requests still await their final response.
    pub fn pending_responses(&self) -> usize {
        self.dispatch.pending_responses()
    }

    /// Whether keep-alive is still honored on this connection.
    pub fn is_persistent(&self) -> bool {
        self.dispatch.is_persistent()
    }

    /// The configured idle timeout, for the driver's timer stage.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.config.idle_timeout
    }
}
