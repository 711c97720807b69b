use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, Version};
use tracing::{debug, trace};

use super::conn::State;
use super::pipeline::{Deferred, Pipeline, RequestHolder};
use super::role;
use crate::headers;
use crate::proto::{
    Content, DecodeResult, InboundMessage, LastContent, OutboundMessage, RequestHead, ResponseHead,
};
use crate::rt::{Channel, Promise, Scheduled};
use crate::server::{Config, ConnState, ConnectionInfo, Scheme, ServerRequest};
use crate::service::Application;

/// Facts captured from the channel on the first inbound event, fixed
/// for the connection's life.
#[derive(Clone, Copy, Debug)]
struct ConnContext {
    secure: bool,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

/// The per-connection traffic stage.
///
/// Inbound, it validates and dispatches decoder events, deferring
/// pipelined requests behind the in-flight one. Outbound, it shapes
/// response heads to match the connection's keep-alive decision and
/// accounts last-content writes. It never blocks; everything it needs
/// from the transport goes through [`Channel`].
pub(crate) struct Dispatcher {
    state: State,
    pipeline: Pipeline,
    ctx: Option<ConnContext>,
    config: Arc<Config>,
    /// Completion signal for the head-of-line request; fired when its
    /// response's last content enters the outbound path, dropped
    /// (canceling the observer) if the connection dies first.
    active_signal: Option<Promise>,
}

impl Dispatcher {
    pub(crate) fn new(config: Arc<Config>) -> Dispatcher {
        Dispatcher {
            state: State::new(),
            pipeline: Pipeline::new(),
            ctx: None,
            config,
            active_signal: None,
        }
    }

    pub(crate) fn pending_responses(&self) -> usize {
        self.state.pending_responses()
    }

    pub(crate) fn is_persistent(&self) -> bool {
        self.state.is_persistent()
    }

    pub(crate) fn on_attach<C: Channel>(&mut self, channel: &mut C) {
        trace!("attached; soliciting first read");
        channel.request_read();
    }

    pub(crate) fn on_detach(&mut self) {
        trace!("detaching");
        self.pipeline.clear();
        // dropping an unfired signal cancels its completion
        self.active_signal = None;
    }

    pub(crate) fn on_inbound<C, A>(&mut self, channel: &mut C, app: &mut A, msg: InboundMessage)
    where
        C: Channel,
        A: Application,
    {
        self.state.mark_read();
        self.capture_context(channel);
        match msg {
            InboundMessage::Head { head, decode } => {
                self.on_request_head(channel, app, head, decode, Instant::now())
            }
            InboundMessage::Content(content) => self.on_content(channel, app, content),
            InboundMessage::Last(last) => self.on_last_content(channel, app, last),
        }
    }

    pub(crate) fn on_read_complete<C: Channel>(&mut self, channel: &mut C) {
        let read = self.state.take_read();
        if self.config.pipeline_flush && read && self.state.take_needs_flush() {
            trace!("flushing at read boundary");
            channel.flush();
        }
    }

    pub(crate) fn run_scheduled<C, A>(&mut self, channel: &mut C, app: &mut A, task: Scheduled)
    where
        C: Channel,
        A: Application,
    {
        match task {
            Scheduled::DrainPipeline => self.drain(channel, app),
        }
    }

    // ===== inbound =====

    fn capture_context<C: Channel>(&mut self, channel: &C) {
        if self.ctx.is_none() {
            let ctx = ConnContext {
                secure: channel.is_secure(),
                remote_addr: channel.proxied_peer_addr().or_else(|| channel.peer_addr()),
                local_addr: channel.local_addr(),
            };
            trace!(remote = ?ctx.remote_addr, secure = ctx.secure, "captured connection context");
            self.ctx = Some(ctx);
        }
    }

    fn on_request_head<C, A>(
        &mut self,
        channel: &mut C,
        app: &mut A,
        head: RequestHead,
        decode: DecodeResult,
        received_at: Instant,
    ) where
        C: Channel,
        A: Application,
    {
        // A new head ends the previous response's finalization phase;
        // in coalescing mode any still-deferred flush goes out first.
        if self.config.pipeline_flush && self.state.is_finalizing() {
            self.terminate(channel);
        }
        self.state.clear_finalizing();

        channel.set_idle_timeout(false);

        if head.version == Version::HTTP_2 {
            debug!("HTTP/2.0 request on an HTTP/1 connection");
            self.reject(channel, crate::Error::new_version());
            return;
        }

        if !self.state.is_persistent() {
            // pipelined request arriving after the close decision
            debug!("dropping request received after close decision");
            return;
        }

        let wants_keep_alive = headers::should_keep_alive(head.version, &head.headers);
        self.state.accept_request(wants_keep_alive);

        if self.state.pending_responses() > 1 {
            self.state.set_overflow();
            trace!(queued = self.pipeline.len() + 1, "deferring pipelined request");
            let holder = RequestHolder {
                head,
                decode,
                received_at,
            };
            if let Err(err) = self.pipeline.push(Deferred::Head(holder)) {
                self.fatal(channel, err);
            }
            return;
        }

        self.dispatch_request(channel, app, head, decode, received_at);
    }

    /// Binds a head-of-line request and hands it to the application.
    fn dispatch_request<C, A>(
        &mut self,
        channel: &mut C,
        app: &mut A,
        head: RequestHead,
        mut decode: DecodeResult,
        received_at: Instant,
    ) where
        C: Channel,
        A: Application,
    {
        if let Some(err) = decode.take_err() {
            debug!("request head failed to decode: {}", err);
            self.reject(channel, err);
            return;
        }

        self.capture_context(channel);
        let ctx = match self.ctx {
            Some(ctx) => ctx,
            None => unreachable!("context captured before dispatch"),
        };
        let info = ConnectionInfo {
            scheme: if ctx.secure { Scheme::Https } else { Scheme::Http },
            local_addr: ctx.local_addr,
            remote_addr: ctx.remote_addr,
        };
        let info = match self.config.forwarded {
            Some(ref resolver) => match resolver.resolve(&head, info) {
                Ok(info) => info,
                Err(err) => {
                    debug!(
                        remote = ?info.remote_addr,
                        local = ?info.local_addr,
                        "connection info resolution failed: {}", err,
                    );
                    self.reject(channel, err);
                    return;
                }
            },
            None => info,
        };

        let (signal, completion) = Promise::pair();
        let completion = match self.config.map_handle {
            Some(ref map) => map(completion),
            None => completion,
        };
        self.active_signal = Some(signal);
        self.state.bind_request();
        if let Some(ref observer) = self.config.observer {
            observer.on_state_change(ConnState::Configured);
        }

        let request = ServerRequest::new(head, received_at, info, self.config.clone(), completion);
        trace!(?request, served = self.state.served_requests(), "dispatching request");
        app.request(request);
    }

    fn on_content<C, A>(&mut self, channel: &mut C, app: &mut A, mut content: Content)
    where
        C: Channel,
        A: Application,
    {
        if self.state.is_overflown() {
            if let Err(err) = self.pipeline.push(Deferred::Content(content)) {
                self.fatal(channel, err);
            }
            return;
        }
        if self.state.pending_responses() == 0 {
            if let Some(err) = content.decode.take_err() {
                self.reject(channel, err);
                return;
            }
            // decoded after its response was already sent
            debug!("dropping content received after response completed");
            return;
        }
        self.forward_content(channel, app, content);
    }

    fn on_last_content<C, A>(&mut self, channel: &mut C, app: &mut A, mut last: LastContent)
    where
        C: Channel,
        A: Application,
    {
        if self.state.is_overflown() {
            if let Err(err) = self.pipeline.push(Deferred::Last(last)) {
                self.fatal(channel, err);
            }
            return;
        }
        if self.state.pending_responses() == 0 {
            if let Some(err) = last.decode.take_err() {
                self.reject(channel, err);
                return;
            }
            if last.is_empty_marker() {
                // benign end-of-message marker with no recipient logic
                app.last_content(last);
            } else {
                debug!("dropping last content received after response completed");
            }
            channel.request_read();
            return;
        }
        self.forward_last(channel, app, last);
    }

    fn forward_content<C, A>(&mut self, channel: &mut C, app: &mut A, mut content: Content)
    where
        C: Channel,
        A: Application,
    {
        if let Some(err) = content.decode.take_err() {
            self.reject(channel, err);
            return;
        }
        app.content(content);
    }

    fn forward_last<C, A>(&mut self, channel: &mut C, app: &mut A, mut last: LastContent)
    where
        C: Channel,
        A: Application,
    {
        if let Some(err) = last.decode.take_err() {
            self.reject(channel, err);
            return;
        }
        app.last_content(last);
    }

    /// Dispatches the next deferred request, then streams its body
    /// parts until the following head. Runs on the connection executor,
    /// serialized with other inbound work.
    fn drain<C, A>(&mut self, channel: &mut C, app: &mut A)
    where
        C: Channel,
        A: Application,
    {
        if !self.state.is_persistent() {
            // never serve another pipelined request once the close
            // decision is made
            self.pipeline.clear();
            self.state.clear_overflow();
            return;
        }

        match self.pipeline.pop() {
            Some(Deferred::Head(holder)) => {
                trace!(remaining = self.pipeline.len(), "draining deferred request");
                self.dispatch_request(channel, app, holder.head, holder.decode, holder.received_at);
            }
            Some(_) => {
                debug_assert!(false, "pipeline drain did not start at a request head");
            }
            None => {}
        }

        loop {
            if !self.state.is_persistent() || self.pipeline.next_is_head() {
                break;
            }
            match self.pipeline.pop() {
                Some(Deferred::Content(content)) => self.forward_content(channel, app, content),
                Some(Deferred::Last(last)) => self.forward_last(channel, app, last),
                Some(Deferred::Head(_)) => unreachable!("guarded by next_is_head"),
                None => break,
            }
        }

        if self.pipeline.is_empty() {
            self.state.clear_overflow();
        }
    }

    // ===== outbound =====

    pub(crate) fn write<C: Channel>(
        &mut self,
        channel: &mut C,
        msg: OutboundMessage,
        mut promise: Promise,
    ) {
        match msg {
            OutboundMessage::Head(head) => {
                let head = self.shape_response_head(head);
                channel.write(OutboundMessage::Head(head), promise);
            }
            OutboundMessage::Full {
                head,
                body,
                trailers,
            } => {
                let informational = head.subject.is_informational();
                let head = self.shape_response_head(head);
                if informational {
                    channel.write(
                        OutboundMessage::Full {
                            head,
                            body,
                            trailers,
                        },
                        promise,
                    );
                    return;
                }
                self.finish_response(&mut promise);
                channel.write(
                    OutboundMessage::Full {
                        head,
                        body,
                        trailers,
                    },
                    promise,
                );
                self.after_last_content(channel);
            }
            OutboundMessage::Content(data) => {
                if self.is_late_content() {
                    promise.succeed();
                    return;
                }
                channel.write(OutboundMessage::Content(data), promise);
            }
            OutboundMessage::Last { data, trailers } => {
                if self.is_late_content() {
                    promise.succeed();
                    return;
                }
                self.finish_response(&mut promise);
                channel.write(OutboundMessage::Last { data, trailers }, promise);
                self.after_last_content(channel);
            }
            OutboundMessage::Raw(data) => {
                channel.write(OutboundMessage::Raw(data), promise);
            }
        }
    }

    pub(crate) fn flush<C: Channel>(&mut self, channel: &mut C) {
        if !self.config.pipeline_flush || !self.state.is_finalizing() {
            channel.flush();
            return;
        }
        // coalesce finalization flushes to the read boundary, unless
        // back-pressure demands one now
        if self.state.take_needs_flush() || !channel.is_writable() {
            channel.flush();
        } else {
            self.state.defer_flush();
        }
    }

    /// Rewrites an outgoing head to match the connection's keep-alive
    /// decision, applying the request-cap and framing checks first.
    fn shape_response_head(&mut self, mut head: ResponseHead) -> ResponseHead {
        if head.subject.is_informational() {
            // written through without accounting
            trace!(status = ?head.subject, "forwarding informational response");
            return head;
        }
        self.state.set_non_informational(true);

        self.state
            .respond(headers::should_keep_alive(head.version, &head.headers));

        if let Some(max) = self.config.keep_alive_requests {
            if self.state.served_requests() >= max {
                debug!(
                    served = self.state.served_requests(),
                    "keep-alive request cap reached"
                );
                self.state.force_last_response();
            }
        }

        if !headers::has_self_defined_length(head.subject, &head.headers) {
            // the client can only detect end-of-message by close
            debug!("response length is not self-defined; closing after response");
            self.state.disable_keep_alive();
        }

        if !self.state.is_persistent() {
            headers::set_connection_close(&mut head.headers);
        }
        head
    }

    /// True if this response content arrived after its response was
    /// already closed out; such content is released and its promise
    /// completed without forwarding.
    fn is_late_content(&self) -> bool {
        if self.state.pending_responses() == 0 && self.state.is_persistent() {
            trace!("dropping response content written after response completed");
            true
        } else {
            false
        }
    }

    /// Accounting for a last-content write entering the outbound path.
    fn finish_response(&mut self, promise: &mut Promise) {
        self.state.begin_finalizing();
        if !self.state.is_persistent() {
            promise.set_close_on_complete();
        }
        let completed = self.state.is_non_informational();
        self.state.complete_response();
        if completed {
            if let Some(signal) = self.active_signal.take() {
                signal.succeed();
            }
        }
    }

    fn after_last_content<C: Channel>(&mut self, channel: &mut C) {
        if !self.state.is_persistent() {
            // closing; anything still deferred is released on detach
            return;
        }
        if !self.pipeline.is_empty() {
            trace!("scheduling pipeline drain");
            channel.schedule(Scheduled::DrainPipeline);
        } else if self.state.pending_responses() == 0 {
            channel.set_idle_timeout(true);
            channel.request_read();
        }
    }

    // ===== failures =====

    /// Answers a failed request with a synthesized response and stops
    /// trusting the connection.
    fn reject<C: Channel>(&mut self, channel: &mut C, err: crate::Error) {
        self.state.disable_keep_alive();
        let head = role::error_response(&err);
        debug!(status = ?head.subject, "responding to failed request: {}", err);
        let mut promise = Promise::ignored();
        promise.set_close_on_complete();
        channel.write(
            OutboundMessage::Full {
                head,
                body: Bytes::new(),
                trailers: HeaderMap::new(),
            },
            promise,
        );
        channel.flush();
    }

    /// An unrecoverable connection failure: no clean response can be
    /// produced, so surface and close.
    fn fatal<C: Channel>(&mut self, channel: &mut C, err: crate::Error) {
        debug!("fatal connection error: {}", err);
        self.state.disable_keep_alive();
        self.pipeline.clear();
        channel.close();
    }

    /// Force-finalizes the previous response's deferred flush before a
    /// new request is admitted.
    fn terminate<C: Channel>(&mut self, channel: &mut C) {
        if self.state.take_needs_flush() {
            trace!("force-finalizing previous response");
            channel.flush();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
