use std::fmt;

use tracing::trace;

/// Per-connection traffic state.
///
/// One instance lives for the life of a connection and mediates every
/// decision the dispatcher and shaper make: whether keep-alive still
/// holds, how many responses are outstanding, whether inbound messages
/// are being deferred, and where the current response is in its write
/// lifecycle.
pub(crate) struct State {
    keep_alive: KA,
    /// Requests accepted whose final response has not been fully
    /// written. Zero iff no request awaits its response.
    pending_responses: usize,
    /// Monotonic count of requests bound to the application on this
    /// connection; compared against the configured keep-alive cap.
    served_requests: usize,
    /// At least one inbound message is deferred behind an in-flight
    /// request.
    overflow: bool,
    /// The current outgoing response is not 1xx, so its last content
    /// decrements `pending_responses`.
    non_informational: bool,
    /// Last content of the current response has entered the outbound
    /// path; cleared when a new request head arrives.
    finalizing: bool,
    /// An inbound event was seen in the current read batch.
    read: bool,
    /// A flush was requested but deferred to the next read boundary.
    needs_flush: bool,
}

impl State {
    pub(crate) fn new() -> State {
        State {
            keep_alive: KA::Enabled,
            pending_responses: 0,
            served_requests: 0,
            overflow: false,
            non_informational: false,
            finalizing: false,
            read: false,
            needs_flush: false,
        }
    }

    /// No request is in flight and nothing is deferred.
    pub(crate) fn is_idle(&self) -> bool {
        self.pending_responses == 0 && !self.overflow
    }

    pub(crate) fn is_persistent(&self) -> bool {
        !matches!(self.keep_alive, KA::Disabled)
    }

    pub(crate) fn disable_keep_alive(&mut self) {
        if self.is_persistent() {
            trace!("disabling keep-alive");
        }
        self.keep_alive.disable();
    }

    /// A request head was accepted for processing: count it pending and
    /// fold its keep-alive wish into the connection decision.
    pub(crate) fn accept_request(&mut self, wants_keep_alive: bool) {
        self.pending_responses += 1;
        self.keep_alive &= wants_keep_alive;
        trace!(
            pending = self.pending_responses,
            persistent = self.is_persistent(),
            "request accepted"
        );
    }

    /// A request operation was bound to the application.
    pub(crate) fn bind_request(&mut self) {
        self.served_requests += 1;
    }

    /// Fold an outgoing response's own keep-alive wish into the
    /// connection decision.
    pub(crate) fn respond(&mut self, wants_keep_alive: bool) {
        self.keep_alive &= wants_keep_alive;
    }

    /// Last content of the current response was handed to the encoder.
    pub(crate) fn complete_response(&mut self) {
        if self.non_informational && self.pending_responses > 0 {
            self.pending_responses -= 1;
            trace!(pending = self.pending_responses, "response completed");
        }
        self.non_informational = false;
    }

    /// The current response must be the connection's last: nothing else
    /// will be answered, and keep-alive is off.
    pub(crate) fn force_last_response(&mut self) {
        self.pending_responses = 0;
        self.keep_alive.disable();
        trace!("forcing last response");
    }

    pub(crate) fn pending_responses(&self) -> usize {
        self.pending_responses
    }

    pub(crate) fn served_requests(&self) -> usize {
        self.served_requests
    }

    pub(crate) fn is_overflown(&self) -> bool {
        self.overflow
    }

    pub(crate) fn set_overflow(&mut self) {
        self.overflow = true;
    }

    pub(crate) fn clear_overflow(&mut self) {
        self.overflow = false;
    }

    pub(crate) fn set_non_informational(&mut self, value: bool) {
        self.non_informational = value;
    }

    pub(crate) fn is_non_informational(&self) -> bool {
        self.non_informational
    }

    pub(crate) fn begin_finalizing(&mut self) {
        self.finalizing = true;
    }

    pub(crate) fn clear_finalizing(&mut self) {
        self.finalizing = false;
    }

    pub(crate) fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    pub(crate) fn mark_read(&mut self) {
        self.read = true;
    }

    /// Clears the read flag at a read-batch boundary, returning whether
    /// any inbound event had been seen in the batch.
    pub(crate) fn take_read(&mut self) -> bool {
        std::mem::replace(&mut self.read, false)
    }

    pub(crate) fn defer_flush(&mut self) {
        self.needs_flush = true;
    }

    pub(crate) fn take_needs_flush(&mut self) -> bool {
        std::mem::replace(&mut self.needs_flush, false)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("keep_alive", &self.keep_alive)
            .field("pending_responses", &self.pending_responses)
            .field("overflow", &self.overflow)
            .field("finalizing", &self.finalizing)
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
enum KA {
    Enabled,
    Disabled,
}

impl std::ops::BitAndAssign<bool> for KA {
    fn bitand_assign(&mut self, enabled: bool) {
        if !enabled {
            *self = KA::Disabled;
        }
    }
}

impl KA {
    fn disable(&mut self) {
        *self = KA::Disabled;
    }
}
