use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use tracing::trace;

use crate::proto::{Content, DecodeResult, LastContent, RequestHead};

/// A request head deferred behind an in-flight response, stamped with
/// its arrival time so request-start timing survives pipelining.
pub(crate) struct RequestHolder {
    pub(crate) head: RequestHead,
    pub(crate) decode: DecodeResult,
    pub(crate) received_at: Instant,
}

/// One deferred inbound item.
///
/// The drain loop is a straight state machine over this variant: emit a
/// head, then stream parts until the next head.
pub(crate) enum Deferred {
    Head(RequestHolder),
    Content(Content),
    Last(LastContent),
}

/// FIFO of inbound messages deferred while an earlier request is still
/// in flight. Allocated lazily on first deferral; unbounded.
pub(crate) struct Pipeline {
    queue: Option<VecDeque<Deferred>>,
}

impl Pipeline {
    pub(crate) fn new() -> Pipeline {
        Pipeline { queue: None }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.as_ref().map(|q| q.is_empty()).unwrap_or(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.as_ref().map(|q| q.len()).unwrap_or(0)
    }

    /// Appends a deferred item. A refusal by the underlying container
    /// is fatal for the connection.
    pub(crate) fn push(&mut self, item: Deferred) -> crate::Result<()> {
        let queue = self.queue.get_or_insert_with(VecDeque::new);
        queue
            .try_reserve(1)
            .map_err(|_| crate::Error::new_overflow())?;
        queue.push_back(item);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<Deferred> {
        self.queue.as_mut().and_then(|q| q.pop_front())
    }

    /// True if the next deferred item is a request head.
    pub(crate) fn next_is_head(&self) -> bool {
        matches!(
            self.queue.as_ref().and_then(|q| q.front()),
            Some(Deferred::Head(_))
        )
    }

    /// Releases every deferred item. Called on detach and when the
    /// connection decides not to persist.
    pub(crate) fn clear(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            if !queue.is_empty() {
                trace!(released = queue.len(), "releasing deferred pipeline items");
            }
            queue.clear();
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("len", &self.len()).finish()
    }
}
