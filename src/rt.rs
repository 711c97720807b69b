//! Runtime components.
//!
//! The traffic handler never performs I/O and never blocks; everything
//! it needs from the surrounding connection — the encoder, the socket's
//! flush and writability signals, the read pump, the idle-timeout
//! stage, and the single-threaded executor — is reached through the
//! [`Channel`] trait. The driver that owns the socket implements it and
//! calls back into the handler from one executor only.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_channel::oneshot;

use crate::proto::OutboundMessage;

/// The transport/pipeline context a [`TrafficHandler`] drives.
///
/// All methods are invoked from the connection's single executor; no
/// implementation needs interior synchronization for the handler's
/// sake.
///
/// [`TrafficHandler`]: crate::server::TrafficHandler
pub trait Channel {
    /// Forward a response message toward the encoder.
    ///
    /// The `promise` must be completed once the physical write finishes
    /// (or fails), and [`Promise::is_close_on_complete`] must be
    /// honored by closing the connection after completion.
    fn write(&mut self, msg: OutboundMessage, promise: Promise);

    /// Flush buffered response bytes to the socket.
    fn flush(&mut self);

    /// Whether the socket currently accepts writes without back-pressure.
    fn is_writable(&self) -> bool;

    /// Ask the transport to pull more inbound bytes.
    fn request_read(&mut self);

    /// Post a task to the connection's executor. The driver must invoke
    /// [`TrafficHandler::run_scheduled`] with it, serialized with all
    /// other inbound work for this connection.
    ///
    /// [`TrafficHandler::run_scheduled`]: crate::server::TrafficHandler::run_scheduled
    fn schedule(&mut self, task: Scheduled);

    /// Insert (`true`) or remove (`false`) the idle-timeout stage.
    fn set_idle_timeout(&mut self, enabled: bool);

    /// Close the transport immediately.
    fn close(&mut self);

    /// The socket's peer address.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// The peer address supplied by a proxy-protocol preamble reader,
    /// when one sits earlier in the pipeline.
    fn proxied_peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// The socket's local address.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Whether a TLS stage sits earlier in the inbound pipeline.
    fn is_secure(&self) -> bool;
}

/// A task the handler posts to the connection executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheduled {
    /// Dispatch the next deferred request from the pipeline queue.
    DrainPipeline,
}

/// The completion side of an outbound write.
///
/// Every frame handed to [`Channel::write`] carries one. The driver
/// completes it when the bytes have actually been written; the handler
/// may flag it close-on-complete first.
pub struct Promise {
    tx: Option<oneshot::Sender<crate::Result<()>>>,
    close_on_complete: bool,
}

impl Promise {
    /// Creates a promise and the [`Completion`] future observing it.
    pub fn pair() -> (Promise, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Promise {
                tx: Some(tx),
                close_on_complete: false,
            },
            Completion {
                inner: Inner::Rx { rx },
            },
        )
    }

    /// A promise nobody is listening to. Used for writes whose outcome
    /// the originator does not care about.
    pub fn ignored() -> Promise {
        Promise {
            tx: None,
            close_on_complete: false,
        }
    }

    /// Complete the write successfully.
    pub fn succeed(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Ok(()));
        }
    }

    /// Complete the write with a failure.
    pub fn fail(mut self, err: crate::Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err));
        }
    }

    /// Whether the driver must close the connection once this write has
    /// completed.
    pub fn is_close_on_complete(&self) -> bool {
        self.close_on_complete
    }

    pub(crate) fn set_close_on_complete(&mut self) {
        self.close_on_complete = true;
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("listened", &self.tx.is_some())
            .field("close_on_complete", &self.close_on_complete)
            .finish()
    }
}

pin_project_lite::pin_project! {
    /// A future resolving when its [`Promise`] is completed.
    ///
    /// Resolves to a canceled error if the promise is dropped without
    /// ever being completed.
    pub struct Completion {
        #[pin]
        inner: Inner,
    }
}

pin_project_lite::pin_project! {
    #[project = InnerProj]
    enum Inner {
        Rx { #[pin] rx: oneshot::Receiver<crate::Result<()>> },
        Boxed { inner: Pin<Box<dyn Future<Output = crate::Result<()>> + Send>> },
    }
}

impl Completion {
    /// Wraps an arbitrary future as a `Completion`; the hook given to
    /// [`Builder::map_handle`] uses this to decorate the per-request
    /// completion signal.
    ///
    /// [`Builder::map_handle`]: crate::server::Builder::map_handle
    pub fn from_future<F>(future: F) -> Completion
    where
        F: Future<Output = crate::Result<()>> + Send + 'static,
    {
        Completion {
            inner: Inner::Boxed {
                inner: Box::pin(future),
            },
        }
    }
}

impl Future for Completion {
    type Output = crate::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().inner.project() {
            InnerProj::Rx { rx } => match rx.poll(cx) {
                Poll::Ready(Ok(res)) => Poll::Ready(res),
                Poll::Ready(Err(_canceled)) => Poll::Ready(Err(crate::Error::new_canceled())),
                Poll::Pending => Poll::Pending,
            },
            InnerProj::Boxed { inner } => inner.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Inner::Rx { .. } => f.write_str("Completion"),
            Inner::Boxed { .. } => f.write_str("Completion(mapped)"),
        }
    }
}
