//! The application seam.

use crate::proto::{Content, LastContent};
use crate::server::ServerRequest;

/// Receives the inbound side of a connection, one request at a time.
///
/// The traffic handler guarantees head-of-line ordering: a
/// [`request`](Application::request) call is never made while an
/// earlier request on the same connection is still awaiting its final
/// response, and body parts always belong to the most recently
/// delivered request.
pub trait Application {
    /// A request was accepted and bound; its head and per-connection
    /// context are carried by the operation object.
    fn request(&mut self, request: ServerRequest);

    /// An intermediate body chunk for the current request.
    fn content(&mut self, content: Content);

    /// The final body chunk for the current request.
    fn last_content(&mut self, last: LastContent);
}
