//! Transport trait definition

use crate::error::TransportResult;
use std::sync::Arc;

/// Retrieval capability
///
/// Turns a module URI into source text. Implementations must be shareable
/// across threads: the kernel issues asynchronous retrievals from worker
/// threads and collects the results on its own thread.
///
/// # Implementations
/// - `MemoryTransport`: In-memory sources (tests, embedding)
/// - `FileTransport`: Local files behind `file://` URIs
/// - `LoggedTransport`: Logging wrapper around another transport
pub trait Transport: Send + Sync {
    /// Retrieve the text at `uri`
    ///
    /// A URI may carry a query string (`?callback=...`) when the kernel is
    /// in bundle mode. Transports that cannot use it should ignore it.
    fn fetch(&self, uri: &str) -> TransportResult<String>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, uri: &str) -> TransportResult<String> {
        (**self).fetch(uri)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn fetch(&self, uri: &str) -> TransportResult<String> {
        (**self).fetch(uri)
    }
}
