//! Logging wrapper for transports

use crate::error::TransportResult;
use crate::Transport;

/// Transport that logs every retrieval under the `rk::transport` target
#[derive(Debug, Clone)]
pub struct LoggedTransport<T> {
    inner: T,
}

impl<T: Transport> LoggedTransport<T> {
    /// Wrap `inner`
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// The wrapped transport
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for LoggedTransport<T> {
    fn fetch(&self, uri: &str) -> TransportResult<String> {
        tracing::debug!(target: "rk::transport", uri, "fetch");
        let result = self.inner.fetch(uri);
        match &result {
            Ok(text) => tracing::debug!(target: "rk::transport", uri, bytes = text.len(), "fetch ok"),
            Err(e) => tracing::warn!(target: "rk::transport", uri, error = %e, "fetch failed"),
        }
        result
    }
}
