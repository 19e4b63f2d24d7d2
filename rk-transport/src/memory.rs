//! In-memory transport implementation

use crate::error::{TransportError, TransportResult};
use crate::uri::strip_query;
use crate::Transport;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::warn;

/// Counters describing how a `MemoryTransport` has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total retrievals issued
    pub requests: usize,
    /// Retrievals currently running
    pub active: usize,
    /// Highest number of retrievals that ever ran at the same time
    pub peak_active: usize,
}

#[derive(Debug, Default)]
struct Shared {
    sources: RwLock<BTreeMap<String, String>>,
    requested: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// An in-memory transport.
///
/// Sources are keyed by URI (query string ignored). Every retrieval is
/// recorded in order, which makes the transport useful for asserting on the
/// kernel's request order and concurrency. An optional latency makes each
/// retrieval sleep, so overlapping worker threads are observable.
///
/// # Example
/// ```
/// use rk_transport::{MemoryTransport, Transport};
///
/// let transport = MemoryTransport::new();
/// transport.insert("mem://lib/a.js", "{}");
/// assert_eq!(transport.fetch("mem://lib/a.js").unwrap(), "{}");
/// assert_eq!(transport.requested(), vec!["mem://lib/a.js".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    /// Create a new empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport pre-populated with sources.
    ///
    /// # Arguments
    /// * `sources` - Iterator of (uri, text) tuples
    pub fn with_sources<I, U, T>(sources: I) -> Self
    where
        I: IntoIterator<Item = (U, T)>,
        U: Into<String>,
        T: Into<String>,
    {
        let transport = Self::new();
        for (uri, text) in sources {
            transport.insert(uri, text);
        }
        transport
    }

    /// Make every retrieval take at least `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add or replace the source at `uri`.
    ///
    /// A poisoned store drops the write; retrievals then fail with the same
    /// condition.
    pub fn insert(&self, uri: impl Into<String>, text: impl Into<String>) {
        let uri = uri.into();
        match self.shared.sources.write() {
            Ok(mut sources) => {
                sources.insert(uri, text.into());
            }
            Err(_) => {
                warn!(target: "rk::transport", uri = %uri, "source store poisoned, insert dropped");
            }
        }
    }

    /// Remove the source at `uri`.
    pub fn remove(&self, uri: &str) -> Option<String> {
        self.shared.sources.write().ok()?.remove(uri)
    }

    /// Every URI requested so far, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.shared
            .requested
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Usage counters.
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            requests: self.shared.requested.lock().map(|log| log.len()).unwrap_or(0),
            active: self.shared.active.load(Ordering::SeqCst),
            peak_active: self.shared.peak.load(Ordering::SeqCst),
        }
    }

    fn lookup(&self, uri: &str) -> TransportResult<String> {
        let key = strip_query(uri);
        let sources = self.shared.sources.read().map_err(|_| TransportError::Custom {
            message: String::from("Lock poisoned"),
        })?;
        sources
            .get(key)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                uri: key.to_string(),
            })
    }
}

/// Decrements the active counter when a retrieval finishes, however it ends.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, uri: &str) -> TransportResult<String> {
        if let Ok(mut log) = self.shared.requested.lock() {
            log.push(uri.to_string());
        }
        let active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = ActiveGuard(&self.shared.active);
        self.shared.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let result = self.lookup(uri);
        drop(guard);
        result
    }
}
