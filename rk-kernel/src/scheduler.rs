//! Fetch scheduling
//!
//! Retrievals are bounded by the request maximum. Requests beyond the
//! bound wait in a backlog that is served most recent first. Concurrent
//! requests for one path share a single retrieval.

use crate::deferred::Task;
use crate::error::{KernelError, KernelResult};
use crate::event_loop::{Channel, Delivery, Tick};
use crate::kernel::Kernel;
use crate::module::Definition;
use crate::path::is_root;
use rk_transport::uri::{encode_path, with_query};
use tracing::{debug, error, trace, warn};

pub(crate) struct FetchScheduler {
    backlog: Vec<String>,
    in_flight: usize,
    maximum: usize,
    peak: usize,
}

impl FetchScheduler {
    pub fn new(maximum: usize) -> Self {
        Self {
            backlog: Vec::new(),
            in_flight: 0,
            maximum: maximum.max(1),
            peak: 0,
        }
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn set_maximum(&mut self, maximum: usize) -> KernelResult<()> {
        if maximum == 0 {
            return Err(KernelError::argument(
                "request maximum must be a positive integer",
            ));
        }
        self.maximum = maximum;
        Ok(())
    }

    pub fn push(&mut self, path: String) {
        self.backlog.push(path);
    }

    /// Claim a slot for the most recently queued path, if one is free.
    pub fn next(&mut self) -> Option<String> {
        if self.in_flight >= self.maximum {
            return None;
        }
        let path = self.backlog.pop()?;
        self.in_flight += 1;
        self.peak = self.peak.max(self.in_flight);
        Some(path)
    }

    pub fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }
}

impl Kernel {
    /// Change the concurrency bound. Zero is rejected and the previous
    /// bound kept; otherwise the backlog is pumped under the new bound.
    pub fn set_request_maximum(&self, maximum: usize) -> KernelResult<()> {
        self.ctx.scheduler.borrow_mut().set_maximum(maximum)?;
        self.pump();
        Ok(())
    }

    /// Run `task` once `path` is defined, retrieving it if nobody has
    /// asked for it yet.
    pub(crate) fn enqueue_fetch(&self, path: String, task: Task) {
        let first = self.ctx.registry.borrow_mut().subscribe(&path, task);
        if !first {
            trace!(target: "rk::fetch", path = %path, "joined pending retrieval");
            return;
        }
        self.ctx.scheduler.borrow_mut().push(path);
        self.pump();
    }

    fn pump(&self) {
        loop {
            let next = self.ctx.scheduler.borrow_mut().next();
            let Some(path) = next else { break };
            if self.is_defined(&path) {
                // Defined by other means while waiting; its waiters already ran.
                self.ctx.scheduler.borrow_mut().settle();
                continue;
            }

            let kernel = self.clone();
            self.ctx.registry.borrow_mut().prepend(
                &path,
                Box::new(move || {
                    kernel.ctx.scheduler.borrow_mut().settle();
                    kernel.pump();
                    Ok(())
                }),
            );
            self.dispatch(path);
        }
    }

    fn channel(&self) -> Channel {
        let settings = self.ctx.settings.borrow();
        match (&settings.global_key_path, settings.host_loaded) {
            (None, _) => Channel::Module,
            (Some(_), false) => Channel::Bundle,
            (Some(_), true) => Channel::Alternate,
        }
    }

    fn dispatch(&self, path: String) {
        let channel = self.channel();
        let uri = match self.uri_for(&path) {
            Ok(uri) => uri,
            Err(e) => {
                self.ctx.events.push_tick(Tick::Deliver(Delivery {
                    path,
                    channel: Channel::Module,
                    outcome: Err(e.to_string()),
                }));
                return;
            }
        };
        debug!(target: "rk::fetch", path = %path, uri = %uri, ?channel, "dispatch");

        if channel == Channel::Alternate {
            let timeout = self.ctx.settings.borrow().bundle_timeout;
            let timer = self.ctx.events.start_timer(path.clone(), timeout);
            let kernel = self.clone();
            self.ctx.registry.borrow_mut().prepend(
                &path,
                Box::new(move || {
                    kernel.ctx.events.cancel_timer(timer);
                    Ok(())
                }),
            );
        }

        self.ctx
            .events
            .spawn_fetch(self.ctx.transport.clone(), path, uri, channel);
    }

    /// URI for a path, with the bundle callback parameter when a key path
    /// is configured.
    pub(crate) fn uri_for(&self, path: &str) -> KernelResult<String> {
        let settings = self.ctx.settings.borrow();
        let encoded = encode_path(path);
        let uri = if is_root(path) {
            let base = settings
                .root_uri
                .as_deref()
                .ok_or_else(|| KernelError::MissingRootUri(path.to_string()))?;
            format!("{}{}", base, encoded)
        } else {
            let base = settings
                .library_uri
                .as_deref()
                .ok_or_else(|| KernelError::MissingLibraryUri(path.to_string()))?;
            format!("{}{}", base, encoded)
        };
        Ok(match &settings.global_key_path {
            Some(key) => with_query(&uri, "callback", &format!("{}.define", key)),
            None => uri,
        })
    }

    /// Retrieve `path` on the calling thread and install the result.
    /// Missing URI configuration is an error; a failed retrieval is not.
    pub(crate) fn fetch_sync(&self, path: &str) -> KernelResult<()> {
        let uri = self.uri_for(path)?;
        let bundle = self.channel() != Channel::Module;
        debug!(target: "rk::fetch", path, uri = %uri, "sync fetch");
        match self.ctx.transport.fetch(&uri) {
            Ok(source) => self.install(path, &source, bundle),
            Err(e) => {
                debug!(target: "rk::fetch", path, error = %e, "sync fetch failed");
                self.define(path, Definition::Missing)
            }
        }
    }

    /// Handle a retrieval result handed back by the event loop.
    pub(crate) fn deliver(&self, delivery: Delivery) -> KernelResult<()> {
        let Delivery {
            path,
            channel,
            outcome,
        } = delivery;
        match outcome {
            Ok(source) => self.install(&path, &source, channel != Channel::Module),
            Err(message) if channel == Channel::Alternate => {
                warn!(target: "rk::fetch", path = %path, error = %message, "bundle retrieval failed, waiting for timeout");
                Ok(())
            }
            Err(message) => {
                warn!(target: "rk::fetch", path = %path, error = %message, "retrieval failed");
                self.define(path, Definition::Missing)
            }
        }
    }

    fn install(&self, path: &str, source: &str, bundle: bool) -> KernelResult<()> {
        if !bundle {
            return match self.ctx.compiler.compile(path, source) {
                Ok(definition) => self.define(path, definition),
                Err(e) => {
                    error!(target: "rk::fetch", path, error = %e, "compile failed");
                    self.define(path, Definition::Missing)
                }
            };
        }

        match self.ctx.compiler.compile_bundle(path, source) {
            Ok(entries) => {
                debug!(target: "rk::fetch", path, modules = entries.len(), "bundle received");
                self.define_many(entries)?;
                if !self.is_defined(path) {
                    warn!(target: "rk::fetch", path, "bundle did not define the requested module");
                    self.define(path, Definition::Missing)?;
                }
                Ok(())
            }
            Err(e) => {
                error!(target: "rk::fetch", path, error = %e, "bundle compile failed");
                self.define(path, Definition::Missing)
            }
        }
    }
}
