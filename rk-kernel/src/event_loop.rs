//! Event loop
//!
//! The kernel itself is single-threaded. Retrievals run on worker threads
//! and report back over a channel; scheduled drains, deliveries and bundle
//! timeouts are all processed one at a time by [`Kernel::turn`].

use crate::error::KernelResult;
use crate::kernel::Kernel;
use crate::module::Definition;
use rk_transport::{Transport, TransportError};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How a retrieval's response is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    /// One module per response
    Module,
    /// A bundle that may define several modules
    Bundle,
    /// A bundle whose failures are only noticed through a timeout
    Alternate,
}

/// A finished retrieval.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub path: String,
    pub channel: Channel,
    pub outcome: Result<String, String>,
}

pub(crate) enum Tick {
    /// Drain the deferred queue
    Drain,
    /// Flush the deferred queue
    Flush,
    Deliver(Delivery),
}

struct Timer {
    id: u64,
    deadline: Instant,
    path: String,
}

enum Event {
    Tick(Tick),
    Timeout(String),
}

pub(crate) struct EventLoop {
    ticks: RefCell<VecDeque<Tick>>,
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
    outstanding: Cell<usize>,
    timers: RefCell<Vec<Timer>>,
    next_timer: Cell<u64>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            ticks: RefCell::new(VecDeque::new()),
            sender,
            receiver,
            outstanding: Cell::new(0),
            timers: RefCell::new(Vec::new()),
            next_timer: Cell::new(0),
        }
    }

    pub fn push_tick(&self, tick: Tick) {
        self.ticks.borrow_mut().push_back(tick);
    }

    /// Run `transport.fetch(uri)` on a worker thread.
    pub fn spawn_fetch(
        &self,
        transport: Arc<dyn Transport>,
        path: String,
        uri: String,
        channel: Channel,
    ) {
        let sender = self.sender.clone();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name(String::from("rk-fetch"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| transport.fetch(&uri)))
                    .unwrap_or_else(|_| {
                        Err(TransportError::Custom {
                            message: String::from("transport panicked"),
                        })
                    })
                    .map_err(|e| e.to_string());
                // The receiver lives as long as the kernel.
                let _ = sender.send(Delivery {
                    path: worker_path,
                    channel,
                    outcome,
                });
            });

        match spawned {
            Ok(_) => self.outstanding.set(self.outstanding.get() + 1),
            Err(e) => self.push_tick(Tick::Deliver(Delivery {
                path,
                channel: Channel::Module,
                outcome: Err(format!("cannot spawn retrieval thread: {}", e)),
            })),
        }
    }

    pub fn start_timer(&self, path: String, timeout: Duration) -> u64 {
        let id = self.next_timer.get();
        self.next_timer.set(id + 1);
        self.timers.borrow_mut().push(Timer {
            id,
            deadline: Instant::now() + timeout,
            path,
        });
        id
    }

    pub fn cancel_timer(&self, id: u64) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn expired_timer(&self, now: Instant) -> Option<String> {
        let mut timers = self.timers.borrow_mut();
        let index = timers.iter().position(|t| t.deadline <= now)?;
        Some(timers.remove(index).path)
    }

    fn nearest_deadline(&self) -> Option<Instant> {
        self.timers.borrow().iter().map(|t| t.deadline).min()
    }

    fn received(&self, delivery: Delivery) -> Event {
        self.outstanding.set(self.outstanding.get().saturating_sub(1));
        Event::Tick(Tick::Deliver(delivery))
    }

    /// Next event, blocking while retrievals or timers are outstanding.
    /// `None` once there is nothing left to wait for.
    fn next_event(&self) -> Option<Event> {
        let tick = self.ticks.borrow_mut().pop_front();
        if let Some(tick) = tick {
            return Some(Event::Tick(tick));
        }
        if let Ok(delivery) = self.receiver.try_recv() {
            return Some(self.received(delivery));
        }

        loop {
            if let Some(path) = self.expired_timer(Instant::now()) {
                return Some(Event::Timeout(path));
            }
            let deadline = self.nearest_deadline();
            if self.outstanding.get() == 0 && deadline.is_none() {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(wait) {
                        Ok(delivery) => return Some(self.received(delivery)),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => return None,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(delivery) => return Some(self.received(delivery)),
                    Err(_) => return None,
                },
            }
        }
    }
}

impl Kernel {
    /// Process one event. Returns `Ok(false)` when the kernel is idle:
    /// no scheduled work, no retrieval outstanding and no timer armed.
    ///
    /// An error is a failure raised by a continuation or module factory
    /// during this event; the kernel stays usable afterwards.
    pub fn turn(&self) -> KernelResult<bool> {
        let Some(event) = self.ctx.events.next_event() else {
            return Ok(false);
        };
        match event {
            Event::Tick(Tick::Drain) => {
                trace!(target: "rk::defer", "scheduled drain");
                self.drain()?;
            }
            Event::Tick(Tick::Flush) => {
                trace!(target: "rk::defer", "scheduled flush");
                self.flush()?;
            }
            Event::Tick(Tick::Deliver(delivery)) => {
                debug!(target: "rk::fetch", path = %delivery.path, ok = delivery.outcome.is_ok(), "delivery");
                self.deliver(delivery)?;
            }
            Event::Timeout(path) => {
                warn!(target: "rk::fetch", path = %path, "bundle retrieval timed out");
                self.define(path, Definition::Missing)?;
            }
        }
        Ok(true)
    }

    /// Process events until the kernel is idle or an event fails.
    pub fn run_until_idle(&self) -> KernelResult<()> {
        while self.turn()? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_transport::MemoryTransport;

    #[test]
    fn test_idle_loop() {
        let events = EventLoop::new();
        assert!(events.next_event().is_none());
    }

    #[test]
    fn test_ticks_before_deliveries() {
        let events = EventLoop::new();
        let transport = Arc::new(MemoryTransport::with_sources([("mem://a.js", "a")]));
        events.spawn_fetch(transport, "a.js".into(), "mem://a.js".into(), Channel::Module);
        events.push_tick(Tick::Flush);

        assert!(matches!(events.next_event(), Some(Event::Tick(Tick::Flush))));
        match events.next_event() {
            Some(Event::Tick(Tick::Deliver(d))) => {
                assert_eq!(d.path, "a.js");
                assert_eq!(d.outcome.as_deref(), Ok("a"));
            }
            _ => panic!("expected a delivery"),
        }
        assert!(events.next_event().is_none());
    }

    #[test]
    fn test_timer_expiry_and_cancel() {
        let events = EventLoop::new();
        let cancelled = events.start_timer("x.js".into(), Duration::from_millis(5));
        events.cancel_timer(cancelled);
        events.start_timer("y.js".into(), Duration::from_millis(5));
        assert_eq!(events.pending_timers(), 1);

        match events.next_event() {
            Some(Event::Timeout(path)) => assert_eq!(path, "y.js"),
            _ => panic!("expected a timeout"),
        }
        assert!(events.next_event().is_none());
    }

    #[test]
    fn test_failed_retrieval_is_delivered() {
        let events = EventLoop::new();
        let transport = Arc::new(MemoryTransport::new());
        events.spawn_fetch(transport, "b.js".into(), "mem://b.js".into(), Channel::Bundle);
        match events.next_event() {
            Some(Event::Tick(Tick::Deliver(d))) => {
                assert_eq!(d.channel, Channel::Bundle);
                assert!(d.outcome.is_err());
            }
            _ => panic!("expected a delivery"),
        }
    }
}
