//! Deferred continuation queue
//!
//! Every asynchronous continuation is queued here rather than run from the
//! stack that discovered it. Draining is FIFO. While a synchronous require
//! holds the sync lock nothing drains inline; a drain is scheduled on the
//! event loop instead, so continuations never interleave with synchronous
//! module construction.

use crate::error::KernelResult;
use crate::event_loop::Tick;
use crate::kernel::Kernel;
use std::collections::VecDeque;
use tracing::{error, trace};

/// A queued unit of work.
pub(crate) type Task = Box<dyn FnOnce() -> KernelResult<()>>;

#[derive(Default)]
pub(crate) struct DeferredQueue {
    pending: VecDeque<Task>,
    /// A drain is already pending on the event loop
    scheduled: bool,
    /// A synchronous require is in progress
    sync_lock: bool,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.pending.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the sync lock, returning the previous state.
    pub fn lock_sync(&mut self) -> bool {
        std::mem::replace(&mut self.sync_lock, true)
    }

    pub fn restore_sync(&mut self, previous: bool) {
        self.sync_lock = previous;
    }
}

impl Kernel {
    pub(crate) fn defer(&self, task: Task) {
        self.ctx.deferred.borrow_mut().push(task);
    }

    pub(crate) fn defer_all(&self, tasks: Vec<Task>) {
        let mut queue = self.ctx.deferred.borrow_mut();
        for task in tasks {
            queue.push(task);
        }
    }

    /// Run queued tasks until the queue is empty or one fails.
    ///
    /// On failure the rest of the queue is left for a drain on the next
    /// tick and the error is returned to whoever triggered this pass.
    pub(crate) fn drain(&self) -> KernelResult<()> {
        let result = loop {
            let next = self.ctx.deferred.borrow_mut().pop();
            match next {
                Some(task) => {
                    if let Err(e) = task() {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            }
        };

        let remaining = {
            let mut queue = self.ctx.deferred.borrow_mut();
            queue.scheduled = !queue.is_empty();
            queue.len()
        };
        if remaining > 0 {
            trace!(target: "rk::defer", remaining, "drain rescheduled");
            self.ctx.events.push_tick(Tick::Drain);
        }
        if let Err(e) = &result {
            error!(target: "rk::defer", error = %e, "deferred task failed");
        }
        result
    }

    /// Drain now, or on the next tick while the sync lock is held.
    pub(crate) fn flush(&self) -> KernelResult<()> {
        let inline = {
            let mut queue = self.ctx.deferred.borrow_mut();
            if queue.scheduled || queue.is_empty() {
                return Ok(());
            }
            if queue.sync_lock {
                queue.scheduled = true;
                false
            } else {
                true
            }
        };
        if inline {
            self.drain()
        } else {
            trace!(target: "rk::defer", "drain deferred behind sync lock");
            self.ctx.events.push_tick(Tick::Drain);
            Ok(())
        }
    }

    /// Run `f` with inline draining suppressed, then flush once.
    ///
    /// Whatever is still queued afterwards, including after a failure, gets
    /// a flush scheduled on the next tick.
    pub(crate) fn flush_after<T>(&self, f: impl FnOnce() -> KernelResult<T>) -> KernelResult<T> {
        self.ctx.deferred.borrow_mut().scheduled = true;
        let result = f().and_then(|value| {
            self.ctx.deferred.borrow_mut().scheduled = false;
            self.flush().map(|()| value)
        });

        let pending = {
            let mut queue = self.ctx.deferred.borrow_mut();
            queue.scheduled = false;
            !queue.is_empty()
        };
        if pending {
            self.ctx.events.push_tick(Tick::Flush);
        }
        result
    }

    /// Run `f` with the sync lock held, restoring the previous state after.
    pub(crate) fn with_sync_lock<T>(&self, f: impl FnOnce() -> KernelResult<T>) -> KernelResult<T> {
        let previous = self.ctx.deferred.borrow_mut().lock_sync();
        let result = f();
        self.ctx.deferred.borrow_mut().restore_sync(previous);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::JsonCompiler;
    use crate::error::KernelError;
    use rk_transport::MemoryTransport;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn kernel() -> Kernel {
        Kernel::new(MemoryTransport::new(), JsonCompiler)
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Task {
        let log = Rc::clone(log);
        Box::new(move || {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_flush_drains_in_order() {
        let k = kernel();
        let log = Rc::new(RefCell::new(Vec::new()));
        k.defer(recorder(&log, "a"));
        k.defer(recorder(&log, "b"));
        k.flush().unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(k.stats().deferred, 0);
    }

    #[test]
    fn test_sync_lock_postpones_drain() {
        let k = kernel();
        let log = Rc::new(RefCell::new(Vec::new()));
        k.with_sync_lock(|| {
            k.defer(recorder(&log, "later"));
            k.flush()
        })
        .unwrap();
        assert!(log.borrow().is_empty());

        k.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["later"]);
    }

    #[test]
    fn test_failure_leaves_rest_for_next_tick() {
        let k = kernel();
        let log = Rc::new(RefCell::new(Vec::new()));
        k.defer(Box::new(|| Err(KernelError::fault("boom"))));
        k.defer(recorder(&log, "survivor"));

        let err = k.flush().unwrap_err();
        assert_eq!(err, KernelError::fault("boom"));
        assert!(log.borrow().is_empty());

        k.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["survivor"]);
    }

    #[test]
    fn test_flush_after_runs_queued_work_once() {
        let k = kernel();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = log.clone();
        let k2 = k.clone();
        k.flush_after(move || {
            k2.defer(recorder(&inner, "first"));
            // Suppressed while inside flush_after.
            k2.flush()?;
            assert!(inner.borrow().is_empty());
            k2.defer(recorder(&inner, "second"));
            Ok(())
        })
        .unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }
}
