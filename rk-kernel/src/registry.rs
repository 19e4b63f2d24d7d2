//! Definition registry
//!
//! Maps normalized paths to definitions. The first definition for a path
//! wins; later ones are dropped. Work waiting on a path is parked here as
//! waiters and released through the deferred queue once the path is
//! defined.

use crate::deferred::Task;
use crate::error::KernelResult;
use crate::kernel::Kernel;
use crate::module::Definition;
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Default)]
pub(crate) struct DefinitionRegistry {
    definitions: HashMap<String, Definition>,
    waiters: HashMap<String, Vec<Task>>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, path: &str) -> bool {
        self.definitions.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<Definition> {
        self.definitions.get(path).cloned()
    }

    /// Register unless already defined. Returns whether it was stored.
    pub fn insert(&mut self, path: String, definition: Definition) -> bool {
        if self.definitions.contains_key(&path) {
            return false;
        }
        self.definitions.insert(path, definition);
        true
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Append a waiter. Returns true when this opened the waiter list,
    /// meaning nobody has asked for the path yet.
    pub fn subscribe(&mut self, path: &str, task: Task) -> bool {
        match self.waiters.get_mut(path) {
            Some(list) => {
                list.push(task);
                false
            }
            None => {
                self.waiters.insert(path.to_string(), vec![task]);
                true
            }
        }
    }

    /// Put a waiter ahead of all others for `path`.
    pub fn prepend(&mut self, path: &str, task: Task) {
        self.waiters
            .entry(path.to_string())
            .or_default()
            .insert(0, task);
    }

    pub fn take_waiters(&mut self, path: &str) -> Vec<Task> {
        self.waiters.remove(path).unwrap_or_default()
    }
}

impl Kernel {
    /// Register a definition for `path`, then release everything waiting
    /// on it.
    ///
    /// A path that is already defined keeps its first definition. The
    /// returned error, if any, comes from a continuation that ran while
    /// the released work was drained.
    pub fn define(&self, path: impl Into<String>, definition: Definition) -> KernelResult<()> {
        self.define_many([(path.into(), definition)])
    }

    /// Register several definitions at once; waiters are released only
    /// after all of them are installed.
    pub fn define_many<I, P>(&self, entries: I) -> KernelResult<()>
    where
        I: IntoIterator<Item = (P, Definition)>,
        P: Into<String>,
    {
        let mut released = Vec::new();
        {
            let mut registry = self.ctx.registry.borrow_mut();
            let mut paths = Vec::new();
            for (path, definition) in entries {
                let path = path.into();
                let missing = definition.is_missing();
                if registry.insert(path.clone(), definition) {
                    debug!(target: "rk::load", path = %path, missing, "defined");
                } else {
                    trace!(target: "rk::load", path = %path, "already defined, ignored");
                }
                paths.push(path);
            }
            for path in &paths {
                released.extend(registry.take_waiters(path));
            }
        }
        if !released.is_empty() {
            trace!(target: "rk::defer", count = released.len(), "waiters released");
        }
        self.defer_all(released);
        self.flush()
    }
}
