//! Module construction
//!
//! Turns definitions into modules. A module is constructed at most once;
//! its factory runs with the path marked as loading, so a synchronous
//! re-entry is reported as a circular dependency instead of recursing.

use crate::deferred::Task;
use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::module::{Definition, Module};
use crate::path::{directory_of, suffixed_candidates};
use crate::require::Require;
use crate::value::Exports;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Default)]
pub(crate) struct ModuleCache {
    modules: HashMap<String, Rc<Module>>,
    loading: HashSet<String>,
    main: Option<Rc<Module>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Rc<Module>> {
        self.modules.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    pub fn is_loading(&self, path: &str) -> bool {
        self.loading.contains(path)
    }

    pub fn main(&self) -> Option<Rc<Module>> {
        self.main.clone()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}

/// Outcome of loading one concrete path.
pub(crate) enum Loaded {
    Module(Rc<Module>),
    /// The path is tombstoned
    Missing,
}

/// Receives the module found by an asynchronous suffix search.
pub(crate) type ModuleContinuation = Box<dyn FnOnce(Option<Rc<Module>>) -> KernelResult<()>>;

impl Kernel {
    /// Construct (or return the cached) module at `path`.
    pub(crate) fn load(&self, path: &str) -> KernelResult<Loaded> {
        let cached = self.ctx.cache.borrow().get(path);
        if let Some(module) = cached {
            return Ok(Loaded::Module(module));
        }
        if self.ctx.cache.borrow().is_loading(path) {
            return Err(KernelError::CircularDependency {
                path: path.to_string(),
            });
        }
        let definition = self.ctx.registry.borrow().get(path);
        let factory = match definition {
            None => return Err(KernelError::UndefinedModule(path.to_string())),
            Some(Definition::Missing) => return Ok(Loaded::Missing),
            Some(Definition::Factory(factory)) => factory,
        };

        let exports = Exports::new();
        let module = Rc::new(Module::new(path, exports.clone()));
        let require = Require::new(self.clone(), directory_of(path));
        {
            let mut cache = self.ctx.cache.borrow_mut();
            cache.loading.insert(path.to_string());
            if cache.main.is_none() {
                cache.main = Some(module.clone());
            }
        }

        debug!(target: "rk::load", path, "constructing");
        let result = factory(&require, &exports, &module);

        let mut cache = self.ctx.cache.borrow_mut();
        cache.loading.remove(path);
        match result {
            Ok(()) => {
                cache.modules.insert(path.to_string(), module.clone());
                Ok(Loaded::Module(module))
            }
            Err(e) => {
                warn!(target: "rk::load", path, error = %e, "construction failed");
                Err(e)
            }
        }
    }

    /// Synchronously find the module for one candidate path, trying each
    /// suffix in order and retrieving undefined ones on this thread.
    pub(crate) fn module_at_path_sync(&self, path: &str) -> KernelResult<Option<Rc<Module>>> {
        self.with_sync_lock(|| {
            for candidate in suffixed_candidates(path) {
                if !self.is_defined(&candidate) {
                    self.fetch_sync(&candidate)?;
                }
                if let Loaded::Module(module) = self.load(&candidate)? {
                    return Ok(Some(module));
                }
            }
            Ok(None)
        })
    }

    /// Asynchronously find the module for one candidate path. The search
    /// starts from the deferred queue, never from the caller's stack.
    pub(crate) fn module_at_path(&self, path: String, continuation: ModuleContinuation) {
        let kernel = self.clone();
        self.defer(Box::new(move || {
            kernel.find_suffix(suffixed_candidates(&path), 0, continuation)
        }));
    }

    fn find_suffix(
        &self,
        candidates: Vec<String>,
        index: usize,
        continuation: ModuleContinuation,
    ) -> KernelResult<()> {
        let Some(candidate) = candidates.get(index).cloned() else {
            return continuation(None);
        };
        let defined = self.is_defined(&candidate);

        let kernel = self.clone();
        let target = candidate.clone();
        let attempt: Task = Box::new(move || match kernel.load(&target)? {
            Loaded::Module(module) => continuation(Some(module)),
            Loaded::Missing => kernel.find_suffix(candidates, index + 1, continuation),
        });

        if defined {
            attempt()
        } else {
            self.enqueue_fetch(candidate, attempt);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::JsonCompiler;
    use crate::value::Value;
    use rk_transport::MemoryTransport;

    fn kernel() -> Kernel {
        Kernel::new(MemoryTransport::new(), JsonCompiler)
    }

    #[test]
    fn test_load_undefined() {
        let k = kernel();
        assert!(matches!(
            k.load("nope.js"),
            Err(KernelError::UndefinedModule(p)) if p == "nope.js"
        ));
    }

    #[test]
    fn test_load_tombstone() {
        let k = kernel();
        k.define("gone.js", Definition::Missing).unwrap();
        assert!(matches!(k.load("gone.js"), Ok(Loaded::Missing)));
    }

    #[test]
    fn test_factory_runs_once() {
        let k = kernel();
        let count = Rc::new(std::cell::Cell::new(0));
        let seen = count.clone();
        k.define(
            "once.js",
            Definition::factory(move |_, _, _| {
                seen.set(seen.get() + 1);
                Ok(())
            }),
        )
        .unwrap();

        let first = match k.load("once.js").unwrap() {
            Loaded::Module(m) => m,
            Loaded::Missing => panic!("expected a module"),
        };
        let second = match k.load("once.js").unwrap() {
            Loaded::Module(m) => m,
            Loaded::Missing => panic!("expected a module"),
        };
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_failed_factory_is_not_cached() {
        let k = kernel();
        k.define(
            "bad.js",
            Definition::factory(|_, _, _| Err(KernelError::fault("boom"))),
        )
        .unwrap();
        assert_eq!(k.load("bad.js").err(), Some(KernelError::fault("boom")));
        assert!(k.module("bad.js").is_none());
        assert!(!k.ctx.cache.borrow().is_loading("bad.js"));
    }

    #[test]
    fn test_module_sees_its_directory() {
        let k = kernel();
        k.define(
            "/dir/a.js",
            Definition::factory(|require, exports, module| {
                exports.set("base", require.base_path());
                exports.set("id", module.id());
                Ok(())
            }),
        )
        .unwrap();
        let exports = k.require().require("/dir/a").unwrap();
        assert_eq!(exports.get("base"), Some(Value::from("/dir/")));
        assert_eq!(exports.get("id"), Some(Value::from("/dir/a.js")));
    }
}
