//! The require function handed to modules
//!
//! A `Require` is bound to a base directory. Relative paths are resolved
//! against it, library paths are searched through the lookup directories
//! of it and its ancestors.

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::module::Module;
use crate::path::{normalize, qualify};
use crate::value::Value;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Receives the exports of one asynchronous require, `None` if not found.
pub type Continuation = Box<dyn FnOnce(Option<Value>) -> KernelResult<()>>;

/// Receives the exports of every requested path, in request order.
pub type BatchContinuation = Box<dyn FnOnce(Vec<Option<Value>>) -> KernelResult<()>>;

/// One argument of the variadic [`Require::call`] form.
pub enum RequireArg {
    Path(String),
    /// A value with no string form
    Null,
    Continuation(BatchContinuation),
}

impl RequireArg {
    pub fn continuation<F>(f: F) -> Self
    where
        F: FnOnce(Vec<Option<Value>>) -> KernelResult<()> + 'static,
    {
        RequireArg::Continuation(Box::new(f))
    }
}

impl From<&str> for RequireArg {
    fn from(path: &str) -> Self {
        RequireArg::Path(path.to_string())
    }
}

impl From<String> for RequireArg {
    fn from(path: String) -> Self {
        RequireArg::Path(path)
    }
}

impl fmt::Debug for RequireArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequireArg::Path(p) => f.debug_tuple("Path").field(p).finish(),
            RequireArg::Null => f.write_str("Null"),
            RequireArg::Continuation(_) => f.write_str("Continuation"),
        }
    }
}

/// A require function bound to a base directory.
#[derive(Clone)]
pub struct Require {
    kernel: Kernel,
    base: Rc<str>,
}

impl Require {
    pub(crate) fn new(kernel: Kernel, base: &str) -> Self {
        Self {
            kernel,
            base: Rc::from(base),
        }
    }

    /// Directory this function resolves relative paths against.
    pub fn base_path(&self) -> &str {
        &self.base
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// The first module the kernel constructed.
    pub fn main(&self) -> Option<Rc<Module>> {
        self.kernel.main()
    }

    /// Candidate paths searched for `path`, in order.
    pub fn resolve(&self, path: &str) -> Vec<String> {
        self.kernel.candidate_paths(path, &self.base)
    }

    /// Synchronous require. Retrieves on the calling thread whatever is not
    /// yet defined and returns the module's exports.
    pub fn require(&self, path: &str) -> KernelResult<Value> {
        let candidates = self.resolve(path);
        debug!(target: "rk::resolve", path, base = %self.base, ?candidates, "require");
        for candidate in &candidates {
            if let Some(module) = self.kernel.module_at_path_sync(candidate)? {
                return Ok(module.exports());
            }
        }
        Err(KernelError::ModuleNotFound(normalize(&qualify(
            path, &self.base,
        ))))
    }

    /// Asynchronous require. `continuation` runs from the deferred queue
    /// with the exports, or `None` when every candidate is missing.
    ///
    /// An error is returned only when queued work that drained inline
    /// failed; not finding the module is never an error here.
    pub fn require_async<F>(&self, path: &str, continuation: F) -> KernelResult<()>
    where
        F: FnOnce(Option<Value>) -> KernelResult<()> + 'static,
    {
        let candidates: VecDeque<String> = self.resolve(path).into();
        debug!(target: "rk::resolve", path, base = %self.base, ?candidates, "require async");
        let kernel = self.kernel.clone();
        self.kernel.flush_after(move || {
            search(&kernel, candidates, Box::new(continuation));
            Ok(())
        })
    }

    /// Require several paths asynchronously, one after another, and hand
    /// all results to `continuation` in request order.
    pub fn require_all<P, F>(&self, paths: &[P], continuation: F) -> KernelResult<()>
    where
        P: AsRef<str>,
        F: FnOnce(Vec<Option<Value>>) -> KernelResult<()> + 'static,
    {
        let remaining: VecDeque<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();
        if remaining.is_empty() {
            let kernel = self.kernel.clone();
            return self.kernel.flush_after(move || {
                kernel.defer(Box::new(move || continuation(Vec::new())));
                Ok(())
            });
        }
        let results = Vec::with_capacity(remaining.len());
        self.require_next(remaining, results, Box::new(continuation))
    }

    fn require_next(
        &self,
        mut remaining: VecDeque<String>,
        mut results: Vec<Option<Value>>,
        continuation: BatchContinuation,
    ) -> KernelResult<()> {
        let Some(path) = remaining.pop_front() else {
            return continuation(results);
        };
        let next = self.clone();
        self.require_async(&path, move |value| {
            results.push(value);
            if remaining.is_empty() {
                continuation(results)
            } else {
                next.require_next(remaining, results, continuation)
            }
        })
    }

    /// Variadic form.
    ///
    /// * `[path]` requires synchronously and returns the exports.
    /// * `[path, continuation]` and `[path, .., continuation]` require
    ///   asynchronously and return `None`.
    pub fn call(&self, mut args: Vec<RequireArg>) -> KernelResult<Option<Value>> {
        match args.len() {
            0 => Err(KernelError::argument("require expects at least one path")),
            1 => {
                let path = path_arg(args.pop())?;
                self.require(&path).map(Some)
            }
            2 => {
                let continuation = match args.pop() {
                    Some(RequireArg::Continuation(k)) => k,
                    _ => {
                        return Err(KernelError::argument(
                            "Continuation must be a function.",
                        ))
                    }
                };
                let path = path_arg(args.pop())?;
                self.require_async(&path, move |value| continuation(vec![value]))
                    .map(|()| None)
            }
            _ => {
                let continuation = match args.pop() {
                    Some(RequireArg::Continuation(k)) => k,
                    _ => {
                        return Err(KernelError::argument(
                            "Final argument must be a continuation.",
                        ))
                    }
                };
                let paths = args
                    .into_iter()
                    .map(|arg| path_arg(Some(arg)))
                    .collect::<KernelResult<Vec<_>>>()?;
                self.require_all(&paths, continuation).map(|()| None)
            }
        }
    }
}

impl fmt::Debug for Require {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Require").field("base", &self.base).finish()
    }
}

fn path_arg(arg: Option<RequireArg>) -> KernelResult<String> {
    match arg {
        Some(RequireArg::Path(path)) => Ok(path),
        Some(RequireArg::Continuation(_)) => Err(KernelError::argument(
            "expected a module path, found a continuation",
        )),
        Some(RequireArg::Null) | None => {
            Err(KernelError::argument("module path has no string form"))
        }
    }
}

/// Try each candidate in order until one yields a module.
fn search(kernel: &Kernel, mut candidates: VecDeque<String>, continuation: Continuation) {
    let Some(path) = candidates.pop_front() else {
        kernel.defer(Box::new(move || continuation(None)));
        return;
    };
    let next = kernel.clone();
    kernel.module_at_path(
        path,
        Box::new(move |module| match module {
            Some(module) => continuation(Some(module.exports())),
            None if candidates.is_empty() => continuation(None),
            None => {
                search(&next, candidates, continuation);
                Ok(())
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::JsonCompiler;
    use crate::module::Definition;
    use rk_transport::MemoryTransport;
    use std::cell::RefCell;

    fn kernel() -> Kernel {
        let k = Kernel::new(MemoryTransport::new(), JsonCompiler);
        k.set_root_uri("mem://root").unwrap();
        k.set_library_uri("mem://lib/");
        k
    }

    #[test]
    fn test_resolve_uses_lookup() {
        let k = kernel();
        k.set_library_lookup_component(Some("deps")).unwrap();
        let r = k.require_from("/app/main.js");
        assert_eq!(r.base_path(), "/app/");
        assert_eq!(r.resolve("x"), vec!["/app/deps/x", "x"]);
        assert_eq!(r.resolve("./y"), vec!["/app/y"]);
    }

    #[test]
    fn test_call_validates_arguments() {
        let r = kernel().require();
        assert!(matches!(r.call(vec![]), Err(KernelError::Argument(_))));
        assert!(matches!(
            r.call(vec![RequireArg::Null]),
            Err(KernelError::Argument(_))
        ));
        assert!(matches!(
            r.call(vec!["1".into(), "1".into()]),
            Err(KernelError::Argument(_))
        ));
        assert!(matches!(
            r.call(vec!["1".into(), "1".into(), "1".into()]),
            Err(KernelError::Argument(_))
        ));
        assert!(matches!(
            r.call(vec![
                "1".into(),
                RequireArg::Null,
                RequireArg::continuation(|_| Ok(()))
            ]),
            Err(KernelError::Argument(_))
        ));
    }

    #[test]
    fn test_call_sync_and_async() {
        let k = kernel();
        k.define(
            "a.js",
            Definition::factory(|_, e, _| {
                e.set("name", "a");
                Ok(())
            }),
        )
        .unwrap();
        let r = k.require();

        let sync = r.call(vec!["a".into()]).unwrap();
        assert_eq!(sync.and_then(|v| v.get("name")), Some(Value::from("a")));

        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let ret = r
            .call(vec![
                "a".into(),
                RequireArg::continuation(move |values| {
                    *sink.borrow_mut() = Some(values);
                    Ok(())
                }),
            ])
            .unwrap();
        assert!(ret.is_none());
        k.run_until_idle().unwrap();
        let values = seen.borrow_mut().take().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_ref().and_then(|v| v.get("name")), Some(Value::from("a")));
    }

    #[test]
    fn test_require_all_empty() {
        let k = kernel();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        k.require()
            .require_all::<&str, _>(&[], move |values| {
                *sink.borrow_mut() = Some(values.len());
                Ok(())
            })
            .unwrap();
        k.run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), Some(0));
    }
}
