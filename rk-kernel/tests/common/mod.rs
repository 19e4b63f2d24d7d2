//! Test helpers shared by the kernel integration tests

#![allow(dead_code)]

use rk_kernel::{CompileError, Definition, Kernel, KernelResult, Value};
use rk_transport::MemoryTransport;
use std::cell::RefCell;
use std::rc::Rc;

pub const ROOT_URI: &str = "mem://root";
pub const LIBRARY_URI: &str = "mem://lib/";

/// URI a root path is retrieved from.
pub fn root_uri(path: &str) -> String {
    format!("{}{}", ROOT_URI, path)
}

/// URI a library path is retrieved from.
pub fn library_uri(path: &str) -> String {
    format!("{}{}", LIBRARY_URI, path)
}

/// Compiles every source into a module exporting `value` (its id) and
/// `source` (the text retrieved).
pub fn id_compiler(_path: &str, source: &str) -> Result<Definition, CompileError> {
    let source = source.to_string();
    Ok(Definition::factory(move |_, exports, module| {
        exports.set("value", module.id());
        exports.set("source", source.as_str());
        Ok(())
    }))
}

/// A module exporting its own id as `value`.
pub fn id_module() -> Definition {
    Definition::factory(|_, exports, module| {
        exports.set("value", module.id());
        Ok(())
    })
}

/// Kernel over `transport` with both URIs set and the id compiler.
pub fn kernel_with(transport: &MemoryTransport) -> Kernel {
    let kernel = Kernel::new(transport.clone(), id_compiler);
    kernel.set_root_uri(ROOT_URI).unwrap();
    kernel.set_library_uri(LIBRARY_URI);
    kernel
}

/// Kernel over an empty transport.
pub fn kernel() -> Kernel {
    kernel_with(&MemoryTransport::new())
}

/// The `value` export, as a string.
pub fn id_of(exports: &Value) -> Option<String> {
    exports
        .get("value")
        .and_then(|v| v.as_str().map(str::to_string))
}

/// Slot filled by a continuation, read after the event loop ran.
pub struct Slot<T>(Rc<RefCell<Option<T>>>);

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Rc::clone(&self.0))
    }
}

impl<T: 'static> Slot<T> {
    pub fn new() -> Self {
        Slot(Rc::new(RefCell::new(None)))
    }

    pub fn fill(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }

    pub fn is_filled(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Continuation that stores what it receives.
    pub fn sink(&self) -> impl FnOnce(T) -> KernelResult<()> + 'static {
        let slot = self.clone();
        move |value| {
            slot.fill(value);
            Ok(())
        }
    }
}

/// Ordered log of events shared between closures.
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}
