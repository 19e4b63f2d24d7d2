//! Definitions and constructed modules

use crate::error::KernelResult;
use crate::require::Require;
use crate::value::{Exports, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Module body. Receives the module's require function, its exports object
/// and the module itself, and runs exactly once.
pub type Factory = Rc<dyn Fn(&Require, &Exports, &Module) -> KernelResult<()>>;

/// What is registered for a path.
#[derive(Clone)]
pub enum Definition {
    /// Module body waiting to be constructed
    Factory(Factory),
    /// The path is known not to exist
    Missing,
}

impl Definition {
    /// Wrap a closure as a factory definition.
    pub fn factory<F>(body: F) -> Self
    where
        F: Fn(&Require, &Exports, &Module) -> KernelResult<()> + 'static,
    {
        Definition::Factory(Rc::new(body))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Definition::Missing)
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Factory(_) => f.write_str("Definition::Factory"),
            Definition::Missing => f.write_str("Definition::Missing"),
        }
    }
}

/// A constructed module.
pub struct Module {
    id: String,
    exports: RefCell<Value>,
}

impl Module {
    pub(crate) fn new(id: impl Into<String>, exports: Exports) -> Self {
        Self {
            id: id.into(),
            exports: RefCell::new(Value::Object(exports)),
        }
    }

    /// The normalized path this module was constructed from.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// What the module publishes. Starts as the exports object handed to
    /// the factory.
    pub fn exports(&self) -> Value {
        self.exports.borrow().clone()
    }

    /// Replace what the module publishes.
    pub fn set_exports(&self, value: impl Into<Value>) {
        *self.exports.borrow_mut() = value.into();
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module").field("id", &self.id).finish()
    }
}

/// Where a path is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Undefined,
    Defined,
    Loading,
    Loaded,
    Missing,
}
