//! Error types for the kernel

use thiserror::Error;

/// Result type used across the kernel
pub type KernelResult<T> = Result<T, KernelError>;

/// Main kernel error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Malformed configuration or call shape
    #[error("argument error: {0}")]
    Argument(String),

    /// Synchronous re-entry into a module whose factory is still running
    #[error("circular dependency encountered while loading '{path}'")]
    CircularDependency { path: String },

    #[error("attempt to load undefined module '{0}'")]
    UndefinedModule(String),

    /// Every candidate path and suffix was exhausted
    #[error("the module at \"{0}\" does not exist")]
    ModuleNotFound(String),

    #[error("attempt to retrieve the root module \"{0}\" but no root URI is defined")]
    MissingRootUri(String),

    #[error("attempt to retrieve the library module \"{0}\" but no library URI is defined")]
    MissingLibraryUri(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Raised by a module factory or a continuation
    #[error("{0}")]
    Fault(String),
}

impl KernelError {
    /// Build an argument error
    pub fn argument(message: impl Into<String>) -> Self {
        KernelError::Argument(message.into())
    }

    /// Build a fault, the error a module body raises
    pub fn fault(message: impl Into<String>) -> Self {
        KernelError::Fault(message.into())
    }

    /// Error class name, as reported to hosts
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::Argument(_) => "ArgumentError",
            KernelError::CircularDependency { .. } => "CircularDependencyError",
            KernelError::UndefinedModule(_)
            | KernelError::ModuleNotFound(_)
            | KernelError::MissingRootUri(_)
            | KernelError::MissingLibraryUri(_) => "Error",
            KernelError::Compile(_) => "CompileError",
            KernelError::Fault(_) => "Fault",
        }
    }
}

/// Error produced by a `Compile` implementation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot compile module '{path}': {message}")]
pub struct CompileError {
    pub path: String,
    pub message: String,
}

impl CompileError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
