//! rk Kernel
//!
//! A require-style module loading kernel. Modules are registered as
//! definitions under normalized paths, retrieved on demand through a
//! [`rk_transport::Transport`], and constructed at most once.
//!
//! # Architecture
//!
//! - `path`: pure path algebra (normalization, candidate search)
//! - `registry`: first-write-wins definitions and waiters
//! - `scheduler`: bounded, deduplicated retrieval
//! - `deferred`: the FIFO continuation queue and its sync lock
//! - `loader`: construction, caching and cycle detection
//! - `require`: the require function modules receive
//! - `event_loop`: hands worker results back to the kernel thread
//!
//! # Usage
//! ```rust,ignore
//! use rk_kernel::{JsonCompiler, Kernel};
//! use rk_transport::FileTransport;
//!
//! let kernel = Kernel::new(FileTransport::new(), JsonCompiler);
//! kernel.set_root_uri("file:///srv/app")?;
//! kernel.set_library_uri("file:///srv/lib");
//!
//! let exports = kernel.require().require("/main")?;
//!
//! kernel.require().require_async("/lazy", |exports| {
//!     println!("{:?}", exports);
//!     Ok(())
//! })?;
//! kernel.run_until_idle()?;
//! ```

mod compile;
mod deferred;
mod error;
mod event_loop;
mod kernel;
mod loader;
mod module;
pub mod path;
mod registry;
mod require;
mod scheduler;
mod value;

pub use compile::{Compile, JsonCompiler, REQUIRE_KEY};
pub use error::{CompileError, KernelError, KernelResult};
pub use kernel::{Kernel, KernelStats};
pub use module::{Definition, Factory, Module, ModuleState};
pub use require::{BatchContinuation, Continuation, Require, RequireArg};
pub use value::{Exports, Value};
