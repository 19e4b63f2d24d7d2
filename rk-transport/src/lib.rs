//! rk Transport
//!
//! The retrieval side of the rk kernel: turns a module URI into raw source
//! text. The kernel never touches the network or the disk itself; it is
//! handed a `Transport` at construction time.
//!
//! # Usage
//! ```rust,ignore
//! use rk_transport::{MemoryTransport, Transport};
//!
//! let transport = MemoryTransport::new();
//! transport.insert("mem://lib/a.js", "{}");
//! let text = transport.fetch("mem://lib/a.js").unwrap();
//! ```

mod error;
mod file;
mod logged;
mod memory;
mod r#trait;
pub mod uri;

pub use error::{TransportError, TransportResult};
pub use file::FileTransport;
pub use logged::LoggedTransport;
pub use memory::{MemoryTransport, TransportStats};
pub use r#trait::Transport;

/// Create a new in-memory transport.
pub fn memory_transport() -> MemoryTransport {
    MemoryTransport::new()
}

/// Create a new file transport.
pub fn file_transport() -> FileTransport {
    FileTransport::new()
}
