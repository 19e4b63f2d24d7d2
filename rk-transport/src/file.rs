//! Local file transport implementation

use crate::error::{TransportError, TransportResult};
use crate::uri::{decode, strip_query};
use crate::Transport;
use std::io::ErrorKind;
use std::path::PathBuf;

/// A transport reading local files.
///
/// Accepts `file://` URIs (`file:///srv/app/a.js`) as well as plain paths.
/// Query strings are ignored and percent escapes decoded, so a module named
/// `/spa ce s.js` round-trips through its encoded URI.
///
/// # Example
/// ```
/// use rk_transport::FileTransport;
/// use std::path::PathBuf;
///
/// let fs = FileTransport::new();
/// assert_eq!(
///     fs.path_for("file:///srv/a%20b.js?callback=x").unwrap(),
///     PathBuf::from("/srv/a b.js")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileTransport {}

impl FileTransport {
    /// Create a new file transport.
    pub fn new() -> Self {
        Self {}
    }

    /// Map a URI onto a local path.
    pub fn path_for(&self, uri: &str) -> TransportResult<PathBuf> {
        let without_query = strip_query(uri);
        let raw = match without_query.strip_prefix("file://") {
            Some(rest) => rest,
            None if without_query.contains("://") => {
                return Err(TransportError::InvalidUri {
                    uri: uri.to_string(),
                    reason: String::from("only file:// URIs can be read locally"),
                })
            }
            None => without_query,
        };
        Ok(PathBuf::from(decode(raw)?))
    }
}

impl Transport for FileTransport {
    fn fetch(&self, uri: &str) -> TransportResult<String> {
        let path = self.path_for(uri)?;
        if path.is_dir() {
            return Err(TransportError::NotFound {
                uri: uri.to_string(),
            });
        }
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TransportError::NotFound {
                uri: uri.to_string(),
            },
            ErrorKind::PermissionDenied => TransportError::PermissionDenied {
                uri: uri.to_string(),
            },
            ErrorKind::InvalidData => TransportError::InvalidUtf8 {
                uri: uri.to_string(),
            },
            _ => e.into(),
        })
    }
}
