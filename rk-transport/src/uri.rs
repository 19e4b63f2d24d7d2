//! URI helpers shared by the kernel and the transports
//!
//! Module paths are mapped onto URIs one segment at a time, with each segment
//! percent-encoded using the same unreserved set as `encodeURIComponent`.

use crate::error::{TransportError, TransportResult};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encode a single path segment or query value.
pub fn encode_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for &byte in component.as_bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0f) as usize] as char);
        }
    }
    out
}

/// Percent-encode every segment of a `/`-separated path, keeping separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes. Malformed escapes are rejected.
pub fn decode(encoded: &str) -> TransportResult<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = bytes.get(i + 1).copied().and_then(hex_value);
            let lo = bytes.get(i + 2).copied().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    return Err(TransportError::InvalidUri {
                        uri: encoded.to_string(),
                        reason: format!("malformed escape at byte {}", i),
                    })
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| TransportError::InvalidUtf8 {
        uri: encoded.to_string(),
    })
}

/// Drop a `?query` and `#fragment` suffix.
pub fn strip_query(uri: &str) -> &str {
    let end = uri.find(|c| c == '?' || c == '#').unwrap_or(uri.len());
    &uri[..end]
}

/// Append a query parameter, choosing `?` or `&` as needed.
pub fn with_query(uri: &str, key: &str, value: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", uri, separator, key, encode_component(value))
}
