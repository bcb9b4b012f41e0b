//! Blob-like view over captured bytes.

use std::io::Cursor;
use std::sync::Arc;

/// Immutable binary payload with a content type.
#[derive(Debug, Clone)]
pub struct Blob {
    data: Arc<[u8]>,
    content_type: &'static str,
}

impl Blob {
    /// Wrap captured bytes as a `text/plain` blob.
    pub fn new(data: Arc<[u8]>) -> Self {
        Self {
            data,
            content_type: "text/plain",
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Content type of the payload.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Borrow the payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Async reader over the payload.
    ///
    /// Each call returns a fresh reader positioned at the start.
    pub fn reader(&self) -> Cursor<Arc<[u8]>> {
        Cursor::new(Arc::clone(&self.data))
    }
}
