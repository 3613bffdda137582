//! Writer entries and their lifecycle operations
//!
//! A [`WriterEntry`] is the live state of one open destination plus the
//! bookkeeping the pool needs to decide when to evict it.

use tracing::{debug, warn};

use crate::bucket::BucketKey;
use crate::error::{Error, Result};
use crate::writer::handle::{DestinationHandle, SharedHandle};

/// One open writer for a bucket
#[derive(Debug, Clone)]
pub struct WriterEntry {
    /// Bucket this writer serves; doubles as its tree path
    pub key: BucketKey,
    handle: SharedHandle,
    /// Generated destination path
    pub file_path: String,
    /// Successful appends so far
    pub write_count: u64,
    /// Epoch milliseconds of the last touch
    pub last_access: i64,
}

impl WriterEntry {
    /// Wrap a freshly opened handle
    pub fn new(key: BucketKey, handle: Box<dyn DestinationHandle>, file_path: String, now: i64) -> Self {
        Self {
            key,
            handle: SharedHandle::new(handle),
            file_path,
            write_count: 0,
            last_access: now,
        }
    }

    /// Copy of this entry marked as used at `now`
    pub fn touched(&self, now: i64) -> Self {
        Self {
            last_access: now.max(self.last_access),
            write_count: self.write_count + 1,
            ..self.clone()
        }
    }

    /// Append `message` and a line terminator
    pub fn write_line(&self, message: &str) -> Result<()> {
        self.handle
            .with_open(|handle| {
                handle.write(message)?;
                handle.newline()
            })
            .map_err(|e| Error::write(self.file_path.clone(), e))
    }

    /// Milliseconds since the last touch
    pub fn idle_millis(&self, now: i64) -> i64 {
        now - self.last_access
    }

    /// Whether both entries are backed by the same open destination
    pub fn same_writer(&self, other: &WriterEntry) -> bool {
        self.handle.same_handle(&other.handle)
    }

    /// Closed, or retired from the tree and about to be closed
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Mark this writer as leaving the tree
    pub fn retire(&self) {
        self.handle.retire();
    }

    /// Close this entry's handle, best effort
    ///
    /// Returns `true` if this call released the handle, `false` if it was
    /// already closed.
    pub fn close(&self) -> bool {
        close_single_writer(&self.handle, &self.file_path)
    }
}

/// Close a handle, logging instead of failing
///
/// A destination that fails to close is reported and then forgotten; it is
/// released either way. Returns whether this call released the handle.
pub fn close_single_writer(handle: &SharedHandle, path: &str) -> bool {
    match handle.close() {
        Ok(true) => {
            debug!(path = %path, "closed writer");
            true
        }
        Ok(false) => {
            debug!(path = %path, "writer already closed");
            false
        }
        Err(e) => {
            warn!(path = %path, error = %e, "failed to close writer");
            true
        }
    }
}
