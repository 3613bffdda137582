//! Destination handles and openers
//!
//! The pool never touches storage directly: it asks a [`DestinationOpener`]
//! for a handle by path and only ever writes, terminates lines and closes.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::compression::CompressedWriter;
use crate::config::CompressionSettings;

/// An open, write-only output stream
pub trait DestinationHandle: Send {
    /// Append text without a terminator
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Append a line terminator
    fn newline(&mut self) -> io::Result<()>;

    /// Flush and release the destination
    fn close(&mut self) -> io::Result<()>;
}

/// Opens destinations by path
pub trait DestinationOpener: Send + Sync {
    fn open(&self, path: &str) -> io::Result<Box<dyn DestinationHandle>>;
}

/// Shared cell around a handle; `None` once closed
///
/// Clones of one writer entry share the cell, so the handle is closed at
/// most once no matter which clone closes it. A cell is retired as soon as
/// its writer leaves the tree, before the handle itself is closed.
#[derive(Clone)]
pub struct SharedHandle {
    inner: Arc<HandleCell>,
}

struct HandleCell {
    handle: Mutex<Option<Box<dyn DestinationHandle>>>,
    retired: AtomicBool,
}

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SharedHandle {
    pub fn new(handle: Box<dyn DestinationHandle>) -> Self {
        Self {
            inner: Arc::new(HandleCell {
                handle: Mutex::new(Some(handle)),
                retired: AtomicBool::new(false),
            }),
        }
    }

    /// Run `f` against the open handle
    pub fn with_open<T>(&self, f: impl FnOnce(&mut dyn DestinationHandle) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self.inner.handle.lock();
        match guard.as_mut() {
            Some(handle) => f(handle.as_mut()),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "writer handle is closed")),
        }
    }

    /// Mark the handle as on its way out; it may still be open
    pub fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
    }

    /// Take the handle out and close it; `Ok(false)` if it was already closed
    pub fn close(&self) -> io::Result<bool> {
        self.retire();
        let taken = self.inner.handle.lock().take();
        match taken {
            Some(mut handle) => handle.close().map(|_| true),
            None => Ok(false),
        }
    }

    /// Closed, or retired and about to be
    pub fn is_closed(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst) || self.inner.handle.lock().is_none()
    }

    /// Whether both cells refer to the same underlying handle
    pub fn same_handle(&self, other: &SharedHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Opener for the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFileOpener {
    compression: CompressionSettings,
}

impl LocalFileOpener {
    pub fn new(compression: CompressionSettings) -> Self {
        Self { compression }
    }
}

impl DestinationOpener for LocalFileOpener {
    fn open(&self, path: &str) -> io::Result<Box<dyn DestinationHandle>> {
        let path = Path::new(path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(Box::new(LocalFileHandle {
            writer: Some(CompressedWriter::new(BufWriter::new(file), &self.compression)),
        }))
    }
}

/// Buffered, optionally compressed local file
pub struct LocalFileHandle {
    writer: Option<CompressedWriter<BufWriter<File>>>,
}

impl LocalFileHandle {
    fn writer(&mut self) -> io::Result<&mut CompressedWriter<BufWriter<File>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "file is closed"))
    }
}

impl DestinationHandle for LocalFileHandle {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.writer()?.write_all(text.as_bytes())
    }

    fn newline(&mut self) -> io::Result<()> {
        self.writer()?.write_all(b"\n")
    }

    fn close(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(writer) => {
                let buffered = writer.finish()?;
                let file = buffered.into_inner().map_err(|e| e.into_error())?;
                file.sync_all()
            }
            None => Ok(()),
        }
    }
}
