//! In-memory destinations for failure injection in tests

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::writer::{DestinationHandle, DestinationOpener};

#[derive(Default)]
struct Recorded {
    contents: HashMap<String, String>,
    closes: HashMap<String, usize>,
    opened: Vec<String>,
    failing_writes: HashSet<String>,
    failing_closes: HashSet<String>,
    failing_opens: bool,
}

/// Opener whose handles append to shared in-memory buffers
#[derive(Clone, Default)]
pub(crate) struct RecordingOpener {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contents(&self, path: &str) -> String {
        self.state.lock().contents.get(path).cloned().unwrap_or_default()
    }

    pub(crate) fn close_count(&self, path: &str) -> usize {
        self.state.lock().closes.get(path).copied().unwrap_or(0)
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    pub(crate) fn fail_writes(&self, path: &str) {
        self.state.lock().failing_writes.insert(path.to_string());
    }

    pub(crate) fn fail_closes(&self, path: &str) {
        self.state.lock().failing_closes.insert(path.to_string());
    }

    pub(crate) fn fail_opens(&self, fail: bool) {
        self.state.lock().failing_opens = fail;
    }
}

impl DestinationOpener for RecordingOpener {
    fn open(&self, path: &str) -> io::Result<Box<dyn DestinationHandle>> {
        let mut state = self.state.lock();
        if state.failing_opens {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "open refused"));
        }
        state.opened.push(path.to_string());
        state.contents.entry(path.to_string()).or_default();

        Ok(Box::new(RecordingHandle {
            path: path.to_string(),
            state: self.state.clone(),
        }))
    }
}

struct RecordingHandle {
    path: String,
    state: Arc<Mutex<Recorded>>,
}

impl RecordingHandle {
    fn append(&self, text: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.failing_writes.contains(&self.path) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "backend unreachable"));
        }
        state.contents.entry(self.path.clone()).or_default().push_str(text);
        Ok(())
    }
}

impl DestinationHandle for RecordingHandle {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.append(text)
    }

    fn newline(&mut self) -> io::Result<()> {
        self.append("\n")
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        *state.closes.entry(self.path.clone()).or_default() += 1;
        if state.failing_closes.contains(&self.path) {
            return Err(io::Error::new(io::ErrorKind::Other, "close refused"));
        }
        Ok(())
    }
}
