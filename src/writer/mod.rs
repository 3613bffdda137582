//! Bucketed writer management
//!
//! This module holds the pieces the pool is assembled from: destination
//! handles, the per-bucket writer entries, the nested tree that indexes them
//! and the helpers that name their files.

mod entry;
mod handle;
mod tree;
mod util;

pub use entry::{close_single_writer, WriterEntry};
pub use handle::{DestinationHandle, DestinationOpener, LocalFileHandle, LocalFileOpener, SharedHandle};
pub use tree::{Node, WriterTree};
pub use util::{writer_file_path, TokenGenerator, UuidTokenGenerator, HIST_SUFFIX};
