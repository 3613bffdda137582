//! Status snapshots for external monitoring
//!
//! A snapshot mirrors the writer tree with handles stripped and idle
//! timestamps rendered for humans, plus the most recent failure if any.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::bucket::BucketZone;
use crate::error::Result;
use crate::metrics::MetricsSnapshot;
use crate::pool::FailureRecord;
use crate::writer::{Node, WriterEntry, WriterTree};

/// Overall health of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Ok,
    Warning,
}

/// Sanitized view of one writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriterView {
    pub file_path: String,
    pub write_count: u64,
    /// Last touch as `YYYY-MM-DD HH:MM:SS ±HHMM`
    pub last_access: String,
}

/// Sanitized view of a tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NodeView {
    Branch(BTreeMap<u32, NodeView>),
    Writer(WriterView),
}

/// The recorded failure, ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureView {
    pub message: String,
    pub timestamp: i64,
    pub cause: String,
    pub recorded_at: String,
}

/// Point-in-time view of a writer pool
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub health: Health,
    pub writer_count: usize,
    pub writers: BTreeMap<u32, NodeView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureView>,
    pub metrics: MetricsSnapshot,
}

impl StatusSnapshot {
    /// Build a snapshot from the current tree and failure cell
    pub fn capture(
        tree: &WriterTree,
        failure: Option<&FailureRecord>,
        zone: BucketZone,
        metrics: MetricsSnapshot,
    ) -> Self {
        let writers = tree
            .root()
            .iter()
            .map(|(segment, node)| (*segment, view_node(node, zone)))
            .collect();

        let last_failure = failure.map(|record| FailureView {
            message: record.message.clone(),
            timestamp: record.timestamp,
            cause: record.cause.clone(),
            recorded_at: zone.format_millis(record.recorded_at),
        });

        Self {
            health: if last_failure.is_some() { Health::Warning } else { Health::Ok },
            writer_count: tree.len(),
            writers,
            last_failure,
            metrics,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health == Health::Ok
    }

    /// One-line summary suitable for a status page
    pub fn summary(&self) -> String {
        match &self.last_failure {
            None => format!("OK: {} open writers", self.writer_count),
            Some(failure) => format!(
                "WARNING: failed to write '{}' (timestamp {}) at {}: {}",
                failure.message, failure.timestamp, failure.recorded_at, failure.cause
            ),
        }
    }

    /// Render the snapshot as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn view_node(node: &Node, zone: BucketZone) -> NodeView {
    match node {
        Node::Leaf(entry) => NodeView::Writer(view_writer(entry, zone)),
        Node::Branch(children) => NodeView::Branch(
            children
                .iter()
                .map(|(segment, child)| (*segment, view_node(child, zone)))
                .collect(),
        ),
    }
}

fn view_writer(entry: &WriterEntry, zone: BucketZone) -> WriterView {
    WriterView {
        file_path: entry.file_path.clone(),
        write_count: entry.write_count,
        last_access: zone.format_millis(entry.last_access),
    }
}
