//! Hourly-bucketed historization writers
//!
//! Records carrying a timestamp are appended, one per line, to a file for
//! the hour they fall in. A [`WriterPool`] keeps one open writer per hour in
//! a nested year/month/day/hour tree, closes writers that have sat idle for
//! too long and exposes a status snapshot for monitoring.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hist_pool::{PoolConfig, WriterPool};
//!
//! # fn main() -> hist_pool::Result<()> {
//! let pool = Arc::new(WriterPool::new(PoolConfig::new().with_top_level_path("/var/hist"))?);
//!
//! pool.append(Some(1_456_916_700_000), "FOO-BAR")?;
//!
//! // Run periodically from a maintenance thread
//! pool.close_old_writers(Duration::from_secs(300));
//! println!("{}", pool.status().summary());
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod clock;
pub mod compression;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod status;
pub mod writer;

#[cfg(test)]
mod testing;

pub use bucket::{resolve_bucket, BucketKey, BucketZone};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CompressionAlgorithm, CompressionSettings, PoolConfig};
pub use error::{Error, Result};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{FailureRecord, WriterPool};
pub use status::{Health, StatusSnapshot};
pub use writer::{DestinationHandle, DestinationOpener, LocalFileOpener, WriterEntry, WriterTree};
