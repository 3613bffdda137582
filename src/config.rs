//! Configuration for the writer pool
//!
//! This module provides configuration options for bucketed writer pools.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::bucket::BucketZone;
use crate::error::{Result, Error};

/// Compression algorithms supported for writer output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    /// No compression, lines are written as-is
    None,
    /// Gzip compression, matching the `.hist.gz` naming
    Gzip,
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::Gzip
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl CompressionAlgorithm {
    /// Parse a compression algorithm from a string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            _ => Err(Error::config(format!("Unknown compression algorithm: {}", s))),
        }
    }

    /// Get the name of the compression algorithm
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
        }
    }

    /// Check if compression is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Compression algorithm and level for writer output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub algorithm: CompressionAlgorithm,
    /// Compression level (0-9, higher = better compression)
    pub level: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Gzip,
            level: 6,
        }
    }
}

impl CompressionSettings {
    pub fn new(algorithm: CompressionAlgorithm, level: u32) -> Self {
        Self { algorithm, level }
    }
}

/// Configuration options for a writer pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct PoolConfig {
    // Layout
    /// Root under which bucket directories are created
    pub top_level_path: String,
    /// Render month, day and hour as two-digit components
    pub zero_padded: bool,
    /// Time zone in which buckets are cut
    pub time_zone: BucketZone,

    // Eviction
    /// Idle time in milliseconds after which `close_idle_writers` evicts a writer
    pub max_idle_ms: u64,

    // Output
    /// Compression applied by the local file opener
    pub compression: CompressionSettings,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            top_level_path: "hist".to_string(),
            zero_padded: false,
            time_zone: BucketZone::default(),

            max_idle_ms: 5 * 60 * 1000, // 5 minutes

            compression: CompressionSettings::default(),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the top-level path
    pub fn with_top_level_path(mut self, path: impl Into<String>) -> Self {
        self.top_level_path = path.into();
        self
    }

    /// Set whether path components are zero padded
    pub fn with_zero_padded(mut self, zero_padded: bool) -> Self {
        self.zero_padded = zero_padded;
        self
    }

    /// Set the bucket time zone
    pub fn with_time_zone(mut self, zone: BucketZone) -> Self {
        self.time_zone = zone;
        self
    }

    /// Set the idle timeout used by `close_idle_writers`
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle_ms = u64::try_from(max_idle.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the output compression
    pub fn with_compression(mut self, compression: CompressionSettings) -> Self {
        self.compression = compression;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.top_level_path.trim().is_empty() {
            return Err(Error::config("Top-level path must not be empty"));
        }

        if self.compression.level > 9 {
            return Err(Error::config(
                "Compression level must be between 0 and 9"
            ));
        }

        if self.max_idle_ms < 1000 {
            return Err(Error::config(
                "Maximum idle time must be at least 1 second"
            ));
        }

        if self.max_idle_ms > i64::MAX as u64 {
            return Err(Error::config(format!(
                "Maximum idle time must not exceed {} ms",
                i64::MAX
            )));
        }

        self.time_zone.validate()?;

        Ok(())
    }

    /// Get the idle timeout as a Duration
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== Writer Pool Configuration ===\n\n");

        result.push_str("Layout:\n");
        result.push_str(&format!("  Top-Level Path: {}\n", self.top_level_path));
        result.push_str(&format!("  Zero Padded: {}\n", self.zero_padded));
        result.push_str(&format!("  Time Zone: {}\n", self.time_zone));

        result.push_str("\nEviction:\n");
        result.push_str(&format!("  Max Idle: {} s\n", self.max_idle_ms / 1000));

        result.push_str("\nOutput:\n");
        result.push_str(&format!("  Compression Algorithm: {}\n", self.compression.algorithm));
        result.push_str(&format!("  Compression Level: {}\n", self.compression.level));

        result
    }
}
