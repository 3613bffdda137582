//! Calendar bucket resolution
//!
//! Maps record timestamps (epoch milliseconds) onto the hourly
//! `(year, month, day, hour)` bucket that selects a writer.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Layout used when rendering instants for humans
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Time zone in which buckets are cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketZone {
    /// The process's local zone
    Local,
    /// Coordinated universal time
    Utc,
    /// A fixed offset east of UTC, in seconds
    Fixed { seconds_east: i32 },
}

impl Default for BucketZone {
    fn default() -> Self {
        Self::Local
    }
}

impl fmt::Display for BucketZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketZone::Local => write!(f, "local"),
            BucketZone::Utc => write!(f, "utc"),
            BucketZone::Fixed { seconds_east } => write!(f, "fixed({:+}s)", seconds_east),
        }
    }
}

impl BucketZone {
    /// Get the fixed offset for this zone, if it is a valid one
    fn fixed_offset(seconds_east: i32) -> Result<FixedOffset> {
        FixedOffset::east_opt(seconds_east)
            .ok_or_else(|| Error::config(format!("Invalid fixed offset: {} seconds", seconds_east)))
    }

    /// Check that the zone can be used for conversions
    pub fn validate(&self) -> Result<()> {
        if let BucketZone::Fixed { seconds_east } = self {
            Self::fixed_offset(*seconds_east)?;
        }
        Ok(())
    }

    /// Resolve the calendar fields of an instant in this zone
    fn calendar_fields(&self, instant: DateTime<Utc>) -> Result<(i32, u32, u32, u32)> {
        Ok(match self {
            BucketZone::Local => fields(instant.with_timezone(&Local)),
            BucketZone::Utc => fields(instant),
            BucketZone::Fixed { seconds_east } => {
                fields(instant.with_timezone(&Self::fixed_offset(*seconds_east)?))
            }
        })
    }

    /// Format an epoch millisecond value as `YYYY-MM-DD HH:MM:SS ±HHMM` in this zone
    pub fn format_millis(&self, millis: i64) -> String {
        let instant = match Utc.timestamp_millis_opt(millis).single() {
            Some(instant) => instant,
            None => return millis.to_string(),
        };

        match self {
            BucketZone::Local => instant.with_timezone(&Local).format(DISPLAY_FORMAT).to_string(),
            BucketZone::Utc => instant.format(DISPLAY_FORMAT).to_string(),
            BucketZone::Fixed { seconds_east } => match Self::fixed_offset(*seconds_east) {
                Ok(offset) => instant.with_timezone(&offset).format(DISPLAY_FORMAT).to_string(),
                Err(_) => instant.format(DISPLAY_FORMAT).to_string(),
            },
        }
    }
}

fn fields<Tz: TimeZone>(dt: DateTime<Tz>) -> (i32, u32, u32, u32) {
    (dt.year(), dt.month(), dt.day(), dt.hour())
}

/// Hourly calendar bucket identifying one writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}T{:02}", self.year, self.month, self.day, self.hour)
    }
}

impl BucketKey {
    /// Create a bucket key, rejecting components outside the calendar ranges
    pub fn new(year: u32, month: u32, day: u32, hour: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_bucket(format!("Month out of range: {}", month)));
        }
        if !(1..=31).contains(&day) {
            return Err(Error::invalid_bucket(format!("Day out of range: {}", day)));
        }
        if hour > 23 {
            return Err(Error::invalid_bucket(format!("Hour out of range: {}", hour)));
        }

        Ok(Self { year, month, day, hour })
    }

    /// Tree-descent path of this bucket
    pub fn segments(&self) -> [u32; 4] {
        [self.year, self.month, self.day, self.hour]
    }

    /// Path components as they appear in generated file paths
    pub fn path_components(&self, zero_padded: bool) -> [String; 4] {
        self.segments().map(|segment| {
            if zero_padded {
                format!("{:02}", segment)
            } else {
                segment.to_string()
            }
        })
    }
}

/// Resolve the bucket of a record timestamp
///
/// An absent timestamp yields `Ok(None)`: the record carries no time and is
/// skipped. Instants chrono cannot represent, or that fall in a negative
/// year, are rejected instead of producing a malformed path.
pub fn resolve_bucket(timestamp: Option<i64>, zone: BucketZone) -> Result<Option<BucketKey>> {
    let millis = match timestamp {
        Some(millis) => millis,
        None => return Ok(None),
    };

    let instant = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::invalid_bucket(format!("Timestamp out of range: {}", millis)))?;

    let (year, month, day, hour) = zone.calendar_fields(instant)?;
    let year = u32::try_from(year)
        .map_err(|_| Error::invalid_bucket(format!("Negative year {} for timestamp {}", year, millis)))?;

    BucketKey::new(year, month, day, hour).map(Some)
}
