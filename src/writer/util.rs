//! Utility functions for writer paths
//!
//! Provides file path generation and the unique tokens that keep paths of
//! writers for the same bucket apart.

use uuid::Uuid;

use crate::bucket::BucketKey;

/// Suffix of every generated file: historized, gzip-compressed output
pub const HIST_SUFFIX: &str = ".hist.gz";

/// Produces collision-resistant tokens for new writer files
pub trait TokenGenerator: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random v4 UUIDs in simple (unhyphenated) form
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokenGenerator;

impl TokenGenerator for UuidTokenGenerator {
    fn next_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Build `{top}/{year}/{month}/{day}/{hour}/{token}.hist.gz`
pub fn writer_file_path(top_level_path: &str, key: &BucketKey, zero_padded: bool, token: &str) -> String {
    let top = top_level_path.trim_end_matches('/');
    let [year, month, day, hour] = key.path_components(zero_padded);
    format!("{}/{}/{}/{}/{}/{}{}", top, year, month, day, hour, token, HIST_SUFFIX)
}
