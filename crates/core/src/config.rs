//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services. Request handlers never read process-wide environment
//! variables, which keeps behaviour consistent across multi-threaded
//! runtimes and test harnesses.

use crate::constants::DEFAULT_BLOB_DIR;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    blob_dir: PathBuf,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with the given blob directory.
    pub fn new(blob_dir: PathBuf) -> Self {
        Self { blob_dir }
    }

    /// Directory where the local blob store keeps binary content.
    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }
}

/// Resolve the blob directory from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns the default directory.
pub fn blob_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_DIR))
}
