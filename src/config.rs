// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Logger configuration types and parsing.
//!
//! JSON5 configuration format supporting comments and trailing commas, e.g.:
//!
//! ```json5
//! {
//!     // drop DEBUG and TRACE before they reach the ring
//!     min_level: "info",
//!     output: "/var/log/app.log",
//!     batch_write: 256,
//! }
//! ```

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_batch_write() -> usize {
    256
}

/// Behavior of the producer path when the ring is full
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Spin until the consumer frees a slot (bounded busy-wait, strict
    /// ticket-order admission)
    #[default]
    Block,
    /// Reject the record and count it as dropped
    Drop,
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Minimum severity accepted by the producer path. Records strictly
    /// below this level are filtered before enqueue.
    #[serde(default)]
    pub min_level: Severity,

    /// Sink target: `"stdout"`, `"stderr"`, or a file path opened with
    /// create-or-append semantics. There is no default; the caller chooses.
    pub output: String,

    /// Maximum records per vectored-write batch
    #[serde(default = "default_batch_write")]
    pub batch_write: usize,

    /// Full-ring policy for the producer path
    #[serde(default)]
    pub on_full: OverflowPolicy,
}

impl LogConfig {
    /// Configuration with defaults for everything except the sink target
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            min_level: Severity::Trace,
            output: output.into(),
            batch_write: default_batch_write(),
            on_full: OverflowPolicy::Block,
        }
    }

    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            json5::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.is_empty() {
            return Err(ConfigError::EmptyOutput);
        }
        if self.batch_write == 0 {
            return Err(ConfigError::InvalidBatchWrite);
        }
        Ok(())
    }
}

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("output target must not be empty")]
    EmptyOutput,

    #[error("batch_write must be at least 1")]
    InvalidBatchWrite,
}
