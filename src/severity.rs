// SPDX-License-Identifier: Apache-2.0 OR MIT
// Severity levels for the logging pipeline

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Log severity levels (0-5, higher is more severe)
///
/// The ordering defines the min-level gate: records with severity strictly
/// below the configured minimum are dropped before they reach the ring.
#[repr(u8)]
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Verbose tracing (per-record diagnostics)
    #[default]
    Trace = 0,
    /// Debug-level messages
    Debug = 1,
    /// Informational (normal operation)
    Info = 2,
    /// Warning conditions (approaching limits, recoverable oddities)
    Warn = 3,
    /// Error conditions (operation failed)
    Error = 4,
    /// Fatal conditions (process about to give up)
    Fatal = 5,
}

impl Severity {
    /// Get severity level as u8 (0-5)
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get severity name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Fixed-width 5-byte tag used on the sink wire format.
    ///
    /// Shorter names carry trailing space padding so the message column
    /// lines up across severities.
    pub const fn tag(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO ",
            Severity::Warn => "WARN ",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Create from u8 value (returns None if invalid)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Severity::Trace),
            1 => Some(Severity::Debug),
            2 => Some(Severity::Info),
            3 => Some(Severity::Warn),
            4 => Some(Severity::Error),
            5 => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a severity name fails
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown severity level: {0:?}")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "fatal" => Ok(Severity::Fatal),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}
