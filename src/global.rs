// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Process-wide logger facade.
//!
//! A thin wrapper over one [`Logger`] instance with explicit lifetime: the
//! owner calls [`init`] once at startup and [`shutdown`] before exit. There
//! is no on-first-use initialization; [`get`] before [`init`] simply returns
//! `None`. Tests (and embedders) that want isolated pipelines construct
//! their own [`Logger`] values instead of going through this module.

use crate::config::LogConfig;
use crate::logger::{LogError, Logger};
use std::sync::{PoisonError, RwLock};

static GLOBAL: RwLock<Option<Logger>> = RwLock::new(None);

/// Install the process-wide logger.
///
/// Returns `LogError::AlreadyInitialized` when a logger is already installed
/// and has not been shut down.
pub fn init(config: LogConfig) -> Result<(), LogError> {
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(LogError::AlreadyInitialized);
    }
    *slot = Some(Logger::new(config)?);
    Ok(())
}

/// Get a handle to the process-wide logger, if one is installed
pub fn get() -> Option<Logger> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Tear down the process-wide logger, draining the ring first.
///
/// A no-op when nothing is installed. After this returns, `init` may be
/// called again.
pub fn shutdown() {
    let logger = GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(logger) = logger {
        logger.shutdown();
    }
}
