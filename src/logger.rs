// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger engine: producer API and lifecycle around the ring + drain worker

use crate::clock;
use crate::config::{ConfigError, LogConfig, OverflowPolicy};
use crate::drain::DrainLoop;
use crate::ring::Ring;
use crate::severity::Severity;
use crate::sink::FdSink;
use crate::slot::Slot;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Ring capacity used by `Logger` unless a different `N` is named
pub const DEFAULT_RING_CAPACITY: usize = 1024;

/// Errors raised while constructing or wiring a logger
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open log sink {target:?}")]
    OpenSink {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn drain thread")]
    SpawnDrain(#[source] io::Error),

    #[error("global logger already initialized")]
    AlreadyInitialized,
}

/// Shared state between producer handles and the drain worker
pub(crate) struct Core<const N: usize> {
    pub(crate) ring: Ring<Slot, N>,
    pub(crate) config: LogConfig,
    pub(crate) running: AtomicBool,
    pub(crate) io_errors: AtomicU64,
    pub(crate) dropped: AtomicU64,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl<const N: usize> Core<N> {
    pub(crate) fn new(config: LogConfig) -> Self {
        Self {
            ring: Ring::new(),
            config,
            running: AtomicBool::new(true),
            io_errors: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            drain: Mutex::new(None),
        }
    }
}

/// Asynchronous logger over a bounded lock-free ring.
///
/// This is a lightweight handle that can be cloned and passed around; the
/// ring, sink and drain worker are shared behind an `Arc`. Producers format
/// on their own thread into a stack slot and enqueue it; the single drain
/// worker batches records into vectored writes.
///
/// Call [`Logger::shutdown`] when done: it stops the drain worker after the
/// ring is empty, so every record enqueued before the call reaches the sink.
/// Dropping the last handle without `shutdown` leaves the worker running.
pub struct Logger<const N: usize = 1024> {
    core: Arc<Core<N>>,
}

impl<const N: usize> Clone for Logger<N> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<const N: usize> Logger<N> {
    /// Create a logger: validates the configuration, opens the sink, and
    /// spawns the drain worker.
    pub fn new(config: LogConfig) -> Result<Self, LogError> {
        config.validate()?;
        let sink = FdSink::open(&config.output).map_err(|source| LogError::OpenSink {
            target: config.output.clone(),
            source,
        })?;

        let batch = config.batch_write;
        let core = Arc::new(Core::new(config));
        let worker = DrainLoop::new(Arc::clone(&core), sink, batch);
        let handle = thread::Builder::new()
            .name("logring-drain".into())
            .spawn(move || worker.run())
            .map_err(LogError::SpawnDrain)?;
        *lock_ignoring_poison(&core.drain) = Some(handle);

        Ok(Self { core })
    }

    /// Enqueue one formatted record.
    ///
    /// Returns `false` when the record was filtered by the min-level gate,
    /// or rejected because the ring was full under the `drop` overflow
    /// policy. Formatting happens on the calling thread into a stack slot;
    /// nothing on this path allocates.
    pub fn log(&self, level: Severity, args: fmt::Arguments<'_>) -> bool {
        if level < self.core.config.min_level {
            return false;
        }

        let mut slot = Slot::new(level, clock::now());
        slot.render(args);

        match self.core.config.on_full {
            OverflowPolicy::Block => {
                self.core.ring.push(slot);
                true
            }
            OverflowPolicy::Drop => {
                if self.core.ring.try_push(slot) {
                    true
                } else {
                    self.core.dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
            }
        }
    }

    /// Check whether a severity would pass the min-level gate
    #[inline]
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.core.config.min_level
    }

    /// Stop the drain worker and wait for it to finish.
    ///
    /// The worker exits only after observing the stop flag *and* an empty
    /// ring, so every successful `log` call that returned before this one
    /// began has been written to the sink when `shutdown` returns. Calling
    /// it again (or from another clone of the handle) is a no-op.
    pub fn shutdown(&self) {
        self.core.running.store(false, Ordering::Relaxed);
        let handle = lock_ignoring_poison(&self.core.drain).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Number of batches abandoned because of sink errors
    pub fn io_error_count(&self) -> u64 {
        self.core.io_errors.load(Ordering::Relaxed)
    }

    /// Number of records rejected under the `drop` overflow policy
    pub fn dropped_count(&self) -> u64 {
        self.core.dropped.load(Ordering::Relaxed)
    }

    /// The configuration this logger was built with
    pub fn config(&self) -> &LogConfig {
        &self.core.config
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
