// SPDX-License-Identifier: Apache-2.0 OR MIT
// Output sinks for the drain worker

use nix::sys::uio;
use std::fs::OpenOptions;
use std::io::{self, IoSlice};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

/// Sink targets recognized by name instead of path
pub const STDOUT_TARGET: &str = "stdout";
pub const STDERR_TARGET: &str = "stderr";

/// Mode bits for sink files created by the logger
const SINK_FILE_MODE: u32 = 0o644;

/// Destination for formatted log bytes.
///
/// The drain worker hands a whole batch to one `writev` call; partial-write
/// and retry policy live in the drain loop, so implementations only perform
/// a single vectored write attempt.
pub trait Sink: Send + 'static {
    /// Write as many bytes as the sink accepts from the scatter list,
    /// returning the byte count consumed.
    fn writev(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;
}

/// Sink over a file descriptor, written with vectored I/O.
///
/// Owns the descriptor: dropping the sink closes it. The standard streams
/// are duplicated at open time, so the process-wide fds 1 and 2 are never
/// closed through the logger.
pub struct FdSink {
    fd: OwnedFd,
}

impl FdSink {
    /// Open a sink from its configured name.
    ///
    /// `"stdout"` / `"stderr"` map to duplicates of the standard streams;
    /// any other value opens the named file for create-or-append with mode
    /// 0644.
    pub fn open(target: &str) -> io::Result<Self> {
        let fd = match target {
            STDOUT_TARGET => io::stdout().as_fd().try_clone_to_owned()?,
            STDERR_TARGET => io::stderr().as_fd().try_clone_to_owned()?,
            path => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .mode(SINK_FILE_MODE)
                    .open(path)?;
                OwnedFd::from(file)
            }
        };
        Ok(Self { fd })
    }
}

impl Sink for FdSink {
    fn writev(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        uio::writev(&self.fd, bufs).map_err(io::Error::from)
    }
}
