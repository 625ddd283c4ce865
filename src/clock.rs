// SPDX-License-Identifier: Apache-2.0 OR MIT
// Wall-clock capture for the producer path

use nix::time::{clock_gettime, ClockId};

/// Wall-clock instant captured at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    /// Seconds since the Unix epoch
    pub sec: i64,
    /// Sub-second nanoseconds
    pub nsec: u32,
}

/// Current wall-clock time.
///
/// Prefers `CLOCK_REALTIME_COARSE` (no vDSO miss, adequate for one-second
/// timestamp resolution) and falls back to `CLOCK_REALTIME` where the coarse
/// clock is unavailable.
pub fn now() -> WallTime {
    #[cfg(target_os = "linux")]
    {
        if let Ok(ts) = clock_gettime(ClockId::CLOCK_REALTIME_COARSE) {
            return WallTime {
                sec: ts.tv_sec(),
                nsec: ts.tv_nsec() as u32,
            };
        }
    }
    match clock_gettime(ClockId::CLOCK_REALTIME) {
        Ok(ts) => WallTime {
            sec: ts.tv_sec(),
            nsec: ts.tv_nsec() as u32,
        },
        Err(_) => WallTime { sec: 0, nsec: 0 },
    }
}
