// SPDX-License-Identifier: Apache-2.0 OR MIT
// Fixed-size log record, cacheline-multiple layout

use crate::clock::WallTime;
use crate::ring::CACHE_LINE_SIZE;
use crate::severity::Severity;
use std::fmt;

/// Inline message buffer capacity in bytes.
///
/// Message bodies are capped at `MSG_MAX - 1` bytes; the final byte is
/// reserved for the NUL written when a message is truncated.
pub const MSG_MAX: usize = 512;

/// One log record as it travels through the ring.
///
/// Layout: a 16-byte metadata prefix followed by the inline message buffer,
/// padded out so the struct is a whole number of cachelines (9 lines at
/// `MSG_MAX = 512`). Slots are moved by plain copy; the inline buffer means
/// no heap allocation or external lifetime is involved.
#[repr(C, align(64))]
#[derive(Clone, Copy)]
pub struct Slot {
    pub(crate) ts_sec: i64,
    pub(crate) ts_nsec: u32,
    pub(crate) len: u16,
    pub(crate) level: u8,
    _pad: u8,
    pub(crate) msg: [u8; MSG_MAX],
}

// Whole-cacheline occupancy: two slots never share a line.
const _: () = assert!(std::mem::size_of::<Slot>() % CACHE_LINE_SIZE == 0);
const _: () = assert!(std::mem::align_of::<Slot>() == CACHE_LINE_SIZE);

impl Slot {
    /// Create an empty record with the given severity and enqueue timestamp.
    pub fn new(level: Severity, ts: WallTime) -> Self {
        Self {
            ts_sec: ts.sec,
            ts_nsec: ts.nsec,
            len: 0,
            level: level.as_u8(),
            _pad: 0,
            msg: [0; MSG_MAX],
        }
    }

    /// Render a format invocation into the inline buffer.
    ///
    /// The body is capped at `MSG_MAX - 1` bytes. When the formatted output
    /// does not fit, the overflow is discarded, a NUL is written at
    /// `MSG_MAX - 1`, and `len` records the bytes kept. A formatting error
    /// (a `Display` impl reporting failure) leaves an empty body.
    pub fn render(&mut self, args: fmt::Arguments<'_>) {
        let (len, truncated) = {
            let mut writer = MsgWriter {
                buf: &mut self.msg,
                len: 0,
                truncated: false,
            };
            match fmt::write(&mut writer, args) {
                Ok(()) => (writer.len, writer.truncated),
                Err(_) => (0, false),
            }
        };
        if truncated {
            self.msg[MSG_MAX - 1] = 0;
            self.len = (MSG_MAX - 1) as u16;
        } else {
            self.len = len as u16;
        }
    }

    /// Raw severity byte (may be outside the known range for records that
    /// did not come from this crate's producer path).
    #[inline]
    pub fn level_raw(&self) -> u8 {
        self.level
    }

    /// Decoded severity, if the raw byte is a known level.
    #[inline]
    pub fn severity(&self) -> Option<Severity> {
        Severity::from_u8(self.level)
    }

    /// Message body bytes (raw, not necessarily UTF-8).
    #[inline]
    pub fn message(&self) -> &[u8] {
        &self.msg[..self.len as usize]
    }

    /// Enqueue timestamp, seconds since the epoch.
    #[inline]
    pub fn ts_sec(&self) -> i64 {
        self.ts_sec
    }

    /// Enqueue timestamp, sub-second nanoseconds.
    #[inline]
    pub fn ts_nsec(&self) -> u32 {
        self.ts_nsec
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            ts_sec: 0,
            ts_nsec: 0,
            len: 0,
            level: 0,
            _pad: 0,
            msg: [0; MSG_MAX],
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("level", &self.level)
            .field("len", &self.len)
            .field("ts_sec", &self.ts_sec)
            .field("msg", &String::from_utf8_lossy(self.message()))
            .finish()
    }
}

/// Bounded writer over the inline buffer. Overflow is swallowed rather than
/// reported so the format machinery keeps running; the truncated flag is
/// applied once the whole invocation has been consumed.
struct MsgWriter<'a> {
    buf: &'a mut [u8; MSG_MAX],
    len: usize,
    truncated: bool,
}

impl fmt::Write for MsgWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let cap = MSG_MAX - 1;
        if self.len < cap {
            let take = bytes.len().min(cap - self.len);
            self.buf[self.len..self.len + take].copy_from_slice(&bytes[..take]);
            self.len += take;
            if take < bytes.len() {
                self.truncated = true;
            }
        } else if !bytes.is_empty() {
            self.truncated = true;
        }
        Ok(())
    }
}
