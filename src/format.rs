// SPDX-License-Identifier: Apache-2.0 OR MIT
// Record rendering for the sink wire format

use crate::slot::Slot;
use chrono::{DateTime, Utc};
use std::io::Write;

/// Maximum header bytes preceding the message body:
/// 19 (timestamp) + 1 (space) + 5 (level tag) + 3 (" - ")
pub const HEADER_MAX: usize = 28;

/// Fixed-width tag rendered for severity bytes outside the known range
const UNKNOWN_TAG: &str = "NONE ";

/// Render one record into `out`:
/// `YYYY-MM-DD HH:MM:SS <TAG5> - <msg bytes>`
///
/// Timestamps are broken down in UTC from the enqueue instant; nanoseconds
/// are not rendered. No trailing newline is appended; callers that want line
/// discipline embed `\n` in the message body.
pub fn render_record(slot: &Slot, out: &mut Vec<u8>) {
    let ts = DateTime::<Utc>::from_timestamp(slot.ts_sec(), slot.ts_nsec())
        .unwrap_or(DateTime::UNIX_EPOCH);
    let tag = match slot.severity() {
        Some(level) => level.tag(),
        None => UNKNOWN_TAG,
    };
    // Writes into a Vec cannot fail
    let _ = write!(out, "{} {} - ", ts.format("%Y-%m-%d %H:%M:%S"), tag);
    out.extend_from_slice(slot.message());
}
