//! Wall-clock helpers.
//!
//! Exchange event times arrive as milliseconds since the Unix epoch, so the
//! window arithmetic works in milliseconds too. Alert timestamps are rendered
//! in a fixed UTC offset (the channel audience reads UTC+8 by default).

use chrono::{FixedOffset, Offset, TimeZone, Utc};

/// Format used for the `Time` line of alert messages.
pub const ALERT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Build a fixed offset from whole hours east of UTC.
///
/// Out-of-range values fall back to UTC; config validation rejects them first.
pub fn offset_hours(hours: i32) -> FixedOffset {
    hours.checked_mul(3600).and_then(FixedOffset::east_opt).unwrap_or_else(|| Utc.fix())
}

/// Render epoch milliseconds with [`ALERT_TIME_FORMAT`] in the given offset.
pub fn format_ms(ms: u64, offset: FixedOffset) -> String {
    match offset.timestamp_millis_opt(ms as i64).single() {
        Some(dt) => dt.format(ALERT_TIME_FORMAT).to_string(),
        None => String::new(),
    }
}
