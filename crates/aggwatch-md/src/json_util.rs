//! Shared JSON parsing helpers.
//!
//! Binance encodes prices and quantities as JSON strings (`"30000.5"`) while
//! ids and timestamps are native numbers; these helpers accept either form.

use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field on a JSON object as `u64` (string or number).
#[inline]
pub fn parse_u64_field(v: &Value, key: &str) -> Option<u64> {
    parse_str_u64(v.get(key))
}
