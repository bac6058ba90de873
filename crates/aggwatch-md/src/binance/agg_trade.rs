//! Binance aggTrade decoding.
//!
//! Combined-stream frames wrap each payload in an envelope:
//!
//! ```json
//! {"stream":"btcusdt@aggTrade",
//!  "data":{"e":"aggTrade","E":1700000000123,"s":"BTCUSDT","a":1,"p":"50000.10",
//!          "q":"0.500","f":1,"l":1,"T":1700000000120,"m":true}}
//! ```
//!
//! Only the fields the aggregator needs are read: `s`, `p`, `q`, `m`, `E`.

use aggwatch_core::error::AggError;
use aggwatch_core::{AggressorSide, MarketType, TradeEvent};
use serde_json::Value;

use crate::json_util::{parse_f64_field, parse_u64_field};

/// Decode one combined-stream text frame.
///
/// Returns `Ok(None)` for frames without a `data` object (subscription acks,
/// error replies) and `Err` for an envelope whose payload is malformed.
pub fn decode_combined(text: &str, market: MarketType) -> Result<Option<TradeEvent>, AggError> {
    let v: Value = serde_json::from_str(text).map_err(|e| AggError::Parse(format!("invalid json: {e}")))?;
    match v.get("data") {
        Some(data) if data.is_object() => decode_payload(data, market).map(Some),
        _ => Ok(None),
    }
}

/// Decode a bare aggTrade payload (the `data` object of an envelope).
pub fn decode_payload(data: &Value, market: MarketType) -> Result<TradeEvent, AggError> {
    let missing = |field: &str| AggError::Parse(format!("aggTrade field `{field}` missing or invalid"));

    let symbol = data.get("s").and_then(Value::as_str).ok_or_else(|| missing("s"))?;
    let price = parse_f64_field(data, "p").ok_or_else(|| missing("p"))?;
    let quantity = parse_f64_field(data, "q").ok_or_else(|| missing("q"))?;
    let is_buyer_maker = data.get("m").and_then(Value::as_bool).ok_or_else(|| missing("m"))?;
    let event_time_ms = parse_u64_field(data, "E").ok_or_else(|| missing("E"))?;

    Ok(TradeEvent {
        symbol: symbol.to_uppercase(),
        market,
        price,
        quantity,
        side: AggressorSide::from_buyer_maker(is_buyer_maker),
        event_time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: &str = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","E":1700000000123,"s":"BTCUSDT","a":5933014,"p":"50000.10","q":"0.500","f":100,"l":105,"T":1700000000120,"m":true,"M":true}}"#;

    #[test]
    fn decodes_envelope() {
        let ev = decode_combined(FRAME, MarketType::Spot).unwrap().unwrap();
        assert_eq!(ev.symbol, "BTCUSDT");
        assert_eq!(ev.market, MarketType::Spot);
        assert_eq!(ev.price, 50000.10);
        assert_eq!(ev.quantity, 0.5);
        assert_eq!(ev.side, AggressorSide::Sell);
        assert_eq!(ev.event_time_ms, 1_700_000_000_123);
    }

    #[test]
    fn buyer_taker_is_buy_aggressor() {
        let frame = FRAME.replace("\"m\":true", "\"m\":false");
        let ev = decode_combined(&frame, MarketType::PerpetualFutures).unwrap().unwrap();
        assert_eq!(ev.side, AggressorSide::Buy);
        assert_eq!(ev.market, MarketType::PerpetualFutures);
    }

    #[test]
    fn subscription_ack_is_skipped() {
        assert_eq!(decode_combined(r#"{"result":null,"id":1}"#, MarketType::Spot).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let frame = r#"{"stream":"btcusdt@aggTrade","data":{"s":"BTCUSDT","p":"x","q":"1","m":true,"E":1}}"#;
        assert!(matches!(decode_combined(frame, MarketType::Spot), Err(AggError::Parse(_))));
        assert!(decode_combined("not json", MarketType::Spot).is_err());
    }
}
