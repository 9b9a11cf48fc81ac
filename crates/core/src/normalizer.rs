//! Schema-tolerant field extraction.
//!
//! Upstream sources have used several naming conventions for the same
//! field over time (`close`, `c`, `ClosePrice`, ...). Every numeric or time
//! read in the pipeline goes through this module so that a renamed field
//! yields an absent value instead of a silent zero.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::types::{Document, TimestampMs};

/// A logical field that may appear under several names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Vwap,
    TradeCount,
    BidPrice,
    AskPrice,
    BidSize,
    AskSize,
    Price,
    Size,
    Timestamp,
}

/// Candidate names per field, most canonical first.
const ALIASES: &[(Field, &[&str])] = &[
    (Field::Open, &["open", "o", "OpenPrice", "Open"]),
    (Field::High, &["high", "h", "HighPrice", "High"]),
    (Field::Low, &["low", "l", "LowPrice", "Low"]),
    (Field::Close, &["close", "c", "ClosePrice", "Close"]),
    (Field::Volume, &["volume", "v", "Volume"]),
    (Field::Vwap, &["vwap", "vw", "VWAP"]),
    (Field::TradeCount, &["trade_count", "n", "TradeCount"]),
    (Field::BidPrice, &["bid_price", "bp", "BidPrice", "bid"]),
    (Field::AskPrice, &["ask_price", "ap", "AskPrice", "ask"]),
    (Field::BidSize, &["bid_size", "bs", "BidSize"]),
    (Field::AskSize, &["ask_size", "as", "AskSize"]),
    (Field::Price, &["price", "p", "Price"]),
    (Field::Size, &["size", "s", "Size"]),
    (Field::Timestamp, &["t", "timestamp", "Timestamp", "time"]),
];

impl Field {
    /// Candidate names for this field in priority order.
    pub fn aliases(self) -> &'static [&'static str] {
        ALIASES
            .iter()
            .find(|(field, _)| *field == self)
            .map_or(&[][..], |(_, names)| *names)
    }
}

/// Coerce a JSON value to a finite number.
///
/// Numbers and numeric strings are accepted; everything else, including
/// NaN and infinities, is absent.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Coerce a JSON value to a millisecond timestamp.
///
/// Accepts RFC 3339 strings, ISO 8601 strings without an offset (read as
/// UTC), epoch milliseconds, and numeric strings.
pub fn coerce_timestamp(value: &Value) -> Option<TimestampMs> {
    if let Value::String(s) = value {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.timestamp_millis());
        }
        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(dt.and_utc().timestamp_millis());
            }
        }
    }
    coerce_number(value).map(|ms| ms as TimestampMs)
}

/// First present value among `names` that coerces to a finite number.
pub fn first_number(doc: &Document, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .filter_map(|name| doc.get(*name))
        .find_map(coerce_number)
}

/// Read a logical field through its alias list.
pub fn number(doc: &Document, field: Field) -> Option<f64> {
    first_number(doc, field.aliases())
}

/// Read the record timestamp through its alias list.
pub fn timestamp(doc: &Document) -> Option<TimestampMs> {
    Field::Timestamp
        .aliases()
        .iter()
        .filter_map(|name| doc.get(*name))
        .find_map(coerce_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_every_field_has_aliases() {
        for (field, names) in ALIASES {
            assert!(!names.is_empty());
            assert_eq!(field.aliases(), *names);
        }
    }

    #[test]
    fn test_alias_priority() {
        let d = doc(json!({"Close": 3.0, "c": 2.0, "close": 1.0}));
        assert_eq!(number(&d, Field::Close), Some(1.0));

        let d = doc(json!({"Close": 3.0, "ClosePrice": 4.0}));
        assert_eq!(number(&d, Field::Close), Some(4.0));
    }

    #[test]
    fn test_skips_non_numeric_candidates() {
        // The canonical name is present but unusable, so the next alias wins.
        let d = doc(json!({"close": "N/A", "c": "101.5"}));
        assert_eq!(number(&d, Field::Close), Some(101.5));
    }

    #[test]
    fn test_absent_never_zero() {
        let d = doc(json!({"close": null, "c": true, "Close": "nan"}));
        assert_eq!(number(&d, Field::Close), None);
        assert_eq!(number(&doc(json!({})), Field::Close), None);
        assert_eq!(coerce_number(&json!("inf")), None);
    }

    #[test]
    fn test_timestamp_forms() {
        let iso = doc(json!({"t": "2024-01-01T00:01:00Z"}));
        assert_eq!(timestamp(&iso), Some(1_704_067_260_000));

        let naive = doc(json!({"t": "2024-01-01T00:01:00"}));
        assert_eq!(timestamp(&naive), Some(1_704_067_260_000));
        let spaced = doc(json!({"t": "2024-01-01 00:01:00.250"}));
        assert_eq!(timestamp(&spaced), Some(1_704_067_260_250));

        let ms = doc(json!({"timestamp": 1_704_067_260_000i64}));
        assert_eq!(timestamp(&ms), Some(1_704_067_260_000));

        let bad = doc(json!({"t": "yesterday", "time": "1704067260000"}));
        assert_eq!(timestamp(&bad), Some(1_704_067_260_000));

        assert_eq!(timestamp(&doc(json!({"t": "yesterday"}))), None);
    }
}
