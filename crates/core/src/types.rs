//! Core data types for the snapshot pipeline.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalizer::{self, Field};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// A schemaless stored record body.
pub type Document = Map<String, Value>;

/// One minute in milliseconds.
pub const MINUTE_MS: TimestampMs = 60_000;

/// Convert a millisecond timestamp to a UTC datetime.
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_ms).single()
}

/// Format a millisecond timestamp as RFC 3339 with millisecond precision.
pub fn format_ts(ts_ms: TimestampMs) -> String {
    match ts_to_datetime(ts_ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ts_ms.to_string(),
    }
}

/// Serde adapter writing datetimes as RFC 3339 with millisecond precision.
mod rfc3339_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}

/// Half-open time range `[start, end)` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimestampMs,
    pub end: TimestampMs,
}

impl TimeRange {
    /// Create a new range.
    pub fn new(start: TimestampMs, end: TimestampMs) -> Self {
        Self { start, end }
    }

    /// The interval of `width_ms` that starts at `start`.
    pub fn interval(start: TimestampMs, width_ms: i64) -> Self {
        Self::new(start, start + width_ms)
    }

    /// Range length in milliseconds (never negative).
    pub fn duration_ms(&self) -> i64 {
        self.end.saturating_sub(self.start).max(0)
    }

    /// Widen both ends by `slack_ms`.
    pub fn widen(&self, slack_ms: i64) -> Self {
        Self::new(self.start - slack_ms, self.end + slack_ms)
    }
}

/// A stored record: its key plus the raw document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub symbol: String,
    pub ts_ms: TimestampMs,
    pub doc: Document,
}

impl Record {
    /// Read a logical field from the document.
    #[inline]
    pub fn number(&self, field: Field) -> Option<f64> {
        normalizer::number(&self.doc, field)
    }
}

/// A symbol registration with its snapshot watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    /// Interval-start of the last snapshot built for this symbol.
    pub watermark: Option<TimestampMs>,
}

/// A Level 1 quote (best bid/ask). Either side may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    pub bid_px: Option<f64>,
    pub ask_px: Option<f64>,
    pub bid_sz: Option<f64>,
    pub ask_sz: Option<f64>,
}

impl Quote {
    /// Normalize a stored quote record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            ts_ms: record.ts_ms,
            bid_px: record.number(Field::BidPrice),
            ask_px: record.number(Field::AskPrice),
            bid_sz: record.number(Field::BidSize),
            ask_sz: record.number(Field::AskSize),
        }
    }

    /// Calculate mid price when both sides are present.
    #[inline]
    pub fn mid(&self) -> Option<f64> {
        mid(self.bid_px, self.ask_px)
    }

    /// Calculate spread when both sides are present.
    #[inline]
    pub fn spread(&self) -> Option<f64> {
        spread(self.bid_px, self.ask_px)
    }
}

/// Mid price of a bid/ask pair.
#[inline]
pub fn mid(bid: Option<f64>, ask: Option<f64>) -> Option<f64> {
    Some((bid? + ask?) / 2.0)
}

/// Spread of a bid/ask pair.
#[inline]
pub fn spread(bid: Option<f64>, ask: Option<f64>) -> Option<f64> {
    Some(ask? - bid?)
}

/// A single trade (print). Price or size may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    pub price: Option<f64>,
    pub size: Option<f64>,
}

impl Trade {
    /// Normalize a stored trade record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            ts_ms: record.ts_ms,
            price: record.number(Field::Price),
            size: record.number(Field::Size),
        }
    }
}

/// Indicator fields written onto bars.
///
/// A field is `None` until its indicator has consumed its warm-up
/// history; `None` fields are never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema12: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema26: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_signal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_histogram: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger_middle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adx14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plus_dmi14: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minus_dmi14: Option<f64>,
}

impl IndicatorValues {
    /// Stored field names, in declaration order.
    pub const FIELD_NAMES: [&'static str; 15] = [
        "sma20",
        "sma50",
        "ema12",
        "ema26",
        "macd",
        "macdSignal",
        "macdHistogram",
        "rsi14",
        "atr14",
        "bollingerUpper",
        "bollingerMiddle",
        "bollingerLower",
        "adx14",
        "plusDmi14",
        "minusDmi14",
    ];

    /// Field name/value pairs, in declaration order.
    pub fn entries(&self) -> [(&'static str, Option<f64>); 15] {
        let values = [
            self.sma20,
            self.sma50,
            self.ema12,
            self.ema26,
            self.macd,
            self.macd_signal,
            self.macd_histogram,
            self.rsi14,
            self.atr14,
            self.bollinger_upper,
            self.bollinger_middle,
            self.bollinger_lower,
            self.adx14,
            self.plus_dmi14,
            self.minus_dmi14,
        ];
        let mut out = [("", None); 15];
        for (slot, (name, value)) in out
            .iter_mut()
            .zip(Self::FIELD_NAMES.iter().zip(values))
        {
            *slot = (*name, value);
        }
        out
    }

    /// Only the fields that carry a value.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, f64)> {
        self.entries()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    /// Whether no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }

    /// Read indicator fields back from a stored bar document.
    pub fn from_document(doc: &Document) -> Self {
        let get = |name: &str| normalizer::first_number(doc, &[name]);
        Self {
            sma20: get("sma20"),
            sma50: get("sma50"),
            ema12: get("ema12"),
            ema26: get("ema26"),
            macd: get("macd"),
            macd_signal: get("macdSignal"),
            macd_histogram: get("macdHistogram"),
            rsi14: get("rsi14"),
            atr14: get("atr14"),
            bollinger_upper: get("bollingerUpper"),
            bollinger_middle: get("bollingerMiddle"),
            bollinger_lower: get("bollingerLower"),
            adx14: get("adx14"),
            plus_dmi14: get("plusDmi14"),
            minus_dmi14: get("minusDmi14"),
        }
    }

    /// Merge the present fields into a document, leaving others untouched.
    pub fn apply_to(&self, doc: &mut Document) {
        for (name, value) in self.present() {
            doc.insert(name.to_string(), Value::from(value));
        }
    }
}

/// Indicator fields to set on one bar, addressed by its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarUpdate {
    pub symbol: String,
    pub ts_ms: TimestampMs,
    pub values: IndicatorValues,
}

/// NBBO context for one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NbboContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_close: Option<f64>,
    /// Time-weighted average spread across the interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spread_avg: Option<f64>,
    /// Quotes inside the strict interval.
    pub quote_count: u32,
}

/// Trade statistics for one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub trades_exec_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap_exec: Option<f64>,
    pub dollar_volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_trade_size: Option<f64>,
}

/// OHLCV fields copied from a bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BarFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<f64>,
}

impl BarFields {
    /// Copy OHLCV fields from a bar record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            open: record.number(Field::Open),
            high: record.number(Field::High),
            low: record.number(Field::Low),
            close: record.number(Field::Close),
            volume: record.number(Field::Volume),
            vwap: record.number(Field::Vwap),
            trade_count: record.number(Field::TradeCount),
        }
    }
}

/// One fused record per symbol per interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    /// Interval start.
    #[serde(with = "rfc3339_millis")]
    pub t: DateTime<Utc>,
    #[serde(flatten)]
    pub bar: BarFields,
    #[serde(flatten)]
    pub indicators: IndicatorValues,
    #[serde(flatten)]
    pub nbbo: NbboContext,
    #[serde(flatten)]
    pub trades: TradeStats,
    /// When this snapshot was assembled.
    #[serde(with = "rfc3339_millis")]
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    /// Interval start in milliseconds.
    #[inline]
    pub fn ts_ms(&self) -> TimestampMs {
        self.t.timestamp_millis()
    }

    /// Serialize to a stored document.
    pub fn to_document(&self) -> crate::Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(crate::Error::data(format!(
                "snapshot serialized to non-object: {other}"
            ))),
        }
    }
}
