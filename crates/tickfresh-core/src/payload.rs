//! Upstream payload classification and normalization.
//!
//! The upstream answers a time-series request with one of three JSON shapes:
//! a map of `timestamp -> OHLCV strings` under an interval-specific label,
//! an `Error Message` field, or a `Note` (older) / `Information` (newer)
//! usage-limit notice. [`classify_payload`] folds every possible body,
//! including garbage, into an [`UpstreamPayload`] without side effects.

use serde_json::{Map, Value};
use thiserror::Error;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::{Bar, Interval, UtcDateTime, ValidationError};

const ERROR_FIELD: &str = "Error Message";
const NOTE_FIELD: &str = "Note";
const INFORMATION_FIELD: &str = "Information";

const OPEN_FIELD: &str = "1. open";
const HIGH_FIELD: &str = "2. high";
const LOW_FIELD: &str = "3. low";
const CLOSE_FIELD: &str = "4. close";
const VOLUME_FIELDS: [&str; 2] = ["5. volume", "6. volume"];

/// Outcome of parsing one upstream body for a requested interval.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    /// Bars sorted ascending by timestamp; never empty.
    TimeSeries(Vec<Bar>),
    UpstreamError(String),
    RateLimited(String),
    /// The expected series label is absent or holds no entries.
    NotFound { label: &'static str },
    ParseFailure(String),
}

/// Reasons [`try_normalize`] can reject a payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("payload has no '{label}' object")]
    MissingSeries { label: &'static str },
    #[error("'{label}' is not a JSON object")]
    SeriesNotObject { label: &'static str },
    #[error("invalid bar timestamp '{value}'")]
    InvalidTimestamp { value: String },
    #[error("bar {timestamp} has invalid field '{field}'")]
    InvalidField {
        timestamp: String,
        field: &'static str,
    },
    #[error("bar {timestamp} violates OHLC bounds: {source}")]
    InvalidBar {
        timestamp: String,
        source: ValidationError,
    },
}

/// Classify a raw upstream body.
pub fn classify_payload(body: &str, interval: Interval) -> UpstreamPayload {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(error) => return UpstreamPayload::ParseFailure(format!("invalid JSON: {error}")),
    };

    let Some(object) = value.as_object() else {
        return UpstreamPayload::ParseFailure(String::from("payload is not a JSON object"));
    };

    if let Some(message) = text_field(object, ERROR_FIELD) {
        return UpstreamPayload::UpstreamError(message);
    }

    if let Some(note) = text_field(object, NOTE_FIELD).or_else(|| text_field(object, INFORMATION_FIELD))
    {
        return UpstreamPayload::RateLimited(note);
    }

    match try_normalize(&value, interval) {
        Ok(bars) if bars.is_empty() => UpstreamPayload::NotFound {
            label: interval.series_label(),
        },
        Ok(bars) => UpstreamPayload::TimeSeries(bars),
        Err(NormalizeError::MissingSeries { label }) => UpstreamPayload::NotFound { label },
        Err(error) => UpstreamPayload::ParseFailure(error.to_string()),
    }
}

/// Canonical bars for `interval`, or an empty vector when the payload does
/// not carry a well-formed series for it.
pub fn normalize(payload: &Value, interval: Interval) -> Vec<Bar> {
    try_normalize(payload, interval).unwrap_or_default()
}

/// Strict variant of [`normalize`] reporting why a payload was rejected.
pub fn try_normalize(payload: &Value, interval: Interval) -> Result<Vec<Bar>, NormalizeError> {
    let label = interval.series_label();
    let series = payload
        .get(label)
        .ok_or(NormalizeError::MissingSeries { label })?
        .as_object()
        .ok_or(NormalizeError::SeriesNotObject { label })?;

    let mut bars = series
        .iter()
        .map(|(timestamp, entry)| parse_bar(timestamp, entry))
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by(|left, right| left.ts.cmp(&right.ts));
    Ok(bars)
}

fn parse_bar(timestamp: &str, entry: &Value) -> Result<Bar, NormalizeError> {
    let ts = parse_timestamp(timestamp)?;
    let open = price_field(timestamp, entry, OPEN_FIELD)?;
    let high = price_field(timestamp, entry, HIGH_FIELD)?;
    let low = price_field(timestamp, entry, LOW_FIELD)?;
    let close = price_field(timestamp, entry, CLOSE_FIELD)?;
    let volume = volume_field(timestamp, entry)?;

    Bar::new(ts, open, high, low, close, volume).map_err(|source| NormalizeError::InvalidBar {
        timestamp: timestamp.to_owned(),
        source,
    })
}

/// Intraday keys carry a time of day, long-horizon keys are plain dates.
/// Both are taken as UTC.
fn parse_timestamp(raw: &str) -> Result<UtcDateTime, NormalizeError> {
    let trimmed = raw.trim();
    let parsed = PrimitiveDateTime::parse(
        trimmed,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
            .map(Date::midnight)
    })
    .map_err(|_| NormalizeError::InvalidTimestamp {
        value: raw.to_owned(),
    })?;

    UtcDateTime::from_offset_datetime(parsed.assume_utc()).map_err(|_| {
        NormalizeError::InvalidTimestamp {
            value: raw.to_owned(),
        }
    })
}

fn price_field(timestamp: &str, entry: &Value, field: &'static str) -> Result<f64, NormalizeError> {
    let invalid = || NormalizeError::InvalidField {
        timestamp: timestamp.to_owned(),
        field,
    };

    let value = match entry.get(field).ok_or_else(invalid)? {
        Value::String(raw) => raw.trim().parse::<f64>().map_err(|_| invalid())?,
        Value::Number(number) => number.as_f64().ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn volume_field(timestamp: &str, entry: &Value) -> Result<u64, NormalizeError> {
    let invalid = |field| NormalizeError::InvalidField {
        timestamp: timestamp.to_owned(),
        field,
    };

    let Some((field, value)) = VOLUME_FIELDS
        .iter()
        .find_map(|field| entry.get(*field).map(|value| (*field, value)))
    else {
        return Err(invalid(VOLUME_FIELDS[0]));
    };

    match value {
        Value::String(raw) => raw.trim().parse::<u64>().map_err(|_| invalid(field)),
        Value::Number(number) => number.as_u64().ok_or_else(|| invalid(field)),
        _ => Err(invalid(field)),
    }
}

fn text_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object.get(field).map(|value| match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    })
}
