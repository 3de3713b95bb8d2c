use crate::bands::{band_for_frequency, mode_from_comment, normalize_mode};
use crate::error::{FetchError, MalformedReport};
use crate::geo::{GeoPoint, decode_locator, interpolate_great_circle};
use crate::signal::{SignalClass, classify};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// One record as delivered by a reporting network. Every field is optional so that a single
/// bad record can be rejected without failing the batch it arrived in.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    #[serde(alias = "spotter", alias = "sender")]
    pub origin_call: Option<String>,
    #[serde(alias = "dxCall", alias = "receiver")]
    pub destination_call: Option<String>,
    #[serde(alias = "spotterGrid", alias = "senderLocator")]
    pub origin_locator: Option<String>,
    #[serde(alias = "dxGrid", alias = "receiverLocator")]
    pub destination_locator: Option<String>,
    pub origin_lat: Option<f64>,
    pub origin_lon: Option<f64>,
    pub destination_lat: Option<f64>,
    pub destination_lon: Option<f64>,
    pub frequency_hz: Option<f64>,
    pub frequency_khz: Option<f64>,
    pub mode: Option<String>,
    pub comment: Option<String>,
    pub snr: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Records decoded from one response body. `undecodable` counts items that were not even
/// shaped like a report; they never reach the aggregator but still count as malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub reports: Vec<RawReport>,
    pub undecodable: usize,
}

impl From<Vec<RawReport>> for RawBatch {
    fn from(reports: Vec<RawReport>) -> Self {
        Self {
            reports,
            undecodable: 0,
        }
    }
}

/// Parses a response body holding either a bare JSON array of records or an object wrapping
/// one under `spots` or `reports`. Items that do not deserialize are dropped individually.
pub fn parse_batch(body: &str) -> Result<RawBatch, FetchError> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("spots").or_else(|| map.remove("reports")) {
            Some(Value::Array(items)) => items,
            _ => return Err(FetchError::NotABatch),
        },
        _ => return Err(FetchError::NotABatch),
    };

    let mut batch = RawBatch::default();
    for item in items {
        match serde_json::from_value::<RawReport>(item) {
            Ok(raw) => batch.reports.push(raw),
            Err(e) => {
                debug!(error = %e, "skipping undecodable report");
                batch.undecodable += 1;
            }
        }
    }
    Ok(batch)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Text(DateTime<Utc>),
    EpochMillis(i64),
}

/// Accepts RFC 3339 strings or integer epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<WireTimestamp>::deserialize(deserializer)?.and_then(|ts| match ts {
            WireTimestamp::Text(dt) => Some(dt),
            WireTimestamp::EpochMillis(ms) => DateTime::from_timestamp_millis(ms),
        }),
    )
}

/// Identity of a spot: `(destination call, frequency in Hz, origin call)`. Calls are
/// upper-cased, so keys built from differently-cased input compare equal.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct SpotKey {
    pub destination_call: String,
    pub frequency_hz: u64,
    pub origin_call: String,
}

impl SpotKey {
    pub fn new(destination_call: &str, frequency_hz: u64, origin_call: &str) -> Self {
        Self {
            destination_call: normalize_call(destination_call),
            frequency_hz,
            origin_call: normalize_call(origin_call),
        }
    }
}

pub fn normalize_call(call: &str) -> String {
    call.trim().to_ascii_uppercase()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub origin_call: String,
    pub destination_call: String,
    pub origin_locator: Option<String>,
    pub destination_locator: Option<String>,
    pub origin_point: Option<GeoPoint>,
    pub destination_point: Option<GeoPoint>,
    pub frequency_hz: u64,
    pub band: Option<&'static str>,
    pub mode: Option<String>,
    pub comment: Option<String>,
    pub snr: Option<f64>,
    pub observed_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

impl Report {
    /// Validates a raw record and fills in every derived field. `ingested_at` is the time the
    /// record enters the aggregator.
    pub fn from_raw(raw: RawReport, ingested_at: DateTime<Utc>) -> Result<Self, MalformedReport> {
        let origin_call = non_empty(raw.origin_call.as_deref())
            .map(normalize_call)
            .ok_or(MalformedReport::MissingOriginCall)?;
        let destination_call = non_empty(raw.destination_call.as_deref())
            .map(normalize_call)
            .ok_or(MalformedReport::MissingDestinationCall)?;

        let frequency = raw
            .frequency_hz
            .or_else(|| raw.frequency_khz.map(|khz| khz * 1000.0))
            .ok_or(MalformedReport::MissingFrequency)?;
        if !frequency.is_finite() || frequency <= 0.0 || frequency > u64::MAX as f64 {
            return Err(MalformedReport::InvalidFrequency(frequency));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frequency_hz = frequency.round() as u64;

        let observed_at = raw.observed_at.ok_or(MalformedReport::MissingObservedAt)?;

        let origin_locator = non_empty(raw.origin_locator.as_deref()).map(normalize_call);
        let destination_locator = non_empty(raw.destination_locator.as_deref()).map(normalize_call);
        let origin_point = resolve_point(raw.origin_lat, raw.origin_lon, origin_locator.as_deref());
        let destination_point = resolve_point(
            raw.destination_lat,
            raw.destination_lon,
            destination_locator.as_deref(),
        );

        let comment = non_empty(raw.comment.as_deref()).map(str::to_string);
        let mode = non_empty(raw.mode.as_deref())
            .map(normalize_mode)
            .or_else(|| comment.as_deref().and_then(mode_from_comment));

        Ok(Self {
            origin_call,
            destination_call,
            origin_locator,
            destination_locator,
            origin_point,
            destination_point,
            frequency_hz,
            band: band_for_frequency(frequency_hz),
            mode,
            comment,
            snr: raw.snr.filter(|s| s.is_finite()),
            observed_at,
            ingested_at,
        })
    }

    pub fn key(&self) -> SpotKey {
        SpotKey {
            destination_call: self.destination_call.clone(),
            frequency_hz: self.frequency_hz,
            origin_call: self.origin_call.clone(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.observed_at
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.age(now).num_minutes()
    }

    pub fn signal(&self) -> SignalClass {
        classify(self.snr)
    }

    /// Both endpoints, when both are known.
    pub fn endpoints(&self) -> Option<(GeoPoint, GeoPoint)> {
        Some((self.origin_point?, self.destination_point?))
    }

    /// Renderable geometry for this spot's path, `None` when either endpoint is unknown.
    pub fn path(&self, steps: usize) -> Option<PathGeometry> {
        let (origin, destination) = self.endpoints()?;
        Some(PathGeometry {
            key: self.key(),
            points: interpolate_great_circle(origin, destination, steps).collect(),
            signal: self.signal(),
            distance_km: origin.distance_km(&destination),
            bearing: origin.initial_bearing(&destination),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathGeometry {
    pub key: SpotKey,
    pub points: Vec<GeoPoint>,
    pub signal: SignalClass,
    pub distance_km: f64,
    pub bearing: f64,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Explicit coordinates win over the locator when both are valid.
fn resolve_point(lat: Option<f64>, lon: Option<f64>, locator: Option<&str>) -> Option<GeoPoint> {
    lat.zip(lon)
        .and_then(|(lat, lon)| GeoPoint::checked(lat, lon))
        .or_else(|| locator.and_then(decode_locator))
}
