#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use shared::spots::{RawReport, Report};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> TimeDelta {
    TimeDelta::minutes(n)
}

pub fn raw(origin: &str, destination: &str, frequency_hz: f64, observed_at: DateTime<Utc>) -> RawReport {
    RawReport {
        origin_call: Some(origin.to_string()),
        destination_call: Some(destination.to_string()),
        frequency_hz: Some(frequency_hz),
        observed_at: Some(observed_at),
        ..RawReport::default()
    }
}

pub fn located(
    origin: &str,
    origin_locator: &str,
    destination: &str,
    destination_locator: &str,
    frequency_hz: f64,
    observed_at: DateTime<Utc>,
) -> RawReport {
    RawReport {
        origin_locator: Some(origin_locator.to_string()),
        destination_locator: Some(destination_locator.to_string()),
        ..raw(origin, destination, frequency_hz, observed_at)
    }
}

pub fn report(raw: RawReport) -> Report {
    Report::from_raw(raw, t0()).unwrap()
}
