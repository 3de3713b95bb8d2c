use chrono::{TimeZone, Utc};
use shared::callsign::Continent;
use shared::error::FetchError;
use shared::{parse_config, shutdown_listener};
use shared::refresh::{DEFAULT_RATE_LIMITED_INTERVAL, DEFAULT_REFRESH_INTERVAL};
use shared::spots::parse_batch;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn empty_config_uses_defaults() {
    let config = parse_config("").unwrap();
    assert_eq!(config.aggregator.retention_minutes, 30);
    assert_eq!(config.aggregator.max_capacity, 200);
    assert!(config.sources.is_empty());
    assert!(config.filter.is_empty());
    assert_eq!(config.summary.path_steps, 32);
    assert!(config.resolver.table_path.is_none());
}

#[test]
fn parses_sources_query_and_filter() {
    let config = parse_config(
        r#"
        [aggregator]
        retention_minutes = 10

        [[sources]]
        name = "cluster"
        url = "http://localhost/spots"

        [[sources]]
        name = "reporters"
        url = "http://localhost/reports"
        interval_seconds = 120
        timeout_seconds = 0

        [query]
        target_callsign = "K1ABC"

        [filter]
        continents = ["EU"]
        cq_zones = [14, 15]
        bands = ["20m"]
        "#,
    )
    .unwrap();

    assert_eq!(config.aggregator.build().retention().num_minutes(), 10);
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[0].interval(), Duration::from_secs(30));
    assert_eq!(config.sources[1].interval(), Duration::from_secs(120));
    assert_eq!(config.sources[1].timeout(), Duration::from_secs(1));
    assert_eq!(config.query.target_callsign.as_deref(), Some("K1ABC"));
    assert_eq!(config.query.window_minutes, None);
    assert!(config.filter.continents.contains(&Continent::EU));
    assert_eq!(config.filter.cq_zones.len(), 2);
    assert!(!config.filter.is_empty());
}

#[test]
fn source_without_url_is_rejected() {
    assert!(parse_config("[[sources]]\nname = \"cluster\"\n").is_err());
}

#[test]
fn parses_bare_array_batches() {
    let batch = parse_batch(
        r#"[
            {"spotter": "K1ABC", "dxCall": "G0XYZ", "frequencyKhz": 14074.0,
             "observedAt": "2024-03-09T18:00:00Z", "spotterGrid": "FN31", "snr": -12},
            {"originCall": "W1AW", "destinationCall": "DL1ABC", "frequencyHz": 7074000,
             "observedAt": 1710007200000}
        ]"#,
    )
    .unwrap()
    .reports;

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].origin_call.as_deref(), Some("K1ABC"));
    assert_eq!(batch[0].frequency_khz, Some(14074.0));
    assert_eq!(batch[0].origin_locator.as_deref(), Some("FN31"));
    assert_eq!(batch[0].snr, Some(-12.0));
    assert_eq!(
        batch[1].observed_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 9, 18, 0, 0).unwrap())
    );
    assert_eq!(batch[0].observed_at, batch[1].observed_at);
}

#[test]
fn wrapped_batches_drop_undecodable_items() {
    let batch = parse_batch(
        r#"{"spots": [
            {"sender": "K1ABC", "receiver": "G0XYZ", "frequencyHz": 14074000},
            {"sender": 42},
            "not a report"
        ]}"#,
    )
    .unwrap();
    assert_eq!(batch.reports.len(), 1);
    assert_eq!(batch.undecodable, 2);
    assert_eq!(batch.reports[0].destination_call.as_deref(), Some("G0XYZ"));

    let empty = parse_batch(r#"{"reports": []}"#).unwrap();
    assert!(empty.reports.is_empty());
    assert_eq!(empty.undecodable, 0);
}

#[test]
fn rejects_bodies_that_are_not_batches() {
    assert!(matches!(parse_batch(r#"{"count": 3}"#), Err(FetchError::NotABatch)));
    assert!(matches!(parse_batch(r#"{"spots": 3}"#), Err(FetchError::NotABatch)));
    assert!(matches!(parse_batch("17"), Err(FetchError::NotABatch)));
    assert!(matches!(parse_batch("<html>"), Err(FetchError::Deserialize(_))));
}

#[test]
fn lat_lon_fields_decode_alongside_locators() {
    let body = serde_json::json!({
        "reports": [{
            "sender": "JA1ABC",
            "receiver": "VK2ABC",
            "frequencyHz": 21074000.0,
            "originLat": 35.68,
            "originLon": 139.69,
            "receiverLocator": "QF56",
            "observedAt": "2024-03-09T18:00:00+09:00"
        }]
    })
    .to_string();

    let batch = parse_batch(&body).unwrap().reports;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].origin_lat, Some(35.68));
    assert_eq!(batch[0].destination_locator.as_deref(), Some("QF56"));
    assert_eq!(
        batch[0].observed_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap())
    );
}

#[test]
fn rate_limited_sources_default_to_five_minutes() {
    let config = parse_config(
        r#"
        [[sources]]
        name = "cluster"
        url = "http://localhost/spots"

        [[sources]]
        name = "reporters"
        url = "http://localhost/reports"
        rate_limited = true

        [[sources]]
        name = "reporters-fast"
        url = "http://localhost/reports"
        rate_limited = true
        interval_seconds = 60
        "#,
    )
    .unwrap();

    let intervals: Vec<Duration> = config.sources.iter().map(|s| s.interval()).collect();
    assert_eq!(
        intervals,
        [
            DEFAULT_REFRESH_INTERVAL,
            DEFAULT_RATE_LIMITED_INTERVAL,
            Duration::from_secs(60)
        ]
    );
    assert_eq!(DEFAULT_RATE_LIMITED_INTERVAL, Duration::from_secs(300));
}

#[tokio::test]
async fn shutdown_listener_returns_once_cancelled_elsewhere() {
    let token = CancellationToken::new();
    let listener = tokio::spawn(shutdown_listener(token.clone()));

    token.cancel();
    let res = tokio::time::timeout(Duration::from_secs(5), listener).await;
    assert!(matches!(res, Ok(Ok(Ok(())))));
}
