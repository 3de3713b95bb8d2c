mod common;

use chrono::TimeDelta;
use common::{located, minutes, raw, t0};
use shared::aggregator::{DEFAULT_MAX_CAPACITY, SpotAggregator};
use shared::callsign::PrefixTable;
use shared::filter::FilterConfig;
use shared::signal::SignalClass;
use shared::spots::{RawReport, SpotKey};

#[test]
fn ingests_and_expires_a_spot() {
    let mut aggregator = SpotAggregator::default();
    let spot = RawReport {
        snr: Some(-5.0),
        ..located("K1ABC", "FN31", "G0XYZ", "IO91", 14_097_000.0, t0())
    };

    let summary = aggregator.ingest_at([spot], t0());
    assert_eq!(summary.inserted, 1);
    assert_eq!(aggregator.len(), 1);

    let view = aggregator.query(&FilterConfig::default(), &PrefixTable::builtin());
    assert_eq!(view.list.len(), 1);
    assert_eq!(view.paths.len(), 1);
    let report = &view.list[0];
    assert_eq!(report.band, Some("20m"));
    assert_eq!(report.signal(), SignalClass::Moderate);
    assert_eq!(report.age_minutes(t0() + minutes(12)), 12);
    assert!(report.path(16).is_some_and(|p| p.points.len() == 17));

    let summary = aggregator.ingest_at(Vec::new(), t0() + minutes(31));
    assert_eq!(summary.expired, 1);
    assert!(aggregator.is_empty());
}

#[test]
fn spot_exactly_at_the_retention_edge_is_kept() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at([raw("K1ABC", "G0XYZ", 14_074_000.0, t0())], t0());

    aggregator.ingest_at(Vec::new(), t0() + minutes(30));
    assert_eq!(aggregator.len(), 1);
}

#[test]
fn repeated_batches_are_idempotent() {
    let batch = vec![
        raw("K1ABC", "G0XYZ", 14_074_000.0, t0()),
        raw("K1ABC", "F5ABC", 7_074_000.0, t0() - minutes(2)),
    ];
    let mut aggregator = SpotAggregator::default();

    aggregator.ingest_at(batch.clone(), t0());
    let first = aggregator.query(&FilterConfig::default(), &PrefixTable::builtin());
    let summary = aggregator.ingest_at(batch, t0());
    let second = aggregator.query(&FilterConfig::default(), &PrefixTable::builtin());

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(first, second);
}

#[test]
fn duplicates_are_case_insensitive_and_keep_first_ingestion() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at([raw("k1abc", "g0xyz", 14_074_000.0, t0())], t0());

    let later = RawReport {
        snr: Some(7.0),
        ..raw("K1ABC", "G0XYZ ", 14_074_000.0, t0() + minutes(1))
    };
    let summary = aggregator.ingest_at([later], t0() + minutes(1));
    assert_eq!(summary.updated, 1);
    assert_eq!(aggregator.len(), 1);

    let stored = aggregator
        .get(&SpotKey::new("G0XYZ", 14_074_000, "K1ABC"))
        .unwrap();
    assert_eq!(stored.snr, Some(7.0));
    assert_eq!(stored.observed_at, t0() + minutes(1));
    assert_eq!(stored.ingested_at, t0());
}

#[test]
fn older_duplicate_does_not_replace_newer_observation() {
    let mut aggregator = SpotAggregator::default();
    let newer = RawReport {
        snr: Some(3.0),
        ..raw("K1ABC", "G0XYZ", 14_074_000.0, t0())
    };
    let older = RawReport {
        snr: Some(-18.0),
        ..raw("K1ABC", "G0XYZ", 14_074_000.0, t0() - minutes(5))
    };

    let summary = aggregator.ingest_at([newer, older], t0());
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.ignored_older, 1);

    let stored = aggregator
        .get(&SpotKey::new("G0XYZ", 14_074_000, "K1ABC"))
        .unwrap();
    assert_eq!(stored.snr, Some(3.0));
}

#[test]
fn different_frequency_is_a_different_spot() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at(
        [
            raw("K1ABC", "G0XYZ", 14_074_000.0, t0()),
            raw("K1ABC", "G0XYZ", 14_074_500.0, t0()),
        ],
        t0(),
    );
    assert_eq!(aggregator.len(), 2);
}

#[test]
fn malformed_items_are_skipped_without_losing_the_batch() {
    let mut aggregator = SpotAggregator::default();
    let batch = vec![
        raw("K1ABC", "G0XYZ", 14_074_000.0, t0()),
        RawReport {
            origin_call: None,
            ..raw("", "G0XYZ", 14_074_000.0, t0())
        },
        raw("K1ABC", "G0XYZ", f64::NAN, t0()),
        RawReport {
            observed_at: None,
            ..raw("K1ABC", "G0XYZ", 7_074_000.0, t0())
        },
        raw("W1AW", "DL1ABC", 3_573_000.0, t0()),
    ];

    let summary = aggregator.ingest_at(batch, t0());
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.malformed, 3);
    assert_eq!(aggregator.len(), 2);
}

#[test]
fn shrinking_retention_evicts_immediately() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at(
        [
            raw("K1ABC", "G0XYZ", 14_074_000.0, t0() - minutes(20)),
            raw("K1ABC", "F5ABC", 14_074_000.0, t0() - minutes(5)),
        ],
        t0(),
    );

    let evicted = aggregator.set_retention_window_at(minutes(10), t0());
    assert_eq!(evicted, 1);
    assert_eq!(aggregator.len(), 1);
    assert_eq!(aggregator.retention(), minutes(10));
}

#[test]
fn capacity_keeps_the_most_recent_spots() {
    let mut aggregator = SpotAggregator::default();
    let batch: Vec<RawReport> = (0..250i64)
        .map(|i| {
            raw(
                &format!("K{i}ABC"),
                "G0XYZ",
                14_074_000.0,
                t0() - TimeDelta::seconds(i),
            )
        })
        .collect();

    let summary = aggregator.ingest_at(batch, t0());
    assert_eq!(summary.over_capacity, 50);
    assert_eq!(aggregator.len(), DEFAULT_MAX_CAPACITY);
    assert!(aggregator.get(&SpotKey::new("G0XYZ", 14_074_000, "K0ABC")).is_some());
    assert!(aggregator.get(&SpotKey::new("G0XYZ", 14_074_000, "K199ABC")).is_some());
    assert!(aggregator.get(&SpotKey::new("G0XYZ", 14_074_000, "K200ABC")).is_none());

    let dropped = aggregator.set_max_capacity(10);
    assert_eq!(dropped, 190);
}

#[test]
fn query_orders_by_recency_and_paths_are_a_subset() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at(
        [
            raw("K1ABC", "G0XYZ", 14_074_000.0, t0() - minutes(3)),
            located("W1AW", "FN31", "DL1ABC", "JO62", 7_074_000.0, t0() - minutes(1)),
            RawReport {
                origin_lat: Some(35.0),
                origin_lon: Some(139.0),
                ..located("JA1ABC", "", "VK2ABC", "QF56", 21_074_000.0, t0() - minutes(2))
            },
        ],
        t0(),
    );

    let view = aggregator.query(&FilterConfig::default(), &PrefixTable::builtin());
    let order: Vec<&str> = view.list.iter().map(|r| r.origin_call.as_str()).collect();
    assert_eq!(order, ["W1AW", "JA1ABC", "K1ABC"]);

    let paths: Vec<&str> = view.paths.iter().map(|r| r.origin_call.as_str()).collect();
    assert_eq!(paths, ["W1AW", "JA1ABC"]);
    assert!(view.paths.iter().all(|p| view.list.contains(p)));
}

#[test]
fn query_applies_the_filter() {
    let mut aggregator = SpotAggregator::default();
    aggregator.ingest_at(
        [
            raw("K1ABC", "G0XYZ", 14_074_000.0, t0()),
            raw("K1ABC", "G0XYZ", 7_074_000.0, t0()),
        ],
        t0(),
    );

    let filter = FilterConfig {
        bands: ["40m".to_string()].into(),
        ..FilterConfig::default()
    };
    let view = aggregator.query(&filter, &PrefixTable::builtin());
    assert_eq!(view.list.len(), 1);
    assert_eq!(view.list[0].band, Some("40m"));
    assert!(view.paths.is_empty());
}
