use crate::callsign::CallsignResolver;
use crate::filter::{FilterConfig, matches};
use crate::spots::{RawReport, Report, SpotKey};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Level, debug, event_enabled, trace};

pub const DEFAULT_MAX_CAPACITY: usize = 200;
pub const DEFAULT_RETENTION_MINUTES: i64 = 30;

pub type SharedAggregator = Arc<RwLock<SpotAggregator>>;

/// The retained, deduplicated working set of spots.
#[derive(Debug, Clone)]
pub struct SpotAggregator {
    spots: HashMap<SpotKey, Report>,
    retention: TimeDelta,
    max_capacity: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Incoming duplicates older than what is already retained.
    pub ignored_older: usize,
    pub malformed: usize,
    pub expired: usize,
    pub over_capacity: usize,
}

/// Derived views handed to consumers; rebuilt on every query.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct SpotView {
    /// Every matching spot, most recent first.
    pub list: Vec<Report>,
    /// The subset of `list` with both endpoints geolocated.
    pub paths: Vec<Report>,
}

impl Default for SpotAggregator {
    fn default() -> Self {
        Self::new(
            TimeDelta::minutes(DEFAULT_RETENTION_MINUTES),
            DEFAULT_MAX_CAPACITY,
        )
    }
}

impl SpotAggregator {
    pub fn new(retention: TimeDelta, max_capacity: usize) -> Self {
        Self {
            spots: HashMap::new(),
            retention,
            max_capacity,
        }
    }

    pub fn shared(self) -> SharedAggregator {
        Arc::new(RwLock::new(self))
    }

    pub fn retention(&self) -> TimeDelta {
        self.retention
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn get(&self, key: &SpotKey) -> Option<&Report> {
        self.spots.get(key)
    }

    pub fn ingest<I>(&mut self, batch: I) -> IngestSummary
    where
        I: IntoIterator<Item = RawReport>,
    {
        self.ingest_at(batch, Utc::now())
    }

    /// Merges a batch in order, then evicts by age and trims to capacity.
    ///
    /// A duplicate key replaces the retained report unless it was observed earlier than it,
    /// so reordered batches converge on the latest observation. The replaced report's
    /// `ingested_at` carries over.
    pub fn ingest_at<I>(&mut self, batch: I, now: DateTime<Utc>) -> IngestSummary
    where
        I: IntoIterator<Item = RawReport>,
    {
        let mut summary = IngestSummary::default();

        for raw in batch {
            let mut report = match Report::from_raw(raw, now) {
                Ok(report) => report,
                Err(e) => {
                    debug!(error = %e, "skipping malformed report");
                    summary.malformed += 1;
                    continue;
                }
            };

            let key = report.key();
            match self.spots.get_mut(&key) {
                Some(existing) if report.observed_at < existing.observed_at => {
                    summary.ignored_older += 1;
                }
                Some(existing) => {
                    report.ingested_at = existing.ingested_at;
                    *existing = report;
                    summary.updated += 1;
                }
                None => {
                    self.spots.insert(key, report);
                    summary.inserted += 1;
                }
            }
        }

        summary.expired = self.evict_expired(now);
        summary.over_capacity = self.enforce_capacity();

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            ignored_older = summary.ignored_older,
            malformed = summary.malformed,
            expired = summary.expired,
            over_capacity = summary.over_capacity,
            retained = self.spots.len(),
            "ingested batch"
        );
        summary
    }

    pub fn set_retention_window(&mut self, retention: TimeDelta) -> usize {
        self.set_retention_window_at(retention, Utc::now())
    }

    /// Applies the new window to the retained set immediately; returns how many spots were
    /// dropped.
    pub fn set_retention_window_at(&mut self, retention: TimeDelta, now: DateTime<Utc>) -> usize {
        self.retention = retention;
        self.evict_expired(now)
    }

    pub fn set_max_capacity(&mut self, max_capacity: usize) -> usize {
        self.max_capacity = max_capacity;
        self.enforce_capacity()
    }

    pub fn query<R>(&self, config: &FilterConfig, resolver: &R) -> SpotView
    where
        R: CallsignResolver + ?Sized,
    {
        let mut list: Vec<Report> = self
            .spots
            .values()
            .filter(|report| matches(report, config, resolver))
            .cloned()
            .collect();
        list.sort_by(by_recency);

        let paths = list
            .iter()
            .filter(|report| report.endpoints().is_some())
            .cloned()
            .collect();

        SpotView { list, paths }
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.spots.len();
        let retention = self.retention;
        self.spots.retain(|key, report| {
            let keep = report.age(now) <= retention;
            if !keep && event_enabled!(Level::TRACE) {
                trace!(key = ?key, observed_at = %report.observed_at, "evicting expired spot");
            }
            keep
        });
        before - self.spots.len()
    }

    fn enforce_capacity(&mut self) -> usize {
        if self.spots.len() <= self.max_capacity {
            return 0;
        }

        let mut ranked: Vec<&Report> = self.spots.values().collect();
        ranked.sort_by(|a, b| by_recency(a, b));
        let dropped: Vec<SpotKey> = ranked
            .into_iter()
            .skip(self.max_capacity)
            .map(Report::key)
            .collect();

        for key in &dropped {
            self.spots.remove(key);
        }
        trace!(count = dropped.len(), "dropped spots over capacity");
        dropped.len()
    }
}

/// Newest observation first, then newest ingestion, then key for a stable order.
fn by_recency(a: &Report, b: &Report) -> Ordering {
    b.observed_at
        .cmp(&a.observed_at)
        .then_with(|| b.ingested_at.cmp(&a.ingested_at))
        .then_with(|| a.key().cmp(&b.key()))
}
