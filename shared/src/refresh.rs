use crate::aggregator::{IngestSummary, SharedAggregator, SpotAggregator};
use crate::error::FetchError;
use crate::spots::RawBatch;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval for the primary spot feed.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Interval for third-party reporting networks that rate-limit their clients.
pub const DEFAULT_RATE_LIMITED_INTERVAL: Duration = Duration::from_secs(300);

/// Parameters forwarded to the source on every fetch. Changing them restarts the cycle.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FetchParams {
    pub target_callsign: Option<String>,
    pub window_minutes: Option<u32>,
}

pub trait BatchSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn fetch(
        &self,
        params: &FetchParams,
    ) -> impl Future<Output = Result<RawBatch, FetchError>> + Send;
}

/// Outcome of the most recent refresh attempts. A non-zero `consecutive_failures` is the
/// transient error flag consumers show next to the (possibly stale) retained spots.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_summary: Option<IngestSummary>,
}

impl RefreshStatus {
    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Periodically pulls batches from one source into an aggregator.
///
/// The loop holds only a weak reference to the aggregator: once every strong handle is
/// dropped, a fetch that completes afterwards is discarded and the loop ends.
pub struct RefreshScheduler {
    source_name: String,
    params_tx: watch::Sender<FetchParams>,
    status: Arc<RwLock<RefreshStatus>>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Starts the loop; the first fetch happens immediately. `shutdown` is used as a parent
    /// token, so cancelling it stops this scheduler too.
    pub fn spawn<S: BatchSource>(
        source: S,
        aggregator: &SharedAggregator,
        interval: Duration,
        params: FetchParams,
        shutdown: &CancellationToken,
    ) -> Self {
        let source_name = source.name().to_string();
        let (params_tx, params_rx) = watch::channel(params);
        let status = Arc::new(RwLock::new(RefreshStatus::default()));
        let shutdown = shutdown.child_token();

        let handle = tokio::spawn(refresh_loop(
            source,
            Arc::downgrade(aggregator),
            interval,
            params_rx,
            Arc::clone(&status),
            shutdown.clone(),
        ));

        Self {
            source_name,
            params_tx,
            status,
            shutdown,
            handle,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Cancels the pending wait and begins a new cycle right away. A fetch already in flight
    /// runs to completion and its batch is still merged. Identical params are a no-op.
    pub fn update_params(&self, params: FetchParams) -> bool {
        self.params_tx.send_if_modified(|current| {
            if *current == params {
                false
            } else {
                *current = params;
                true
            }
        })
    }

    pub fn params(&self) -> FetchParams {
        self.params_tx.borrow().clone()
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.read().clone()
    }

    /// Shared view of the status for tasks that outlive a borrow of the scheduler.
    pub fn status_handle(&self) -> Arc<RwLock<RefreshStatus>> {
        Arc::clone(&self.status)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the loop and waits for it to exit. Results of an in-flight fetch are discarded.
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        self.shutdown.cancel();
        self.handle.await
    }
}

async fn refresh_loop<S: BatchSource>(
    source: S,
    aggregator: Weak<RwLock<SpotAggregator>>,
    interval: Duration,
    mut params_rx: watch::Receiver<FetchParams>,
    status: Arc<RwLock<RefreshStatus>>,
    shutdown: CancellationToken,
) {
    let name = source.name().to_string();
    info!(name: "refresh.loop.initialized", source = %name, interval = ?interval, "initialized refresh loop");

    loop {
        if aggregator.strong_count() == 0 {
            info!(name: "refresh.loop.orphaned", source = %name, "aggregator dropped, exiting refresh loop");
            break;
        }

        let params = params_rx.borrow_and_update().clone();
        status.write().last_attempt = Some(Utc::now());

        let result = tokio::select! {
            result = source.fetch(&params) => result,
            () = shutdown.cancelled() => {
                info!(name: "refresh.loop.shutdown", source = %name, "shutdown requested during fetch, discarding result");
                break;
            }
        };

        // Orphaned loops exit whatever the fetch outcome.
        let Some(store) = aggregator.upgrade() else {
            info!(name: "refresh.loop.orphaned", source = %name, "aggregator dropped, discarding fetch result");
            break;
        };

        match result {
            Ok(batch) => {
                let received = batch.reports.len() + batch.undecodable;
                let mut summary = store.write().ingest(batch.reports);
                summary.malformed += batch.undecodable;
                debug!(
                    name: "refresh.fetch.merged",
                    source = %name,
                    received,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    malformed = summary.malformed,
                    "merged fetched batch"
                );

                let mut status = status.write();
                status.last_success = status.last_attempt;
                status.last_error = None;
                status.consecutive_failures = 0;
                status.last_summary = Some(summary);
            }
            Err(e) => {
                warn!(name: "refresh.fetch.failed", source = %name, error = ?e, "failed to fetch batch, keeping retained spots");
                let mut status = status.write();
                status.last_error = Some(e.to_string());
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            }
        }
        drop(store);

        tokio::select! {
            () = sleep(interval) => {}
            changed = params_rx.changed() => {
                if changed.is_err() {
                    info!(name: "refresh.loop.closed", source = %name, "scheduler handle dropped, exiting refresh loop");
                    break;
                }
                info!(name: "refresh.params.changed", source = %name, "fetch parameters changed, restarting cycle");
            }
            () = shutdown.cancelled() => {
                info!(name: "refresh.loop.shutdown", source = %name, "shutdown requested, exiting refresh loop");
                break;
            }
        }
    }
}
