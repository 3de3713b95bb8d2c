#![warn(clippy::pedantic)]
mod error;
mod source;

use crate::error::MainError;
use crate::source::HttpBatchSource;
use chrono::{TimeDelta, Utc};
use parking_lot::RwLock;
use shared::aggregator::SharedAggregator;
use shared::callsign::PrefixTable;
use shared::error::InitializationError;
use shared::filter::FilterConfig;
use shared::refresh::{RefreshScheduler, RefreshStatus};
use shared::{Config, SummaryConfig, init_tracing, load_config, shutdown_listener};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, event_enabled, info, warn};

type SourceStatus = (String, Arc<RwLock<RefreshStatus>>);

#[tokio::main]
async fn main() -> Result<(), MainError> {
    init_tracing()?;

    let config = load_config().map_err(InitializationError::from)?;
    info!(name: "config.loaded", config = ?config, "config loaded");

    let resolver = config.resolver.build()?;
    info!(name: "resolver.loaded", prefixes = resolver.len(), "callsign prefix table loaded");

    let aggregator = config.aggregator.build().shared();
    let filter = Arc::new(RwLock::new(config.filter.clone()));

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let mut signal_handle = tokio::spawn(shutdown_listener(shutdown_token.clone()));

    let mut schedulers = Vec::with_capacity(config.sources.len());
    for source_config in &config.sources {
        let source = HttpBatchSource::new(source_config).map_err(|source| MainError::HttpClient {
            name: source_config.name.clone(),
            source,
        })?;
        schedulers.push(RefreshScheduler::spawn(
            source,
            &aggregator,
            source_config.interval(),
            config.query.clone(),
            &shutdown_token,
        ));
    }
    if schedulers.is_empty() {
        warn!(name: "sources.empty", "no sources configured, the spot set will stay empty");
    }

    let statuses: Vec<SourceStatus> = schedulers
        .iter()
        .map(|s| (s.source_name().to_string(), s.status_handle()))
        .collect();

    let mut summary_handle = tokio::spawn(summary_loop(
        Arc::clone(&aggregator),
        resolver,
        Arc::clone(&filter),
        config.summary.clone(),
        statuses,
        shutdown_token.clone(),
    ));

    #[cfg(unix)]
    let reload = reload_on_hangup(&aggregator, &filter, &schedulers, &shutdown_token);
    #[cfg(not(unix))]
    let reload = async {
        shutdown_token.cancelled().await;
        Ok::<(), std::io::Error>(())
    };

    let mut first_err: Option<MainError> = None;
    let mut summary_done = false;

    tokio::select! {
        res = &mut summary_handle => {
            info!(name: "summary.completed", "summary task completed first, propagating cancellation token to other tasks");
            summary_done = true;
            shutdown_token.cancel();
            if let Err(join) = res {
                warn!(name: "summary.completed", error = ?join, "summary task completed due to error");
                first_err.get_or_insert(join.into());
            }
        }
        res = &mut signal_handle => {
            info!(name: "listener.completed", "SIGINT/SIGTERM listener task completed first, propagating cancellation token to other tasks");
            shutdown_token.cancel();
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(name: "listener.completed", error = ?e, "could not install SIGINT/SIGTERM handlers");
                    first_err.get_or_insert(e.into());
                }
                Err(join) => {
                    warn!(name: "listener.completed", error = ?join, "error with SIGINT/SIGTERM listener task");
                    first_err.get_or_insert(join.into());
                }
            }
        }
        res = reload => {
            shutdown_token.cancel();
            if let Err(e) = res {
                warn!(name: "reload.completed", error = ?e, "hangup listener failed");
                first_err.get_or_insert(e.into());
            }
        }
    }

    for scheduler in schedulers {
        let name = scheduler.source_name().to_string();
        if let Err(join) = scheduler.stop().await {
            warn!(name: "refresh.completed", source = %name, error = ?join, "refresh task completed with error");
            first_err.get_or_insert(join.into());
        }
    }

    if !summary_done && let Err(join) = summary_handle.await {
        warn!(name: "summary.completed", error = ?join, "summary task completed with error");
        first_err.get_or_insert(join.into());
    }

    if let Some(err) = first_err {
        Err(err)
    } else {
        Ok(())
    }
}

/// Plays the part of the list/map consumer: periodically queries the aggregator and reports
/// what a renderer would draw.
async fn summary_loop(
    aggregator: SharedAggregator,
    resolver: PrefixTable,
    filter: Arc<RwLock<FilterConfig>>,
    summary: SummaryConfig,
    statuses: Vec<SourceStatus>,
    shutdown: CancellationToken,
) {
    let interval = Duration::from_secs(summary.interval_seconds.max(1));
    loop {
        tokio::select! {
            () = sleep(interval) => {},
            () = shutdown.cancelled() => {
                info!(name: "summary_loop.shutdown.requested", "shutdown requested, exiting summary loop");
                break;
            }
        }

        let view = {
            let filter = filter.read();
            aggregator.read().query(&filter, &resolver)
        };
        let stale_sources: Vec<&str> = statuses
            .iter()
            .filter(|(_, status)| status.read().is_failing())
            .map(|(name, _)| name.as_str())
            .collect();

        info!(
            name: "summary_loop.view",
            spots = view.list.len(),
            paths = view.paths.len(),
            stale_sources = ?stale_sources,
            "spot view refreshed"
        );

        if event_enabled!(Level::DEBUG) {
            let now = Utc::now();
            for report in view.list.iter().take(10) {
                let path = report.path(summary.path_steps);
                debug!(
                    origin = %report.origin_call,
                    destination = %report.destination_call,
                    band = report.band.unwrap_or("?"),
                    mode = report.mode.as_deref().unwrap_or("?"),
                    age_minutes = report.age_minutes(now),
                    signal = ?report.signal(),
                    color = report.signal().color(),
                    distance_km = path.as_ref().map(|p| p.distance_km.round()),
                    points = path.as_ref().map(|p| p.points.len()),
                    "spot"
                );
            }
        }
    }
}

/// Re-reads the settings file on SIGHUP and applies what can change at runtime: fetch
/// parameters, the filter and the retention window.
#[cfg(unix)]
async fn reload_on_hangup(
    aggregator: &SharedAggregator,
    filter: &Arc<RwLock<FilterConfig>>,
    schedulers: &[RefreshScheduler],
    shutdown: &CancellationToken,
) -> Result<(), std::io::Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    return Ok(());
                }
            }
            () = shutdown.cancelled() => return Ok(()),
        }

        match load_config() {
            Ok(config) => apply_reload(&config, aggregator, filter, schedulers),
            Err(e) => warn!(name: "reload.failed", error = ?e, "could not reload configuration, keeping current settings"),
        }
    }
}

#[cfg(unix)]
fn apply_reload(
    config: &Config,
    aggregator: &SharedAggregator,
    filter: &Arc<RwLock<FilterConfig>>,
    schedulers: &[RefreshScheduler],
) {
    *filter.write() = config.filter.clone();

    let retention = TimeDelta::minutes(config.aggregator.retention_minutes.max(0));
    let evicted = aggregator.write().set_retention_window(retention);

    let restarted = schedulers
        .iter()
        .filter(|s| s.update_params(config.query.clone()))
        .count();

    info!(
        name: "reload.applied",
        retention_minutes = retention.num_minutes(),
        evicted,
        restarted,
        "configuration reloaded"
    );
}
