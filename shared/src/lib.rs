pub mod aggregator;
pub mod bands;
pub mod callsign;
pub mod filter;
pub mod geo;
pub mod refresh;
pub mod signal;
pub mod spots;

use crate::aggregator::{DEFAULT_MAX_CAPACITY, DEFAULT_RETENTION_MINUTES, SpotAggregator};
use crate::callsign::PrefixTable;
use crate::error::{ConfigError, InitializationError};
use crate::filter::FilterConfig;
use crate::refresh::{DEFAULT_RATE_LIMITED_INTERVAL, DEFAULT_REFRESH_INTERVAL, FetchParams};
use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const ENV_VAR_PREFIX: &str = "SPOTMAP__";
pub const SETTINGS_FILE: &str = "Settings.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub sources: Vec<SourceConfig>,
    pub query: FetchParams,
    pub filter: FilterConfig,
    pub summary: SummaryConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AggregatorConfig {
    pub retention_minutes: i64,
    pub max_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            retention_minutes: DEFAULT_RETENTION_MINUTES,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl AggregatorConfig {
    pub fn build(&self) -> SpotAggregator {
        SpotAggregator::new(
            TimeDelta::minutes(self.retention_minutes.max(0)),
            self.max_capacity,
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Third-party networks that throttle clients; polled every 5 minutes unless
    /// `interval_seconds` says otherwise.
    #[serde(default)]
    pub rate_limited: bool,
    pub interval_seconds: Option<u64>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl SourceConfig {
    pub fn interval(&self) -> Duration {
        match self.interval_seconds {
            Some(seconds) => Duration::from_secs(seconds.max(1)),
            None if self.rate_limited => DEFAULT_RATE_LIMITED_INTERVAL,
            None => DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    pub interval_seconds: u64,
    pub path_steps: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_REFRESH_INTERVAL.as_secs(),
            path_steps: 32,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// `PREFIX,CQ,ITU,CONTINENT` file replacing the built-in prefix table.
    pub table_path: Option<PathBuf>,
}

impl ResolverConfig {
    pub fn build(&self) -> Result<PrefixTable, InitializationError> {
        match &self.table_path {
            Some(path) => Ok(PrefixTable::load(path)?),
            None => Ok(PrefixTable::builtin()),
        }
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Toml::file(SETTINGS_FILE))
        .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
        .extract::<Config>()?)
}

pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    Ok(Figment::new().merge(Toml::string(toml)).extract::<Config>()?)
}

pub fn init_tracing() -> Result<(), InitializationError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels `token`, or returns quietly once `token` is
/// cancelled by someone else.
pub async fn shutdown_listener(token: CancellationToken) -> Result<(), std::io::Error> {
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!(name: "shutdown.ctrl_c", "received Ctrl+C, stopping spot refresh");
        }
        _ = terminated => info!(name: "shutdown.sigterm", "received SIGTERM, stopping spot refresh"),
        () = token.cancelled() => return Ok(()),
    }

    token.cancel();
    Ok(())
}

pub mod error {
    use std::num::ParseIntError;
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
        #[error("failed to load callsign prefix table: {0}")]
        PrefixTable(#[from] PrefixTableError),
    }

    #[derive(Debug, Error)]
    pub enum PrefixTableError {
        #[error(transparent)]
        Io(#[from] std::io::Error),
        #[error("line {line}: expected 4 comma-separated fields, found {found}")]
        FieldCount { line: usize, found: usize },
        #[error("line {line}: invalid zone number")]
        Zone {
            line: usize,
            #[source]
            source: ParseIntError,
        },
        #[error("unknown continent code {0:?}")]
        UnknownContinent(String),
    }

    /// A batch item that cannot become a report. Skipped without affecting the rest of the
    /// batch.
    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum MalformedReport {
        #[error("missing origin callsign")]
        MissingOriginCall,
        #[error("missing destination callsign")]
        MissingDestinationCall,
        #[error("missing frequency")]
        MissingFrequency,
        #[error("invalid frequency {0}")]
        InvalidFrequency(f64),
        #[error("missing observation time")]
        MissingObservedAt,
    }

    #[derive(Debug, Error)]
    pub enum FetchError {
        #[error("request failed: {0}")]
        Request(#[source] Box<dyn std::error::Error + Send + Sync>),
        #[error("unexpected HTTP status {0}")]
        Status(u16),
        #[error(transparent)]
        Deserialize(#[from] serde_json::Error),
        #[error("response body is not a batch of reports")]
        NotABatch,
    }

    impl FetchError {
        pub fn request<E>(error: E) -> Self
        where
            E: std::error::Error + Send + Sync + 'static,
        {
            FetchError::Request(Box::new(error))
        }
    }
}
