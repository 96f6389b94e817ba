//! Runtime settings for the task engine.
//!
//! Values are layered: built-in defaults, then `DIVAN_*` environment
//! variables, then whatever the binary's command line overrides.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::db::default_db_path;

/// Accepted matches between two progress events.
pub const DEFAULT_PROGRESS_BATCH: usize = 217;

/// Mirrors polled, in order, for the latest version information.
pub const DEFAULT_UPDATE_MIRRORS: [&str; 3] = [
    "http://srazi.github.io/Saaghar/saaghar.version",
    "http://saaghar.sourceforge.net/saaghar.version",
    "http://en.saaghar.pozh.org/saaghar.version",
];

pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_DATABASE: &str = "DIVAN_DB";
pub const ENV_THREADS: &str = "DIVAN_THREADS";
pub const ENV_FULL_NOTIFICATION: &str = "DIVAN_FULL_NOTIFICATION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("worker thread count must be at least 1")]
    NoWorkers,
    #[error("progress batch must be at least 1")]
    EmptyBatch,
    #[error("could not resolve the default database location: {0}")]
    Location(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Verse database searched when a caller does not name one.
    pub database: PathBuf,
    /// Upper bound on tasks running at the same time.
    pub worker_threads: usize,
    /// Emit per-batch and final progress events from search tasks.
    pub display_full_notification: bool,
    pub progress_batch: usize,
    pub update_mirrors: Vec<String>,
    pub network_timeout: Duration,
    pub use_system_proxy: bool,
}

impl Settings {
    /// Defaults around an explicit database path.
    pub fn new(database: impl Into<PathBuf>) -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            database: database.into(),
            worker_threads,
            display_full_notification: true,
            progress_batch: DEFAULT_PROGRESS_BATCH,
            update_mirrors: DEFAULT_UPDATE_MIRRORS.iter().map(|m| m.to_string()).collect(),
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
            use_system_proxy: true,
        }
    }

    /// Defaults with the home-relative database, overridden by the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let database = default_db_path().map_err(ConfigError::Location)?;
        Self::new(database).with_env(|key| std::env::var(key).ok())
    }

    /// Apply `DIVAN_*` overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database = PathBuf::from(database);
        }

        if let Some(raw) = lookup(ENV_THREADS) {
            self.worker_threads = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_THREADS,
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = lookup(ENV_FULL_NOTIFICATION) {
            self.display_full_notification = parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                key: ENV_FULL_NOTIFICATION,
                value: raw.clone(),
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.progress_batch == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
