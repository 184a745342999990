//! Queue configuration and on-disk layout.

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{BackoffPolicy, QueueError, QueueResult, WorkerSettings};

/// Default data directory, relative to the working directory.
pub const DEFAULT_HOME: &str = ".queuectl";

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "QUEUECTL_HOME";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Tunables persisted in `<home>/config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempt ceiling applied to jobs enqueued without one.
    pub max_retries: u32,
    /// Exponential backoff base, in seconds.
    pub backoff_base: f64,
    /// Cap on a single backoff delay, in seconds.
    pub max_backoff_secs: u64,
    /// Per-command wall-clock limit; 0 disables it.
    pub job_timeout_secs: u64,
    /// Idle poll interval.
    pub poll_interval_ms: u64,
    /// How long `worker stop` waits before escalating to SIGKILL.
    pub stop_grace_secs: u64,
    /// Default tracing level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::core::DEFAULT_MAX_RETRIES,
            backoff_base: 2.0,
            max_backoff_secs: 86_400,
            job_timeout_secs: 30,
            poll_interval_ms: 1_000,
            stop_grace_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl QueueConfig {
    /// Keys accepted by [`QueueConfig::get`] and [`QueueConfig::set`].
    pub const KEYS: [&'static str; 7] = [
        "max_retries",
        "backoff_base",
        "max_backoff_secs",
        "job_timeout_secs",
        "poll_interval_ms",
        "stop_grace_secs",
        "log_level",
    ];

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_base.is_finite() || self.backoff_base <= 0.0 {
            return Err("backoff_base must be a positive number".into());
        }
        if self.max_backoff_secs == 0 {
            return Err("max_backoff_secs must be greater than 0".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".into());
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `path`, creating it with defaults when missing. A corrupt or
    /// invalid file is reported and replaced in memory by the defaults.
    ///
    /// # Errors
    ///
    /// `Io` when a missing file cannot be created.
    pub fn load_or_create(path: &Path) -> QueueResult<Self> {
        match fs::read_to_string(path) {
            Ok(body) => Ok(Self::from_json_str(&body).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "config file corrupted, using defaults");
                Self::default()
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// `Io` on write failure, `Config` if serialization fails.
    pub fn save(&self, path: &Path) -> QueueResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(|e| QueueError::Config(e.to_string()))?;
        fs::write(path, body)?;
        Ok(())
    }

    /// Apply `QUEUECTL_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, key) in [
            ("QUEUECTL_MAX_RETRIES", "max_retries"),
            ("QUEUECTL_BACKOFF_BASE", "backoff_base"),
            ("QUEUECTL_JOB_TIMEOUT", "job_timeout_secs"),
        ] {
            let Some(value) = lookup(var) else { continue };
            let mut candidate = self.clone();
            match candidate.set(key, &value) {
                Ok(()) => *self = candidate,
                Err(e) => warn!(var, value = %value, error = %e, "ignoring environment override"),
            }
        }
    }

    /// Render one key's value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "max_retries" => self.max_retries.to_string(),
            "backoff_base" => self.backoff_base.to_string(),
            "max_backoff_secs" => self.max_backoff_secs.to_string(),
            "job_timeout_secs" => self.job_timeout_secs.to_string(),
            "poll_interval_ms" => self.poll_interval_ms.to_string(),
            "stop_grace_secs" => self.stop_grace_secs.to_string(),
            "log_level" => self.log_level.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Parse `value` according to `key`'s type, assign it, and re-validate.
    /// On error the configuration is left unchanged.
    ///
    /// # Errors
    ///
    /// `Config` for an unknown key, an unparseable value, or a value that
    /// fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> QueueResult<()> {
        let mut next = self.clone();
        let value = value.trim();
        match key {
            "max_retries" => next.max_retries = parse_value(key, value)?,
            "backoff_base" => next.backoff_base = parse_value(key, value)?,
            "max_backoff_secs" => next.max_backoff_secs = parse_value(key, value)?,
            "job_timeout_secs" => next.job_timeout_secs = parse_value(key, value)?,
            "poll_interval_ms" => next.poll_interval_ms = parse_value(key, value)?,
            "stop_grace_secs" => next.stop_grace_secs = parse_value(key, value)?,
            "log_level" => next.log_level = value.to_ascii_lowercase(),
            _ => return Err(QueueError::Config(format!("unknown key `{key}`"))),
        }
        next.validate().map_err(QueueError::Config)?;
        *self = next;
        Ok(())
    }

    /// Command timeout, `None` when disabled.
    #[must_use]
    pub const fn job_timeout(&self) -> Option<Duration> {
        if self.job_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.job_timeout_secs))
        }
    }

    /// Backoff schedule.
    #[must_use]
    pub const fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_base).with_cap(Duration::from_secs(self.max_backoff_secs))
    }

    /// Grace period granted to workers on stop.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    /// Settings for a worker loop.
    #[must_use]
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            job_timeout: self.job_timeout(),
            backoff: self.backoff(),
            ..WorkerSettings::default()
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> QueueResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| QueueError::Config(format!("invalid value `{value}` for `{key}`: {e}")))
}

/// Files under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    home: PathBuf,
}

impl QueuePaths {
    /// Layout rooted at `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Pick the home directory: explicit flag, then `QUEUECTL_HOME`, then
    /// [`DEFAULT_HOME`].
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let home = explicit
            .or_else(|| env::var_os(HOME_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME));
        Self::new(home)
    }

    /// Data directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// SQLite database file.
    #[must_use]
    pub fn database(&self) -> PathBuf {
        self.home.join("queuectl.db")
    }

    /// Worker registry snapshot.
    #[must_use]
    pub fn workers(&self) -> PathBuf {
        self.home.join("workers.json")
    }

    /// Configuration file.
    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.home.join("config.json")
    }
}
