use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("ncpu must be at least 1")]
    NoSlots,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SlicePolicyKind {
    Weighted,
    Flat,
}

/// Scheduler settings, fixed once the engine is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedConfig {
    /// Number of jobs allowed to run at the same time.
    pub ncpu: usize,
    /// Quantum given to priority 1; other levels scale from it.
    pub base_quantum_ms: u64,
    /// How often occupied slots are polled while a quantum runs.
    pub poll_interval_ms: u64,
    /// Daemon sleep between two drains.
    pub daemon_backoff_ms: u64,
    pub slice_policy: SlicePolicyKind,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            ncpu: 1,
            base_quantum_ms: 10,
            poll_interval_ms: 1,
            daemon_backoff_ms: 1,
            slice_policy: SlicePolicyKind::Weighted,
        }
    }
}

impl SchedConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.ncpu == 0 {
            return Err(ConfigError::NoSlots);
        }
        if self.base_quantum_ms == 0 {
            return Err(ConfigError::ZeroDuration("base_quantum_ms"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("poll_interval_ms"));
        }
        Ok(self)
    }

    pub fn base_quantum(&self) -> Duration {
        Duration::from_millis(self.base_quantum_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn daemon_backoff(&self) -> Duration {
        Duration::from_millis(self.daemon_backoff_ms)
    }
}
