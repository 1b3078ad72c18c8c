//! Engine configuration loaded from TOML.
//!
//! Every field has a default so a missing or empty file yields a working
//! engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "QUEST_ENGINE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub validator: ValidatorConfig,
    pub rewards: RewardConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Directory containing `quests/*.toml`
    pub data_dir: PathBuf,
    pub database_url: String,
    pub worker_count: usize,
    /// Optimistic-concurrency retries before a save is abandoned
    pub max_save_retries: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_url: "sqlite:quests.db?mode=rwc".to_string(),
            worker_count: 4,
            max_save_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Stop at the first failed required check
    pub early_exit: bool,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    /// Concurrent validations in `validate_many` (1 = sequential)
    pub max_parallel: usize,
    pub extended: ExtendedChecksConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            early_exit: false,
            cache_enabled: true,
            cache_ttl_secs: 30,
            max_parallel: 4,
            extended: ExtendedChecksConfig::default(),
        }
    }
}

impl ValidatorConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }
}

/// Toggles for the extended requirement checks
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtendedChecksConfig {
    pub badges: bool,
    pub inventory: bool,
    pub region: bool,
    pub temporal: bool,
    pub party_size: bool,
}

impl Default for ExtendedChecksConfig {
    fn default() -> Self {
        Self {
            badges: true,
            inventory: true,
            region: true,
            temporal: true,
            party_size: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reject the whole bundle if any reward is malformed, and stop at the
    /// first failed reward
    pub strict_validation: bool,
    /// Bundles up to this size are reported as a single batch
    pub batch_size: usize,
    pub max_gold_per_distribution: i64,
    pub sink_timeout_ms: u64,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Per-player entries kept in distribution and failure history
    pub history_limit: usize,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            strict_validation: false,
            batch_size: 10,
            max_gold_per_distribution: 1_000_000,
            sink_timeout_ms: 3_000,
            max_retry_attempts: 3,
            retry_base_delay_ms: 200,
            history_limit: 200,
        }
    }
}

impl RewardConfig {
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Send through the transport inside `notify`
    Immediate,
    /// Enqueue and let the flush timer deliver
    Queued,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub duplicate_window_secs: u64,
    /// Deliveries allowed per player in any trailing 60 seconds
    pub max_per_minute: u32,
    pub mode: DeliveryMode,
    /// Messages drained per player per flush tick
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub history_limit: usize,
    pub delivery_timeout_ms: u64,
    /// Requeue attempts for failed queued deliveries
    pub max_delivery_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Queued mode only; the lowest-priority entry is dropped past this
    pub max_queue_per_player: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: 5,
            max_per_minute: 30,
            mode: DeliveryMode::Immediate,
            batch_size: 5,
            flush_interval_ms: 250,
            history_limit: 100,
            delivery_timeout_ms: 2_000,
            max_delivery_retries: 3,
            retry_base_delay_ms: 500,
            max_queue_per_player: 50,
        }
    }
}

impl NotifierConfig {
    pub fn duplicate_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duplicate_window_secs as i64)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file falls back to defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Resolve the config path from `QUEST_ENGINE_CONFIG`, else `config.toml`
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.worker_count == 0 {
            return Err(ConfigError::Invalid("engine.worker_count must be at least 1".into()));
        }
        if self.rewards.batch_size == 0 {
            return Err(ConfigError::Invalid("rewards.batch_size must be at least 1".into()));
        }
        if self.rewards.max_gold_per_distribution <= 0 {
            return Err(ConfigError::Invalid(
                "rewards.max_gold_per_distribution must be positive".into(),
            ));
        }
        if self.notifier.batch_size == 0 {
            return Err(ConfigError::Invalid("notifier.batch_size must be at least 1".into()));
        }
        if self.notifier.max_per_minute == 0 {
            return Err(ConfigError::Invalid("notifier.max_per_minute must be at least 1".into()));
        }
        if self.notifier.max_queue_per_player == 0 {
            return Err(ConfigError::Invalid(
                "notifier.max_queue_per_player must be at least 1".into(),
            ));
        }
        if self.notifier.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid("notifier.flush_interval_ms must be at least 1".into()));
        }
        if self.validator.max_parallel == 0 {
            return Err(ConfigError::Invalid("validator.max_parallel must be at least 1".into()));
        }
        Ok(())
    }
}
