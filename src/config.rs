//! Configuration loading for Sieve.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.sieve/config.toml`)
//! 3. User config (`~/.sieve/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The engine runs with the documented
//! defaults when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SieveError};
use crate::gates::duplication::DEFAULT_SIMILARITY_THRESHOLD;
use crate::ledger::DEFAULT_MAX_CHAIN_DEPTH;
use crate::pipeline::{RetryPolicy, RunMode, DEFAULT_DELAYS_MS, DEFAULT_MAX_ATTEMPTS, NON_RETRYABLE_GATES};

/// Main configuration struct for Sieve.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Retry budget, delays and failure taxonomy.
    pub retry: RetryConfig,
    /// Near-duplicate detection.
    pub duplication: DuplicationConfig,
    /// Replacement chain traversal.
    pub deprecation: DeprecationConfig,
    /// Gate result retention.
    pub retention: RetentionConfig,
    /// Where file-backed stores live.
    pub storage: StorageConfig,
}

/// Retry configuration.
///
/// `max_attempts` is the only attempt budget in the system. Both the retry
/// controller and the failure recorder's `can_retry` read it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Delay before attempt `n` is `delays_ms[n - 1]`; the last entry repeats.
    pub delays_ms: Vec<u64>,
    pub non_retryable_gates: Vec<String>,
    /// Gate runner mode.
    pub mode: RunMode,
}

/// Minimum attempt budget.
pub const MIN_MAX_ATTEMPTS: u32 = 1;

impl RetryConfig {
    pub fn is_valid_max_attempts(value: u32) -> bool {
        value >= MIN_MAX_ATTEMPTS
    }

    /// Parse a comma-separated delay list such as `0,2000,5000`.
    pub fn parse_delays(value: &str) -> Option<Vec<u64>> {
        let delays: std::result::Result<Vec<u64>, _> = value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect();
        delays.ok().filter(|d| !d.is_empty())
    }

    /// Build the retry policy this section describes.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delays: self.delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            non_retryable: self.non_retryable_gates.iter().cloned().collect(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays_ms: DEFAULT_DELAYS_MS.to_vec(),
            non_retryable_gates: NON_RETRYABLE_GATES.iter().map(|s| s.to_string()).collect(),
            mode: RunMode::default(),
        }
    }
}

/// Near-duplicate detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplicationConfig {
    /// Similarity at or above which two texts are duplicates.
    pub similarity_threshold: f64,
}

impl DuplicationConfig {
    /// Threshold must be in (0.0, 1.0] and finite.
    pub fn is_valid_threshold(value: f64) -> bool {
        value.is_finite() && value > 0.0 && value <= 1.0
    }
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeprecationConfig {
    /// Maximum replacement hops followed.
    pub max_chain_depth: usize,
}

impl Default for DeprecationConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Gate results older than this many days are pruned.
    pub days_to_keep: u32,
}

/// Minimum retention window.
pub const MIN_DAYS_TO_KEEP: u32 = 1;

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { days_to_keep: 90 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the data directory (`$SIEVE_HOME` or `~/.sieve`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the current working directory.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.replace_invalid_values();
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration for a specific directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.replace_invalid_values();
        config.apply_env_overrides();

        config
    }

    fn load_user_config() -> Option<Config> {
        let home = sieve_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = cwd.join(".sieve").join("config.toml");
        match Self::load_from_file(&config_path) {
            Ok(config) => Some(config),
            Err(SieveError::Storage { .. }) => None,
            Err(e) => {
                eprintln!("Warning: ignoring {}: {}", config_path.display(), e);
                None
            }
        }
    }

    /// Parse one TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SieveError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| SieveError::config(e.to_string()))
    }

    /// Reset out-of-range values read from config files to their defaults.
    fn replace_invalid_values(&mut self) {
        if !RetryConfig::is_valid_max_attempts(self.retry.max_attempts) {
            let fallback = RetryConfig::default().max_attempts;
            eprintln!(
                "Warning: Invalid retry.max_attempts value '{}'. \
                Must be >= {}. Using '{}'.",
                self.retry.max_attempts, MIN_MAX_ATTEMPTS, fallback
            );
            self.retry.max_attempts = fallback;
        }

        if !DuplicationConfig::is_valid_threshold(self.duplication.similarity_threshold) {
            let fallback = DuplicationConfig::default().similarity_threshold;
            eprintln!(
                "Warning: Invalid duplication.similarity_threshold value '{}'. \
                Must be in range (0.0, 1.0]. Using '{}'.",
                self.duplication.similarity_threshold, fallback
            );
            self.duplication.similarity_threshold = fallback;
        }

        if self.retention.days_to_keep < MIN_DAYS_TO_KEEP {
            let fallback = RetentionConfig::default().days_to_keep;
            eprintln!(
                "Warning: Invalid retention.days_to_keep value '{}'. \
                Must be >= {}. Using '{}'.",
                self.retention.days_to_keep, MIN_DAYS_TO_KEEP, fallback
            );
            self.retention.days_to_keep = fallback;
        }
    }

    fn apply_env_overrides(&mut self) {
        // SIEVE_MAX_ATTEMPTS
        if let Ok(val) = env::var("SIEVE_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if RetryConfig::is_valid_max_attempts(n) => self.retry.max_attempts = n,
                Ok(n) => eprintln!(
                    "Warning: Invalid SIEVE_MAX_ATTEMPTS value '{}'. \
                    Must be >= {}. Using '{}'.",
                    n, MIN_MAX_ATTEMPTS, self.retry.max_attempts
                ),
                Err(_) => eprintln!(
                    "Warning: Invalid SIEVE_MAX_ATTEMPTS value '{}'. \
                    Expected a positive integer. Using '{}'.",
                    val, self.retry.max_attempts
                ),
            }
        }

        // SIEVE_RETRY_DELAYS_MS
        if let Ok(val) = env::var("SIEVE_RETRY_DELAYS_MS") {
            match RetryConfig::parse_delays(&val) {
                Some(delays) => self.retry.delays_ms = delays,
                None => eprintln!(
                    "Warning: Invalid SIEVE_RETRY_DELAYS_MS value '{}'. \
                    Expected comma-separated milliseconds. Using {:?}.",
                    val, self.retry.delays_ms
                ),
            }
        }

        // SIEVE_SIMILARITY_THRESHOLD
        if let Ok(val) = env::var("SIEVE_SIMILARITY_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(n) if DuplicationConfig::is_valid_threshold(n) => {
                    self.duplication.similarity_threshold = n
                }
                Ok(n) => eprintln!(
                    "Warning: Invalid SIEVE_SIMILARITY_THRESHOLD value '{}'. \
                    Must be in range (0.0, 1.0]. Using '{}'.",
                    n, self.duplication.similarity_threshold
                ),
                Err(_) => eprintln!(
                    "Warning: Invalid SIEVE_SIMILARITY_THRESHOLD value '{}'. \
                    Expected a decimal number. Using '{}'.",
                    val, self.duplication.similarity_threshold
                ),
            }
        }

        // SIEVE_RETENTION_DAYS
        if let Ok(val) = env::var("SIEVE_RETENTION_DAYS") {
            match val.parse::<u32>() {
                Ok(n) if n >= MIN_DAYS_TO_KEEP => self.retention.days_to_keep = n,
                _ => eprintln!(
                    "Warning: Invalid SIEVE_RETENTION_DAYS value '{}'. \
                    Expected an integer >= {}. Using '{}'.",
                    val, MIN_DAYS_TO_KEEP, self.retention.days_to_keep
                ),
            }
        }
    }

    /// Layer `other` over `self`, taking every value `other` changed from
    /// its default.
    fn merge(mut self, other: Config) -> Self {
        let default_retry = RetryConfig::default();
        if other.retry.max_attempts != default_retry.max_attempts {
            self.retry.max_attempts = other.retry.max_attempts;
        }
        if other.retry.delays_ms != default_retry.delays_ms {
            self.retry.delays_ms = other.retry.delays_ms;
        }
        if other.retry.non_retryable_gates != default_retry.non_retryable_gates {
            self.retry.non_retryable_gates = other.retry.non_retryable_gates;
        }
        if other.retry.mode != default_retry.mode {
            self.retry.mode = other.retry.mode;
        }

        if other.duplication.similarity_threshold
            != DuplicationConfig::default().similarity_threshold
        {
            self.duplication.similarity_threshold = other.duplication.similarity_threshold;
        }

        if other.deprecation.max_chain_depth != DeprecationConfig::default().max_chain_depth {
            self.deprecation.max_chain_depth = other.deprecation.max_chain_depth;
        }

        if other.retention.days_to_keep != RetentionConfig::default().days_to_keep {
            self.retention.days_to_keep = other.retention.days_to_keep;
        }

        if other.storage.data_dir.is_some() {
            self.storage.data_dir = other.storage.data_dir;
        }

        self
    }

    /// The data directory: `storage.data_dir` if set, else [`sieve_home`].
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.clone().or_else(sieve_home)
    }

    /// Write this config to `<cwd>/.sieve/config.toml` atomically.
    pub fn save_project(&self, cwd: &Path) -> Result<PathBuf> {
        let sieve_dir = cwd.join(".sieve");
        if !sieve_dir.exists() {
            fs::create_dir_all(&sieve_dir).map_err(|e| SieveError::storage(&sieve_dir, e))?;
        }

        let config_path = sieve_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| SieveError::config(e.to_string()))?;

        let temp_path = sieve_dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| SieveError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &config_path).map_err(|e| SieveError::storage(&config_path, e))?;

        Ok(config_path)
    }
}

/// Sieve's home directory.
///
/// `$SIEVE_HOME` when set and non-empty, otherwise `~/.sieve`, otherwise a
/// per-user directory under `/tmp`.
pub fn sieve_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("SIEVE_HOME") {
        if home.is_empty() {
            tracing::warn!("SIEVE_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("SIEVE_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".sieve"));
    }

    let fallback_path = fallback_sieve_home();
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

#[cfg(unix)]
fn fallback_sieve_home() -> PathBuf {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata("/").map(|m| m.uid()).unwrap_or(0);
    PathBuf::from(format!("/tmp/sieve-{}", uid))
}

#[cfg(not(unix))]
fn fallback_sieve_home() -> PathBuf {
    std::env::temp_dir().join("sieve")
}

/// Default data directory for file-backed stores.
pub fn default_data_dir() -> Option<PathBuf> {
    sieve_home()
}
