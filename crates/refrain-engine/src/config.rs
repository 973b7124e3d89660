use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::dsp::{HashConfig, PeakConfig, SpectrogramConfig};
use crate::error::ConfigError;

/// Configuration for refrain.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (REFRAIN_* prefix)
/// 3. Config file (~/.config/refrain/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: REFRAIN_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/refrain/refrain.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Only fingerprint the first N seconds of each source. Absent or -1
    /// means the whole track.
    #[serde(default)]
    pub fingerprint_limit_secs: Option<i64>,

    /// Number of concurrent fingerprinting workers. Defaults to the
    /// available hardware parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Per-source timeout for a fingerprinting task, in seconds.
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    /// File extensions picked up when fingerprinting a directory.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub fingerprint: FingerprintConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            fingerprint_limit_secs: None,
            workers: None,
            task_timeout_secs: None,
            extensions: default_extensions(),
            fingerprint: FingerprintConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/refrain/config.toml
    /// Reads environment variables with REFRAIN_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("refrain");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        config
            .fingerprint
            .validate()
            .context("Invalid fingerprint settings")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// The decode limit, or `None` to fingerprint whole tracks.
    pub fn fingerprint_limit(&self) -> Option<Duration> {
        match self.fingerprint_limit_secs {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs.unsigned_abs())),
            _ => None,
        }
    }

    /// Worker pool size, never zero.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(default_workers)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

/// Parameters of the spectrogram, peak and hashing stages.
///
/// Stored fingerprints are only comparable with queries generated from the
/// same settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Samples per analysis frame.
    pub window_size: usize,
    /// Fraction of each frame shared with the next one.
    pub overlap_ratio: f64,
    /// Side of the square neighbourhood a peak must dominate, in cells.
    pub neighborhood_size: usize,
    /// Minimum log-power (dB) for a cell to count as a peak.
    pub amplitude_min: f32,
    /// Maximum number of successors paired with each peak.
    pub fan_value: usize,
    /// Pairs must be more than this many frames apart.
    pub min_time_delta: u32,
    /// Pairs must be at most this many frames apart.
    pub max_time_delta: u32,
    /// Length of each stored hash, in bytes.
    pub hash_bytes: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            window_size: 4096,
            overlap_ratio: 0.5,
            neighborhood_size: 20,
            amplitude_min: 10.0,
            fan_value: 15,
            min_time_delta: 0,
            max_time_delta: 200,
            hash_bytes: 10,
        }
    }
}

impl FingerprintConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.window_size < 2 || self.window_size % 2 != 0 {
            return Err(ConfigError::WindowSize(self.window_size));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(ConfigError::OverlapRatio(self.overlap_ratio));
        }
        if self.fan_value == 0 {
            return Err(ConfigError::FanValue);
        }
        if self.min_time_delta >= self.max_time_delta {
            return Err(ConfigError::TimeDelta {
                min: self.min_time_delta,
                max: self.max_time_delta,
            });
        }
        if !(1..=32).contains(&self.hash_bytes) {
            return Err(ConfigError::HashBytes(self.hash_bytes));
        }
        Ok(())
    }

    pub fn spectrogram(&self) -> SpectrogramConfig {
        SpectrogramConfig {
            window_size: self.window_size,
            overlap_ratio: self.overlap_ratio,
        }
    }

    pub fn peaks(&self) -> PeakConfig {
        PeakConfig {
            neighborhood_size: self.neighborhood_size,
            amplitude_min: self.amplitude_min,
        }
    }

    pub fn hashing(&self) -> HashConfig {
        HashConfig {
            fan_value: self.fan_value,
            min_time_delta: self.min_time_delta,
            max_time_delta: self.max_time_delta,
            hash_bytes: self.hash_bytes,
        }
    }
}

/// Log output settings, applied by the binary at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
    pub coloured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            coloured: true,
        }
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/refrain/refrain.db (or platform equivalent)
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("refrain")
        .join("refrain.db")
}

fn default_extensions() -> Vec<String> {
    ["mp3", "flac", "ogg", "wav", "m4a"]
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

pub(crate) fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/refrain/config.toml
/// - macOS: ~/Library/Application Support/refrain/config.toml
/// - Windows: %APPDATA%\refrain\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("refrain")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Refrain Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (REFRAIN_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database holding songs and fingerprint hashes
#
# Can also be set via:
# - CLI: refrain --db /custom/path.db fingerprint ~/Music
# - Environment: REFRAIN_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/refrain.db"

# Only fingerprint the first N seconds of each file (-1 = whole track)
#fingerprint_limit_secs = -1

# Concurrent fingerprinting workers (default: number of CPUs)
#workers = 4

# Give up on a single file after this many seconds
#task_timeout_secs = 300

extensions = ["mp3", "flac", "ogg", "wav", "m4a"]

# Changing these invalidates every stored fingerprint.
[fingerprint]
window_size = 4096
overlap_ratio = 0.5
neighborhood_size = 20
amplitude_min = 10.0
fan_value = 15
min_time_delta = 0
max_time_delta = 200
hash_bytes = 10

[logging]
level = "info"
coloured = true
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
