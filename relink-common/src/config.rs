//! Configuration loading and settings resolution
//!
//! Settings are resolved with the following priority:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`RELINK_*`)
//! 3. TOML config file (`RELINK_CONFIG`, or `<config_dir>/relink/relink.toml`)
//! 4. OS-dependent compiled defaults (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_ENV_VAR: &str = "RELINK_CONFIG";
/// Environment variable with search directories (platform path-list syntax)
pub const SEARCH_DIRS_ENV_VAR: &str = "RELINK_SEARCH_DIRS";
/// Environment variable with the conversion output directory
pub const OUTPUT_DIR_ENV_VAR: &str = "RELINK_OUTPUT_DIR";
/// Environment variable with the concurrency limit
pub const CONCURRENCY_ENV_VAR: &str = "RELINK_CONCURRENCY";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directories searched recursively when a stale path must be located
    #[serde(default)]
    pub search_directories: Vec<PathBuf>,

    /// Where converted files are written
    #[serde(default)]
    pub output_directory: Option<PathBuf>,

    /// Maximum concurrent conversions (defaults to host parallelism)
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Total memory the batch may use, in MiB
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u64,

    /// Memory a single transcode may hold (full decoded buffer), in MiB
    #[serde(default = "default_per_job_memory_mb")]
    pub per_job_memory_mb: u64,

    /// Free space that must remain on the output volume, in MiB
    #[serde(default = "default_min_free_space_mb")]
    pub min_free_space_mb: u64,

    /// Output encoding
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Target format name (mp3, aac, flac, opus, ogg, wav)
    #[serde(default = "default_format")]
    pub format: String,

    /// Target bitrate for lossy formats
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_memory_budget_mb() -> u64 {
    2048
}

fn default_per_job_memory_mb() -> u64 {
    256
}

fn default_min_free_space_mb() -> u64 {
    100
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_bitrate_kbps() -> u32 {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            search_directories: Vec::new(),
            output_directory: None,
            concurrency: None,
            memory_budget_mb: default_memory_budget_mb(),
            per_job_memory_mb: default_per_job_memory_mb(),
            min_free_space_mb: default_min_free_space_mb(),
            conversion: ConversionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub search_directories: Vec<PathBuf>,
    pub output_directory: PathBuf,
}

impl CompiledDefaults {
    /// Defaults for the running platform: the user's music folder
    pub fn for_current_platform() -> Self {
        let music_dir = dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Music")))
            .unwrap_or_else(|| PathBuf::from("./Music"));

        Self {
            output_directory: music_dir.join("relink-converted"),
            search_directories: vec![music_dir],
        }
    }
}

/// Default TOML location: `<config_dir>/relink/relink.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("relink").join("relink.toml"))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    debug!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), "Wrote TOML config");
    Ok(())
}

/// Default concurrency: host parallelism, clamped so that
/// `concurrency * per_job_memory_mb <= memory_budget_mb`. Never below 1.
pub fn default_concurrency(memory_budget_mb: u64, per_job_memory_mb: u64) -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let memory_cap = if per_job_memory_mb == 0 {
        usize::MAX
    } else {
        usize::try_from(memory_budget_mb / per_job_memory_mb).unwrap_or(usize::MAX)
    };

    parallelism.min(memory_cap).max(1)
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub search_directories: Vec<PathBuf>,
    pub output_directory: PathBuf,
    pub concurrency: usize,
    pub min_free_space_bytes: u64,
    pub conversion: ConversionConfig,
    pub logging: LoggingConfig,
}

/// Resolves [`Settings`] from CLI overrides, environment, TOML and defaults
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    config_path: Option<PathBuf>,
    search_directories: Vec<PathBuf>,
    output_directory: Option<PathBuf>,
    concurrency: Option<usize>,
}

impl SettingsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit TOML file (overrides `RELINK_CONFIG` and the default location)
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// CLI search directories; an empty list means "not given"
    pub fn with_search_directories(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_directories = dirs;
        self
    }

    pub fn with_output_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.output_directory = dir;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Locate and load the TOML config, falling back to defaults if absent
    fn load_toml(&self) -> Result<TomlConfig> {
        let explicit = self
            .config_path
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        match explicit {
            Some(path) => {
                if path.exists() {
                    load_toml_config(&path)
                } else {
                    warn!(
                        path = %path.display(),
                        "Config file not found, using defaults"
                    );
                    Ok(TomlConfig::default())
                }
            }
            None => match default_config_path() {
                Some(path) if path.exists() => load_toml_config(&path),
                _ => {
                    debug!("No config file present, using defaults");
                    Ok(TomlConfig::default())
                }
            },
        }
    }

    /// Resolve all settings
    pub fn resolve(&self) -> Result<Settings> {
        let toml_config = self.load_toml()?;
        let defaults = CompiledDefaults::for_current_platform();

        // Priority 1: CLI, 2: ENV, 3: TOML, 4: compiled default
        let search_directories = if !self.search_directories.is_empty() {
            self.search_directories.clone()
        } else if let Some(value) = std::env::var_os(SEARCH_DIRS_ENV_VAR) {
            std::env::split_paths(&value).collect()
        } else if !toml_config.search_directories.is_empty() {
            toml_config.search_directories.clone()
        } else {
            defaults.search_directories.clone()
        };

        let output_directory = self
            .output_directory
            .clone()
            .or_else(|| std::env::var_os(OUTPUT_DIR_ENV_VAR).map(PathBuf::from))
            .or_else(|| toml_config.output_directory.clone())
            .unwrap_or(defaults.output_directory);

        let env_concurrency = match std::env::var(CONCURRENCY_ENV_VAR) {
            Ok(value) => Some(value.trim().parse::<usize>().map_err(|e| {
                Error::Config(format!("Invalid {}='{}': {}", CONCURRENCY_ENV_VAR, value, e))
            })?),
            Err(_) => None,
        };

        let concurrency = self
            .concurrency
            .or(env_concurrency)
            .or(toml_config.concurrency)
            .unwrap_or_else(|| {
                default_concurrency(toml_config.memory_budget_mb, toml_config.per_job_memory_mb)
            });

        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        let settings = Settings {
            search_directories,
            output_directory,
            concurrency,
            min_free_space_bytes: toml_config.min_free_space_mb.saturating_mul(1024 * 1024),
            conversion: toml_config.conversion,
            logging: toml_config.logging,
        };

        info!(
            search_dirs = settings.search_directories.len(),
            output_dir = %settings.output_directory.display(),
            concurrency = settings.concurrency,
            "Settings resolved"
        );

        Ok(settings)
    }
}
