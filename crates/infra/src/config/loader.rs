//! Configuration loader
//!
//! Loads [`EngineSettings`] from a file and applies per-class environment
//! overrides on top.
//!
//! ## Loading Strategy
//! 1. If `BULWARK_CONFIG` is set, load that file (it must exist)
//! 2. Otherwise probe the standard locations for a config file
//! 3. With no file anywhere, start from empty settings
//! 4. Apply `BULWARK_<CLASS>_*` environment overrides
//! 5. Validate the result
//!
//! ## Environment Variables
//! - `BULWARK_CONFIG`: Path to the settings file
//! - `BULWARK_<CLASS>_TIMEOUT_MS`: Per-attempt deadline in milliseconds
//! - `BULWARK_<CLASS>_MAX_ATTEMPTS`: Total attempts including the first
//! - `BULWARK_<CLASS>_RPS`: Rate limit in requests per second
//! - `BULWARK_<CLASS>_MAX_CONCURRENT`: Bulkhead concurrency bound
//!
//! `<CLASS>` is the operation class in upper case (`USER_PROFILE` targets
//! class `user_profile`); `DEFAULT` targets the default configuration. A
//! class that only appears in the environment starts from the default
//! configuration.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./bulwark.toml`, `./bulwark.json`, `./config/bulwark.toml`
//! 2. `bulwark.toml`, `bulwark.json` next to the executable

use std::path::{Path, PathBuf};
use std::time::Duration;

use bulwark_domain::{
    BulkheadConfig, ConfigError, EngineSettings, RateLimitConfig, ResilienceConfig, RetryConfig,
};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "BULWARK_CONFIG";

const ENV_PREFIX: &str = "BULWARK_";
const DEFAULT_CLASS: &str = "default";

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML format: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Settings file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from the file extension
    ///
    /// # Errors
    /// Returns `LoadError::UnsupportedFormat` for anything but `toml` or `json`.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(LoadError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }
}

/// Load settings with the full strategy described in the module docs
///
/// # Errors
/// Returns a `LoadError` if `BULWARK_CONFIG` names a missing file, a file
/// cannot be read or parsed, an override has an unparsable value, or the
/// final settings fail validation.
pub fn load() -> Result<EngineSettings, LoadError> {
    let settings = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => read_settings(&existing(PathBuf::from(path))?)?,
        None => match probe_config_paths() {
            Some(path) => read_settings(&path)?,
            None => {
                debug!("no config file found, starting from empty settings");
                EngineSettings::default()
            }
        },
    };

    let settings = apply_env_overrides(settings)?;
    settings.validate()?;
    info!(classes = settings.classes.len(), "resilience settings loaded");
    Ok(settings)
}

/// Load settings from a file, without environment overrides
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `LoadError::NotFound` if the file (or any probed file) does not
/// exist, and parse or validation errors otherwise.
pub fn load_from_file(path: Option<PathBuf>) -> Result<EngineSettings, LoadError> {
    let config_path = match path {
        Some(path) => existing(path)?,
        None => probe_config_paths()
            .ok_or_else(|| LoadError::NotFound(PathBuf::from("bulwark.toml")))?,
    };
    read_settings(&config_path)
}

/// Parse and validate settings from string content
///
/// # Errors
/// Returns a `LoadError` if the content is malformed or invalid.
pub fn parse_settings(contents: &str, format: ConfigFormat) -> Result<EngineSettings, LoadError> {
    let settings: EngineSettings = match format {
        ConfigFormat::Toml => toml::from_str(contents)?,
        ConfigFormat::Json => serde_json::from_str(contents)?,
    };
    settings.validate()?;
    Ok(settings)
}

/// First existing settings file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([
            cwd.join("bulwark.toml"),
            cwd.join("bulwark.json"),
            cwd.join("config").join("bulwark.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend([exe_dir.join("bulwark.toml"), exe_dir.join("bulwark.json")]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Apply `BULWARK_<CLASS>_*` overrides from the process environment
///
/// # Errors
/// Returns `LoadError::InvalidEnv` for a value that does not parse.
pub fn apply_env_overrides(settings: EngineSettings) -> Result<EngineSettings, LoadError> {
    apply_overrides(settings, std::env::vars())
}

/// Apply overrides from `(key, value)` pairs; keys without a known suffix are ignored
///
/// # Errors
/// Returns `LoadError::InvalidEnv` for a value that does not parse.
pub fn apply_overrides<I>(mut settings: EngineSettings, vars: I) -> Result<EngineSettings, LoadError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some((class, setting)) = parse_override_key(&key) else {
            continue;
        };

        let config = if class == DEFAULT_CLASS {
            settings.default.get_or_insert_with(ResilienceConfig::default)
        } else {
            let fallback = settings.default.clone().unwrap_or_default();
            settings.classes.entry(class.clone()).or_insert(fallback)
        };

        setting.apply(config, &key, &value)?;
        debug!(class = %class, key = %key, "applied environment override");
    }
    Ok(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    TimeoutMs,
    MaxAttempts,
    Rps,
    MaxConcurrent,
}

impl Setting {
    const SUFFIXES: [(&'static str, Self); 4] = [
        ("_TIMEOUT_MS", Self::TimeoutMs),
        ("_MAX_ATTEMPTS", Self::MaxAttempts),
        ("_RPS", Self::Rps),
        ("_MAX_CONCURRENT", Self::MaxConcurrent),
    ];

    fn apply(self, config: &mut ResilienceConfig, key: &str, value: &str) -> Result<(), LoadError> {
        match self {
            Self::TimeoutMs => {
                config.timeout = Some(Duration::from_millis(parse_value(key, value)?));
            }
            Self::MaxAttempts => {
                config.retry.get_or_insert_with(RetryConfig::default).max_attempts =
                    parse_value(key, value)?;
            }
            Self::Rps => {
                let rps: f64 = parse_value(key, value)?;
                config
                    .rate_limit
                    .get_or_insert_with(|| RateLimitConfig::new(rps))
                    .requests_per_second = rps;
            }
            Self::MaxConcurrent => {
                config.bulkhead.get_or_insert_with(BulkheadConfig::default).max_concurrent =
                    parse_value(key, value)?;
            }
        }
        Ok(())
    }
}

/// Split `BULWARK_USER_PROFILE_TIMEOUT_MS` into `("user_profile", TimeoutMs)`
fn parse_override_key(key: &str) -> Option<(String, Setting)> {
    let rest = key.strip_prefix(ENV_PREFIX)?;
    Setting::SUFFIXES.iter().find_map(|(suffix, setting)| {
        let class = rest.strip_suffix(suffix)?;
        (!class.is_empty()).then(|| (class.to_ascii_lowercase(), *setting))
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LoadError> {
    value
        .trim()
        .parse()
        .map_err(|_| LoadError::InvalidEnv { key: key.to_string(), value: value.to_string() })
}

fn existing(path: PathBuf) -> Result<PathBuf, LoadError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(LoadError::NotFound(path))
    }
}

fn read_settings(path: &Path) -> Result<EngineSettings, LoadError> {
    info!(path = %path.display(), "Loading resilience settings from file");

    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)
        .map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;
    parse_settings(&contents, format)
}
