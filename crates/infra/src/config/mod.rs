//! Configuration loading
//!
//! Loads engine settings from TOML or JSON files and applies per-class
//! environment overrides.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, apply_overrides, load, load_from_file, parse_settings,
    probe_config_paths, ConfigFormat, LoadError, CONFIG_PATH_ENV,
};
