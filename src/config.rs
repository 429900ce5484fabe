//! Splain configuration
//!
//! Loaded from `splain.yaml` with a fallback chain: explicit `SPLAIN_CONFIG`
//! env var → `~/.config/splain/splain.yaml` → `./splain.yaml` → defaults.
//! Credentials never live here; the backend resolves its API key from the
//! environment variable this config names.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    /// Directory with per-key persona overrides (`<dir>/<key>.md`)
    pub personas_dir: Option<PathBuf>,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model identifier sent on every completion request
    pub model: String,
    /// OpenAI-compatible API root
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request streamed responses (always aggregated before display)
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            personas_dir: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "SPLAIN_API_KEY".to_string(),
            stream: true,
        }
    }
}

impl Config {
    /// Load configuration with the fallback chain.
    pub fn load() -> Result<Self> {
        if let Ok(env_path) = std::env::var("SPLAIN_CONFIG") {
            let path = PathBuf::from(env_path);
            return Self::load_from_file(&path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("splain").join("splain.yaml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("splain.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.backend.api_key_env, "SPLAIN_API_KEY");
        assert!(config.personas_dir.is_none());
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "backend:\n  model: local-model\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend.model, "local-model");
        // Unspecified fields keep their defaults
        assert_eq!(config.backend.base_url, "https://api.openai.com/v1");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed.backend.model, config.backend.model);
        assert_eq!(parsed.backend.stream, config.backend.stream);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/code");
        let expanded = Config::expand_path(&path);
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.to_string_lossy().contains("code"));
    }

    #[test]
    fn test_expand_path_no_expansion() {
        let path = PathBuf::from("/usr/local/src");
        assert_eq!(Config::expand_path(&path), PathBuf::from("/usr/local/src"));
    }
}
