//! Templar Configuration Module
//!
//! Persistent defaults for the CLI, stored in `~/.config/templar/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (`--partial`, `--unescape`, `-s`)
//! 2. Environment variables (`TEMPLAR_ALLOW_PARTIAL`, `TEMPLAR_UNESCAPE`)
//! 3. Config file (`~/.config/templar/config.toml`)
//! 4. Defaults

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TemplarError};
use crate::template::ResolveOptions;

pub const ENV_ALLOW_PARTIAL: &str = "TEMPLAR_ALLOW_PARTIAL";
pub const ENV_UNESCAPE: &str = "TEMPLAR_UNESCAPE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplarConfig {
    /// Default resolution options
    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Secret handling
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Secrets configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecretsConfig {
    /// Secret names treated as loaded by `templar secrets`
    #[serde(default)]
    pub loaded: Vec<String>,
}

impl TemplarConfig {
    /// Returns `~/.config/templar/` on Unix, `%APPDATA%/templar/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("templar")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default location
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path (defaults when the file is absent)
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| TemplarError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| TemplarError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| TemplarError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| TemplarError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| TemplarError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Set variables take precedence over config file values; empty or
    /// unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Some(flag) = env_flag(ENV_ALLOW_PARTIAL) {
            self.resolve.allow_partial = flag;
        }
        if let Some(flag) = env_flag(ENV_UNESCAPE) {
            self.resolve.unescape = flag;
        }
        self
    }

    /// Effective options after applying CLI flags (a set flag always wins)
    pub fn resolve_options(&self, partial_flag: bool, unescape_flag: bool) -> ResolveOptions {
        ResolveOptions {
            allow_partial: self.resolve.allow_partial || partial_flag,
            unescape: self.resolve.unescape || unescape_flag,
        }
    }

    /// Loaded secret names from config plus extra names from the CLI
    pub fn loaded_secrets<I, S>(&self, extra: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secrets
            .loaded
            .iter()
            .cloned()
            .chain(extra.into_iter().map(Into::into))
            .collect()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!(variable = name, value = other, "ignoring unrecognized boolean value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_templar() {
        let path = TemplarConfig::config_path();
        assert!(path.to_string_lossy().contains("templar"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
        assert_eq!(path.parent().unwrap(), TemplarConfig::config_dir());
    }

    #[test]
    fn test_default_config() {
        let config = TemplarConfig::default();
        assert!(!config.resolve.allow_partial);
        assert!(!config.resolve.unescape);
        assert!(config.secrets.loaded.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = TemplarConfig {
            resolve: ResolveOptions {
                allow_partial: true,
                unescape: false,
            },
            secrets: SecretsConfig {
                loaded: vec!["token".into()],
            },
        };
        config.save_to(&path).unwrap();

        assert_eq!(TemplarConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = TemplarConfig::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TemplarConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[resolve\nallow_partial = ").unwrap();

        let err = TemplarConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "TPL-040");
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: TemplarConfig = toml::from_str("[resolve]\nunescape = true\n").unwrap();
        assert!(config.resolve.unescape);
        assert!(!config.resolve.allow_partial);
    }

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var(ENV_ALLOW_PARTIAL, "true");
        env::set_var(ENV_UNESCAPE, "0");

        let config = TemplarConfig {
            resolve: ResolveOptions {
                allow_partial: false,
                unescape: true,
            },
            ..Default::default()
        }
        .with_env();

        assert!(config.resolve.allow_partial);
        assert!(!config.resolve.unescape);

        env::remove_var(ENV_ALLOW_PARTIAL);
        env::remove_var(ENV_UNESCAPE);
    }

    #[test]
    #[serial]
    fn test_env_ignores_empty_and_garbage() {
        env::set_var(ENV_ALLOW_PARTIAL, "");
        env::set_var(ENV_UNESCAPE, "maybe");

        let config = TemplarConfig {
            resolve: ResolveOptions {
                allow_partial: true,
                unescape: true,
            },
            ..Default::default()
        }
        .with_env();

        assert!(config.resolve.allow_partial);
        assert!(config.resolve.unescape);

        env::remove_var(ENV_ALLOW_PARTIAL);
        env::remove_var(ENV_UNESCAPE);
    }

    #[test]
    fn test_cli_flags_win() {
        let config = TemplarConfig::default();
        let opts = config.resolve_options(true, false);
        assert!(opts.allow_partial);
        assert!(!opts.unescape);
    }

    #[test]
    fn test_loaded_secrets_merges_cli_names() {
        let config = TemplarConfig {
            secrets: SecretsConfig {
                loaded: vec!["b".into()],
            },
            ..Default::default()
        };
        let loaded = config.loaded_secrets(["a", "b"]);
        assert_eq!(loaded.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_toml_format() {
        let config = TemplarConfig {
            secrets: SecretsConfig {
                loaded: vec!["api-key".into()],
            },
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[resolve]"));
        assert!(toml_str.contains("allow_partial = false"));
        assert!(toml_str.contains("[secrets]"));
        assert!(toml_str.contains("api-key"));
    }
}
