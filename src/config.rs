//! Configuration file handling
//!
//! Handles TOML parsing, defaults and validation. Every section and key is
//! optional; command line flags are applied on top by the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_BACKUP_MAX_AGE_DAYS, DEFAULT_BACKUP_MAX_COUNT,
    DEFAULT_CACHE_CAPACITY, DEFAULT_DIR_NAME, DEFAULT_MAX_WIDTH, MAX_CACHE_CAPACITY,
    MIN_MAX_WIDTH,
};
use crate::logging::parse_level;
use crate::output::{Format, RenderOptions};
use crate::storage::StoreOptions;

/// Failure to load or validate configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage: StorageSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

/// Store location and maintenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    /// Root of the store; `~` expands to the home directory
    pub base_dir: PathBuf,
    /// LRU entries, 0 disables the cache
    pub cache_capacity: usize,
    /// Copy files aside before overwriting them
    pub backups: bool,
    pub backup_max_age_days: u64,
    pub backup_max_count: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("~").join(DEFAULT_DIR_NAME),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            backups: true,
            backup_max_age_days: DEFAULT_BACKUP_MAX_AGE_DAYS,
            backup_max_count: DEFAULT_BACKUP_MAX_COUNT,
        }
    }
}

/// Rendering defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub format: String,
    pub no_color: bool,
    pub max_width: usize,
    /// Indented JSON
    pub pretty: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: "table".to_string(),
            no_color: false,
            max_width: DEFAULT_MAX_WIDTH,
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicitly named file must exist. Without one the default path is
    /// tried, and its absence yields the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if required {
                return Err(ConfigError::NotFound(path));
            }
            log::debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.clone(), source },
            other => other,
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.cache_capacity > MAX_CACHE_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "storage.cache_capacity must be at most {}, got {}",
                MAX_CACHE_CAPACITY, self.storage.cache_capacity
            )));
        }
        if self.output.max_width < MIN_MAX_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "output.max_width must be at least {}, got {}",
                MIN_MAX_WIDTH, self.output.max_width
            )));
        }
        self.output
            .format
            .parse::<Format>()
            .map_err(|e| ConfigError::Invalid(format!("output.format: {}", e)))?;
        if parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of off, error, warn, info, debug, trace, got {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Store root with `~` expanded
    pub fn base_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.base_dir)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            cache_capacity: self.storage.cache_capacity,
            backups: self.storage.backups,
            workers: None,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            pretty: self.output.pretty,
            no_color: self.output.no_color,
            max_width: self.output.max_width,
        }
    }

    pub fn backup_max_age(&self) -> Duration {
        Duration::from_secs(self.storage.backup_max_age_days.saturating_mul(24 * 60 * 60))
    }
}

/// `~/.vaino/config.toml`, when a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Replace a leading `~` with the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.cache_capacity, 32);
        assert_eq!(config.output.max_width, 120);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [storage]
            base_dir = "/srv/vaino"
            backups = false

            [output]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_dir(), PathBuf::from("/srv/vaino"));
        assert!(!config.store_options().backups);
        assert_eq!(config.storage.backup_max_count, 10);
        assert_eq!(config.output.format, "json");
        assert!(config.output.pretty);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[storage]\ncache_capacity = 10001",
            "[output]\nmax_width = 39",
            "[output]\nformat = \"xml\"",
            "[logging]\nlevel = \"loud\"",
        ];
        for case in cases {
            let err = Config::from_toml(case).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}: {:?}", case, err);
        }
        assert!(matches!(
            Config::from_toml("[storage]\nunknown = 1").unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(ConfigError::NotFound(_))));

        let present = dir.path().join("config.toml");
        std::fs::write(&present, "[output]\nno_color = true\n").unwrap();
        let config = Config::load(Some(&present)).unwrap();
        assert!(config.render_options().no_color);
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/.vaino")), home.join(".vaino"));
        }
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
        assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
        assert_eq!(Config::default().backup_max_age(), Duration::from_secs(30 * 86_400));
    }
}
