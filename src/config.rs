//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `$PATHTREE_CONFIG_FILE`, else `.pathtree-config.json` in the working directory
//! 3. Environment variables: `PATHTREE_*` prefix
//!
//! The settings are loaded once per process and read by the tree core through [`settings`].

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::errors::{LoadError, LoadResult};

/// Environment variable naming an alternative config file.
pub const CONFIG_FILE_ENV: &str = "PATHTREE_CONFIG_FILE";

/// Config file looked up in the working directory when no override is given.
pub const DEFAULT_CONFIG_FILE: &str = ".pathtree-config.json";

static SETTINGS: Lazy<Settings> = Lazy::new(|| {
    Settings::load().unwrap_or_else(|e| {
        warn!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    })
});

/// Process-wide, read-only settings.
pub fn settings() -> &'static Settings {
    &SETTINGS
}

/// Unified configuration for pathtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Separator between segments of a delimited key (default: ".")
    pub delimiter: String,
    /// Whether string keys are split on the delimiter at all (default: true)
    pub use_delimited_keys: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delimiter: ".".into(),
            use_delimited_keys: true,
        }
    }
}

/// Path of the config file to consult: the env override, else the default name.
pub fn config_file_path() -> PathBuf {
    std::env::var(CONFIG_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

impl Settings {
    /// Load settings from the default config file location plus env overrides.
    pub fn load() -> LoadResult<Self> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(Some(&path))
        } else {
            Self::load_from(None)
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `path` - Optional config file (json, toml or yaml, inferred from the extension)
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. The given config file
    /// 3. Environment variables: `PATHTREE_*` prefix
    #[instrument(level = "debug")]
    pub fn load_from(path: Option<&Path>) -> LoadResult<Self> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("delimiter", defaults.delimiter.clone())
            .map_err(config_err)?
            .set_default("use_delimited_keys", defaults.use_delimited_keys)
            .map_err(config_err)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PATHTREE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;
        let settings: Self = config.try_deserialize().map_err(config_err)?;
        settings.validate()?;

        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Reject delimiters that would make keys ambiguous.
    pub fn validate(&self) -> LoadResult<()> {
        if self.delimiter.is_empty() {
            return Err(LoadError::Config {
                message: "delimiter must not be empty".to_string(),
            });
        }
        if self.delimiter.contains(|c| c == '[' || c == ']') {
            return Err(LoadError::Config {
                message: format!(
                    "delimiter '{}' clashes with sequence index brackets",
                    self.delimiter
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> LoadResult<String> {
        toml::to_string_pretty(self).map_err(|e| LoadError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# pathtree configuration
#
# Locations (by precedence, lowest to highest):
#   File: $PATHTREE_CONFIG_FILE, else ./.pathtree-config.json (json, toml or yaml)
#   Env:  PATHTREE_* environment variables (explicit overrides)

# Separator between the segments of a delimited key ("a.b.c")
# delimiter = "."

# Set to false to treat string keys as single segments
# use_delimited_keys = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> LoadError {
    LoadError::Config {
        message: e.to_string(),
    }
}
