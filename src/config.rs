use crate::core::{Result, TenantqlError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration parsed from a TOML file. Every key is optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding one file per database.
    pub data_dir: PathBuf,
    /// Database holding the tenant registry.
    pub control_database: String,
    /// Registry table inside the control database.
    pub registry_table: String,
    /// Prefix of generated tenant database names.
    pub name_prefix: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            control_database: "own".to_string(),
            registry_table: "databasenames".to_string(),
            name_prefix: "account".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TenantqlError::Config(e.to_string()))
    }

    /// Loads configuration from a TOML file at the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// let config = tenantql::config::Config::load("config.toml").expect("Failed to load config");
    /// println!("{:?}", config);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| TenantqlError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// `<config dir>/tenantql/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tenantql").join("config.toml"))
    }

    /// Loads `path` if given (it must exist), otherwise the default file if
    /// present, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(default) if default.is_file() => Self::load(default),
                _ => Ok(Config::default()),
            },
        }
    }
}
