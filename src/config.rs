//! TOML-based configuration.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid configuration.
//! Values from the file can be overridden with `BENTO_*` environment variables.
//!
//! Example configuration:
//! ```toml
//! max_file_size = 10485760
//! allowed_extensions = [".xlsx", ".xlsm", ".xls", ".ods"]
//! sample_rows = 5
//! preview_rows = 10
//! storage_batch_size = 100
//! default_table_base = "excel_data"
//! ```

use serde::Deserialize;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable prefix for overrides, e.g. `BENTO_MAX_FILE_SIZE`.
pub const ENV_PREFIX: &str = "BENTO_";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value '{1}' for {0}")]
    InvalidValue(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Largest accepted upload, in bytes.
    pub max_file_size: usize,

    /// Accepted file name suffixes, matched case-insensitively.
    pub allowed_extensions: Vec<String>,

    /// Records kept in each sheet's `sample_rows`.
    pub sample_rows: usize,

    /// Default row count for data previews.
    pub preview_rows: usize,

    /// Rows per insert when storing a table.
    pub storage_batch_size: usize,

    /// Table name base when no dashboard name is given.
    pub default_table_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec![".xlsx".to_string(), ".xlsm".to_string(), ".xls".to_string(), ".ods".to_string()],
            sample_rows: 5,
            preview_rows: 10,
            storage_batch_size: 100,
            default_table_base: "excel_data".to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Loads the file at `path`, then applies `BENTO_*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let mut settings = Self::from_file(path)?;
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Defaults plus `BENTO_*` environment overrides.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        settings.apply_overrides(|key| env::var(key).ok())?;
        Ok(settings)
    }

    /// Overrides fields from `lookup`, which maps `BENTO_<FIELD>` keys to raw values.
    /// Extensions are comma separated.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |field: &str| format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());

        override_parsed(&mut self.max_file_size, &key("max_file_size"), &lookup)?;
        override_parsed(&mut self.sample_rows, &key("sample_rows"), &lookup)?;
        override_parsed(&mut self.preview_rows, &key("preview_rows"), &lookup)?;
        override_parsed(&mut self.storage_batch_size, &key("storage_batch_size"), &lookup)?;
        if let Some(value) = lookup(&key("allowed_extensions")) {
            self.allowed_extensions = value
                .split(',')
                .map(str::trim)
                .filter(|extension| !extension.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(value) = lookup(&key("default_table_base")) {
            self.default_table_base = value;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.storage_batch_size == 0 {
            return Err(SettingsError::InvalidConfig("storage_batch_size must be positive".to_string()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(SettingsError::InvalidConfig("allowed_extensions must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether `file_name` ends with one of the allowed extensions, ignoring case.
    pub fn accepts_extension(&self, file_name: &str) -> bool {
        let file_name = file_name.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|extension| file_name.ends_with(&extension.to_lowercase()))
    }
}

fn override_parsed<T, F>(field: &mut T, key: &str, lookup: &F) -> Result<(), SettingsError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        *field = value
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidValue(key.to_string(), value.to_owned()))?;
    }
    Ok(())
}
