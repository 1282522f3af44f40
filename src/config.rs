use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::analysis::MinCandles;
use crate::error::ConfigError;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            data_dir: default_data_dir(),
        }
    }
}

impl GeneralConfig {
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("market-snapshot.db")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Sqlite,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// Required when `kind = "csv"`.
    pub csv_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub min_candles: MinCandles,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            min_candles: MinCandles::default(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_log_format(config)?;
    validate_source(config)?;
    validate_snapshot(config)?;
    Ok(())
}

fn validate_log_format(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not one of text, json",
                config.general.log_format
            ),
        }));
    }
    Ok(())
}

fn validate_source(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let missing_path = config
        .source
        .csv_path
        .as_deref()
        .is_none_or(|p| p.trim().is_empty());
    if config.source.kind == SourceKind::Csv && missing_path {
        return Err(Report::new(ConfigError::Validation {
            field: "source.csv_path is required when source.kind = \"csv\"".into(),
        }));
    }
    Ok(())
}

fn validate_snapshot(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let snapshot = &config.snapshot;
    if snapshot.concurrency == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "snapshot.concurrency must be at least 1".into(),
        }));
    }

    let floors = [
        ("daily", snapshot.min_candles.daily),
        ("weekly", snapshot.min_candles.weekly),
        ("monthly", snapshot.min_candles.monthly),
    ];
    for (name, floor) in floors {
        if floor == 0 {
            return Err(Report::new(ConfigError::Validation {
                field: format!("snapshot.min_candles.{name} must be at least 1"),
            }));
        }
    }
    Ok(())
}
