//! Service Configuration - storage locations, ingestion layout, thresholds
//!
//! Every section implements `Default` with the values the service has always
//! used, so running without a config file behaves exactly like a stock
//! deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::ThresholdTable;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one mileage-watch deployment.
///
/// Load with `ServiceConfig::load()` which searches:
/// 1. `$MILEAGE_WATCH_CONFIG` env var
/// 2. `./mileage_watch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Baseline and report locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload sheet layout
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Baseline ratchet policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Category -> max allowed increase
    #[serde(default)]
    pub thresholds: ThresholdTable,
}

impl ServiceConfig {
    /// Load configuration using the standard search order:
    /// 1. `$MILEAGE_WATCH_CONFIG` environment variable
    /// 2. `./mileage_watch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from env path, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are reported as warnings and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values that would make the service misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let require = |value: &str, name: &str, errors: &mut Vec<String>| {
            if value.trim().is_empty() {
                errors.push(format!("{name} must not be empty"));
            }
        };

        require(&self.ingest.sheet_name, "ingest.sheet_name", &mut errors);
        require(&self.ingest.category_column, "ingest.category_column", &mut errors);
        require(&self.ingest.vehicle_column, "ingest.vehicle_column", &mut errors);
        require(&self.ingest.mileage_token, "ingest.mileage_token", &mut errors);
        require(&self.server.addr, "server.addr", &mut errors);

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push("storage.data_dir must not be empty".to_string());
        }
        if self.storage.baseline_file.trim().is_empty() {
            errors.push("storage.baseline_file must not be empty".to_string());
        }
        if self.storage.report_dir.as_os_str().is_empty() {
            errors.push("storage.report_dir must not be empty".to_string());
        }

        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs must be > 0".to_string());
        }
        if self.server.max_upload_bytes == 0 {
            errors.push("server.max_upload_bytes must be > 0".to_string());
        }

        for (category, limit) in self.thresholds.iter() {
            if limit == 0 {
                errors.push(format!("thresholds.\"{category}\" must be > 0"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address.
    ///
    /// Can be overridden by `MILEAGE_WATCH_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Upper bound on one request, upload processing included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}
fn default_request_timeout() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_max_upload() -> usize {
    defaults::MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the baseline file and the process lock
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Baseline file name inside `data_dir`
    #[serde(default = "default_baseline_file")]
    pub baseline_file: String,

    /// Directory for dated deviation reports
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Remove reports of other dates whenever a new one is written
    #[serde(default = "default_true")]
    pub prune_previous_reports: bool,
}

impl StorageConfig {
    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join(&self.baseline_file)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}
fn default_baseline_file() -> String {
    defaults::BASELINE_FILE.to_string()
}
fn default_report_dir() -> PathBuf {
    PathBuf::from(defaults::REPORT_DIR)
}
fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            baseline_file: default_baseline_file(),
            report_dir: default_report_dir(),
            prune_previous_reports: true,
        }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Layout of the uploaded worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Worksheet holding the readings grid
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Leading non-data rows before the header row
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,

    /// Exact (trimmed) header of the category column
    #[serde(default = "default_category_column")]
    pub category_column: String,

    /// Exact (trimmed) header of the vehicle id column
    #[serde(default = "default_vehicle_column")]
    pub vehicle_column: String,

    /// Substring identifying the mileage column header
    #[serde(default = "default_mileage_token")]
    pub mileage_token: String,
}

fn default_sheet_name() -> String {
    defaults::SHEET_NAME.to_string()
}
fn default_header_rows() -> usize {
    defaults::HEADER_ROWS
}
fn default_category_column() -> String {
    defaults::CATEGORY_COLUMN.to_string()
}
fn default_vehicle_column() -> String {
    defaults::VEHICLE_COLUMN.to_string()
}
fn default_mileage_token() -> String {
    defaults::MILEAGE_TOKEN.to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sheet_name: default_sheet_name(),
            header_rows: default_header_rows(),
            category_column: default_category_column(),
            vehicle_column: default_vehicle_column(),
            mileage_token: default_mileage_token(),
        }
    }
}

// ============================================================================
// Ratchet Policy
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Treat `NEW` vehicles as a reason to advance the baseline.
    ///
    /// Off by default: only `DEVIATION` rows move the baseline forward.
    #[serde(default)]
    pub new_vehicles_advance_baseline: bool,
}
