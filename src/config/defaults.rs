//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config discovery
// ============================================================================

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "MILEAGE_WATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "mileage_watch.toml";

/// Environment variable overriding the bind address.
pub const SERVER_ADDR_ENV_VAR: &str = "MILEAGE_WATCH_SERVER_ADDR";

// ============================================================================
// Server
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:5000";

/// Upload processing is bounded by file size; two minutes is generous.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// 25 MiB
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ============================================================================
// Storage
// ============================================================================

pub const DATA_DIR: &str = "./data";

pub const BASELINE_FILE: &str = "previous_kilometer_data.csv";

pub const REPORT_DIR: &str = "./data/reports";

/// Report file name prefix, followed by `YYYY-MM-DD.csv`.
pub const REPORT_FILE_PREFIX: &str = "km_deviation_report_";

// ============================================================================
// Ingestion
// ============================================================================

pub const SHEET_NAME: &str = "Grid";

/// Title and subtitle rows above the header row.
pub const HEADER_ROWS: usize = 2;

pub const CATEGORY_COLUMN: &str = "קבוצה";

pub const VEHICLE_COLUMN: &str = "רישוי";

/// Matches `קילומטרז'` and annotated variants.
pub const MILEAGE_TOKEN: &str = "קילומטרז";
