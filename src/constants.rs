//! Global constants for vaino
//!
//! Centralized location for application-wide constants

/// Application name used for the default store directory and log events
pub const APP_NAME: &str = "vaino";

/// Default store directory name under the user's home directory
pub const DEFAULT_DIR_NAME: &str = ".vaino";

/// Default configuration file name inside the store directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

// Store layout under base_dir
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const BASELINES_DIR: &str = "baselines";
pub const DRIFT_REPORTS_DIR: &str = "history/drift-reports";
pub const CACHE_DIR: &str = "cache";
pub const BACKUPS_DIR: &str = "backups";

/// Suffix of snapshot documents
pub const SNAPSHOT_SUFFIX: &str = "-scan.json";

/// Prefix of drift report documents
pub const DRIFT_REPORT_PREFIX: &str = "drift-report-";

/// Extension of backup files written by the atomic writer
pub const BACKUP_EXTENSION: &str = ".backup";

/// Timestamp layout embedded in backup file names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Marker between a file name and its random temp suffix
pub const TEMP_MARKER: &str = ".tmp.";

/// Maximum document size accepted on load (50 MiB)
pub const MAX_DOCUMENT_SIZE: u64 = 50 * 1024 * 1024;

/// Bytes read for a partial header load during listing
pub const HEADER_READ_SIZE: usize = 4 * 1024;

/// Size of each pooled I/O buffer
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on worker threads for batch store operations
pub const MAX_WORKERS: usize = 8;

/// Maximum identifier length in bytes
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Default file mode for store documents
pub const DOCUMENT_MODE: u32 = 0o644;

/// Default LRU cache capacity (snapshots)
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Upper bound accepted for the configured cache capacity
pub const MAX_CACHE_CAPACITY: usize = 10_000;

// Backup retention defaults
pub const DEFAULT_BACKUP_MAX_AGE_DAYS: u64 = 30;
pub const DEFAULT_BACKUP_MAX_COUNT: usize = 10;

// Table rendering bounds
pub const DEFAULT_MAX_WIDTH: usize = 120;
pub const MIN_MAX_WIDTH: usize = 40;

/// Similarity above which a removed/added pair is considered a move
pub const MOVE_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Baseline version stamped on creation
pub const BASELINE_VERSION: &str = "1.0";

// Exit codes (sysexits.h)
pub const EXIT_DRIFT_DETECTED: i32 = 1;
pub const EXIT_GENERAL: i32 = 1;
pub const EXIT_NO_INPUT: i32 = 66;
pub const EXIT_UNAVAILABLE: i32 = 69;
pub const EXIT_NO_PERMISSION: i32 = 77;
pub const EXIT_CONFIG: i32 = 78;
pub const EXIT_INTERRUPTED: i32 = 130;

// Timeline thresholds
pub const CORRELATION_WINDOW_SECS: i64 = 3600;
pub const CORRELATION_THRESHOLD: f64 = 0.3;
pub const MAX_CORRELATION_EXAMPLES: usize = 3;
pub const PREDICTION_STEPS: usize = 3;
