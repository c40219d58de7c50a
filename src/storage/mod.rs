//! On-disk storage primitives
//!
//! Atomic file replacement for the baseline and reports, plus the PID lock
//! that keeps a second instance off the same data directory.

pub mod atomic;
pub mod lockfile;

pub use atomic::{write_atomic, StagedFile};
pub use lockfile::{DataDirLock, LockError};

/// Byte-order mark prefixed to CSV output so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
