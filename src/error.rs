// ⚠️ Error types - hard failures only
// Recoverable anomalies (missing source dir, bad line, unreadable file) are
// diagnostics, never errors.

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A profile file that was explicitly requested by path does not exist
    #[error("Profile not found: {}", .0.display())]
    ProfileNotFound(PathBuf),

    /// I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Alias table could not be read or decoded
    #[error("Alias table error: {0}")]
    AliasTable(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
