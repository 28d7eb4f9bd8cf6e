//! Error types for the contacts import pipeline.
//!
//! This module defines the error hierarchy:
//!
//! - [`CsvError`] - Row source errors (read, decode, parse)
//! - [`ValidationError`] - Batch-fatal validation errors (missing columns)
//! - [`StoreError`] - SQLite store errors, including lock contention
//! - [`BackupError`] - Database backup copy errors
//! - [`ImportError`] - Top-level orchestration errors
//!
//! Per-row problems are not errors: they are collected as
//! [`RowRejection`](crate::validation::RowRejection) records and reported.
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::RowRejection;

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading the CSV row source.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CSV structure.
    #[error("Invalid CSV at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Batch-level validation failures, raised before any row is processed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Required columns are absent from the header line.
    #[error("CSV is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the contact / parent store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer held the lock longer than the configured busy timeout.
    #[error("Database is busy (another writer holds the lock): {0}")]
    Busy(String),

    /// A table the importer relies on does not exist.
    #[error("Table '{0}' does not exist in the database")]
    MissingTable(String),

    /// Database file could not be opened.
    #[error("Cannot open database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Any other SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Busy(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => StoreError::Sqlite(other),
        }
    }
}

impl StoreError {
    /// Lock contention is the only transient failure; retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

// =============================================================================
// Backup Errors
// =============================================================================

/// Errors while copying the database before an import.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Database file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Backup failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Top-level import errors.
///
/// This is the error type returned by [`crate::import::run_import`].
#[derive(Debug, Error)]
pub enum ImportError {
    /// CSV reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Batch validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Strict policy: at least one row was rejected, nothing was written.
    #[error("{} row(s) failed validation; nothing was imported", .rejections.len())]
    RowsRejected { rejections: Vec<RowRejection> },

    /// Store error raised before the transaction was opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error inside the transaction; everything was rolled back.
    #[error("Import failed, transaction rolled back: {source}")]
    Transaction {
        #[source]
        source: StoreError,
    },
}

impl ImportError {
    /// Errors caused by the input or environment rather than by the write.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ImportError::Csv(_)
                | ImportError::Validation(_)
                | ImportError::Store(StoreError::MissingTable(_))
                | ImportError::Store(StoreError::Open { .. })
        )
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;
