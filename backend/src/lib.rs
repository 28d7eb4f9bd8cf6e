//! # coopcontacts - cooperative contacts normalizer and importer
//!
//! Reads contact CSV files (email, phone, WhatsApp, website, ...) exported by
//! cooperatives, canonicalizes every value, drops duplicates and writes the
//! result into the shared SQLite contacts table in a single transaction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐
//! │ CSV File │──▶│  Parser  │──▶│ Normalizer │──▶│ Deduplicator │──▶│  SQLite  │
//! │(ISO/UTF8)│   │(auto-enc)│   │ + Validator│   │ batch + store│   │ (1 txn)  │
//! └──────────┘   └──────────┘   └────────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coopcontacts::{import_csv_file, ImportOptions, SqliteStore, StoreConfig};
//! use std::path::Path;
//!
//! let mut store = SqliteStore::open(StoreConfig::from_env()).unwrap();
//! let summary = import_csv_file(Path::new("contatos.csv"), &mut store, &ImportOptions::default()).unwrap();
//! println!("Inserted {} contacts", summary.inserted);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (RawContactRow, NormalizedContact, IdentityKey)
//! - [`parser`] - CSV reading with encoding and delimiter detection
//! - [`normalize`] - Canonical forms per category
//! - [`validation`] - Required columns and strict/lenient policy
//! - [`dedup`] - Batch dedup and store reconciliation
//! - [`store`] - Store traits and the SQLite implementation
//! - [`import`] - Transactional import pipeline and summary
//! - [`backup`] - Timestamped database copies
//! - [`logs`] - Progress log broadcaster

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Normalization
pub mod normalize;
pub mod validation;

// Deduplication
pub mod dedup;

// Persistence
pub mod backup;
pub mod store;

// Orchestration
pub mod import;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{BackupError, CsvError, ImportError, StoreError, ValidationError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Category, IdentityKey, NormalizedContact, RawContactRow, StoredContactRow, Subcategory};

// =============================================================================
// Re-exports - Parsing & Normalization
// =============================================================================

pub use parser::{decode_content, detect_delimiter, detect_encoding, CsvSource};

pub use normalize::{normalize_row, normalize_value};

pub use validation::{validate_source, RejectReason, RowRejection, ValidatedBatch, ValidationPolicy};

// =============================================================================
// Re-exports - Deduplication
// =============================================================================

pub use dedup::{dedup_batch, plan_reconciliation, ReconcileDecision, ReconcilePlan};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{ContactStore, ContactTransaction, ParentStore, SqliteStore, StoreConfig};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use import::{import_bytes, import_csv_file, run_import, ImportOptions, ImportSummary};

pub use backup::{backup_database, restore_hint};
