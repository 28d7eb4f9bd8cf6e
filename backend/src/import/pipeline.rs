//! High-level import API.
//!
//! Combines every step: parsing, normalization, policy check, store
//! reconciliation and the insert pass, all writes inside one transaction.
//!
//! # Example
//!
//! ```rust,no_run
//! use coopcontacts::import::{import_csv_file, ImportOptions};
//! use coopcontacts::store::{SqliteStore, StoreConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = SqliteStore::open(StoreConfig::from_env())?;
//!     let summary = import_csv_file(
//!         Path::new("contatos.csv"),
//!         &mut store,
//!         &ImportOptions::default(),
//!     )?;
//!
//!     println!("Inserted {} contacts", summary.inserted);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::report::{rejected_rows, rejections_by_reason, ImportSummary};
use crate::dedup::{apply_reconciliation, existing_keys, plan_reconciliation, BatchDedup, ReconcilePlan};
use crate::error::{ImportError, ImportResult, StoreError, StoreResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::NormalizedContact;
use crate::parser::CsvSource;
use crate::store::{ContactStore, ContactTransaction};
use crate::validation::{validate_source, RowRejection, ValidationPolicy};

/// Options for one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// What rejected rows mean for the batch
    pub policy: ValidationPolicy,

    /// Merge duplicates already in the store before inserting
    pub reconcile: bool,

    /// Run everything, then roll back
    pub dry_run: bool,

    /// How many rejected rows to list in the log
    pub max_reported_rejections: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            policy: ValidationPolicy::Lenient,
            reconcile: true,
            dry_run: false,
            max_reported_rejections: 25,
        }
    }
}

/// Import a CSV file.
pub fn import_csv_file<S: ContactStore>(
    path: &Path,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary> {
    log_info(format!("📖 Reading {}", path.display()));
    let source = CsvSource::from_path(path)?;
    run_import(&source, store, options)
}

/// Import CSV bytes.
pub fn import_bytes<S: ContactStore>(
    bytes: &[u8],
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary> {
    let source = CsvSource::from_bytes(bytes)?;
    run_import(&source, store, options)
}

/// Run the import against an already-opened source.
///
/// 1. Loads the valid parent identifiers
/// 2. Normalizes every row and applies the policy (strict aborts here)
/// 3. Opens one write transaction, reconciles stored duplicates
/// 4. Inserts new contacts in input order
/// 5. Commits, or rolls back on dry run
///
/// Any failure in steps 3-5 rolls everything back and comes out as
/// [`ImportError::Transaction`].
pub fn run_import<S: ContactStore>(
    source: &CsvSource,
    store: &mut S,
    options: &ImportOptions,
) -> ImportResult<ImportSummary> {
    log_success(format!("Detected encoding: {}", source.encoding()));
    log_success(format!("Detected separator: '{}'", format_delimiter(source.delimiter())));

    // Step 1: parents
    let parents = store.parent_identifiers()?;
    log_info(format!("{} cooperatives known to the store", parents.len()));

    // Step 2: normalize + policy
    log_info(format!("✔️  Normalizing rows ({} policy)...", options.policy));
    let batch = validate_source(source)?;
    log_success(format!(
        "Read {} rows: {} normalized, {} rejected",
        batch.total_rows,
        batch.normalized.len(),
        batch.rejected.len()
    ));
    report_rejections(&batch.rejected, options.max_reported_rejections);
    batch.check_policy(options.policy)?;

    let mut summary = ImportSummary {
        total_rows: batch.total_rows,
        normalized_rows: batch.normalized.len(),
        rejected_rows: rejected_rows(&batch.rejected),
        dry_run: options.dry_run,
        ..Default::default()
    };

    // Step 3-5: one transaction
    let mut tx = store.begin()?;
    if let Err(err) = write_batch(&mut tx, &batch.normalized, &parents, options.reconcile, &mut summary) {
        log_error(format!("Import failed: {}", err));
        if let Err(e) = tx.rollback() {
            log_error(format!("Rollback failed: {}", e));
        }
        return Err(ImportError::Transaction { source: err });
    }

    let finished = if options.dry_run {
        tx.rollback()
    } else {
        tx.commit()
    };
    finished.map_err(|source| ImportError::Transaction { source })?;

    if options.dry_run {
        log_warning("Dry run: all changes rolled back");
    } else {
        log_success(format!("✅ Committed: {} inserted", summary.inserted));
    }
    Ok(summary)
}

/// Reconcile and insert inside an open transaction.
fn write_batch<T: ContactTransaction>(
    tx: &mut T,
    contacts: &[NormalizedContact],
    parents: &HashSet<String>,
    reconcile: bool,
    summary: &mut ImportSummary,
) -> StoreResult<()> {
    let stored = tx.load_contacts()?;
    log_info(format!("{} contacts already stored", stored.len()));

    let plan = if reconcile {
        log_info("🔄 Reconciling stored duplicates...");
        let plan = plan_reconciliation(&stored);
        summary.deleted_in_reconciliation = apply_reconciliation(tx, &plan)?;
        summary.promoted_in_reconciliation = plan.promoted_count();
        if plan.is_empty() {
            log_success("No stored duplicates");
        }
        plan
    } else {
        ReconcilePlan::default()
    };
    let existing = existing_keys(&stored, &plan);

    log_info("📦 Inserting contacts...");
    let mut seen = BatchDedup::new();
    for contact in contacts {
        if !parents.contains(&contact.identifier) {
            summary.skipped_missing_parent += 1;
            log_warning_indent(
                format!("Line {}: cooperative {} not found", contact.line, contact.identifier),
                1,
            );
            continue;
        }

        let key = contact.identity_key();
        if !seen.first_seen(&key) {
            summary.skipped_duplicate_in_batch += 1;
            continue;
        }
        if contact.value.is_empty() {
            continue;
        }
        if existing.contains(&key) || tx.contact_exists(&key)? {
            summary.skipped_existing += 1;
            continue;
        }

        let id = tx.insert_contact(contact)?;
        summary.inserted += 1;
        log_info_indent(format!("+ {} ({})", key, id), 1);
    }

    log_success(format!(
        "{} inserted, {} already stored, {} duplicate in file, {} unknown cooperative",
        summary.inserted,
        summary.skipped_existing,
        summary.skipped_duplicate_in_batch,
        summary.skipped_missing_parent
    ));
    Ok(())
}

fn report_rejections(rejections: &[RowRejection], max: usize) {
    if rejections.is_empty() {
        return;
    }
    log_warning(format!("{} rows rejected", rejections.len()));
    for (reason, count) in rejections_by_reason(rejections) {
        log_warning_indent(format!("• {}: {}", reason, count), 1);
    }
    for r in rejections.iter().take(max) {
        log_warning_indent(r.to_string(), 2);
    }
    if rejections.len() > max {
        log_warning_indent(format!("... +{}", rejections.len() - max), 2);
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

/// Whether an error from [`run_import`] left the store untouched because the
/// write lock could not be taken.
pub fn is_busy(err: &ImportError) -> bool {
    matches!(
        err,
        ImportError::Store(StoreError::Busy(_)) | ImportError::Transaction { source: StoreError::Busy(_) }
    )
}
