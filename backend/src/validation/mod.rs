//! Batch validation.
//!
//! Two duties:
//!
//! 1. **Required columns** - checked on the header line, before any row is
//!    read. A missing column fails the whole batch.
//! 2. **Policy** - per-row failures come from the normalizer as
//!    [`RowRejection`]s. The [`ValidationPolicy`] decides what they mean for
//!    the batch:
//!    - [`ValidationPolicy::Strict`]: any rejection aborts the import, nothing
//!      is written.
//!    - [`ValidationPolicy::Lenient`]: rejected rows are skipped and reported.
//!
//! # Example
//!
//! ```rust
//! use coopcontacts::parser::CsvSource;
//! use coopcontacts::validation::{validate_source, ValidationPolicy};
//!
//! let csv = "id_singular,tipo,subtipo,valor\n7,email,,a@b.com\n1234,email,,x@y.com\n";
//! let source = CsvSource::from_bytes(csv.as_bytes()).unwrap();
//!
//! let batch = validate_source(&source).unwrap();
//! assert_eq!(batch.normalized.len(), 1);
//! assert_eq!(batch.rejected.len(), 1);
//!
//! assert!(batch.check_policy(ValidationPolicy::Lenient).is_ok());
//! assert!(batch.check_policy(ValidationPolicy::Strict).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ImportError, ValidationError};
use crate::models::NormalizedContact;
use crate::normalize::normalize_row;
use crate::parser::{columns, CsvSource};

/// Columns that must be present in the header line.
pub const REQUIRED_COLUMNS: &[&str] = &[
    columns::IDENTIFIER,
    columns::CATEGORY,
    columns::SUBCATEGORY,
    columns::VALUE,
];

// =============================================================================
// Policy
// =============================================================================

/// What a rejected row means for the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Any rejected row aborts the import before the first write.
    Strict,
    /// Rejected rows are skipped and reported; the rest is imported.
    #[default]
    Lenient,
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Strict => f.write_str("strict"),
            ValidationPolicy::Lenient => f.write_str("lenient"),
        }
    }
}

impl std::str::FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(ValidationPolicy::Strict),
            "lenient" => Ok(ValidationPolicy::Lenient),
            other => Err(format!("unknown validation policy '{}' (expected strict or lenient)", other)),
        }
    }
}

// =============================================================================
// Row Rejections
// =============================================================================

/// Why a row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidIdentifier,
    EmptyCategory,
    InvalidEmail,
    InvalidUrl,
    InvalidPhone,
    EmptyValue,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RejectReason::InvalidIdentifier => "invalid identifier (expected up to 3 digits)",
            RejectReason::EmptyCategory => "empty category",
            RejectReason::InvalidEmail => "invalid email",
            RejectReason::InvalidUrl => "invalid URL (use http or https)",
            RejectReason::InvalidPhone => "invalid phone number (no digits)",
            RejectReason::EmptyValue => "empty value",
        };
        f.write_str(msg)
    }
}

/// A row that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRejection {
    /// Source line (header is line 1).
    pub line: usize,
    /// Column holding the offending value.
    pub field: String,
    pub raw_value: String,
    pub reason: RejectReason,
    /// Human-readable reason.
    pub message: String,
}

impl RowRejection {
    pub fn new(line: usize, field: &str, raw_value: &str, reason: RejectReason) -> Self {
        Self {
            line,
            field: field.to_string(),
            raw_value: raw_value.to_string(),
            reason,
            message: reason.to_string(),
        }
    }
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}, column '{}' (value '{}'): {}",
            self.line, self.field, self.raw_value, self.message
        )
    }
}

// =============================================================================
// Batch Validation
// =============================================================================

/// Fail when any of [`REQUIRED_COLUMNS`] is absent. Header names are expected
/// to be normalized already (see [`CsvSource::headers`]).
pub fn require_columns(headers: &[String]) -> Result<(), ValidationError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingColumns { missing })
    }
}

/// Rows of one batch, split by the normalizer.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    /// Data rows read (blank lines excluded).
    pub total_rows: usize,
    /// Normalized contacts, in input order.
    pub normalized: Vec<NormalizedContact>,
    /// Rejected rows, in input order.
    pub rejected: Vec<RowRejection>,
}

impl ValidatedBatch {
    /// Apply the batch policy. Strict mode turns any rejection into an error
    /// carrying every rejection.
    pub fn check_policy(&self, policy: ValidationPolicy) -> Result<(), ImportError> {
        match policy {
            ValidationPolicy::Strict if !self.rejected.is_empty() => Err(ImportError::RowsRejected {
                rejections: self.rejected.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Check the header, then normalize every row of the source.
///
/// Per-row problems never stop the loop; a structural CSV error does.
pub fn validate_source(source: &CsvSource) -> Result<ValidatedBatch, ImportError> {
    require_columns(source.headers())?;

    let mut batch = ValidatedBatch::default();
    for row in source.rows() {
        let row = row?;
        batch.total_rows += 1;
        match normalize_row(&row) {
            Ok(contact) => batch.normalized.push(contact),
            Err(rejection) => batch.rejected.push(rejection),
        }
    }

    Ok(batch)
}
