//! Row normalization.
//!
//! Pure, deterministic mapping from a [`RawContactRow`] to a
//! [`NormalizedContact`], or to a [`RowRejection`] describing why the row
//! cannot be imported.
//!
//! ## Flow
//!
//! ```text
//! identifier ─▶ digits, ≤3, zero-pad        ─┐
//! category   ─▶ fold text ─▶ synonym table   ├─▶ NormalizedContact
//! value      ─▶ per-category canonical form  │      or RowRejection
//! primary    ─▶ truthy tokens                ─┘
//! ```

pub mod tables;
pub mod text;
pub mod value;

pub use tables::{lookup_category, lookup_subcategory};
pub use text::{digits_only, normalize_enum_text};
pub use value::{
    canonical_stored_value, fold_email, is_valid_email, normalize_email, normalize_identifier,
    normalize_phone, normalize_website, parse_primary,
};

use crate::models::{Category, NormalizedContact, RawContactRow};
use crate::parser::columns;
use crate::validation::{RejectReason, RowRejection};

/// Normalize one raw row.
///
/// # Example
/// ```
/// use coopcontacts::models::{Category, RawContactRow};
/// use coopcontacts::normalize::normalize_row;
///
/// let row = RawContactRow {
///     line: 2,
///     identifier: "7".into(),
///     category: "E-mail".into(),
///     value: " John@Example.COM ".into(),
///     ..Default::default()
/// };
/// let contact = normalize_row(&row).unwrap();
/// assert_eq!(contact.identifier, "007");
/// assert_eq!(contact.category, Category::Email);
/// assert_eq!(contact.value, "john@example.com");
/// ```
pub fn normalize_row(row: &RawContactRow) -> Result<NormalizedContact, RowRejection> {
    let identifier = normalize_identifier(&row.identifier).ok_or_else(|| {
        RowRejection::new(row.line, columns::IDENTIFIER, &row.identifier, RejectReason::InvalidIdentifier)
    })?;

    let category = lookup_category(&normalize_enum_text(&row.category)).ok_or_else(|| {
        RowRejection::new(row.line, columns::CATEGORY, &row.category, RejectReason::EmptyCategory)
    })?;

    let value = normalize_value(&category, &row.value)
        .map_err(|reason| RowRejection::new(row.line, columns::VALUE, &row.value, reason))?;

    let label = row.label.trim();

    Ok(NormalizedContact {
        line: row.line,
        identifier,
        subcategory: lookup_subcategory(&normalize_enum_text(&row.subcategory)),
        category,
        value,
        is_primary: parse_primary(&row.is_primary),
        label: (!label.is_empty()).then(|| label.to_string()),
    })
}

/// Canonical value for a category, or the reason it has none.
pub fn normalize_value(category: &Category, raw: &str) -> Result<String, RejectReason> {
    match category {
        Category::Email => normalize_email(raw).ok_or(RejectReason::InvalidEmail),
        Category::Website => normalize_website(raw).ok_or(RejectReason::InvalidUrl),
        c if c.is_phone_like() => normalize_phone(raw).ok_or(RejectReason::InvalidPhone),
        _ => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Err(RejectReason::EmptyValue)
            } else {
                Ok(trimmed.to_string())
            }
        }
    }
}
