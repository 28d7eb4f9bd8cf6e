//! Text folding helpers shared by the enum and value normalizers.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold free text for enum matching: trim, lowercase, strip diacritics,
/// collapse whitespace runs to one space.
///
/// ```
/// use coopcontacts::normalize::normalize_enum_text;
///
/// assert_eq!(normalize_enum_text("  Plantão   24h "), "plantao 24h");
/// assert_eq!(normalize_enum_text("EMERGÊNCIA"), "emergencia");
/// ```
pub fn normalize_enum_text(value: &str) -> String {
    let folded: String = value
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep ASCII digits only.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}
