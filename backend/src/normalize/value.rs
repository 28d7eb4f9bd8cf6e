//! Canonical forms for identifiers, contact values and flags.
//!
//! Each function returns `None` when the raw text cannot be canonicalized; the
//! caller turns that into a row rejection.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::text::digits_only;
use crate::models::Category;

/// Width of the parent identifier.
pub const IDENTIFIER_WIDTH: usize = 3;

/// Longest accepted email address.
pub const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// An explicit `scheme://` prefix.
static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)[a-z][a-z0-9+.\-]*://").expect("valid scheme regex"));

const TRUE_TOKENS: &[&str] = &["1", "true", "t", "sim", "s", "yes", "y", "x"];

/// Parent identifier: digits only, at most three, left-padded with zeros.
///
/// ```
/// use coopcontacts::normalize::normalize_identifier;
///
/// assert_eq!(normalize_identifier("7").as_deref(), Some("007"));
/// assert_eq!(normalize_identifier("12345"), None);
/// ```
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    if digits.is_empty() || digits.len() > IDENTIFIER_WIDTH {
        return None;
    }
    Some(format!("{:0>width$}", digits, width = IDENTIFIER_WIDTH))
}

/// Lowercase and trim. No syntax check.
pub fn fold_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(value: &str) -> bool {
    !value.is_empty() && value.chars().count() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(value)
}

/// Folded email when it looks like `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let folded = fold_email(raw);
    is_valid_email(&folded).then_some(folded)
}

/// Canonical absolute http(s) URL.
///
/// Adds `https://` when no scheme is given, lowercases scheme and host, drops
/// the fragment, keeps the query, and strips trailing slashes from any path
/// other than the bare root.
pub fn normalize_website(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let candidate = if SCHEME_RE.is_match(raw) {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let mut url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().map_or(true, str::is_empty) {
        return None;
    }

    url.set_fragment(None);

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    Some(url.to_string())
}

/// Digits of a phone-like value.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    (!digits.is_empty()).then_some(digits)
}

/// Truthy tokens, case-insensitive. Anything else is `false`.
pub fn parse_primary(raw: &str) -> bool {
    let token = raw.trim().to_lowercase();
    TRUE_TOKENS.contains(&token.as_str())
}

/// Best-effort canonical value for a stored row, used to group rows that were
/// written before normalization existed. Emails are folded without a syntax
/// check; values that cannot be canonicalized come back empty.
pub fn canonical_stored_value(category: &Category, raw: &str) -> String {
    match category {
        Category::Email => fold_email(raw),
        Category::Website => normalize_website(raw).unwrap_or_default(),
        c if c.is_phone_like() => digits_only(raw),
        _ => raw.trim().to_string(),
    }
}
