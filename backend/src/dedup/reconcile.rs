//! Store-side reconciliation.
//!
//! Rows already in the contacts table are grouped by canonical identity key.
//! Every group with more than one member keeps a single survivor:
//!
//! 1. primary rows first
//! 2. then the most recent `criado_em` (missing or unparseable counts as oldest)
//! 3. then the smallest id
//!
//! All other members are deleted. When one of them was primary and the survivor
//! was not, the survivor is promoted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::error::StoreResult;
use crate::logs::{log_info, log_info_indent};
use crate::models::{IdentityKey, StoredContactRow};
use crate::normalize::{canonical_stored_value, lookup_category, normalize_enum_text, normalize_identifier};
use crate::store::ContactTransaction;

/// Timestamp layouts seen in `criado_em`.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Outcome for one duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileDecision {
    pub key: IdentityKey,
    pub survivor_id: String,
    pub deleted_ids: Vec<String>,
    /// Survivor gets `principal = 1`.
    pub promote_survivor: bool,
}

/// Every decision taken over the stored rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePlan {
    pub decisions: Vec<ReconcileDecision>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn deleted_ids(&self) -> impl Iterator<Item = &String> {
        self.decisions.iter().flat_map(|d| d.deleted_ids.iter())
    }

    pub fn deleted_count(&self) -> usize {
        self.decisions.iter().map(|d| d.deleted_ids.len()).sum()
    }

    pub fn promoted_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.promote_survivor).count()
    }
}

/// Canonical key of a stored row, or `None` when any part is empty.
///
/// The identifier falls back to its trimmed raw text when it is not a valid
/// three-digit identifier, so legacy rows still group with each other.
pub fn stored_identity_key(row: &StoredContactRow) -> Option<IdentityKey> {
    let identifier =
        normalize_identifier(&row.identifier).unwrap_or_else(|| row.identifier.trim().to_string());
    let category = lookup_category(&normalize_enum_text(&row.category))?;
    let value = canonical_stored_value(&category, &row.value);

    let key = IdentityKey::new(identifier, category, value);
    (!key.is_incomplete()).then_some(key)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn created_at(row: &StoredContactRow) -> Option<NaiveDateTime> {
    row.created_at.as_deref().and_then(parse_timestamp)
}

/// Best row first.
fn survivor_order(a: &StoredContactRow, b: &StoredContactRow) -> Ordering {
    b.is_primary
        .cmp(&a.is_primary)
        .then_with(|| created_at(b).cmp(&created_at(a)))
        .then_with(|| a.id.cmp(&b.id))
}

/// Decide survivors and deletions. Pure; nothing is written.
pub fn plan_reconciliation(rows: &[StoredContactRow]) -> ReconcilePlan {
    let mut groups: BTreeMap<IdentityKey, Vec<&StoredContactRow>> = BTreeMap::new();
    for row in rows {
        if let Some(key) = stored_identity_key(row) {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut plan = ReconcilePlan::default();
    for (key, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| survivor_order(a, b));

        let survivor = members[0];
        let losers = &members[1..];
        let promote_survivor = !survivor.is_primary && losers.iter().any(|r| r.is_primary);

        plan.decisions.push(ReconcileDecision {
            key,
            survivor_id: survivor.id.clone(),
            deleted_ids: losers.iter().map(|r| r.id.clone()).collect(),
            promote_survivor,
        });
    }

    plan
}

/// Write a plan inside an open transaction. Returns the number of rows deleted.
pub fn apply_reconciliation<T: ContactTransaction>(tx: &mut T, plan: &ReconcilePlan) -> StoreResult<usize> {
    if plan.is_empty() {
        return Ok(0);
    }

    let ids: Vec<String> = plan.deleted_ids().cloned().collect();
    let deleted = tx.delete_contacts(&ids)?;

    for decision in &plan.decisions {
        if decision.promote_survivor {
            tx.set_primary(&decision.survivor_id)?;
        }
        log_info_indent(
            format!(
                "{} → kept {}, removed {}{}",
                decision.key,
                decision.survivor_id,
                decision.deleted_ids.len(),
                if decision.promote_survivor { " (promoted)" } else { "" }
            ),
            1,
        );
    }

    log_info(format!(
        "Reconciliation: {} duplicate groups, {} rows deleted, {} promoted",
        plan.decisions.len(),
        deleted,
        plan.promoted_count()
    ));

    Ok(deleted)
}

/// Canonical keys of the stored rows that remain after a plan is applied.
pub fn existing_keys(rows: &[StoredContactRow], plan: &ReconcilePlan) -> HashSet<IdentityKey> {
    let removed: HashSet<&String> = plan.deleted_ids().collect();
    rows.iter()
        .filter(|r| !removed.contains(&r.id))
        .filter_map(stored_identity_key)
        .collect()
}
