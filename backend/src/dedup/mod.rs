//! Duplicate detection.
//!
//! Two scopes, one notion of identity ([`IdentityKey`]):
//!
//! ```text
//! batch      first occurrence wins, later ones are counted
//!
//! store      rows grouped by canonical key       ┌──────────────────┐
//!            ─▶ one survivor per group         ─▶│ ReconcilePlan    │
//!            ─▶ the rest deleted                 │  deletes, promotes│
//!            ─▶ survivor promoted if a deleted   └──────────────────┘
//!               member was primary
//! ```
//!
//! [`IdentityKey`]: crate::models::IdentityKey

pub mod batch;
pub mod reconcile;

pub use batch::{dedup_batch, BatchDedup, BatchDedupOutcome};
pub use reconcile::{
    apply_reconciliation, existing_keys, plan_reconciliation, stored_identity_key, ReconcileDecision,
    ReconcilePlan,
};
