//! Store collaborators of the importer.
//!
//! The importer only talks to these traits; [`SqliteStore`] is the production
//! implementation.
//!
//! - [`ParentStore`] - the set of valid parent identifiers
//! - [`ContactStore`] - opens a scoped write transaction
//! - [`ContactTransaction`] - read, delete, promote, check and insert inside
//!   that transaction

pub mod sqlite;

pub use sqlite::{SqliteStore, SqliteTransaction, StoreConfig};

use std::collections::HashSet;

use crate::error::StoreResult;
use crate::models::{IdentityKey, NormalizedContact, StoredContactRow};

/// Source of valid parent identifiers.
pub trait ParentStore {
    /// Current set of three-digit parent identifiers.
    fn parent_identifiers(&mut self) -> StoreResult<HashSet<String>>;
}

/// A store that can open a write transaction on the contacts table.
pub trait ContactStore: ParentStore {
    type Tx<'a>: ContactTransaction
    where
        Self: 'a;

    /// Begin a write transaction. Fails with
    /// [`StoreError::Busy`](crate::error::StoreError::Busy) when the write lock
    /// cannot be taken within the configured wait.
    fn begin(&mut self) -> StoreResult<Self::Tx<'_>>;
}

/// Operations available inside one write transaction.
///
/// Dropping a transaction without calling [`commit`](Self::commit) rolls it back.
pub trait ContactTransaction {
    /// Every row of the contacts table.
    fn load_contacts(&mut self) -> StoreResult<Vec<StoredContactRow>>;

    /// Delete rows by id; returns the number of rows removed.
    fn delete_contacts(&mut self, ids: &[String]) -> StoreResult<usize>;

    /// Set the primary flag of one row.
    fn set_primary(&mut self, id: &str) -> StoreResult<()>;

    /// Whether a row with exactly this (identifier, category, value) is stored.
    fn contact_exists(&mut self, key: &IdentityKey) -> StoreResult<bool>;

    /// Insert an active row; returns the generated id.
    fn insert_contact(&mut self, contact: &NormalizedContact) -> StoreResult<String>;

    fn commit(self) -> StoreResult<()>
    where
        Self: Sized;

    fn rollback(self) -> StoreResult<()>
    where
        Self: Sized;
}
