//! SQLite implementation of the store traits.
//!
//! Works on an existing database; tables are never created or altered.
//!
//! ```text
//! urede_cooperativas          (id_singular, ...)
//! urede_cooperativa_contatos  (id, id_singular, tipo, subtipo, valor,
//!                              principal, ativo, label, criado_em)
//! ```

use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use super::{ContactStore, ContactTransaction, ParentStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{IdentityKey, NormalizedContact, StoredContactRow};
use crate::normalize::normalize_identifier;

/// Default database path, relative to the working directory.
const DEFAULT_DB_PATH: &str = "data/urede.db";

/// Default wait for the write lock, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

const DEFAULT_CONTACTS_TABLE: &str = "urede_cooperativa_contatos";
const DEFAULT_PARENTS_TABLE: &str = "urede_cooperativas";

/// Max bound parameters per DELETE statement.
const DELETE_CHUNK: usize = 500;

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// How long to wait for another writer before failing with `Busy`.
    pub busy_timeout_ms: u64,
    pub contacts_table: String,
    pub parents_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            contacts_table: DEFAULT_CONTACTS_TABLE.to_string(),
            parents_table: DEFAULT_PARENTS_TABLE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `COOPCONTACTS_DB` and
    /// `COOPCONTACTS_BUSY_TIMEOUT_MS` (a `.env` file is loaded if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(path) = env::var("COOPCONTACTS_DB") {
            if !path.trim().is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }
        if let Some(ms) = env::var("COOPCONTACTS_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.busy_timeout_ms = ms;
        }
        config
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Quote an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite-backed contact and parent store.
pub struct SqliteStore {
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStore {
    /// Open an existing database file. The file is never created.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&config.db_path, flags).map_err(|source| {
            StoreError::Open {
                path: config.db_path.clone(),
                source,
            }
        })?;
        Self::from_connection(conn, config)
    }

    /// Wrap an already-open connection (in-memory databases in tests).
    pub fn from_connection(conn: Connection, config: StoreConfig) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn, config };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Fail with `MissingTable` unless both tables exist.
    pub fn ensure_tables(&self) -> StoreResult<()> {
        for table in [&self.config.parents_table, &self.config.contacts_table] {
            let found = self
                .conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1",
                    params![table],
                    |_| Ok(()),
                )
                .optional()?;
            if found.is_none() {
                return Err(StoreError::MissingTable(table.clone()));
            }
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ParentStore for SqliteStore {
    fn parent_identifiers(&mut self) -> StoreResult<HashSet<String>> {
        let sql = format!(
            "SELECT CAST(id_singular AS TEXT) FROM {}",
            quote_ident(&self.config.parents_table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;

        let mut ids = HashSet::new();
        for raw in rows {
            if let Some(id) = raw?.as_deref().and_then(normalize_identifier) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }
}

impl ContactStore for SqliteStore {
    type Tx<'a> = SqliteTransaction<'a> where Self: 'a;

    fn begin(&mut self) -> StoreResult<Self::Tx<'_>> {
        let contacts = quote_ident(&self.config.contacts_table);
        // IMMEDIATE takes the write lock now, so contention surfaces here.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { tx, contacts })
    }
}

/// One IMMEDIATE transaction on the contacts table.
pub struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
    contacts: String,
}

impl ContactTransaction for SqliteTransaction<'_> {
    fn load_contacts(&mut self) -> StoreResult<Vec<StoredContactRow>> {
        let sql = format!(
            "SELECT CAST(id AS TEXT),
                    CAST(COALESCE(id_singular, '') AS TEXT),
                    CAST(COALESCE(tipo, '') AS TEXT),
                    CAST(subtipo AS TEXT),
                    CAST(COALESCE(valor, '') AS TEXT),
                    CAST(COALESCE(principal, 0) AS INTEGER),
                    CAST(COALESCE(ativo, 1) AS INTEGER),
                    CAST(label AS TEXT),
                    CAST(criado_em AS TEXT)
               FROM {}",
            self.contacts
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredContactRow {
                id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                identifier: row.get(1)?,
                category: row.get(2)?,
                subcategory: row.get(3)?,
                value: row.get(4)?,
                is_primary: row.get::<_, i64>(5)? != 0,
                active: row.get::<_, i64>(6)? != 0,
                label: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn delete_contacts(&mut self, ids: &[String]) -> StoreResult<usize> {
        let mut deleted = 0;
        for chunk in ids.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("DELETE FROM {} WHERE id IN ({})", self.contacts, placeholders);
            deleted += self.tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }
        Ok(deleted)
    }

    fn set_primary(&mut self, id: &str) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET principal = 1 WHERE id = ?1", self.contacts);
        self.tx.execute(&sql, params![id])?;
        Ok(())
    }

    fn contact_exists(&mut self, key: &IdentityKey) -> StoreResult<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE id_singular = ?1 AND tipo = ?2 AND valor = ?3 LIMIT 1",
            self.contacts
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;
        Ok(stmt.exists(params![key.identifier, key.category.as_str(), key.value])?)
    }

    fn insert_contact(&mut self, contact: &NormalizedContact) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {} (id, id_singular, tipo, subtipo, valor, principal, ativo, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            self.contacts
        );
        let mut stmt = self.tx.prepare_cached(&sql)?;
        stmt.execute(params![
            id,
            contact.identifier,
            contact.category.as_str(),
            contact.subcategory.as_ref().map(|s| s.as_str()),
            contact.value,
            contact.is_primary as i64,
            contact.label,
        ])?;
        Ok(id)
    }

    fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Category, Subcategory};

    pub(crate) const TEST_SCHEMA: &str = r#"
        CREATE TABLE urede_cooperativas (
            id_singular TEXT PRIMARY KEY,
            nome TEXT
        );
        CREATE TABLE urede_cooperativa_contatos (
            id TEXT PRIMARY KEY,
            id_singular TEXT NOT NULL,
            tipo TEXT NOT NULL,
            subtipo TEXT,
            valor TEXT,
            principal INTEGER DEFAULT 0,
            ativo INTEGER DEFAULT 1,
            label TEXT,
            criado_em TEXT DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO urede_cooperativas (id_singular, nome) VALUES ('001', 'Alpha'), ('7', 'Beta');
    "#;

    pub(crate) fn memory_store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(TEST_SCHEMA).unwrap();
        SqliteStore::from_connection(conn, StoreConfig::default()).unwrap()
    }

    fn contact(value: &str) -> NormalizedContact {
        NormalizedContact {
            line: 2,
            identifier: "001".into(),
            category: Category::Email,
            subcategory: Some(Subcategory::Lgpd),
            value: value.into(),
            is_primary: true,
            label: Some("DPO".into()),
        }
    }

    fn count(store: &SqliteStore) -> i64 {
        store
            .connection()
            .query_row("SELECT COUNT(*) FROM urede_cooperativa_contatos", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE urede_cooperativas (id_singular TEXT);").unwrap();
        match SqliteStore::from_connection(conn, StoreConfig::default()) {
            Err(StoreError::MissingTable(t)) => assert_eq!(t, "urede_cooperativa_contatos"),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn test_parent_identifiers_normalized() {
        let mut store = memory_store();
        let ids = store.parent_identifiers().unwrap();
        assert!(ids.contains("001"));
        assert!(ids.contains("007"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_insert_and_exists() {
        let mut store = memory_store();
        let c = contact("dpo@alpha.coop");

        let mut tx = store.begin().unwrap();
        assert!(!tx.contact_exists(&c.identity_key()).unwrap());
        let id = tx.insert_contact(&c).unwrap();
        assert!(tx.contact_exists(&c.identity_key()).unwrap());
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        let rows = tx.load_contacts().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].category, "email");
        assert_eq!(rows[0].subcategory.as_deref(), Some("lgpd"));
        assert!(rows[0].is_primary);
        assert!(rows[0].active);
        assert!(rows[0].created_at.is_some());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut store = memory_store();
        let mut tx = store.begin().unwrap();
        tx.insert_contact(&contact("a@alpha.coop")).unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&store), 0);

        {
            let mut tx = store.begin().unwrap();
            tx.insert_contact(&contact("b@alpha.coop")).unwrap();
            // dropped without commit
        }
        assert_eq!(count(&store), 0);
    }

    #[test]
    fn test_delete_and_promote() {
        let mut store = memory_store();
        store
            .connection()
            .execute_batch(
                "INSERT INTO urede_cooperativa_contatos (id, id_singular, tipo, valor, principal)
                 VALUES ('a', '001', 'email', 'x@y.com', 0),
                        ('b', '001', 'email', 'x@y.com', 0),
                        ('c', '001', 'email', 'z@y.com', 0);",
            )
            .unwrap();

        let mut tx = store.begin().unwrap();
        let deleted = tx.delete_contacts(&["b".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(deleted, 1);
        tx.set_primary("a").unwrap();
        tx.commit().unwrap();

        let primary: i64 = store
            .connection()
            .query_row(
                "SELECT principal FROM urede_cooperativa_contatos WHERE id = 'a'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(primary, 1);
        assert_eq!(count(&store), 2);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_db_path(dir.path().join("absent.db"));
        assert!(matches!(SqliteStore::open(config), Err(StoreError::Open { .. })));
    }

    #[test]
    fn test_busy_when_another_writer_holds_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(TEST_SCHEMA).unwrap();
        }

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let config = StoreConfig::default()
            .with_db_path(&path)
            .with_busy_timeout_ms(50);
        let mut store = SqliteStore::open(config).unwrap();
        match store.begin() {
            Err(e) => assert!(e.is_transient(), "expected busy, got {e}"),
            Ok(_) => panic!("write lock should be held by another connection"),
        }

        holder.execute_batch("ROLLBACK;").unwrap();
        assert!(store.begin().is_ok());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("contatos"), "\"contatos\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
