// End-to-end tests: CSV file -> SQLite database, through the library and the CLI.
// Run with: cargo test -p coopcontacts-backend --test import_test

use coopcontacts::error::ImportError;
use coopcontacts::import::{import_csv_file, ImportOptions};
use coopcontacts::store::{SqliteStore, StoreConfig};
use coopcontacts::validation::ValidationPolicy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SCHEMA: &str = r#"
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
    INSERT INTO urede_cooperativas (id_singular, nome)
    VALUES ('001', 'Alpha'), ('002', 'Beta'), ('010', 'Gamma');
"#;

const CONTACTS_CSV: &str = "\
id_singular;tipo;subtipo;valor;principal;label
1;E-mail;LGPD; DPO@Alpha.coop ;sim;Encarregado
1;email;lgpd;dpo@alpha.coop;;
2;WhatsApp Comercial;Plantão 24h;+55 (11) 98888-7777;1;
2;Site;Portal do Cliente;Alpha.coop/cliente/;;
10;Telefone Fixo;;(21) 3333-4444;;Recepção
999;email;;orphan@x.com;;
";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let conn = Connection::open(dir.path().join("urede.db")).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        Self { dir }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("urede.db")
    }

    fn csv(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::open(StoreConfig::default().with_db_path(self.db())).unwrap()
    }

    fn conn(&self) -> Connection {
        Connection::open(self.db()).unwrap()
    }

    fn contact_count(&self) -> i64 {
        self.conn()
            .query_row("SELECT COUNT(*) FROM urede_cooperativa_contatos", [], |r| r.get(0))
            .unwrap()
    }
}

fn identity_duplicates(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM (
            SELECT id_singular, tipo, valor FROM urede_cooperativa_contatos
            GROUP BY id_singular, tipo, valor HAVING COUNT(*) > 1
         )",
        [],
        |r| r.get(0),
    )
    .unwrap()
}

#[test]
fn import_then_reimport_is_idempotent() {
    let fx = Fixture::new();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);

    let first = import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap();
    assert_eq!(first.total_rows, 6);
    assert_eq!(first.inserted, 4);
    assert_eq!(first.skipped_duplicate_in_batch, 1);
    assert_eq!(first.skipped_missing_parent, 1);
    assert_eq!(fx.contact_count(), 4);

    let second = import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped_existing, 4);
    assert_eq!(fx.contact_count(), 4);
    assert_eq!(identity_duplicates(&fx.conn()), 0);
}

#[test]
fn stored_values_are_canonical() {
    let fx = Fixture::new();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);
    import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap();

    let conn = fx.conn();
    let mut stmt = conn
        .prepare("SELECT id_singular, tipo, subtipo, valor, principal FROM urede_cooperativa_contatos ORDER BY id_singular, tipo")
        .unwrap();
    let rows: Vec<(String, String, Option<String>, String, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(
        rows,
        vec![
            ("001".into(), "email".into(), Some("lgpd".into()), "dpo@alpha.coop".into(), 1),
            ("002".into(), "website".into(), Some("portal do cliente".into()), "https://alpha.coop/cliente".into(), 0),
            ("002".into(), "whatsapp".into(), Some("plantao".into()), "5511988887777".into(), 1),
            ("010".into(), "telefone".into(), None, "2133334444".into(), 0),
        ]
    );
}

#[test]
fn reconciliation_merges_legacy_duplicates() {
    let fx = Fixture::new();
    fx.conn()
        .execute_batch(
            "INSERT INTO urede_cooperativa_contatos (id, id_singular, tipo, valor, principal, criado_em) VALUES
                ('old', '1',   'E-mail', 'DPO@alpha.coop', 0, '2022-01-01 00:00:00'),
                ('new', '001', 'email',  'dpo@alpha.coop', 0, '2024-01-01 00:00:00'),
                ('pri', '001', 'Email',  ' dpo@Alpha.coop', 1, '2020-01-01 00:00:00');",
        )
        .unwrap();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);

    let summary = import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap();
    assert_eq!(summary.deleted_in_reconciliation, 2);
    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.inserted, 3);

    let kept: String = fx
        .conn()
        .query_row(
            "SELECT id FROM urede_cooperativa_contatos WHERE lower(trim(valor)) = 'dpo@alpha.coop'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(kept, "pri");
}

#[test]
fn strict_policy_writes_nothing() {
    let fx = Fixture::new();
    let csv = fx.csv(
        "bad.csv",
        "id_singular,tipo,subtipo,valor\n1,email,,ok@alpha.coop\n2,email,,not-an-email\n",
    );
    let strict = ImportOptions {
        policy: ValidationPolicy::Strict,
        ..Default::default()
    };

    let err = import_csv_file(&csv, &mut fx.store(), &strict).unwrap_err();
    assert!(matches!(err, ImportError::RowsRejected { .. }));
    assert_eq!(fx.contact_count(), 0);

    let summary = import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.rejected_rows.len(), 1);
    assert_eq!(summary.rejected_rows[0].line, 3);
    assert_eq!(fx.contact_count(), 1);
}

#[test]
fn failing_insert_rolls_back_everything() {
    let fx = Fixture::new();
    fx.conn()
        .execute_batch(
            "INSERT INTO urede_cooperativa_contatos (id, id_singular, tipo, valor) VALUES
                ('a', '001', 'email', 'dup@alpha.coop'),
                ('b', '001', 'email', 'DUP@alpha.coop');
             CREATE TRIGGER fail_on_website BEFORE INSERT ON urede_cooperativa_contatos
             WHEN NEW.tipo = 'website'
             BEGIN SELECT RAISE(ABORT, 'website inserts disabled'); END;",
        )
        .unwrap();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);

    let err = import_csv_file(&csv, &mut fx.store(), &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, ImportError::Transaction { .. }));
    assert_eq!(fx.contact_count(), 2);
}

// =============================================================================
// CLI
// =============================================================================

fn coopcontacts(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_coopcontacts"));
    cmd.current_dir(cwd);
    cmd.env_remove("COOPCONTACTS_DB");
    cmd
}

#[test]
fn cli_import_json_and_backup() {
    let fx = Fixture::new();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);
    let backups = fx.dir.path().join("backups");

    let out = coopcontacts(fx.dir.path())
        .args(["import", "--json", "--db"])
        .arg(fx.db())
        .arg("--csv")
        .arg(&csv)
        .arg("--backups-dir")
        .arg(&backups)
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["inserted"], 4);
    assert_eq!(summary["dry_run"], false);

    let copies: Vec<_> = fs::read_dir(&backups).unwrap().flatten().collect();
    assert_eq!(copies.len(), 1);
}

#[test]
fn cli_dry_run_leaves_database_untouched() {
    let fx = Fixture::new();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);

    let status = coopcontacts(fx.dir.path())
        .args(["import", "--dry-run", "--db"])
        .arg(fx.db())
        .arg("--csv")
        .arg(&csv)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fx.contact_count(), 0);
    assert!(!fx.dir.path().join("data/backups").exists());
}

#[test]
fn cli_exit_codes() {
    let fx = Fixture::new();

    let missing = coopcontacts(fx.dir.path())
        .args(["import", "--no-backup", "--csv", "absent.csv", "--db"])
        .arg(fx.db())
        .status()
        .unwrap();
    assert_eq!(missing.code(), Some(2));

    let no_columns = fx.csv("cols.csv", "id_singular,valor\n1,a@b.com\n");
    let status = coopcontacts(fx.dir.path())
        .args(["import", "--no-backup", "--db"])
        .arg(fx.db())
        .arg("--csv")
        .arg(&no_columns)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));

    let bad = fx.csv("bad.csv", "id_singular,tipo,subtipo,valor\n1,email,,nope\n");
    let status = coopcontacts(fx.dir.path())
        .args(["import", "--strict", "--no-backup", "--db"])
        .arg(fx.db())
        .arg("--csv")
        .arg(&bad)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(fx.contact_count(), 0);
}

#[test]
fn cli_normalize_outputs_unique_contacts() {
    let fx = Fixture::new();
    let csv = fx.csv("contatos.csv", CONTACTS_CSV);

    let out = coopcontacts(fx.dir.path()).arg("normalize").arg(&csv).output().unwrap();
    assert!(out.status.success());

    let contacts: Vec<serde_json::Value> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(contacts.len(), 5);
    assert_eq!(contacts[0]["identifier"], "001");
    assert_eq!(contacts[0]["value"], "dpo@alpha.coop");
    assert_eq!(contacts[0]["isPrimary"], true);
}

#[test]
fn cli_log_json_streams_every_entry() {
    let fx = Fixture::new();
    let mut content = String::from("id_singular,tipo,subtipo,valor\n");
    for i in 0..1500 {
        content.push_str(&format!("1,email,,u{}@x.com\n", i));
    }
    let csv = fx.csv("big.csv", &content);

    let out = coopcontacts(fx.dir.path())
        .args(["import", "--log-json", "--no-backup", "--db"])
        .arg(fx.db())
        .arg("--csv")
        .arg(&csv)
        .output()
        .unwrap();
    assert!(out.status.success());

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(!stderr.contains("log entries dropped"));

    let entries: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(entries[0]["message"].as_str().unwrap().starts_with("📖 Reading"));

    let inserts = entries
        .iter()
        .filter(|e| e["message"].as_str().is_some_and(|m| m.starts_with("+ ")))
        .count();
    assert_eq!(inserts, 1500);
    assert_eq!(fx.contact_count(), 1500);
}

#[test]
fn cli_check_reports_rejections_through_exit_code() {
    let fx = Fixture::new();
    let clean = fx.csv("clean.csv", "id_singular,tipo,subtipo,valor\n1,email,,a@b.com\n");
    let bad = fx.csv("bad.csv", "id_singular,tipo,subtipo,valor\n1,email,,a@b.com\n\n2,email,,nope\n");

    let status = coopcontacts(fx.dir.path()).arg("check").arg(&clean).status().unwrap();
    assert_eq!(status.code(), Some(0));

    let out = coopcontacts(fx.dir.path())
        .args(["check", "--json"])
        .arg(&bad)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));

    let rejected: Vec<serde_json::Value> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["line"], 4);
}
