//! Database backups - timestamped copies taken before an import.
//!
//! A backup of `data/urede.db` lands in `<dir>/urede.db.20240131_154500.bak`.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};
use crate::logs::log_success;

/// Directory where backups are written (relative to current dir)
pub const DEFAULT_BACKUP_DIR: &str = "data/backups";

const BACKUP_EXT: &str = "bak";

/// Copy `db_path` into `backups_dir`, creating the directory on demand.
/// Returns the path of the copy.
pub fn backup_database(db_path: &Path, backups_dir: &Path) -> BackupResult<PathBuf> {
    if !db_path.is_file() {
        return Err(BackupError::SourceMissing(db_path.to_path_buf()));
    }

    fs::create_dir_all(backups_dir).map_err(|source| BackupError::Io {
        path: backups_dir.to_path_buf(),
        source,
    })?;

    let target = next_backup_path(db_path, backups_dir);
    fs::copy(db_path, &target).map_err(|source| BackupError::Io {
        path: target.clone(),
        source,
    })?;

    log_success(format!("💾 Backup written to {}", target.display()));
    Ok(target)
}

/// Free `<name>.<timestamp>.bak` path; a counter is appended when two backups
/// land in the same second.
fn next_backup_path(db_path: &Path, backups_dir: &Path) -> PathBuf {
    let name = db_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("database");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    let mut candidate = backups_dir.join(format!("{}.{}.{}", name, stamp, BACKUP_EXT));
    let mut n = 1;
    while candidate.exists() {
        candidate = backups_dir.join(format!("{}.{}_{}.{}", name, stamp, n, BACKUP_EXT));
        n += 1;
    }
    candidate
}

/// Shell command that puts a backup back in place.
pub fn restore_hint(backup: &Path, db_path: &Path) -> String {
    format!("cp -f '{}' '{}'", backup.display(), db_path.display())
}
