//! coopcontacts CLI - normalize and import cooperative contact CSV files
//!
//! # Main Commands
//!
//! ```bash
//! coopcontacts import --db data/urede.db --csv contatos.csv   # Import into SQLite
//! coopcontacts import --csv contatos.csv --strict --dry-run   # Check against the store, write nothing
//! ```
//!
//! # Offline Commands
//!
//! ```bash
//! coopcontacts check contatos.csv              # Normalize only, list rejected rows
//! coopcontacts normalize contatos.csv -o out.json
//! ```
//!
//! Exit codes: `0` success, `1` import failure, `2` bad input or environment.

use clap::{Parser, Subcommand};
use coopcontacts::backup::{backup_database, restore_hint, DEFAULT_BACKUP_DIR};
use coopcontacts::dedup::dedup_batch;
use coopcontacts::error::{BackupError, ImportError, StoreError};
use coopcontacts::import::{import_csv_file, is_busy, rejections_by_reason, ImportOptions};
use coopcontacts::logs::LOG_BROADCASTER;
use coopcontacts::parser::CsvSource;
use coopcontacts::store::{SqliteStore, StoreConfig};
use coopcontacts::validation::{validate_source, ValidationPolicy};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "coopcontacts")]
#[command(about = "Normalize and import cooperative contact CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file into the contacts table
    Import {
        /// SQLite database (default: COOPCONTACTS_DB or data/urede.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Input CSV file
        #[arg(long)]
        csv: PathBuf,

        /// Abort the whole import if any row is rejected
        #[arg(long)]
        strict: bool,

        /// Skip merging duplicates already in the store
        #[arg(long)]
        no_reconcile: bool,

        /// Run everything, then roll back
        #[arg(long)]
        dry_run: bool,

        /// Where to write the pre-import backup
        #[arg(long, default_value = DEFAULT_BACKUP_DIR)]
        backups_dir: PathBuf,

        /// Do not back up the database first
        #[arg(long)]
        no_backup: bool,

        /// Lock wait in milliseconds (default: COOPCONTACTS_BUSY_TIMEOUT_MS or 30000)
        #[arg(long)]
        busy_timeout_ms: Option<u64>,

        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Emit progress as JSON lines on stderr
        #[arg(long)]
        log_json: bool,
    },

    /// Normalize a CSV file and list rejected rows (no database)
    Check {
        /// Input CSV file
        input: PathBuf,

        /// Print rejections as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize a CSV file and output the contacts as JSON
    Normalize {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Bad invocation or missing input.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            db,
            csv,
            strict,
            no_reconcile,
            dry_run,
            backups_dir,
            no_backup,
            busy_timeout_ms,
            json,
            log_json,
        } => {
            let mut config = StoreConfig::from_env();
            if let Some(db) = db {
                config.db_path = db;
            }
            if let Some(ms) = busy_timeout_ms {
                config.busy_timeout_ms = ms;
            }
            let options = ImportOptions {
                policy: if strict { ValidationPolicy::Strict } else { ValidationPolicy::Lenient },
                reconcile: !no_reconcile,
                dry_run,
                ..Default::default()
            };
            let backups = (!no_backup && !dry_run).then_some(backups_dir);

            if log_json {
                LOG_BROADCASTER.set_json(true);
            }
            cmd_import(&csv, config, &options, backups.as_deref(), json)
        }

        Commands::Check { input, json } => cmd_check(&input, json),

        Commands::Normalize { input, output } => cmd_normalize(&input, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(exit_code(&*e));
    }
}

/// `2` when the input or environment is wrong, `1` otherwise.
fn exit_code(err: &(dyn Error + 'static)) -> i32 {
    let precondition = err.is::<UsageError>()
        || err
            .downcast_ref::<ImportError>()
            .is_some_and(ImportError::is_precondition)
        || err
            .downcast_ref::<StoreError>()
            .is_some_and(|e| matches!(e, StoreError::Open { .. } | StoreError::MissingTable(_)))
        || err
            .downcast_ref::<BackupError>()
            .is_some_and(|e| matches!(e, BackupError::SourceMissing(_)));
    if precondition {
        2
    } else {
        1
    }
}

fn cmd_import(
    csv: &Path,
    config: StoreConfig,
    options: &ImportOptions,
    backups_dir: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    if !csv.is_file() {
        return Err(UsageError(format!("CSV file not found: {}", csv.display())).into());
    }
    if !config.db_path.is_file() {
        return Err(UsageError(format!("Database not found: {}", config.db_path.display())).into());
    }

    eprintln!("📄 Importing: {}", csv.display());
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Policy: {}", options.policy);
    if options.dry_run {
        eprintln!("   Dry run: nothing will be written");
    }

    let db_path = config.db_path.clone();
    let backup = match backups_dir {
        Some(dir) => Some(backup_database(&db_path, dir)?),
        None => None,
    };

    let mut store = SqliteStore::open(config)?;
    let summary = match import_csv_file(csv, &mut store, options) {
        Ok(summary) => summary,
        Err(e) => {
            if let ImportError::RowsRejected { rejections } = &e {
                for r in rejections.iter().take(options.max_reported_rejections) {
                    eprintln!("   - {}", r);
                }
            }
            if is_busy(&e) {
                eprintln!("   Another process is writing to the database; try again later.");
            }
            if let (ImportError::Transaction { .. }, Some(backup)) = (&e, &backup) {
                eprintln!("   To restore the backup: {}", restore_hint(backup, &db_path));
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", summary.to_json()?);
    } else {
        summary.print_report(options.max_reported_rejections);
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_check(input: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    eprintln!("✔️  Checking: {}", input.display());

    let source = CsvSource::from_path(input)?;
    eprintln!("   Encoding: {}", source.encoding());
    eprintln!("   Delimiter: '{}'", format_delimiter(source.delimiter()));
    eprintln!("   Columns: {}", source.headers().join(", "));

    let batch = validate_source(&source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&batch.rejected)?);
    } else {
        for r in batch.rejected.iter().take(25) {
            eprintln!("   ❌ {}", r);
        }
        if batch.rejected.len() > 25 {
            eprintln!("   ... +{} more", batch.rejected.len() - 25);
        }
    }

    for (reason, count) in rejections_by_reason(&batch.rejected) {
        eprintln!("   • {}: {}", reason, count);
    }
    eprintln!(
        "\n📊 Results: {} rows, {} valid, {} rejected",
        batch.total_rows,
        batch.normalized.len(),
        batch.rejected.len()
    );

    if !batch.rejected.is_empty() {
        return Err(ImportError::RowsRejected {
            rejections: batch.rejected,
        }
        .into());
    }

    Ok(())
}

fn cmd_normalize(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    eprintln!("📦 Normalizing: {}", input.display());

    let source = CsvSource::from_path(input)?;
    let batch = validate_source(&source)?;
    if !batch.rejected.is_empty() {
        eprintln!("   ⚠️ {} rows rejected (run `check` for details)", batch.rejected.len());
    }

    let outcome = dedup_batch(batch.normalized);
    eprintln!(
        "   {} contacts, {} duplicates dropped",
        outcome.unique.len(),
        outcome.duplicates.len()
    );

    let json = serde_json::to_string_pretty(&outcome.unique)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
