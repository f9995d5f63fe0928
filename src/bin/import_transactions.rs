use std::{error::Error, fs};

use clap::Parser;
use rusqlite::Connection;

use paywatch_rs::{import_csv, initialize_db};

/// Import a ledger CSV export into the paywatch database.
///
/// Rows that were imported before are skipped, so the same file can be
/// imported again safely.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// File path to the CSV file to import.
    #[arg(long)]
    csv_path: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.csv_path)?;
    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;

    println!("Importing transactions from {:#?}", args.csv_path);
    let report = import_csv(&text, &conn)?;

    println!(
        "Imported {} transactions, skipped {} duplicates.",
        report.imported, report.duplicates
    );

    if !report.failures.is_empty() {
        eprintln!("{} rows could not be imported:", report.failures.len());

        for failure in &report.failures {
            eprintln!("  line {}: {}", failure.line, failure.reason);
        }
    }

    Ok(())
}
