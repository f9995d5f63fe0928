use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use paywatch_rs::{Transaction, TransactionMode, create_transaction, initialize_db};

/// A utility for creating a test database for the paywatch API server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const MODES: [TransactionMode; 5] = [
    TransactionMode::Upi,
    TransactionMode::Neft,
    TransactionMode::Imps,
    TransactionMode::Rtgs,
    TransactionMode::Other,
];

const ACCOUNTS: [&str; 4] = ["1029384756", "5647382910", "9081726354", "4455667788"];

/// The number of days of sample transactions to create.
const DAYS: i64 = 14;

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating sample transactions...");

    let now = OffsetDateTime::now_utc();
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;

    for day in 0..DAYS {
        // Between one and five transactions a day so the daily series is uneven.
        for index in 0..(day % 5 + 1) {
            let seed = (day * 7 + index) as usize;
            let mode = MODES[seed % MODES.len()];
            let amount = ((seed * 373) % 5000) as f64 + 0.5 * (seed % 2) as f64;
            let timestamp = now - Duration::days(day) - Duration::hours(index + 1);

            create_transaction(
                Transaction::build(amount, timestamp, mode)
                    .sender(ACCOUNTS[seed % ACCOUNTS.len()])
                    .receiver(ACCOUNTS[(seed + 1) % ACCOUNTS.len()]),
                &tx,
            )?;
            count += 1;
        }
    }

    tx.commit()?;

    println!("Created {count} transactions.");
    println!("Success!");

    Ok(())
}
