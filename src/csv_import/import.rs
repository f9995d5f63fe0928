use std::time::Instant;

use rusqlite::Connection;
use serde::Serialize;

use crate::{Error, csv_import::csv::parse_csv, transaction::create_transaction};

/// A CSV row that could not be imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFailure {
    /// The line the row starts on, counting the header as line 1.
    pub line: u64,
    /// Why the row was rejected.
    pub reason: String,
}

/// The outcome of importing a CSV file.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    /// The number of new transactions stored.
    pub imported: usize,
    /// The number of rows that were already in the ledger.
    pub duplicates: usize,
    /// The rows that could not be imported.
    pub failures: Vec<ImportFailure>,
}

/// Import the transactions in a ledger CSV.
///
/// All rows are written in a single database transaction. Rows that were
/// imported before are counted as duplicates, and rows that cannot be parsed
/// or fail validation are reported without stopping the import.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the header is missing a required column, or
/// [Error::SqlError] if the database fails part way through, in which case
/// nothing is imported.
pub fn import_csv(text: &str, connection: &Connection) -> Result<ImportReport, Error> {
    let start_time = Instant::now();
    let records = parse_csv(text)?;

    let tx = connection
        .unchecked_transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))?;

    let mut report = ImportReport::default();

    for record in records {
        let builder = match record.result {
            Ok(builder) => builder,
            Err(reason) => {
                report.failures.push(ImportFailure {
                    line: record.line,
                    reason,
                });
                continue;
            }
        };

        match create_transaction(builder, &tx) {
            Ok(_) => report.imported += 1,
            Err(Error::DuplicateImportId) => report.duplicates += 1,
            Err(error @ (Error::InvalidAmount(_) | Error::FutureDate(_))) => {
                report.failures.push(ImportFailure {
                    line: record.line,
                    reason: error.to_string(),
                });
            }
            Err(error) => {
                tracing::error!("Failed to import line {}: {error}", record.line);
                return Err(error);
            }
        }
    }

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit transaction: {error}"))?;

    tracing::info!(
        "Imported {} transactions ({} duplicates, {} failures) in {:.1}ms",
        report.imported,
        report.duplicates,
        report.failures.len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    Ok(report)
}
