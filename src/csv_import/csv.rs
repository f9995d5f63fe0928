//! Parses ledger CSV exports into transactions.

use serde::Deserialize;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    format_description::well_known::Rfc3339, macros::format_description,
};

use crate::{
    Error,
    transaction::{Transaction, TransactionBuilder, TransactionMode},
};

/// The columns every ledger CSV must have. Other columns are ignored.
const REQUIRED_COLUMNS: [&str; 5] = [
    "senderAccountNumber",
    "receiverAccountNumber",
    "amount",
    "transactionDateTime",
    "transactionMode",
];

const DATE_TIME_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerRecord {
    sender_account_number: String,
    receiver_account_number: String,
    amount: String,
    transaction_date_time: String,
    transaction_mode: String,
}

/// One data row of a CSV file.
#[derive(Debug, PartialEq)]
pub(super) struct ParsedRecord {
    /// The line the row starts on, counting the header as line 1.
    pub line: u64,
    /// The transaction, or why the row could not be read.
    pub result: Result<TransactionBuilder, String>,
}

/// Parse a ledger CSV with a header row.
///
/// Rows that cannot be read are returned with the reason so that the caller
/// can report them without abandoning the whole file.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the header is missing a required column.
pub(super) fn parse_csv(text: &str) -> Result<Vec<ParsedRecord>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| Error::InvalidCSV(error.to_string()))?
        .clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .collect();

    if !missing.is_empty() {
        return Err(Error::InvalidCSV(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let (line, result) = match row {
            Ok(row) => {
                let line = row
                    .position()
                    .map_or(index as u64 + 2, |position| position.line());
                let result = row
                    .deserialize::<LedgerRecord>(Some(&headers))
                    .map_err(|error| error.to_string())
                    .and_then(parse_record)
                    .map(|builder| {
                        let csv_line = row.iter().collect::<Vec<_>>().join(",");
                        builder.import_id(Some(create_import_id(&csv_line)))
                    });

                (line, result)
            }
            Err(error) => {
                let line = error
                    .position()
                    .map_or(index as u64 + 2, |position| position.line());
                (line, Err(error.to_string()))
            }
        };

        records.push(ParsedRecord { line, result });
    }

    Ok(records)
}

fn parse_record(record: LedgerRecord) -> Result<TransactionBuilder, String> {
    let amount: f64 = record
        .amount
        .parse()
        .map_err(|_| format!("invalid amount \"{}\"", record.amount))?;

    let timestamp = parse_timestamp(&record.transaction_date_time).ok_or_else(|| {
        format!(
            "invalid transaction date time \"{}\"",
            record.transaction_date_time
        )
    })?;

    let mode = TransactionMode::normalize(
        Some(record.transaction_mode.as_str()).filter(|mode| !mode.is_empty()),
    );

    let mut builder = Transaction::build(amount, timestamp, mode);

    if !record.sender_account_number.is_empty() {
        builder = builder.sender(&record.sender_account_number);
    }

    if !record.receiver_account_number.is_empty() {
        builder = builder.receiver(&record.receiver_account_number);
    }

    Ok(builder)
}

/// Parse an RFC 3339 timestamp, a UTC date and time (`2025-01-31 13:45:00`),
/// or a UTC date (`2025-01-31`).
fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339)
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(text, DATE_TIME_FORMAT)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            Date::parse(text, DATE_FORMAT)
                .ok()
                .map(|date| date.midnight().assume_utc())
        })
}

/// Creates a hash for a transaction based on the fields of its CSV row.
///
/// Identical rows get the same ID, which is how re-imports are detected.
pub fn create_import_id(csv_line: &str) -> i64 {
    let hash_128 = md5::compute(csv_line);
    let mut hash_64 = [0; 8];
    hash_64.copy_from_slice(&hash_128[0..8]);
    i64::from_le_bytes(hash_64)
}

#[cfg(test)]
mod parse_csv_tests {
    use time::macros::datetime;

    use crate::{
        Error,
        csv_import::csv::{create_import_id, parse_csv, parse_timestamp},
        transaction::{TransactionMode, UNKNOWN_ACCOUNT},
    };

    const LEDGER_CSV: &str = "senderId,receiverId,senderAccountNumber,receiverAccountNumber,amount,transactionDateTime,transactionMode\n\
        7,9,1234567890,0987654321,250.00,2025-01-15T10:30:00Z,UPI\n\
        7,9,1234567890,0987654321,99.5,2025-01-16 08:00:00,neft\n\
        7,9,,0987654321,10,2025-01-17,CHEQUE\n\
        7,9,1234567890,0987654321,lots,2025-01-17,UPI\n\
        7,9,1234567890,0987654321,5,last tuesday,UPI";

    #[test]
    fn create_import_id_matching_inputs() {
        assert_eq!(
            create_import_id("1234567890,0987654321,250.00,2025-01-15T10:30:00Z,UPI"),
            create_import_id("1234567890,0987654321,250.00,2025-01-15T10:30:00Z,UPI"),
        )
    }

    #[test]
    fn create_import_id_different_inputs() {
        assert_ne!(
            create_import_id("1234567890,0987654321,250.00,2025-01-15T10:30:00Z,UPI"),
            create_import_id("1234567890,0987654321,250.01,2025-01-15T10:30:00Z,UPI"),
        );
    }

    #[test]
    fn parses_ledger_csv() {
        let records = parse_csv(LEDGER_CSV).unwrap();

        assert_eq!(records.len(), 5);

        let first = records[0].result.as_ref().unwrap();
        assert_eq!(records[0].line, 2);
        assert_eq!(first.amount, 250.0);
        assert_eq!(first.timestamp, datetime!(2025-01-15 10:30 UTC));
        assert_eq!(first.mode, TransactionMode::Upi);
        assert_eq!(first.sender_account_number, "1234567890");
        assert!(first.import_id.is_some());

        let second = records[1].result.as_ref().unwrap();
        assert_eq!(second.timestamp, datetime!(2025-01-16 08:00 UTC));
        assert_eq!(second.mode, TransactionMode::Neft);

        let third = records[2].result.as_ref().unwrap();
        assert_eq!(third.timestamp, datetime!(2025-01-17 00:00 UTC));
        assert_eq!(third.mode, TransactionMode::Other);
        assert_eq!(third.sender_account_number, UNKNOWN_ACCOUNT);
    }

    #[test]
    fn reports_bad_rows_with_line_numbers() {
        let records = parse_csv(LEDGER_CSV).unwrap();

        assert_eq!(records[3].line, 5);
        assert!(records[3].result.as_ref().unwrap_err().contains("amount"));
        assert_eq!(records[4].line, 6);
        assert!(
            records[4]
                .result
                .as_ref()
                .unwrap_err()
                .contains("date time")
        );
    }

    #[test]
    fn missing_columns_are_invalid() {
        let result = parse_csv("senderAccountNumber,amount\n1,2");

        assert_eq!(
            result,
            Err(Error::InvalidCSV(
                "missing columns: receiverAccountNumber, transactionDateTime, transactionMode"
                    .to_owned()
            ))
        );
    }

    #[test]
    fn header_only_has_no_records() {
        let records = parse_csv(
            "senderAccountNumber,receiverAccountNumber,amount,transactionDateTime,transactionMode\n",
        )
        .unwrap();

        assert!(records.is_empty());
    }

    #[test]
    fn parses_timestamps_with_offsets() {
        assert_eq!(
            parse_timestamp("2025-01-15T16:00:00+05:30"),
            Some(datetime!(2025-01-15 10:30 UTC))
        );
        assert_eq!(parse_timestamp("15/01/2025"), None);
    }
}
