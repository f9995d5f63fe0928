//! Importing transactions from ledger CSV exports.

mod csv;
mod import;

pub use import::{ImportFailure, ImportReport, import_csv};
