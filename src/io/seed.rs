//! Seed file loading
//!
//! Reads account and recurring payment tables from CSV. Delegates format
//! concerns to the `csv_format` module.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, unreadable header) are returned
//! - A row that fails to parse or convert is logged with its line number and
//!   skipped; loading continues with the next row

use crate::io::csv_format::{
    convert_account_row, convert_recurring_payment_row, AccountRow, RecurringPaymentRow,
};
use crate::types::{Account, PaymentError, RecurringPayment};
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Load every valid account row from `path`
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, PaymentError> {
    load_rows(path, convert_account_row)
}

/// Load every valid recurring payment row from `path`
pub fn load_recurring_payments(path: &Path) -> Result<Vec<RecurringPayment>, PaymentError> {
    load_rows(path, convert_recurring_payment_row)
}

fn load_rows<Row, T>(
    path: &Path,
    convert: fn(Row) -> Result<T, String>,
) -> Result<Vec<T>, PaymentError>
where
    Row: DeserializeOwned,
{
    let file = File::open(path).map_err(|e| PaymentError::IoError {
        message: format!("Failed to open file '{}': {}", path.display(), e),
    })?;

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file);
    let headers = reader.headers()?.clone();

    let mut loaded = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let parsed = record.map_err(PaymentError::from).and_then(|record| {
            let line = record.position().map(|pos| pos.line());
            record
                .deserialize::<Row>(Some(&headers))
                .map_err(PaymentError::from)
                .and_then(|row| {
                    convert(row).map_err(|message| PaymentError::ParseError { line, message })
                })
        });

        match parsed {
            Ok(value) => loaded.push(value),
            Err(err) => {
                skipped += 1;
                warn!(file = %path.display(), error = %err, "Skipping seed row");
            }
        }
    }

    info!(
        file = %path.display(),
        loaded = loaded.len(),
        skipped,
        "Seed file loaded"
    );
    Ok(loaded)
}
