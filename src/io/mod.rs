//! I/O module
//!
//! Handles seed file parsing and account output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, output serialization)
//! - `seed` - Loading account and recurring payment tables from files

pub mod csv_format;
pub mod seed;

pub use csv_format::{
    convert_account_row, convert_recurring_payment_row, parse_timestamp, write_accounts_csv,
    AccountRow, RecurringPaymentRow,
};
pub use seed::{load_accounts, load_recurring_payments};
