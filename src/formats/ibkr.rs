use std::fs::File;
use std::io::Read;
use std::str::FromStr;

use chrono::{Datelike, Timelike};
use log::debug;
use thiserror::Error;

use crate::core::GenericResult;
use crate::currency::parse_currency;
use crate::trades::Transaction;
use crate::types::Decimal;
use crate::util;

use super::{column_index, field};

/// Commissions and fees are a negative cash flow in the export, so a negative fee after negation
/// means a malformed or misattributed row.
#[derive(Debug, Error)]
#[error("unexpected negative fee in {symbol} trade concluded on {time}")]
pub struct UnexpectedNegativeFee {
    pub symbol: String,
    pub time: String,
}

/// Reads an IBKR trade export. The symbol doubles as both the product id and the display name.
pub fn read_transactions(
    path: &str, tax_year: i32, option_contracts: bool,
) -> GenericResult<Vec<Transaction>> {
    Ok(parse_transactions(File::open(path)?, tax_year, option_contracts).map_err(|e| format!(
        "Error while reading {path:?} broker statement: {e}"))?)
}

fn parse_transactions<R: Read>(
    reader: R, tax_year: i32, option_contracts: bool,
) -> GenericResult<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let time = column_index(&headers, "Date/Time")?;
    let symbol = column_index(&headers, "Symbol")?;
    let quantity = column_index(&headers, "Quantity")?;
    let price = column_index(&headers, "T. Price")?;
    let currency = column_index(&headers, "Currency")?;
    let fee = column_index(&headers, "Comm/Fee")?;

    let mut transactions = Vec::new();

    for record in reader.records() {
        let record = record?;

        let transaction = parse_record(
            &record, time, symbol, quantity, price, currency, fee, option_contracts,
        ).map_err(|e| format!("Failed to parse {record:?}: {e}"))?;

        if transaction.time.year() > tax_year {
            debug!("Skipping {}: it's concluded after the requested tax year.", transaction);
            continue;
        }

        transactions.push(transaction);
    }

    transactions.sort_by_key(|transaction| transaction.time);
    Ok(transactions)
}

fn parse_record(
    record: &csv::StringRecord, time: usize, symbol: usize, quantity: usize, price: usize,
    currency: usize, fee: usize, option_contracts: bool,
) -> GenericResult<Transaction> {
    let time_field = field(record, time);

    // Trade times are tracked with minute precision
    let time = util::parse_date_time(time_field, "%Y-%m-%d, %H:%M:%S")?
        .with_second(0).unwrap();

    let symbol = field(record, symbol);

    let count: i32 = field(record, quantity).replace(',', "").parse().map_err(|_| format!(
        "Invalid quantity: {:?}", field(record, quantity)))?;

    let unit_price = Decimal::from_str(field(record, price)).map_err(|_| format!(
        "Invalid price: {:?}", field(record, price)))?;

    let currency = parse_currency(field(record, currency))?;

    let fee = -Decimal::from_str(field(record, fee)).map_err(|_| format!(
        "Invalid fee: {:?}", field(record, fee)))?;

    if fee.is_sign_negative() && !fee.is_zero() {
        return Err(UnexpectedNegativeFee {
            symbol: symbol.to_owned(),
            time: time_field.to_owned(),
        }.into());
    }

    Transaction::new(
        time, symbol, symbol, count, unit_price,
        currency, fee, currency, option_contracts,
    )
}
