use std::fs::File;
use std::io::Read;
use std::str::FromStr;

use chrono::Datelike;
use log::{debug, warn};

use crate::core::GenericResult;
use crate::currency::{Currency, parse_currency};
use crate::trades::Transaction;
use crate::types::Decimal;
use crate::util;

use super::{column_index, field};

/// Reads a Degiro account export.
///
/// The export carries the trade date and time in separate columns and the currency of each
/// monetary column in an unnamed column right after it. Transaction fees are always charged
/// in EUR.
pub fn read_transactions(path: &str, tax_year: i32) -> GenericResult<Vec<Transaction>> {
    Ok(parse_transactions(File::open(path)?, tax_year).map_err(|e| format!(
        "Error while reading {path:?} broker statement: {e}"))?)
}

fn parse_transactions<R: Read>(reader: R, tax_year: i32) -> GenericResult<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let date = column_index(&headers, "Date")?;
    let time = column_index(&headers, "Time")?;
    let product = column_index(&headers, "Product")?;
    let isin = column_index(&headers, "ISIN")?;
    let quantity = column_index(&headers, "Quantity")?;
    let price = column_index(&headers, "Price")?;
    let fee = column_index(&headers, "Transaction and/or third")?;

    let mut transactions = Vec::new();
    let mut dropped = 0;

    for record in reader.records() {
        let record = record?;

        // The broker emits cash operation rows with an empty date - they are of no interest here
        if field(&record, date).is_empty() {
            dropped += 1;
            continue;
        }

        let transaction = parse_record(&record, date, time, product, isin, quantity, price, fee)
            .map_err(|e| format!("Failed to parse {record:?}: {e}"))?;

        if transaction.time.year() > tax_year {
            debug!("Skipping {}: it's concluded after the requested tax year.", transaction);
            continue;
        }

        transactions.push(transaction);
    }

    if dropped != 0 {
        warn!("Dropped {} record(s) with an empty date.", dropped);
    }

    transactions.sort_by_key(|transaction| transaction.time);
    Ok(transactions)
}

fn parse_record(
    record: &csv::StringRecord, date: usize, time: usize, product: usize, isin: usize,
    quantity: usize, price: usize, fee: usize,
) -> GenericResult<Transaction> {
    let time = util::parse_date_time(
        &format!("{} {}", field(record, date), field(record, time)), "%d-%m-%Y %H:%M")?;

    let count: i32 = field(record, quantity).parse().map_err(|_| format!(
        "Invalid quantity: {:?}", field(record, quantity)))?;

    let unit_price = parse_amount(field(record, price))?;

    // The currency of a monetary column is in the unnamed column right after it
    let currency = parse_currency(field(record, price + 1))?;

    // Fees are charged as a negative cash flow and may be missing entirely
    let fee_field = field(record, fee);
    let fee_amount = if fee_field.is_empty() {
        dec!(0)
    } else {
        parse_amount(fee_field)?.abs()
    };

    let fee_currency = field(record, fee + 1);
    if !fee_currency.is_empty() && fee_currency != "EUR" {
        return Err!("Unexpected fee currency: {fee_currency:?}");
    }

    Transaction::new(
        time, field(record, isin), field(record, product), count, unit_price,
        currency, fee_amount, Currency::Eur, false,
    )
}

fn parse_amount(value: &str) -> GenericResult<Decimal> {
    Ok(Decimal::from_str(value).map_err(|_| format!("Invalid amount: {value:?}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "\
Date,Time,Product,ISIN,Exchange,Quantity,Price,,Local value,,Transaction and/or third,,Order ID
01-03-2021,15:30,ADVANCED MICRO DEVICES,US0079031078,NSY,10,78.5,USD,-785.00,USD,-0.54,EUR,b8a71ac3
10-03-2021,16:45,ADVANCED MICRO DEVICES,US0079031078,NSY,-4,81.23,USD,324.92,USD,-0.50,EUR,0a9f2c1d
,,,,,,,,,,,,
15-01-2022,10:05,ADVANCED MICRO DEVICES,US0079031078,NSY,2,120.0,USD,-240.00,USD,,,71bd02e8
";

    #[test]
    fn parsing() {
        let transactions = parse_transactions(STATEMENT.as_bytes(), 2021).unwrap();
        assert_eq!(transactions.len(), 2);

        let buy = &transactions[0];
        assert_eq!(buy.time, date_time!(2021, 3, 1, 15, 30));
        assert_eq!(buy.product_id, "US0079031078");
        assert_eq!(buy.display_name, "ADVANCED MICRO DEVICES");
        assert_eq!(buy.count, 10);
        assert_eq!(buy.unit_price, dec!(78.5));
        assert_eq!(buy.currency, Currency::Usd);
        assert_eq!(buy.fee, dec!(0.54));
        assert_eq!(buy.fee_currency, Currency::Eur);
        assert_eq!(buy.multiplier, 1);

        let sale = &transactions[1];
        assert_eq!(sale.count, -4);
        assert_eq!(sale.fee, dec!(0.5));
    }

    #[test]
    fn rows_after_tax_year() {
        let transactions = parse_transactions(STATEMENT.as_bytes(), 2022).unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[2].fee, dec!(0));
    }

    #[test]
    fn unexpected_fee_currency() {
        let statement = STATEMENT.replace(",-0.54,EUR,", ",-0.54,USD,");
        let error = parse_transactions(statement.as_bytes(), 2021).unwrap_err();
        assert!(error.to_string().contains("Unexpected fee currency"));
    }
}
