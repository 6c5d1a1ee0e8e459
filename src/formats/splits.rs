use std::fs::File;
use std::io::Read;

use crate::core::GenericResult;
use crate::corporate_actions::StockSplit;
use crate::util;

use super::{column_index, field};

/// Reads a stock split table. Each row is emitted once per provided instrument id (exchange
/// symbol and ISIN), so an instrument is matched whichever id the transactions are keyed by.
/// The resulting duplicates for one instrument are collapsed by the split adjuster.
pub fn read_splits(path: &str) -> GenericResult<Vec<StockSplit>> {
    Ok(parse_splits(File::open(path)?).map_err(|e| format!(
        "Error while reading {path:?} stock split table: {e}"))?)
}

fn parse_splits<R: Read>(reader: R) -> GenericResult<Vec<StockSplit>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let symbol = column_index(&headers, "Symbol")?;
    let date = column_index(&headers, "Report Date")?;
    let numerator = column_index(&headers, "Numerator")?;
    let denominator = column_index(&headers, "Denominator")?;
    let isin = headers.iter().position(|header| header == "ISIN");

    let mut splits = Vec::new();

    for record in reader.records() {
        let record = record?;

        let cut_off = util::parse_date(field(&record, date), "%Y-%m-%d")
            .map_err(|e| format!("Failed to parse {record:?}: {e}"))?
            .and_hms_opt(0, 0, 0).unwrap();

        let numerator: u32 = field(&record, numerator).parse().map_err(|_| format!(
            "Invalid split numerator: {:?}", field(&record, numerator)))?;
        let denominator: u32 = field(&record, denominator).parse().map_err(|_| format!(
            "Invalid split denominator: {:?}", field(&record, denominator)))?;

        if numerator < 1 || denominator < 1 {
            return Err!("Invalid split ratio: {numerator}:{denominator}");
        }

        let mut product_ids = vec![field(&record, symbol)];
        if let Some(isin) = isin {
            product_ids.push(field(&record, isin));
        }

        for product_id in product_ids {
            if product_id.is_empty() {
                continue;
            }

            splits.push(StockSplit {
                product_id: product_id.to_owned(),
                cut_off, numerator, denominator,
            });
        }
    }

    Ok(splits)
}
