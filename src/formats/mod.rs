pub mod degiro;
pub mod ibkr;
pub mod splits;

use crate::core::GenericResult;

fn column_index(headers: &csv::StringRecord, name: &str) -> GenericResult<usize> {
    headers.iter().position(|header| header == name).ok_or_else(|| format!(
        "The statement has no {name:?} column").into())
}

fn field<'a>(record: &'a csv::StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or_default().trim()
}
