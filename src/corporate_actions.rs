use itertools::Itertools;
use log::info;

use crate::core::EmptyResult;
use crate::trades::Transaction;
use crate::types::DateTime;

#[derive(Debug, Clone)]
pub struct StockSplit {
    pub product_id: String,
    pub cut_off: DateTime,
    pub numerator: u32,
    pub denominator: u32,
}

/// Back-adjusts all transactions of the specified instrument for stock splits: every transaction
/// concluded strictly before a split's cut off date gets its share count and price rescaled.
///
/// Splits are applied cumulatively in cut off order, so share count integrality is checked at
/// each event. Events at or before the first trade are irrelevant to the history and are dropped.
/// Brokers may emit the same event under multiple ticker aliases of one instrument, so duplicate
/// (product, cut off) rows are collapsed.
pub fn adjust_product(
    transactions: &mut [Transaction], splits: &[StockSplit], product_id: &str,
) -> EmptyResult {
    let first_trade_time = match transactions.iter()
        .filter(|transaction| transaction.product_id == product_id)
        .map(|transaction| transaction.time)
        .min()
    {
        Some(time) => time,
        None => return Ok(()),
    };

    let events: Vec<&StockSplit> = splits.iter()
        .filter(|split| split.product_id == product_id && split.cut_off > first_trade_time)
        .sorted_by_key(|split| split.cut_off)
        .dedup_by(|a, b| a.cut_off == b.cut_off)
        .collect();

    check_known_splits(product_id, first_trade_time, events.len())?;

    for split in events {
        info!("Applying {}:{} stock split to {} with {} cut off.",
              split.numerator, split.denominator, product_id, split.cut_off.date());

        for transaction in transactions.iter_mut() {
            if transaction.product_id == product_id && transaction.time.date() < split.cut_off.date() {
                transaction.apply_split(split.numerator, split.denominator)?;
            }
        }
    }

    Ok(())
}

// Brokers are known to lose older corporate actions from their exports, which would silently
// skew the whole position history, so cross-check the instruments we know the split history of.
fn check_known_splits(product_id: &str, first_trade_time: DateTime, events: usize) -> EmptyResult {
    if matches!(product_id, "TSLA" | "US88160R1014") {
        let first_trade_date = first_trade_time.date();

        if first_trade_date < date!(2022, 8, 25) && events < 1 ||
            first_trade_date < date!(2020, 8, 31) && events < 2 {
            return Err!(
                "Missing stock split data for {}: the first transaction is concluded on {}, but only {} split(s) are provided",
                product_id, first_trade_date, events);
        }
    }

    Ok(())
}
