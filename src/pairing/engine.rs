use std::collections::{HashMap, VecDeque};

use chrono::Datelike;
use log::warn;

use crate::core::GenericResult;
use crate::currency::Cash;
use crate::trades::Transaction;
use crate::types::{DateTime, Decimal};

use super::{StrategyMap, selector, strategy_for};

use self::PairingStatus::*;

/// Binds an opening transaction (referenced by its index in the transaction sequence) to a
/// position closing one for a specific share quantity.
#[derive(Debug)]
pub struct LotBinding {
    pub lot: usize,
    pub quantity: u32,
    pub fee_claimed_here: bool,
    pub is_short_cover: bool,

    // Populated by the tax calculator
    pub fx_rate: Option<Decimal>,
    pub cost: Option<Cash>,
    pub fees: Option<Cash>,
    pub time_test_passed: bool,
}

impl LotBinding {
    pub(super) fn new(lot: usize, quantity: u32, fee_claimed_here: bool) -> LotBinding {
        LotBinding {
            lot, quantity, fee_claimed_here,
            is_short_cover: false,

            fx_rate: None,
            cost: None,
            fees: None,
            time_test_passed: false,
        }
    }

    fn new_short_cover(lot: usize, quantity: u32, fee_claimed_here: bool) -> LotBinding {
        LotBinding {
            is_short_cover: true,
            ..LotBinding::new(lot, quantity, fee_claimed_here)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    Complete,
    Partial,
}

/// One position closing event: the anchor transaction (the sale for long closes, the short sale
/// for short closes) plus the opening lots consumed by it.
pub struct SaleRecord {
    pub anchor: usize,
    pub bindings: Vec<LotBinding>,
    pub status: PairingStatus,

    /// Long positions close at the anchor sale instant. Shorts close when the last covering buy
    /// executes, which determines the tax year the realized gain belongs to.
    pub close_time: DateTime,

    // Populated by the tax calculator, in the reporting currency
    pub income: Option<Cash>,
    pub cost: Option<Cash>,
    pub fees: Option<Cash>,
    pub untaxed_quantity: u32,
}

impl SaleRecord {
    fn new(anchor: usize, bindings: Vec<LotBinding>, close_time: DateTime, status: PairingStatus) -> SaleRecord {
        SaleRecord {
            anchor, bindings, status, close_time,
            income: None,
            cost: None,
            fees: None,
            untaxed_quantity: 0,
        }
    }

    pub fn profit(&self) -> Option<Cash> {
        Some(self.income? - self.cost?)
    }

    fn add_cover(&mut self, binding: LotBinding, cover_time: DateTime) {
        self.close_time = self.close_time.max(cover_time);
        self.bindings.push(binding);
    }
}

struct OpenShort {
    anchor: usize,
    remaining: u32,
}

/// Walks the transaction history of one instrument in chronological order and pairs every
/// position closing transaction with its opening lots:
///
/// * A sale closes existing longs using the configured lot selection strategy. Any excess
///   quantity opens or deepens a short position.
///
/// * A buy covers outstanding shorts in strict FIFO order, attaching the covers to the short
///   sale's record and advancing its close time. Any excess quantity is retained as open long
///   inventory available to later sales.
///
/// The returned records are ordered by their anchor transaction time, not by close time.
pub fn pair_transactions(
    transactions: &mut [Transaction], strategies: &StrategyMap,
) -> GenericResult<Vec<SaleRecord>> {
    debug_assert!(transactions.is_sorted_by_key(|transaction| transaction.time));
    warn_about_default_strategy(transactions, strategies);

    let mut records: Vec<SaleRecord> = Vec::new();
    let mut record_index: HashMap<usize, usize> = HashMap::new();
    let mut open_shorts: VecDeque<OpenShort> = VecDeque::new();

    for index in 0..transactions.len() {
        if transactions[index].is_sale() {
            let strategy = strategy_for(transactions[index].time.year(), strategies)?;

            let (bindings, status) = match selector::find_lots(strategy, index, transactions) {
                Ok(bindings) => (bindings, Complete),
                Err(e) => {
                    warn!("{}: {}. The unpaired quantity opens a short position.",
                          transactions[index], e);
                    (e.matched, Partial)
                },
            };

            let matched: u32 = bindings.iter().map(|binding| binding.quantity).sum();
            let excess = transactions[index].count.unsigned_abs() - matched;

            record_index.insert(index, records.len());
            records.push(SaleRecord::new(index, bindings, transactions[index].time, status));

            if excess > 0 {
                open_shorts.push_back(OpenShort {anchor: index, remaining: excess});
            }
        } else {
            while transactions[index].remaining_count() > 0 && !open_shorts.is_empty() {
                let short = open_shorts.front_mut().unwrap();

                let quantity = transactions[index].remaining_count().min(short.remaining);
                let fee_claimed_here = transactions[index].consume(quantity);

                records[record_index[&short.anchor]].add_cover(
                    LotBinding::new_short_cover(index, quantity, fee_claimed_here),
                    transactions[index].time);

                short.remaining -= quantity;
                if short.remaining == 0 {
                    open_shorts.pop_front();
                }
            }

            // Any remaining shares form or enlarge a long position. No extra action needed: they
            // will be paired by the lot selector later.
        }
    }

    if !open_shorts.is_empty() {
        let uncovered: u32 = open_shorts.iter().map(|short| short.remaining).sum();
        warn!("{} short sold share(s) remain uncovered at the end of the transaction history.",
              uncovered);
    }

    Ok(records)
}

fn warn_about_default_strategy(transactions: &[Transaction], strategies: &StrategyMap) {
    let first_year = match strategies.keys().next() {
        Some(&year) => year,
        None => return,
    };

    for transaction in transactions {
        if transaction.is_sale() && transaction.time.year() < first_year {
            warn!("No pairing strategy configured for {}. Falling back to FIFO.",
                  transaction.time.year());
            return;
        }
    }
}
