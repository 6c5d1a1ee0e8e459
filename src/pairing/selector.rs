use thiserror::Error;

use crate::trades::Transaction;
use crate::types::DateTime;

use super::Strategy;
use super::engine::LotBinding;

/// The closing transaction couldn't be fully paired against the open lots. The bindings found so
/// far are returned with the error: the position engine keeps them and treats the shortfall as a
/// new short position.
#[derive(Debug, Error)]
#[error("unable to pair {missing} of {required} share(s) against open lots")]
pub struct InsufficientLots {
    pub required: u32,
    pub missing: u32,
    pub matched: Vec<LotBinding>,
}

/// Selects opening lots for the specified closing transaction under the specified strategy,
/// consuming the matched quantities from them.
///
/// Candidate lots are all prior opposite-side transactions which still have unconsumed shares.
/// The transactions are expected to be sorted by time.
pub(super) fn find_lots(
    strategy: Strategy, sale_index: usize, transactions: &mut [Transaction],
) -> Result<Vec<LotBinding>, InsufficientLots> {
    match strategy {
        Strategy::Fifo => find_lots_ordered(sale_index, transactions, false),
        Strategy::Lifo => find_lots_ordered(sale_index, transactions, true),
        Strategy::MaxCost => find_lots_priced(sale_index, transactions, is_costlier_lot),
        Strategy::MinCost => find_lots_priced(sale_index, transactions, is_cheaper_lot),
    }
}

fn open_lots(transactions: &[Transaction], sale_time: DateTime) -> Vec<usize> {
    transactions.iter().enumerate()
        .filter(|(_, transaction)| {
            !transaction.is_sale() && transaction.remaining_count() > 0 && transaction.time < sale_time
        })
        .map(|(index, _)| index)
        .collect()
}

fn find_lots_ordered(
    sale_index: usize, transactions: &mut [Transaction], newest_first: bool,
) -> Result<Vec<LotBinding>, InsufficientLots> {
    let required = transactions[sale_index].count.unsigned_abs();
    let mut lots = open_lots(transactions, transactions[sale_index].time);
    if newest_first {
        lots.reverse();
    }

    let mut bindings = Vec::new();
    let mut remaining = required;

    for index in lots {
        bind_lot(&mut bindings, transactions, index, &mut remaining);
        if remaining == 0 {
            break;
        }
    }

    if remaining != 0 {
        return Err(InsufficientLots {required, missing: remaining, matched: bindings});
    }

    Ok(bindings)
}

// Greedily takes the whole best-priced lot on each iteration. Lots are scanned newest first, so
// among lots the significance filter considers equivalent the most recent one wins.
fn find_lots_priced(
    sale_index: usize, transactions: &mut [Transaction],
    is_better: fn(&Transaction, &Transaction) -> bool,
) -> Result<Vec<LotBinding>, InsufficientLots> {
    let required = transactions[sale_index].count.unsigned_abs();
    let sale_time = transactions[sale_index].time;

    let mut bindings = Vec::new();
    let mut remaining = required;

    while remaining > 0 {
        let mut best: Option<usize> = None;

        for index in open_lots(transactions, sale_time).into_iter().rev() {
            if match best {
                Some(best_index) => is_better(&transactions[best_index], &transactions[index]),
                None => true,
            } {
                best = Some(index);
            }
        }

        let index = match best {
            Some(index) => index,
            None => return Err(InsufficientLots {required, missing: remaining, matched: bindings}),
        };

        bind_lot(&mut bindings, transactions, index, &mut remaining);
    }

    Ok(bindings)
}

fn bind_lot(
    bindings: &mut Vec<LotBinding>, transactions: &mut [Transaction],
    index: usize, remaining: &mut u32,
) {
    let lot = &mut transactions[index];

    let quantity = (*remaining).min(lot.remaining_count());
    assert!(quantity > 0);

    let fee_claimed_here = lot.consume(quantity);
    *remaining -= quantity;

    bindings.push(LotBinding::new(index, quantity, fee_claimed_here));
}

fn is_costlier_lot(best: &Transaction, candidate: &Transaction) -> bool {
    let day_diff = (best.time - candidate.time).num_days().abs();

    day_diff < 20 && candidate.unit_price > best.unit_price * dec!(1.02) ||
    day_diff < 75 && candidate.unit_price > best.unit_price * dec!(1.08) ||
    candidate.unit_price > best.unit_price * dec!(1.15)
}

fn is_cheaper_lot(best: &Transaction, candidate: &Transaction) -> bool {
    let day_diff = (best.time - candidate.time).num_days().abs();

    // The floor is deliberately 0.085, not 0.85: the softer variant consumed too many lots that
    // were still eligible for the holding period exemption.
    day_diff < 20 && candidate.unit_price < best.unit_price * dec!(0.97) ||
    day_diff < 75 && candidate.unit_price < best.unit_price * dec!(0.75) ||
    candidate.unit_price < best.unit_price * dec!(0.085)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use crate::trades::testing::{trade_in_month, trade_on};
    use crate::types::Decimal;
    use super::*;

    #[rstest(price, day, month, expected,
        case(dec!(100), 5, 10, false),
        case(dec!(135), 29, 10, true),
        case(dec!(107), 30, 9, false),
        case(dec!(110), 30, 9, true),
        case(dec!(112), 27, 2, false),
        case(dec!(112), 27, 8, true),
    )]
    fn costlier_lot_filter(price: Decimal, day: u32, month: u32, expected: bool) {
        let best = trade_in_month(1, dec!(100), 30, 10);
        let candidate = trade_in_month(1, price, day, month);
        assert_eq!(is_costlier_lot(&best, &candidate), expected);
    }

    #[test]
    fn costlier_lot_filter_across_years() {
        let best = trade_in_month(1, dec!(100), 30, 10);
        let candidate = trade_on(1, dec!(112), date_time!(2020, 10, 27));
        assert!(!is_costlier_lot(&best, &candidate));
    }

    #[rstest(price, day, month, expected,
        case(dec!(97),   29, 10, false),
        case(dec!(96.9), 29, 10, true),
        case(dec!(76),   30, 9,  false),
        case(dec!(74),   30, 9,  true),
        case(dec!(9),    27, 2,  false), // above the 8.5% floor
        case(dec!(8),    27, 2,  true),
    )]
    fn cheaper_lot_filter(price: Decimal, day: u32, month: u32, expected: bool) {
        let best = trade_in_month(1, dec!(100), 30, 10);
        let candidate = trade_in_month(1, price, day, month);
        assert_eq!(is_cheaper_lot(&best, &candidate), expected);
    }
}
