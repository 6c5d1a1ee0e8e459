use std::fmt;

use thiserror::Error;

use crate::core::GenericResult;
use crate::currency::Currency;
use crate::types::{DateTime, Decimal};
use crate::util::{self, DecimalRestrictions};

// Prices have up to 4 decimal digits, plus some extra: the brokerage exports carry them as
// doubles, so we quantize on import and after every back-adjustment.
const IMPORT_PRECISION: u32 = 6;

/// One executed trade of a single instrument.
///
/// Negative `count` is a sale (long close or short open), positive - a buy (long open or short
/// cover). Besides the immutable trade facts the transaction carries its lot consumption state
/// which is mutated only by the pairing engine and the split adjuster.
#[derive(Debug)]
pub struct Transaction {
    pub time: DateTime,
    pub product_id: String,
    pub display_name: String,
    pub count: i32,
    pub unit_price: Decimal,
    pub currency: Currency,
    pub fee: Decimal,
    pub fee_currency: Currency,
    pub multiplier: u32,

    remaining_count: u32,
    fee_claimed: bool,
    split_ratio: Decimal,
    bep: Option<Decimal>,
}

#[derive(Debug, Error)]
#[error("{numerator}:{denominator} stock split leaves a fractional share count on {transaction}")]
pub struct SplitIndivisible {
    pub numerator: u32,
    pub denominator: u32,
    pub transaction: String,
}

impl Transaction {
    pub fn new(
        time: DateTime, product_id: &str, display_name: &str, count: i32, unit_price: Decimal,
        currency: Currency, fee: Decimal, fee_currency: Currency, option_contract: bool,
    ) -> GenericResult<Transaction> {
        if count == 0 {
            return Err!("Invalid transaction: zero share count");
        }

        let unit_price = util::validate_decimal(unit_price, DecimalRestrictions::PositiveOrZero)
            .map_err(|_| format!("Invalid share price: {unit_price}"))?
            .round_dp(IMPORT_PRECISION);

        let fee = util::validate_decimal(fee, DecimalRestrictions::PositiveOrZero)
            .map_err(|_| format!("Invalid fee: {fee}"))?
            .round_dp(IMPORT_PRECISION);

        Ok(Transaction {
            time,
            product_id: product_id.to_owned(),
            display_name: display_name.to_owned(),
            count, unit_price, currency, fee, fee_currency,
            multiplier: if option_contract {100} else {1},

            remaining_count: count.unsigned_abs(),
            fee_claimed: false,
            split_ratio: dec!(1),
            bep: None,
        })
    }

    pub fn is_sale(&self) -> bool {
        self.count < 0
    }

    pub fn remaining_count(&self) -> u32 {
        self.remaining_count
    }

    pub fn split_ratio(&self) -> Decimal {
        self.split_ratio
    }

    pub fn bep(&self) -> Option<Decimal> {
        self.bep
    }

    pub fn set_bep(&mut self, bep: Decimal) {
        self.bep = Some(bep);
    }

    /// Marks the specified share quantity as consumed by a pairing and returns true if this
    /// consumption claimed the transaction's fee (only the first one does).
    pub fn consume(&mut self, quantity: u32) -> bool {
        assert!(quantity > 0);
        assert!(quantity <= self.remaining_count,
                "An attempt to consume {} shares with only {} remaining",
                quantity, self.remaining_count);

        self.remaining_count -= quantity;

        if self.fee_claimed {
            false
        } else {
            self.fee_claimed = true;
            true
        }
    }

    /// Scales share count and price by numerator/denominator in place, accumulating the ratio
    /// for audit. The resulting share count must stay integral.
    pub fn apply_split(&mut self, numerator: u32, denominator: u32) -> Result<(), SplitIndivisible> {
        if numerator == denominator {
            return Ok(());
        }

        let scaled = i64::from(self.count) * i64::from(numerator);
        if scaled % i64::from(denominator) != 0 {
            return Err(SplitIndivisible {
                numerator, denominator,
                transaction: self.to_string(),
            });
        }

        self.count = (scaled / i64::from(denominator)) as i32;
        self.remaining_count = (u64::from(self.remaining_count) * u64::from(numerator)
            / u64::from(denominator)) as u32;

        self.split_ratio = self.split_ratio * Decimal::from(numerator) / Decimal::from(denominator);
        self.unit_price = (self.unit_price * Decimal::from(denominator) / Decimal::from(numerator))
            .round_dp(IMPORT_PRECISION);

        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {}, {}, {}, {}, fee: {}",
               self.time, self.display_name, self.count, self.product_id, self.unit_price, self.fee)
    }
}
