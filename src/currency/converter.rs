use crate::core::GenericResult;
use crate::types::Decimal;

use super::{Cash, Currency, rates};

/// Converts trade amounts into the reporting currency using unified annual rates.
pub struct CurrencyConverter {
    target: Currency,
}

impl CurrencyConverter {
    pub fn new(target: Currency) -> GenericResult<CurrencyConverter> {
        if target != Currency::Czk {
            return Err!("Unsupported reporting currency: {}", target);
        }
        Ok(CurrencyConverter {target})
    }

    pub fn target(&self) -> Currency {
        self.target
    }

    pub fn rate(&self, year: i32, currency: Currency) -> GenericResult<Decimal> {
        if currency == self.target {
            return Ok(dec!(1));
        }
        Ok(rates::unified_rate(year, currency)?)
    }

    pub fn convert(&self, year: i32, amount: Cash) -> GenericResult<Cash> {
        Ok(Cash::new(self.target, amount.amount * self.rate(year, amount.currency)?))
    }
}
