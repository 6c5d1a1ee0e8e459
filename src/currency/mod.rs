use std::str::FromStr;

use thiserror::Error;

use crate::types::Decimal;
use crate::util;

mod cash;
mod rates;

pub mod converter;

pub use self::cash::Cash;
pub use self::rates::{FxNotSupported, unified_rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Currency {
    Czk,
    Usd,
    Eur,
    Cad,
}

#[derive(Debug, Error)]
#[error("{0:?} currency is not supported")]
pub struct CurrencyUnsupported(pub String);

pub fn parse_currency(code: &str) -> Result<Currency, CurrencyUnsupported> {
    Currency::from_str(code).map_err(|_| CurrencyUnsupported(code.to_owned()))
}

pub fn round(amount: Decimal) -> Decimal {
    util::round(amount, 2)
}

pub fn round_to(amount: Decimal, points: u32) -> Decimal {
    util::round(amount, points)
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;
    use super::*;

    #[test]
    fn currency_codes() {
        assert_eq!(parse_currency("USD").unwrap(), Currency::Usd);
        assert_eq!(parse_currency("CZK").unwrap(), Currency::Czk);
        assert_eq!(Currency::Eur.to_string(), "EUR");

        assert_matches!(parse_currency("GBP"), Err(CurrencyUnsupported(ref code)) if code == "GBP");
        assert_matches!(parse_currency("usd"), Err(_));
    }
}
