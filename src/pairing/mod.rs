use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

mod engine;
mod selector;

pub use self::engine::{LotBinding, PairingStatus, SaleRecord, pair_transactions};
pub use self::selector::InsufficientLots;

/// Lot selection policy for pairing position closing transactions with opening ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    Fifo,
    Lifo,
    MaxCost,
    MinCost,
}

/// Per tax year strategy configuration. The strategy must be configured for every year starting
/// from the first configured one; years before that fall back to FIFO.
pub type StrategyMap = BTreeMap<i32, Strategy>;

#[derive(Debug, Error)]
#[error("there is no pairing strategy configured for {0}")]
pub struct NoStrategy(pub i32);

pub fn strategy_for(year: i32, strategies: &StrategyMap) -> Result<Strategy, NoStrategy> {
    let last_year = *strategies.keys().next_back().ok_or(NoStrategy(year))?;
    if year > last_year {
        return Err(NoStrategy(year));
    }

    let first_year = *strategies.keys().next().unwrap();
    if year < first_year {
        return Ok(Strategy::Fifo);
    }

    strategies.get(&year).copied().ok_or(NoStrategy(year))
}
