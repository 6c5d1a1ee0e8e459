use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::core::GenericResult;
use crate::pairing::StrategyMap;
use crate::taxes::TaxOptions;

pub struct Config {
    pub tax_year: i32,
    pub strategies: StrategyMap,

    pub break_even: bool,
    pub time_test: bool,
    pub option_contracts: bool,
    pub apply_splits: bool,

    /// When set, restricts processing to the specified product ids
    pub symbols: Option<HashSet<String>>,

    pub output_dir: PathBuf,
}

impl Config {
    pub fn tax_options(&self) -> TaxOptions {
        TaxOptions {
            break_even: self.break_even,
            time_test: self.time_test,
        }
    }

    #[cfg(test)]
    pub fn mock() -> Config {
        use maplit::btreemap;
        use crate::pairing::Strategy;

        Config {
            tax_year: 2021,
            strategies: btreemap! {2021 => Strategy::MaxCost},

            break_even: false,
            time_test: false,
            option_contracts: false,
            apply_splits: true,

            symbols: None,
            output_dir: PathBuf::from("outputs"),
        }
    }
}

/// Loads the per year pairing strategy configuration: a JSON object with year keys and
/// fifo/lifo/max_cost/min_cost values.
pub fn load_strategies(path: &str) -> GenericResult<StrategyMap> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    Ok(serde_json::from_slice(&data).map_err(|e| format!(
        "Error while reading {path:?}: {e}"))?)
}
