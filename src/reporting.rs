use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Datelike;
use log::{error, info, warn};
use prettytable::Table;
use prettytable::format::Alignment;

use crate::config::Config;
use crate::core::{EmptyResult, GenericResult};
use crate::corporate_actions::{self, StockSplit};
use crate::currency::{Cash, Currency};
use crate::currency::converter::CurrencyConverter;
use crate::formatting;
use crate::pairing::SaleRecord;
use crate::taxes;
use crate::trades::Transaction;
use crate::types::{DateTime, Decimal};

const EXPORT_PRECISION: u32 = 4;
const DISPLAY_PRECISION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display)]
pub enum ProductStatus {
    #[strum(serialize = "OK")]
    Ok,
    NoSales,
    Error,
}

pub struct ProductRow {
    pub display_name: String,
    pub product_id: String,
    pub status: ProductStatus,

    pub income: Cash,
    pub cost: Cash,
    pub profit: Cash,
    pub fees: Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PairSide {
    Open,
    Close,
}

/// One side of a paired open/close transaction couple in the detailed pairing listing. Both rows
/// of a couple share the pair id.
pub struct PairingRow {
    pub pair_id: String,
    pub side: PairSide,
    pub product_id: String,
    pub time: DateTime,
    pub quantity: u32,
    pub split_ratio: Decimal,
    pub unit_price: Decimal,
    pub currency: Currency,

    // Open side only
    pub time_test_passed: Option<bool>,
    pub profit_per_share: Option<Decimal>,
}

pub struct TaxReport {
    pub tax_year: i32,
    pub rows: Vec<ProductRow>,
    pub pairings: Vec<PairingRow>,

    pub total_income: Cash,
    pub total_cost: Cash,
    pub total_fees: Cash,
    pub total_untaxed_quantity: u64,

    pub errors: usize,
}

/// Processes all imported transactions instrument by instrument and aggregates the results for
/// the requested tax year.
///
/// Instruments are sandboxed from each other: a failure to process one is reported as an error
/// row with zero amounts and doesn't affect the others.
pub fn generate_report(
    transactions: Vec<Transaction>, splits: &[StockSplit], config: &Config,
    converter: &CurrencyConverter,
) -> GenericResult<TaxReport> {
    let tax_year = config.tax_year;

    let mut products: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for transaction in transactions {
        products.entry(transaction.product_id.clone()).or_default().push(transaction);
    }

    let mut report = TaxReport::new(tax_year, converter.target());

    for (product_id, mut product_transactions) in products {
        if !product_transactions.iter().any(|transaction| transaction.time.year() == tax_year) {
            continue;
        }

        if let Some(symbols) = config.symbols.as_ref() {
            if !symbols.contains(&product_id) {
                info!("Skipping {} per the provided symbol list.", product_id);
                continue;
            }
        }

        let display_name = product_transactions.first().unwrap().display_name.clone();

        match process_product(&mut product_transactions, splits, &product_id, config, converter) {
            Ok(records) => {
                report.add_product(&display_name, &product_id, &product_transactions, &records);
            },
            Err(e) => {
                error!("Failed to process {}: {}.", product_id, e);
                report.add_failed_product(&display_name, &product_id);
            },
        }
    }

    if report.errors > 0 {
        warn!("Failed to process {} instrument(s). Their amounts are reported as zero.",
              report.errors);
    }

    Ok(report)
}

fn process_product(
    transactions: &mut [Transaction], splits: &[StockSplit], product_id: &str,
    config: &Config, converter: &CurrencyConverter,
) -> GenericResult<Vec<SaleRecord>> {
    if config.apply_splits {
        corporate_actions::adjust_product(transactions, splits, product_id)?;
    }

    taxes::process_product(
        transactions, config.tax_year, &config.strategies, config.tax_options(), converter)
}

pub fn calculate_totals(
    records: &[SaleRecord], tax_year: i32, currency: Currency,
) -> (Cash, Cash, Cash) {
    let mut income = Cash::zero(currency);
    let mut cost = Cash::zero(currency);
    let mut fees = Cash::zero(currency);

    for record in records {
        if record.close_time.year() != tax_year {
            continue;
        }

        income += record.income.unwrap_or(Cash::zero(currency));
        cost += record.cost.unwrap_or(Cash::zero(currency));
        fees += record.fees.unwrap_or(Cash::zero(currency));
    }

    (
        income.round_to(EXPORT_PRECISION),
        cost.round_to(EXPORT_PRECISION),
        fees.round_to(EXPORT_PRECISION),
    )
}

pub fn calculate_untaxed_total(records: &[SaleRecord], tax_year: i32) -> u64 {
    records.iter()
        .filter(|record| record.close_time.year() == tax_year)
        .map(|record| u64::from(record.untaxed_quantity))
        .sum()
}

fn pairing_rows(
    records: &[SaleRecord], transactions: &[Transaction], tax_year: i32,
) -> Vec<PairingRow> {
    let mut rows = Vec::new();

    for record in records {
        if record.close_time.year() != tax_year {
            continue;
        }

        let sale = &transactions[record.anchor];
        let close_time = record.close_time.format("%Y-%m-%dT%H:%M:%S");

        for (index, binding) in record.bindings.iter().enumerate() {
            let lot = &transactions[binding.lot];
            let pair_id = format!("{close_time}_{index}");

            rows.push(PairingRow {
                pair_id: pair_id.clone(),
                side: PairSide::Open,
                product_id: lot.product_id.clone(),
                time: lot.time,
                quantity: binding.quantity,
                split_ratio: lot.split_ratio(),
                unit_price: lot.unit_price,
                currency: lot.currency,
                time_test_passed: Some(binding.time_test_passed),
                profit_per_share: Some(sale.unit_price - lot.unit_price),
            });

            rows.push(PairingRow {
                pair_id,
                side: PairSide::Close,
                product_id: sale.product_id.clone(),
                time: sale.time,
                quantity: binding.quantity,
                split_ratio: sale.split_ratio(),
                unit_price: sale.unit_price,
                currency: sale.currency,
                time_test_passed: None,
                profit_per_share: None,
            });
        }
    }

    rows
}

impl TaxReport {
    fn new(tax_year: i32, currency: Currency) -> TaxReport {
        TaxReport {
            tax_year,
            rows: Vec::new(),
            pairings: Vec::new(),

            total_income: Cash::zero(currency),
            total_cost: Cash::zero(currency),
            total_fees: Cash::zero(currency),
            total_untaxed_quantity: 0,

            errors: 0,
        }
    }

    pub fn profit_before_fees(&self) -> Cash {
        self.total_income - self.total_cost
    }

    pub fn profit_after_fees(&self) -> Cash {
        self.profit_before_fees() - self.total_fees
    }

    fn add_product(
        &mut self, display_name: &str, product_id: &str,
        transactions: &[Transaction], records: &[SaleRecord],
    ) {
        let (income, cost, fees) = calculate_totals(records, self.tax_year, self.total_income.currency);
        let untaxed = calculate_untaxed_total(records, self.tax_year);

        let status = if records.iter().any(|record| record.close_time.year() == self.tax_year) {
            ProductStatus::Ok
        } else {
            ProductStatus::NoSales
        };

        self.rows.push(ProductRow {
            display_name: display_name.to_owned(),
            product_id: product_id.to_owned(),
            status,
            income, cost, fees,
            profit: income - cost,
        });

        self.pairings.extend(pairing_rows(records, transactions, self.tax_year));

        self.total_income += income;
        self.total_cost += cost;
        self.total_fees += fees;
        self.total_untaxed_quantity += untaxed;
    }

    fn add_failed_product(&mut self, display_name: &str, product_id: &str) {
        let zero = Cash::zero(self.total_income.currency);

        self.rows.push(ProductRow {
            display_name: display_name.to_owned(),
            product_id: product_id.to_owned(),
            status: ProductStatus::Error,
            income: zero,
            cost: zero,
            profit: zero,
            fees: zero,
        });
        self.errors += 1;
    }

    pub fn print(&self) {
        let mut table = Table::new();

        for row in &self.rows {
            table.add_row(prettytable::Row::new(vec![
                prettytable::Cell::new(&row.display_name),
                prettytable::Cell::new(&row.product_id),
                prettytable::Cell::new_align(&row.status.to_string(), Alignment::CENTER),
                formatting::decimal_cell(row.income.amount),
                formatting::decimal_cell(row.cost.amount),
                formatting::decimal_cell(row.profit.amount),
                formatting::decimal_cell(row.fees.amount),
            ]));
        }

        formatting::print_table(
            &format!("Capital gains for {}", self.tax_year),
            &["Product", "ID", "Status", "Income", "Cost", "Profit", "Fees"],
            table);

        let display = |amount: Cash| amount.round_to(DISPLAY_PRECISION);

        println!();
        println!("Total income: {}", display(self.total_income));
        println!("Total cost  : {}", display(self.total_cost));
        println!("Total fees  : {}", display(self.total_fees));
        println!("Total profit: {}, after fees: {} (~{})",
                 display(self.profit_before_fees()), display(self.profit_after_fees()),
                 self.profit_after_fees().format_rounded());

        if self.total_untaxed_quantity > 0 {
            println!("Untaxed via time test: {} share(s)", self.total_untaxed_quantity);
        }

        if self.errors > 0 {
            println!("! {} instrument(s) failed to process !", self.errors);
        }
    }

    pub fn save(&self, output_dir: &Path) -> EmptyResult {
        fs::create_dir_all(output_dir).map_err(|e| format!(
            "Unable to create {output_dir:?}: {e}"))?;

        self.write_results(&output_dir.join(format!("results-{}.csv", self.tax_year)))?;
        self.write_pairings(&output_dir.join(format!("pairings-{}.csv", self.tax_year)))?;

        Ok(())
    }

    fn write_results(&self, path: &Path) -> EmptyResult {
        let mut writer = csv::Writer::from_path(path).map_err(|e| format!(
            "Unable to create {path:?}: {e}"))?;

        writer.write_record(["Product", "ID", "Status", "Income", "Cost", "Profit", "Fees"])?;

        for row in &self.rows {
            writer.write_record([
                row.display_name.clone(),
                row.product_id.clone(),
                row.status.to_string(),
                row.income.amount.to_string(),
                row.cost.amount.to_string(),
                row.profit.amount.to_string(),
                row.fees.amount.to_string(),
            ])?;
        }

        Ok(writer.flush()?)
    }

    fn write_pairings(&self, path: &Path) -> EmptyResult {
        let mut writer = csv::Writer::from_path(path).map_err(|e| format!(
            "Unable to create {path:?}: {e}"))?;

        writer.write_record([
            "PairID", "Side", "Product", "Time", "Quantity", "SplitRatio",
            "UnitPrice", "Currency", "TimeTestPassed", "ProfitPerShare",
        ])?;

        for row in &self.pairings {
            writer.write_record([
                row.pair_id.clone(),
                row.side.to_string(),
                row.product_id.clone(),
                row.time.format("%Y-%m-%d %H:%M").to_string(),
                row.quantity.to_string(),
                row.split_ratio.to_string(),
                row.unit_price.to_string(),
                row.currency.to_string(),
                row.time_test_passed.map(|passed| passed.to_string()).unwrap_or_default(),
                row.profit_per_share.map(|profit| profit.to_string()).unwrap_or_default(),
            ])?;
        }

        Ok(writer.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::trades::testing::{TAX_YEAR, trade};
    use super::*;

    fn new_trade(product_id: &str, count: i32, price: Decimal, day: u32) -> Transaction {
        let mut transaction = trade(count, price, day);
        transaction.product_id = s!(product_id);
        transaction.display_name = format!("{product_id} Inc");
        transaction
    }

    fn mock_report(config: &Config, transactions: Vec<Transaction>) -> TaxReport {
        let converter = CurrencyConverter::new(Currency::Czk).unwrap();
        generate_report(transactions, &[], config, &converter).unwrap()
    }

    #[test]
    fn aggregation() {
        let config = Config::mock();
        let report = mock_report(&config, vec![
            new_trade("X1", 10, dec!(100), 1),
            new_trade("X1", -10, dec!(150), 5),
            new_trade("X2", 5, dec!(200), 2),
        ]);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.errors, 0);

        let row = &report.rows[0];
        assert_eq!(row.product_id, "X1");
        assert_eq!(row.status, ProductStatus::Ok);
        assert_eq!(row.income.amount, dec!(10) * dec!(150) * dec!(21.72));
        assert_eq!(row.profit.amount, dec!(500) * dec!(21.72));

        let row = &report.rows[1];
        assert_eq!(row.product_id, "X2");
        assert_eq!(row.status, ProductStatus::NoSales);
        assert_eq!(row.income.amount, dec!(0));

        assert_eq!(report.total_income.amount, dec!(10) * dec!(150) * dec!(21.72));
        assert_eq!(report.profit_before_fees().amount, dec!(500) * dec!(21.72));
    }

    #[test]
    fn totals_quantization() {
        let config = Config::mock();
        let report = mock_report(&config, vec![
            new_trade("X1", 3, dec!(0.123456), 1),
            new_trade("X1", -3, dec!(0.654321), 5),
        ]);

        // Unquantized income would be 3 * 0.654321 * 21.72 = 42.63555636
        assert_eq!(report.rows[0].income.amount, dec!(42.6356));
        assert_eq!(report.rows[0].cost.amount, dec!(8.0444));
    }

    #[test]
    fn sandboxed_product_failure() {
        // The close year is out of the configured strategy range, which fails the instrument
        let mut config = Config::mock();
        config.strategies = maplit::btreemap! {2020 => crate::pairing::Strategy::Fifo};

        let report = mock_report(&config, vec![
            new_trade("X1", 10, dec!(100), 1),
            new_trade("X1", -10, dec!(150), 5),
        ]);

        assert_eq!(report.errors, 1);
        assert_eq!(report.rows[0].status, ProductStatus::Error);
        assert_eq!(report.rows[0].income.amount, dec!(0));
    }

    #[test]
    fn pairing_listing() {
        let config = Config::mock();
        let report = mock_report(&config, vec![
            new_trade("X1", 10, dec!(100), 1),
            new_trade("X1", -4, dec!(150), 5),
        ]);

        assert_eq!(report.pairings.len(), 2);

        let open = &report.pairings[0];
        let close = &report.pairings[1];

        let close_time = date_time!(TAX_YEAR, 3, 5);
        assert_eq!(open.pair_id, format!("{}_0", close_time.format("%Y-%m-%dT%H:%M:%S")));
        assert_eq!(open.pair_id, close.pair_id);

        assert_eq!(open.side, PairSide::Open);
        assert_eq!(open.quantity, 4);
        assert_eq!(open.profit_per_share, Some(dec!(50)));
        assert_eq!(open.time_test_passed, Some(false));

        assert_eq!(close.side, PairSide::Close);
        assert_eq!(close.unit_price, dec!(150));
        assert_eq!(close.profit_per_share, None);
    }

    #[test]
    fn csv_export() {
        let config = Config::mock();
        let report = mock_report(&config, vec![
            new_trade("X1", 10, dec!(100), 1),
            new_trade("X1", -10, dec!(150), 5),
        ]);

        let output_dir = tempfile::tempdir().unwrap();
        report.save(output_dir.path()).unwrap();

        let results = fs::read_to_string(output_dir.path().join("results-2021.csv")).unwrap();
        assert!(results.starts_with("Product,ID,Status,Income,Cost,Profit,Fees\n"));
        assert!(results.contains("X1 Inc,X1,OK,"));

        let pairings = fs::read_to_string(output_dir.path().join("pairings-2021.csv")).unwrap();
        assert_eq!(pairings.lines().count(), 3);
    }
}
