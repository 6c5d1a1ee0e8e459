use chrono::Datelike;
use log::debug;

use crate::core::{EmptyResult, GenericResult};
use crate::currency::Cash;
use crate::currency::converter::CurrencyConverter;
use crate::pairing::{SaleRecord, StrategyMap, pair_transactions};
use crate::trades::Transaction;
use crate::types::Decimal;

// The holding period exemption uses plain calendar days, not a calendar accurate interval
const TIME_TEST_DAYS: i64 = 3 * 365;

#[derive(Clone, Copy, Default)]
pub struct TaxOptions {
    /// Override the cost basis of each paired lot with the break even price of the long position
    /// prevailing at the sale time.
    pub break_even: bool,

    /// Exclude lots held longer than three years from taxation.
    pub time_test: bool,
}

/// Processes the transaction history of one instrument: reconstructs the position history,
/// pairs every position closing transaction with its opening lots and calculates the realized
/// income, cost and fees of every record closed in the requested tax year.
pub fn process_product(
    transactions: &mut [Transaction], tax_year: i32, strategies: &StrategyMap,
    options: TaxOptions, converter: &CurrencyConverter,
) -> GenericResult<Vec<SaleRecord>> {
    transactions.sort_by_key(|transaction| transaction.time);

    if options.break_even {
        calculate_break_even_prices(transactions);
    }

    let mut records = pair_transactions(transactions, strategies)?;
    calculate_taxes(&mut records, transactions, tax_year, options, converter)?;

    Ok(records)
}

/// Walks the chronologically sorted transactions maintaining the running average cost of the
/// long position and records it on each transaction: buys update the average, sales are recorded
/// at the prevailing one and reduce the accumulated cost by it.
pub fn calculate_break_even_prices(transactions: &mut [Transaction]) {
    let mut quantity: i64 = 0;
    let mut total_cost = dec!(0);

    for transaction in transactions {
        if transaction.is_sale() {
            // With no long position there is no average cost to record (short selling activity)
            if quantity <= 0 {
                continue;
            }

            let bep = total_cost / Decimal::from(quantity);
            transaction.set_bep(bep);

            total_cost += Decimal::from(transaction.count) * bep; // count is negative for sales
            quantity += i64::from(transaction.count);
        } else {
            total_cost += Decimal::from(transaction.count) * transaction.unit_price;
            quantity += i64::from(transaction.count);

            if quantity > 0 {
                transaction.set_bep(total_cost / Decimal::from(quantity));
            }
        }
    }
}

pub fn calculate_taxes(
    records: &mut [SaleRecord], transactions: &[Transaction], tax_year: i32,
    options: TaxOptions, converter: &CurrencyConverter,
) -> EmptyResult {
    for record in records.iter_mut() {
        if record.close_time.year() == tax_year {
            calculate_record(record, transactions, tax_year, options, converter)?;
        }
    }
    Ok(())
}

fn calculate_record(
    record: &mut SaleRecord, transactions: &[Transaction], tax_year: i32,
    options: TaxOptions, converter: &CurrencyConverter,
) -> EmptyResult {
    let sale = &transactions[record.anchor];
    if !sale.is_sale() {
        return Err!("An attempt to calculate income for a non-sale transaction: {}", sale);
    }

    let sale_rate = converter.rate(sale.time.year(), sale.currency)?;

    let mut total_income = dec!(0);
    let mut total_cost = dec!(0);
    let mut total_fees = dec!(0);
    let mut included_count = 0u32;
    let mut untaxed_count = 0u32;

    for binding in &mut record.bindings {
        let lot = &transactions[binding.lot];

        // Short covers executed before the tax year are already accounted in their own year
        if binding.is_short_cover && lot.time.year() < tax_year {
            if lot.time < sale.time {
                return Err!("Pairing is broken: {} is not a short cover of {}", lot, sale);
            }
            debug!("Skipping short cover which is already accounted in {}: {}.",
                   lot.time.year(), lot);
            continue;
        }

        let quantity = Decimal::from(binding.quantity);
        let pair_income = quantity * sale.unit_price * sale_rate * Decimal::from(sale.multiplier);

        let effective_price = if options.break_even {
            sale.bep().unwrap_or(lot.unit_price)
        } else {
            lot.unit_price
        };

        let lot_rate = converter.rate(lot.time.year(), lot.currency)?;
        let pair_cost = quantity * effective_price * lot_rate * Decimal::from(lot.multiplier);

        let pair_fees = if binding.fee_claimed_here {
            converter.convert(lot.time.year(), Cash::new(lot.fee_currency, lot.fee))?
        } else {
            Cash::zero(converter.target())
        };

        binding.fx_rate = Some(lot_rate);
        binding.cost = Some(Cash::new(converter.target(), pair_cost));
        binding.fees = Some(pair_fees);

        if (sale.time - lot.time).num_days() > TIME_TEST_DAYS {
            binding.time_test_passed = true;

            debug!("Time test passed{} for {} share(s) bought on {}: untaxed profit is {}.",
                   if options.time_test {""} else {" (but not applied)"},
                   binding.quantity, lot.time.date(),
                   Cash::new(converter.target(), pair_income - pair_cost).round());

            if options.time_test {
                untaxed_count += binding.quantity;
                continue;
            }
        }

        total_income += pair_income;
        total_cost += pair_cost;
        total_fees += pair_fees.amount;
        included_count += binding.quantity;
    }

    // Don't charge the sale fee on a sale which is entirely a time test exemption or a dangling
    // open short
    if included_count > 0 {
        total_fees += converter.convert(
            sale.time.year(), Cash::new(sale.fee_currency, sale.fee))?.amount;
    }

    record.income = Some(Cash::new(converter.target(), total_income));
    record.cost = Some(Cash::new(converter.target(), total_cost));
    record.fees = Some(Cash::new(converter.target(), total_fees));
    record.untaxed_quantity = untaxed_count;

    Ok(())
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use crate::currency::Currency;
    use crate::pairing::Strategy;
    use crate::trades::testing::{TAX_YEAR, trade, trade_in_month, trade_on};
    use super::*;

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new(Currency::Czk).unwrap()
    }

    fn process(
        transactions: &mut [Transaction], strategy: Strategy, options: TaxOptions,
    ) -> Vec<SaleRecord> {
        let strategies = btreemap! {TAX_YEAR => strategy};
        process_product(transactions, TAX_YEAR, &strategies, options, &converter()).unwrap()
    }

    #[test]
    fn fee_claiming() {
        let mut transactions = vec![
            trade(10, dec!(100), 1),
            trade(-2, dec!(150), 10),
            trade_in_month(-8, dec!(150), 20, 11),
        ];
        let records = process(&mut transactions, Strategy::MaxCost, TaxOptions::default());

        // The buy fee is claimed by the first record only, the sale fee is always charged
        let eur_rate = dec!(25.65);
        assert_eq!(records[0].fees.unwrap().amount, dec!(1.00) * eur_rate);
        assert_eq!(records[1].fees.unwrap().amount, dec!(0.50) * eur_rate);
    }

    #[test]
    fn profit_calculation() {
        let mut transactions = vec![
            trade(10, dec!(100), 1),
            trade(-3, dec!(120), 5),
        ];
        let records = process(&mut transactions, Strategy::MaxCost, TaxOptions::default());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].profit().unwrap().amount, dec!(60) * dec!(21.72));
    }

    #[test]
    fn profit_calculation_multiple_buys() {
        let mut transactions = vec![
            trade(5, dec!(100), 1),
            trade(4, dec!(110), 2),
            trade(3, dec!(120), 3),
            trade(-10, dec!(200), 10),
        ];
        let records = process(&mut transactions, Strategy::MaxCost, TaxOptions::default());

        // FIFO would give $940
        assert_eq!(records[0].profit().unwrap().amount, dec!(900) * dec!(21.72));
    }

    #[test]
    fn break_even_prices_buys_only() {
        let mut transactions = vec![
            trade(5, dec!(100), 1),
            trade(3, dec!(150), 2),
        ];
        calculate_break_even_prices(&mut transactions);

        assert_eq!(transactions[0].bep().unwrap(), dec!(100));
        assert_eq!(transactions[1].bep().unwrap(), dec!(118.75)); // (500 + 450) / 8
    }

    #[test]
    fn break_even_prices_with_sales() {
        let mut transactions = vec![
            trade(10, dec!(100), 1),
            trade(5, dec!(120), 2),
            trade(-8, dec!(130), 3),
            trade(1, dec!(140), 4),
        ];
        calculate_break_even_prices(&mut transactions);

        assert_eq!(transactions[0].bep().unwrap(), dec!(100));

        let bep = dec!(1600) / dec!(15);
        assert_eq!(transactions[1].bep().unwrap(), bep);

        // The sale is recorded at the prevailing average and reduces the accumulated cost by it
        assert_eq!(transactions[2].bep().unwrap(), bep);

        let total_cost = dec!(1600) - dec!(8) * bep;
        assert_eq!(transactions[3].bep().unwrap(), (total_cost + dec!(140)) / dec!(8));
    }

    #[test]
    fn profit_calculation_break_even() {
        let mut transactions = vec![
            trade(10, dec!(100), 1),
            trade(10, dec!(300), 3),
            trade(-3, dec!(120), 5),
            trade(17, dec!(400), 10),
            trade(-10, dec!(500), 15),
        ];
        let options = TaxOptions {break_even: true, ..Default::default()};
        let records = process(&mut transactions, Strategy::Fifo, options);
        assert_eq!(records.len(), 2);

        let fx_rate = dec!(21.72);
        assert_eq!(records[0].profit().unwrap().amount / fx_rate, dec!(-240));
        assert_eq!(records[1].profit().unwrap().amount / fx_rate, dec!(2000));
    }

    #[test]
    fn time_test() {
        let mut transactions = vec![
            trade_on(5, dec!(100), date_time!(TAX_YEAR - 3, 1, 1)),
            trade_on(3, dec!(120), date_time!(TAX_YEAR - 2, 1, 1)),
            trade_on(-8, dec!(200), date_time!(TAX_YEAR, 1, 2)),
        ];
        let options = TaxOptions {time_test: true, ..Default::default()};
        let records = process(&mut transactions, Strategy::Fifo, options);

        let record = &records[0];
        assert!(record.bindings[0].time_test_passed);
        assert!(!record.bindings[1].time_test_passed);

        assert_eq!(record.untaxed_quantity, 5);
        assert_eq!(record.income.unwrap().amount, dec!(3) * dec!(200) * dec!(21.72));
        assert_eq!(record.cost.unwrap().amount, dec!(3) * dec!(120) * dec!(22.93));
    }

    #[test]
    fn time_test_disabled() {
        let mut transactions = vec![
            trade_on(5, dec!(100), date_time!(TAX_YEAR - 3, 1, 1)),
            trade_on(3, dec!(120), date_time!(TAX_YEAR - 2, 1, 1)),
            trade_on(-8, dec!(200), date_time!(TAX_YEAR, 1, 2)),
        ];
        let records = process(&mut transactions, Strategy::Fifo, TaxOptions::default());

        // The flag is still set on the passing binding, but income and cost include both lots
        let record = &records[0];
        assert!(record.bindings[0].time_test_passed);

        assert_eq!(record.untaxed_quantity, 0);
        assert_eq!(record.income.unwrap().amount, dec!(8) * dec!(200) * dec!(21.72));
        assert_eq!(
            record.cost.unwrap().amount,
            dec!(5) * dec!(100) * dec!(21.78) + dec!(3) * dec!(120) * dec!(22.93),
        );
    }

    #[test]
    fn fully_exempt_sale_pays_no_fee() {
        let mut transactions = vec![
            trade_on(5, dec!(100), date_time!(TAX_YEAR - 4, 1, 1)),
            trade_on(-5, dec!(200), date_time!(TAX_YEAR, 1, 2)),
        ];
        let options = TaxOptions {time_test: true, ..Default::default()};
        let records = process(&mut transactions, Strategy::Fifo, options);

        let record = &records[0];
        assert_eq!(record.untaxed_quantity, 5);
        assert_eq!(record.income.unwrap().amount, dec!(0));
        assert_eq!(record.cost.unwrap().amount, dec!(0));
        assert_eq!(record.fees.unwrap().amount, dec!(0));
    }

    #[test]
    fn short_cover_from_prior_year() {
        let mut transactions = vec![
            trade_on(-100, dec!(100), date_time!(2021, 12, 28)),
            trade_on(60, dec!(90), date_time!(2021, 12, 30)),
            trade_on(40, dec!(80), date_time!(2022, 1, 3)),
        ];
        let strategies = btreemap! {
            2021 => Strategy::Fifo,
            2022 => Strategy::Fifo,
        };
        let records = process_product(
            &mut transactions, 2022, &strategies, TaxOptions::default(), &converter()).unwrap();

        // The 2021 cover is already accounted in 2021, so only the 2022 one contributes
        let record = &records[0];
        assert_eq!(record.close_time.year(), 2022);
        assert_eq!(record.income.unwrap().amount, dec!(40) * dec!(100) * dec!(21.72));
        assert_eq!(record.cost.unwrap().amount, dec!(40) * dec!(80) * dec!(23.41));
        assert_eq!(record.fees.unwrap().amount, dec!(0.5) * dec!(24.54) + dec!(0.5) * dec!(25.65));
    }

    #[test]
    fn deepened_short_totals() {
        let mut transactions = vec![
            trade(-50, dec!(100), 1),
            trade(-70, dec!(120), 2),
            trade(60, dec!(90), 3),
            trade(60, dec!(80), 4),
        ];
        let records = process(&mut transactions, Strategy::Fifo, TaxOptions::default());
        assert_eq!(records.len(), 2);

        let income: Decimal = records.iter().map(|record| record.income.unwrap().amount).sum();
        let cost: Decimal = records.iter().map(|record| record.cost.unwrap().amount).sum();

        let fx_rate = dec!(21.72);
        assert_eq!(income, dec!(13400) * fx_rate); // 50 * 100 + 70 * 120
        assert_eq!(cost, dec!(10200) * fx_rate);   // 60 * 90 + 60 * 80
    }

    #[test]
    fn short_position_calculation() {
        let mut transactions = vec![
            trade_on(-100, dec!(100), date_time!(2021, 1, 2)),
            trade_on(100, dec!(150), date_time!(2021, 1, 5)),
        ];
        let records = process(&mut transactions, Strategy::Fifo, TaxOptions::default());

        let record = &records[0];
        assert_eq!(record.income.unwrap().amount, dec!(10000) * dec!(21.72));
        assert_eq!(record.cost.unwrap().amount, dec!(15000) * dec!(21.72));
    }
}
