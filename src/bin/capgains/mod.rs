use std::process;

use log::error;

use capgains::config::Config;
use capgains::core::EmptyResult;
use capgains::currency::Currency;
use capgains::currency::converter::CurrencyConverter;
use capgains::formats::{degiro, ibkr, splits};
use capgains::reporting;

use self::init::{Args, BrokerFormat, initialize};

mod init;

fn main() {
    let (args, config) = initialize();

    if let Err(e) = run(args, config) {
        error!("{}.", e);
        process::exit(1);
    }
}

fn run(args: Args, config: Config) -> EmptyResult {
    let mut transactions = Vec::new();

    for path in &args.files {
        let mut statement = match args.format {
            BrokerFormat::Degiro => degiro::read_transactions(path, config.tax_year)?,
            BrokerFormat::Ibkr => ibkr::read_transactions(
                path, config.tax_year, config.option_contracts)?,
        };
        transactions.append(&mut statement);
    }

    let split_table = match args.splits.as_deref() {
        Some(path) if config.apply_splits => splits::read_splits(path)?,
        _ => Vec::new(),
    };

    let converter = CurrencyConverter::new(Currency::Czk)?;
    let report = reporting::generate_report(transactions, &split_table, &config, &converter)?;

    report.print();
    report.save(&config.output_dir)?;

    Ok(())
}
