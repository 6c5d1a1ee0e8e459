use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::Level;

use capgains::config::{Config, load_strategies};
use capgains::core::GenericResult;
use capgains::pairing::{Strategy, StrategyMap};

const DEFAULT_SPLITS_PATH: &str = "config/corporate_actions.csv";

pub enum BrokerFormat {
    Degiro,
    Ibkr,
}

pub struct Args {
    pub files: Vec<String>,
    pub format: BrokerFormat,
    pub splits: Option<String>,
}

pub fn initialize() -> (Args, Config) {
    let matches = Command::new("Capital gains")
        .about("\nCalculates capital gains from your stock and option trades")
        .arg(Arg::new("deg")
            .long("deg")
            .action(ArgAction::SetTrue)
            .help("Process Degiro account statements"))
        .arg(Arg::new("ibkr")
            .long("ibkr")
            .action(ArgAction::SetTrue)
            .conflicts_with("deg")
            .help("Process IBKR trade statements"))
        .arg(Arg::new("year")
            .short('y')
            .long("year")
            .value_name("YEAR")
            .value_parser(value_parser!(i32))
            .required(true)
            .help("Tax year to report"))
        .arg(Arg::new("strategy")
            .short('s')
            .long("strategy")
            .value_name("STRATEGY")
            .value_parser(["fifo", "lifo", "max_cost", "min_cost"])
            .help("Pairing strategy for the tax year"))
        .arg(Arg::new("strategies")
            .long("strategies")
            .value_name("PATH")
            .conflicts_with("strategy")
            .help("JSON file with per year pairing strategies"))
        .arg(Arg::new("bep")
            .long("bep")
            .action(ArgAction::SetTrue)
            .help("Use break even prices of the long position as the cost basis"))
        .arg(Arg::new("no_ttest")
            .long("no-ttest")
            .action(ArgAction::SetTrue)
            .help("Don't apply the three year holding period exemption"))
        .arg(Arg::new("options")
            .long("options")
            .action(ArgAction::SetTrue)
            .help("The statements contain option contract trades (price multiplier 100)"))
        .arg(Arg::new("no_splits")
            .long("no-splits")
            .action(ArgAction::SetTrue)
            .help("Don't apply stock split adjustments"))
        .arg(Arg::new("splits")
            .long("splits")
            .value_name("PATH")
            .help(format!("Stock split table path [default: {DEFAULT_SPLITS_PATH}]")))
        .arg(Arg::new("symbol")
            .long("symbol")
            .value_name("SYMBOL")
            .action(ArgAction::Append)
            .help("Process only the specified product ids"))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("PATH")
            .default_value("outputs")
            .help("Output directory path"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Sets the level of verbosity"))
        .arg(Arg::new("files")
            .value_name("FILE")
            .num_args(1..)
            .required(true)
            .help("Broker statements to process"))
        .get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    };

    if let Err(e) = easy_logging::init(module_path!().split("::").next().unwrap(), log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {}.", e);
        process::exit(1);
    }

    match parse_args(&matches) {
        Ok(result) => result,
        Err(e) => {
            let _ = writeln!(io::stderr(), "{}.", e);
            process::exit(1);
        },
    }
}

fn parse_args(matches: &ArgMatches) -> GenericResult<(Args, Config)> {
    let format = if matches.get_flag("ibkr") {
        BrokerFormat::Ibkr
    } else if matches.get_flag("deg") {
        BrokerFormat::Degiro
    } else {
        return Err("One of --deg and --ibkr must be specified".into());
    };

    let tax_year = *matches.get_one::<i32>("year").unwrap();

    let strategies: StrategyMap = if let Some(path) = matches.get_one::<String>("strategies") {
        load_strategies(&shellexpand::tilde(path))?
    } else if let Some(name) = matches.get_one::<String>("strategy") {
        let strategy = name.parse::<Strategy>().map_err(|_| format!(
            "Invalid pairing strategy: {name:?}"))?;
        [(tax_year, strategy)].into_iter().collect()
    } else {
        return Err("Either --strategy or --strategies must be specified".into());
    };

    let symbols: Option<HashSet<String>> = matches.get_many::<String>("symbol")
        .map(|symbols| symbols.cloned().collect());

    let splits = matches.get_one::<String>("splits").cloned().or_else(|| {
        Path::new(DEFAULT_SPLITS_PATH).exists().then(|| DEFAULT_SPLITS_PATH.to_owned())
    });

    let files = matches.get_many::<String>("files").unwrap().cloned().collect();

    let config = Config {
        tax_year, strategies,

        break_even: matches.get_flag("bep"),
        time_test: !matches.get_flag("no_ttest"),
        option_contracts: matches.get_flag("options"),
        apply_splits: !matches.get_flag("no_splits"),

        symbols,
        output_dir: PathBuf::from(shellexpand::tilde(
            matches.get_one::<String>("output").unwrap()).to_string()),
    };

    Ok((Args {files, format, splits}, config))
}
