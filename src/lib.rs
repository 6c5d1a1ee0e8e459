#[macro_use] extern crate rust_decimal_macros;

#[macro_use] pub mod core;
#[macro_use] pub mod types;
pub mod config;
pub mod corporate_actions;
pub mod currency;
pub mod formats;
pub mod formatting;
pub mod pairing;
pub mod reporting;
pub mod taxes;
pub mod trades;
pub mod util;
