use rust_decimal::RoundingStrategy;

use crate::core::GenericResult;
use crate::types::{Date, DateTime, Decimal};

pub fn round(amount: Decimal, points: u32) -> Decimal {
    amount.round_dp_with_strategy(points, RoundingStrategy::MidpointAwayFromZero).normalize()
}

#[derive(Clone, Copy)]
pub enum DecimalRestrictions {
    No,
    PositiveOrZero,
    StrictlyPositive,
}

pub fn validate_decimal(value: Decimal, restrictions: DecimalRestrictions) -> GenericResult<Decimal> {
    let valid = match restrictions {
        DecimalRestrictions::No => true,
        DecimalRestrictions::PositiveOrZero => value.is_sign_positive() || value.is_zero(),
        DecimalRestrictions::StrictlyPositive => value.is_sign_positive() && !value.is_zero(),
    };

    if !valid {
        return Err!("The value doesn't comply to the specified restrictions: {}", value);
    }

    Ok(value)
}

pub fn parse_date(date: &str, format: &str) -> GenericResult<Date> {
    Ok(Date::parse_from_str(date, format).map_err(|_| format!(
        "Invalid date: {date:?}"))?)
}

pub fn parse_date_time(date_time: &str, format: &str) -> GenericResult<DateTime> {
    Ok(DateTime::parse_from_str(date_time, format).map_err(|_| format!(
        "Invalid time: {date_time:?}"))?)
}
