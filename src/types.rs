pub use chrono::NaiveDate as Date;
pub use chrono::NaiveDateTime as DateTime;
pub use rust_decimal::Decimal;

macro_rules! date {
    ($year:expr, $month:expr, $day:expr) => {
        ::chrono::NaiveDate::from_ymd_opt($year, $month, $day).unwrap()
    };
}

#[cfg(test)]
macro_rules! date_time {
    ($year:expr, $month:expr, $day:expr) => {
        date_time!($year, $month, $day, 0, 0)
    };
    ($year:expr, $month:expr, $day:expr, $hour:expr, $minute:expr) => {
        date!($year, $month, $day).and_hms_opt($hour, $minute, 0).unwrap()
    };
}
