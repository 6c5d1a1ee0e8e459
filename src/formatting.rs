use ansi_term::Style;
use prettytable::format::{Alignment, FormatBuilder, LinePosition, LineSeparator};
use prettytable::{Cell, Row, Table};

use crate::types::{Date, DateTime, Decimal};

pub fn format_date(date: Date) -> String {
    date.format("%d.%m.%Y").to_string()
}

pub fn format_date_time(time: DateTime) -> String {
    time.format("%d.%m.%Y %H:%M").to_string()
}

pub fn decimal_cell(value: Decimal) -> Cell {
    Cell::new_align(&value.to_string(), Alignment::RIGHT)
}

pub fn print_table(name: &str, titles: &[&str], mut table: Table) {
    table.set_format(FormatBuilder::new().padding(1, 1).build());
    table.set_titles(Row::new(
        titles.iter().map(|name| Cell::new_align(name, Alignment::CENTER)).collect()));

    let mut wrapping_table = Table::new();

    wrapping_table.set_format(FormatBuilder::new()
        .separator(LinePosition::Title, LineSeparator::new(' ', ' ', ' ', ' '))
        .build());

    wrapping_table.set_titles(Row::new(vec![
        Cell::new_align(&("\n".to_owned() + &Style::new().bold().paint(name).to_string()),
                        Alignment::CENTER),
    ]));

    wrapping_table.add_row(Row::new(vec![Cell::new(&table.to_string())]));
    wrapping_table.printstd();
}
