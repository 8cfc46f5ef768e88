use crate::model::Amount;
use crate::report::Entry;
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// How many months the evolution report covers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Window {
    #[default]
    #[value(name = "6")]
    Six,
    #[value(name = "12")]
    Twelve,
}

impl Window {
    pub fn months(self) -> u32 {
        match self {
            Window::Six => 6,
            Window::Twelve => 12,
        }
    }
}

/// The totals of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthPoint {
    pub year: i32,
    pub month: u32,
    pub income: Amount,
    pub expense: Amount,
    pub savings: Amount,
    /// `income - expense`
    pub balance: Amount,
}

impl Display for MonthPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// One point per month for the `window` months ending with the month of `today`, oldest first.
/// Months without records are zero. Entries without a date or an amount are left out.
pub fn monthly_evolution<I, E, S>(
    today: NaiveDate,
    window: Window,
    incomes: &[I],
    expenses: &[E],
    savings: &[S],
) -> Vec<MonthPoint>
where
    I: Entry,
    E: Entry,
    S: Entry,
{
    let current = today.with_day(1).unwrap_or(today);
    (0..window.months())
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .map(|start| {
            let (year, month) = (start.year(), start.month());
            let income = month_total(incomes, year, month);
            let expense = month_total(expenses, year, month);
            MonthPoint {
                year,
                month,
                income,
                expense,
                savings: month_total(savings, year, month),
                balance: income - expense,
            }
        })
        .collect()
}

fn month_total<E: Entry>(entries: &[E], year: i32, month: u32) -> Amount {
    entries
        .iter()
        .filter(|e| {
            e.date()
                .is_some_and(|d| d.year() == year && d.month() == month)
        })
        .filter_map(|e| e.amount())
        .sum()
}
