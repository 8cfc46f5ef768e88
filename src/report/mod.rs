//! Turns lists of records into the numbers shown in reports.
//!
//! Nothing in here does I/O or modifies its input. Records come from the API with any field
//! possibly missing; an element without the field a computation needs is left out of that
//! computation instead of being counted as zero or failing the whole report.

mod category;
mod evolution;
mod goals;
mod totals;

use crate::model::{Amount, Goal, RecurringExpense, Savings, Transaction};
use chrono::NaiveDate;

pub use category::{group_by_label, Category, Group, KeywordTable, OTHER};
pub use evolution::{monthly_evolution, MonthPoint, Window};
pub use goals::{completion_transitions, goal_progress, percentage, GoalProgress};
pub use totals::{summary, top_n, total, Summary};

/// The fields reports read from a record.
pub trait Entry {
    fn amount(&self) -> Option<Amount>;

    /// The date the entry counts for in a monthly series.
    fn date(&self) -> Option<NaiveDate>;

    /// The text entries are grouped by.
    fn label(&self) -> Option<&str>;
}

impl Entry for Transaction {
    fn amount(&self) -> Option<Amount> {
        self.amount
    }

    fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn label(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Entry for RecurringExpense {
    fn amount(&self) -> Option<Amount> {
        self.amount
    }

    fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    fn label(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A savings fund counts in the month it started.
impl Entry for Savings {
    fn amount(&self) -> Option<Amount> {
        self.amount
    }

    fn date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A goal's amount is what has been put into it so far.
impl Entry for Goal {
    fn amount(&self) -> Option<Amount> {
        self.current_amount
    }

    fn date(&self) -> Option<NaiveDate> {
        None
    }

    fn label(&self) -> Option<&str> {
        self.display_name()
    }
}

impl<E: Entry> Entry for &E {
    fn amount(&self) -> Option<Amount> {
        (*self).amount()
    }

    fn date(&self) -> Option<NaiveDate> {
        (*self).date()
    }

    fn label(&self) -> Option<&str> {
        (*self).label()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::model::{Amount, Transaction};
    use chrono::NaiveDate;
    use std::str::FromStr;

    pub(crate) fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    pub(crate) fn tx(value: Option<&str>, date: Option<(i32, u32, u32)>, description: &str) -> Transaction {
        Transaction {
            id: None,
            amount: value.map(amount),
            date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            description: Some(description.to_string()),
        }
    }
}
