use crate::model::{Amount, Goal, RecurringExpense, Savings, Transaction};
use crate::report::Entry;
use serde::Serialize;

/// The sum of the amounts that are present.
pub fn total<E: Entry>(entries: &[E]) -> Amount {
    entries.iter().filter_map(|e| e.amount()).sum()
}

/// The `n` largest entries by amount, largest first. Entries with equal amounts keep their order
/// and entries without an amount are left out.
pub fn top_n<E: Entry>(entries: &[E], n: usize) -> Vec<&E> {
    let mut ranked: Vec<(&E, Amount)> = entries
        .iter()
        .filter_map(|e| e.amount().map(|a| (e, a)))
        .collect();
    // sort_by is stable
    ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
    ranked.into_iter().take(n).map(|(e, _)| e).collect()
}

/// The figures on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub income: Amount,
    pub expenses: Amount,
    pub recurring: Amount,
    pub savings: Amount,
    pub goals_saved: Amount,
    /// Income minus variable expenses.
    pub balance: Amount,
}

pub fn summary(
    incomes: &[Transaction],
    expenses: &[Transaction],
    recurring: &[RecurringExpense],
    savings: &[Savings],
    goals: &[Goal],
) -> Summary {
    let income = total(incomes);
    let expenses = total(expenses);
    Summary {
        income,
        expenses,
        recurring: total(recurring),
        savings: total(savings),
        goals_saved: total(goals),
        balance: income - expenses,
    }
}
