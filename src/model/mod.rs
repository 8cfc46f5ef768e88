//! Types that represent the data exchanged with the finance API, such as `Transaction` and `Goal`.
mod amount;
pub(crate) mod lenient;
mod payload;
mod records;
mod user;

pub use amount::{Amount, AmountError};
pub use payload::{NewGoal, NewRecurringExpense, NewSavings, NewTransaction, Payload};
pub use records::{Frequency, Goal, Record, RecurringExpense, Savings, Transaction};
pub use user::User;
