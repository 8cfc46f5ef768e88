//! Records as returned by the finance API.
//!
//! Every field is optional because nothing about the server's response is guaranteed locally. See
//! `lenient` for how individual fields are read.

use crate::error::{ClientError, Res};
use crate::model::{lenient, Amount};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Common behavior of the records held by the API.
pub trait Record {
    /// The server-assigned id, absent before the record has been created.
    fn id(&self) -> Option<u64>;

    /// A single line describing the record for display.
    fn summary(&self) -> String;

    /// The id of a persisted record. Updating or deleting a record that was never saved is a
    /// caller error.
    fn require_id(&self) -> Res<u64> {
        self.id()
            .ok_or_else(|| ClientError::validation("the record has not been saved yet"))
    }
}

/// An income or a variable expense. Both share the same shape on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Amount>,
    #[serde(
        default,
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl Record for Transaction {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn summary(&self) -> String {
        format!(
            "{:>6}  {:<10}  {:>12}  {}",
            show_id(self.id),
            show_date(self.date),
            show_amount(self.amount),
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// An expense that repeats with a frequency instead of belonging to one date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringExpense {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Amount>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Id of a `Frequency`.
    #[serde(
        default,
        deserialize_with = "lenient::reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<u64>,
    /// Some deployments also record when the expense started.
    #[serde(
        default,
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
}

impl Record for RecurringExpense {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn summary(&self) -> String {
        format!(
            "{:>6}  {:>12}  freq {:<4}  {}",
            show_id(self.id),
            show_amount(self.amount),
            self.frequency.map(|f| f.to_string()).unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// A savings fund. `amount` is cumulative and only grows through deposits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Savings {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Amount>,
    #[serde(
        default,
        alias = "startDate",
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        alias = "endDate",
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl Record for Savings {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn summary(&self) -> String {
        format!(
            "{:>6}  {:<10} → {:<10}  {:>12}  {}",
            show_id(self.id),
            show_date(self.start_date),
            show_date(self.end_date),
            show_amount(self.amount),
            self.name.as_deref().unwrap_or_default()
        )
    }
}

/// A financial goal: a target amount and how much has been put towards it so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        alias = "targetAmount",
        deserialize_with = "lenient::amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_amount: Option<Amount>,
    #[serde(
        default,
        alias = "currentAmount",
        deserialize_with = "lenient::amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_amount: Option<Amount>,
    #[serde(
        default,
        deserialize_with = "lenient::reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub frequency: Option<u64>,
}

impl Goal {
    /// Name and description are treated as one display string: the name when present, otherwise
    /// the description.
    pub fn display_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// True when the current amount has reached the target.
    pub fn is_completed(&self) -> bool {
        match (self.current_amount, self.target_amount) {
            (Some(current), Some(target)) => current.value() >= target.value(),
            _ => false,
        }
    }
}

impl Record for Goal {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn summary(&self) -> String {
        format!(
            "{:>6}  {:>12} / {:<12}  {}",
            show_id(self.id),
            show_amount(self.current_amount),
            show_amount(self.target_amount),
            self.display_name().unwrap_or_default()
        )
    }
}

/// A value from the closed reference set of frequencies, e.g. "Mensual".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    #[serde(default, deserialize_with = "lenient::id")]
    pub id: Option<u64>,
    #[serde(
        default,
        alias = "nombre",
        alias = "name",
        alias = "frecuencia",
        deserialize_with = "lenient::text"
    )]
    pub label: Option<String>,
}

impl Record for Frequency {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn summary(&self) -> String {
        format!(
            "{:>6}  {}",
            show_id(self.id),
            self.label.as_deref().unwrap_or_default()
        )
    }
}

fn show_id(id: Option<u64>) -> String {
    id.map(|id| format!("#{id}")).unwrap_or_else(|| "-".into())
}

fn show_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "?".into())
}

fn show_amount(amount: Option<Amount>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_else(|| "?".into())
}
