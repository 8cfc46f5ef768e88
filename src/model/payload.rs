//! Bodies sent to the API when creating or replacing records.
//!
//! Unlike the records in `records`, every required field is present by construction. `validate`
//! covers what the type system cannot: empty strings, negative amounts, inconsistent dates, and a
//! goal whose current amount is over its target.

use crate::error::{ClientError, Res};
use crate::model::{Amount, Goal, Savings};
use chrono::{Months, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A body for `create` and `update`.
pub trait Payload: Serialize + DeserializeOwned + Debug + Clone + Send + Sync {
    /// Basic required-field checks run before anything is submitted.
    fn validate(&self) -> Res<()>;

    /// Fill in values the client defaults on creation. Updates are sent as given.
    fn for_create(self) -> Self {
        self
    }
}

/// Income and variable expense body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Amount,
    pub date: NaiveDate,
    pub description: String,
}

impl Payload for NewTransaction {
    fn validate(&self) -> Res<()> {
        require_text("description", &self.description)?;
        require_non_negative("amount", self.amount)
    }
}

/// Recurring expense body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecurringExpense {
    pub amount: Amount,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
}

impl Payload for NewRecurringExpense {
    fn validate(&self) -> Res<()> {
        require_text("description", &self.description)?;
        require_non_negative("amount", self.amount)
    }
}

/// Savings fund body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSavings {
    pub name: String,
    pub amount: Amount,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Payload for NewSavings {
    fn validate(&self) -> Res<()> {
        require_text("name", &self.name)?;
        require_non_negative("amount", self.amount)?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ClientError::validation(format!(
                    "end date {end} is before start date {}",
                    self.start_date
                )));
            }
        }
        Ok(())
    }

    /// A fund created without an end date runs for one year from its start.
    fn for_create(mut self) -> Self {
        if self.end_date.is_none() {
            self.end_date = self.start_date.checked_add_months(Months::new(12));
        }
        self
    }
}

impl TryFrom<&Savings> for NewSavings {
    type Error = ClientError;

    fn try_from(s: &Savings) -> Res<Self> {
        Ok(Self {
            name: s.name.clone().ok_or_else(|| incomplete("savings", "name"))?,
            amount: s.amount.ok_or_else(|| incomplete("savings", "amount"))?,
            start_date: s
                .start_date
                .ok_or_else(|| incomplete("savings", "start date"))?,
            end_date: s.end_date,
            description: s.description.clone(),
        })
    }
}

/// Goal body. The API has both a name and a description; they are sent as the same display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub description: String,
    pub target_amount: Amount,
    pub current_amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
}

impl NewGoal {
    pub fn new(
        name: impl Into<String>,
        target_amount: Amount,
        current_amount: Amount,
        frequency: Option<u64>,
    ) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            target_amount,
            current_amount,
            frequency,
        }
    }
}

impl Payload for NewGoal {
    fn validate(&self) -> Res<()> {
        require_text("name", &self.name)?;
        require_non_negative("current amount", self.current_amount)?;
        if self.target_amount.value() <= rust_decimal::Decimal::ZERO {
            return Err(ClientError::validation("target amount must be greater than zero"));
        }
        if self.current_amount > self.target_amount {
            return Err(ClientError::validation(format!(
                "current amount {} exceeds the target of {}",
                self.current_amount, self.target_amount
            )));
        }
        Ok(())
    }
}

impl TryFrom<&Goal> for NewGoal {
    type Error = ClientError;

    fn try_from(g: &Goal) -> Res<Self> {
        Ok(NewGoal::new(
            g.display_name().ok_or_else(|| incomplete("goal", "name"))?,
            g.target_amount
                .ok_or_else(|| incomplete("goal", "target amount"))?,
            g.current_amount.unwrap_or(Amount::ZERO),
            g.frequency,
        ))
    }
}

fn require_text(field: &str, value: &str) -> Res<()> {
    if value.trim().is_empty() {
        return Err(ClientError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Amount) -> Res<()> {
    if value.is_negative() {
        return Err(ClientError::validation(format!(
            "{field} cannot be negative"
        )));
    }
    Ok(())
}

fn incomplete(kind: &str, field: &str) -> ClientError {
    ClientError::validation(format!("the {kind} record from the server has no {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_transaction_requires_description() {
        let t = NewTransaction {
            amount: amount("10"),
            date: date(2025, 1, 1),
            description: "   ".into(),
        };
        assert_eq!(
            t.validate(),
            Err(ClientError::validation("description is required"))
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        let t = NewRecurringExpense {
            amount: amount("-5"),
            description: "Gimnasio".into(),
            frequency: Some(1),
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_savings_defaults_end_date_on_create() {
        let s = NewSavings {
            name: "Colchón".into(),
            amount: amount("100"),
            start_date: date(2024, 2, 29),
            end_date: None,
            description: None,
        }
        .for_create();
        assert_eq!(s.end_date, Some(date(2025, 2, 28)));
    }

    #[test]
    fn test_savings_keeps_explicit_end_date() {
        let s = NewSavings {
            name: "Colchón".into(),
            amount: amount("100"),
            start_date: date(2025, 1, 1),
            end_date: Some(date(2025, 6, 1)),
            description: None,
        }
        .for_create();
        assert_eq!(s.end_date, Some(date(2025, 6, 1)));
    }

    #[test]
    fn test_savings_end_before_start() {
        let s = NewSavings {
            name: "Colchón".into(),
            amount: amount("100"),
            start_date: date(2025, 6, 1),
            end_date: Some(date(2025, 1, 1)),
            description: None,
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_goal_current_over_target_rejected() {
        let g = NewGoal::new("Moto", amount("500"), amount("500.01"), None);
        assert!(matches!(g.validate(), Err(ClientError::ValidationFailed(_))));

        let ok = NewGoal::new("Moto", amount("500"), amount("500"), None);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_goal_zero_target_rejected() {
        let g = NewGoal::new("Nada", amount("0"), amount("0"), None);
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_goal_name_and_description_match() {
        let g = NewGoal::new("Entrada piso", amount("20000"), Amount::ZERO, Some(2));
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["name"], "Entrada piso");
        assert_eq!(json["description"], "Entrada piso");
        assert_eq!(json["frequency"], 2);
    }

    #[test]
    fn test_goal_from_record_uses_display_name() {
        let record = Goal {
            id: Some(3),
            name: None,
            description: Some("Viaje".into()),
            target_amount: Some(amount("900")),
            current_amount: None,
            frequency: None,
        };
        let payload = NewGoal::try_from(&record).unwrap();
        assert_eq!(payload.name, "Viaje");
        assert_eq!(payload.current_amount, Amount::ZERO);
    }
}
