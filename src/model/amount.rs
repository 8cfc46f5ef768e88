//! Amount type for handling monetary values exchanged with the finance API.
//!
//! The API is not consistent about how it sends money: decimal fields usually arrive as strings
//! (`"1250.00"`) but hand-entered or older records may arrive as JSON numbers. `Amount` accepts
//! both, and also tolerates a leading currency sign and thousands separators when parsing text typed
//! by a user.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// Represents an amount of money.
///
/// Serializes as a plain decimal string, which is what the API expects for decimal fields.
///
/// # Examples
///
/// ```
/// # use finanzas::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "1,250.50");
/// assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1250.5\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// `None` when the sum does not fit in a `Decimal`.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// `None` when the difference does not fit in a `Decimal`.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        // Remove a currency sign if present, keeping the minus in front
        let without_sign = if let Some(after_minus) = trimmed.strip_prefix('-') {
            match after_minus.strip_prefix(['$', '€']) {
                Some(rest) => format!("-{rest}"),
                None => trimmed.to_string(),
            }
        } else {
            trimmed.trim_start_matches(['$', '€']).to_string()
        };

        // Remove commas (thousand separators)
        let plain = without_sign.replace(',', "");

        let value = Decimal::from_str(&plain)
            .or_else(|_| Decimal::from_scientific(&plain))
            .map_err(AmountError)?;
        Ok(Amount(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rounded = self
            .0
            .abs()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let sign = if self.is_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let plain = format!("{rounded:.2}");
        let (whole, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
        f.pad(&format!("{sign}{}.{cents}", group_thousands(whole)))
    }
}

/// `1234567` becomes `1,234,567`.
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Amount::try_from(&value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&serde_json::Value> for Amount {
    type Error = String;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            // Going through the textual form avoids binary float artifacts such as 0.1 + 0.2
            serde_json::Value::Number(n) => {
                Amount::from_str(&n.to_string()).map_err(|e| e.to_string())
            }
            serde_json::Value::String(s) if !s.trim().is_empty() => {
                Amount::from_str(s).map_err(|e| e.to_string())
            }
            other => Err(format!("expected an amount, found {other}")),
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

/// Arithmetic on amounts saturates at the bounds of `Decimal` instead of panicking, so that sums
/// over whatever the server returned always produce a number. Use `checked_add` where an
/// out-of-range result has to be reported.
impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}
