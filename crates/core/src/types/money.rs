//! Rupiah amounts with decimal arithmetic.
//!
//! Prices are stored as `numeric(12,2)` and displayed the Indonesian way:
//! `.` groups thousands and `,` separates the (rare) fractional part.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount cannot be empty")]
    Empty,
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount may have at most two decimal places")]
    TooPrecise,
    #[error("'{0}' is not a valid amount")]
    Invalid(String),
}

/// A non-negative amount of Rupiah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero and
    /// [`MoneyError::TooPrecise`] for more than two decimal places.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        Ok(Self(amount))
    }

    /// Whole Rupiah.
    #[must_use]
    pub fn rupiah(amount: u32) -> Self {
        Self(Decimal::from(amount))
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Render as `Rp 25.000` (or `Rp 25.000,50` when there are cents).
    #[must_use]
    pub fn format(&self) -> String {
        let cents = (self.0.round_dp(2) * Decimal::ONE_HUNDRED)
            .trunc()
            .to_u128()
            .unwrap_or_default();
        let whole = cents / 100;
        let frac = cents % 100;

        let digits = whole.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }

        if frac == 0 {
            format!("Rp {grouped}")
        } else {
            format!("Rp {grouped},{frac:02}")
        }
    }

    /// Parse admin or seed input such as `25000`, `25.000`, `Rp 25.000,50`
    /// or `25000.5`.
    ///
    /// A `.` followed only by three-digit groups is a thousands separator;
    /// any other single `.` is a decimal point. A `,` is always decimal.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the text is empty, malformed, negative or
    /// has more than two decimal places.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let mut s = input.trim();
        for prefix in ["Rp.", "Rp", "rp.", "rp", "IDR", "idr"] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest;
                break;
            }
        }
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(MoneyError::Empty);
        }
        if compact.starts_with('-') {
            return Err(MoneyError::Negative);
        }

        let canonical = if let Some((whole, frac)) = compact.rsplit_once(',') {
            if whole.contains(',') || !is_grouped(whole) {
                return Err(MoneyError::Invalid(input.to_owned()));
            }
            format!("{}.{frac}", whole.replace('.', ""))
        } else if compact.contains('.') {
            let groups: Vec<&str> = compact.split('.').collect();
            let thousands = groups
                .iter()
                .skip(1)
                .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
            if thousands {
                groups.concat()
            } else if groups.len() == 2 {
                compact.clone()
            } else {
                return Err(MoneyError::Invalid(input.to_owned()));
            }
        } else {
            compact.clone()
        };

        if !canonical.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(MoneyError::Invalid(input.to_owned()));
        }
        let amount =
            Decimal::from_str(&canonical).map_err(|_| MoneyError::Invalid(input.to_owned()))?;
        Self::new(amount)
    }
}

/// `true` if the integer part is plain digits or correctly dot-grouped.
fn is_grouped(whole: &str) -> bool {
    if whole.is_empty() {
        return false;
    }
    let mut groups = whole.split('.');
    let first_ok = groups
        .next()
        .is_some_and(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));
    first_ok && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Columns carry CHECK (>= 0) constraints.
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(Money::rupiah(0).format(), "Rp 0");
        assert_eq!(Money::rupiah(500).format(), "Rp 500");
        assert_eq!(Money::rupiah(25_000).format(), "Rp 25.000");
        assert_eq!(Money::rupiah(1_250_000).format(), "Rp 1.250.000");
        assert_eq!(Money::new(dec("25000.5")).unwrap().format(), "Rp 25.000,50");
    }

    #[test]
    fn test_parse_accepts_display_and_plain_forms() {
        assert_eq!(Money::parse("25000").unwrap(), Money::rupiah(25_000));
        assert_eq!(Money::parse("25.000").unwrap(), Money::rupiah(25_000));
        assert_eq!(Money::parse("Rp 25.000").unwrap(), Money::rupiah(25_000));
        assert_eq!(Money::parse("Rp1.250.000").unwrap(), Money::rupiah(1_250_000));
        assert_eq!(Money::parse("IDR 18000").unwrap(), Money::rupiah(18_000));
        assert_eq!(Money::parse("25000.5").unwrap().amount(), dec("25000.5"));
        assert_eq!(Money::parse("25.000,50").unwrap().amount(), dec("25000.50"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(Money::parse("  "), Err(MoneyError::Empty));
        assert_eq!(Money::parse("Rp "), Err(MoneyError::Empty));
        assert_eq!(Money::parse("-5000"), Err(MoneyError::Negative));
        assert_eq!(Money::parse("1.5.0"), Err(MoneyError::Invalid("1.5.0".into())));
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Invalid(_))));
        assert!(matches!(Money::parse("25.00,5"), Err(MoneyError::Invalid(_))));
        assert_eq!(Money::parse("10.125"), Ok(Money::rupiah(10_125)));
        assert_eq!(Money::parse("10,125"), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn test_format_then_parse_returns_same_amount() {
        for amount in ["0", "750", "18000", "1250000", "25000.5", "99999.99"] {
            let money = Money::new(dec(amount)).unwrap();
            assert_eq!(Money::parse(&money.format()).unwrap(), money, "{amount}");
        }
    }

    #[test]
    fn test_arithmetic() {
        let unit = Money::rupiah(22_000) + Money::rupiah(3_000);
        assert_eq!(unit * 3, Money::rupiah(75_000));
        let total: Money = [Money::rupiah(1), Money::rupiah(2)].iter().sum();
        assert_eq!(total, Money::rupiah(3));
    }
}
