//! [`Money`]-related definitions.

use std::{fmt, ops, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::define_kind;

/// Non-negative amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    amount: Decimal,

    /// [`Currency`] of this amount.
    currency: Currency,
}

impl Money {
    /// Creates a new [`Money`] if the provided `amount` is non-negative.
    #[must_use]
    pub fn new(amount: Decimal, currency: Currency) -> Option<Self> {
        (amount >= Decimal::ZERO).then_some(Self {
            amount: amount.normalize(),
            currency,
        })
    }

    /// Creates a zero [`Money`] in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Creates a [`Money`] of US dollars from the provided number of cents.
    ///
    /// [`None`] is returned if `cents` is negative.
    #[must_use]
    pub fn usd_cents(cents: i64) -> Option<Self> {
        Self::new(Decimal::new(cents, 2), Currency::Usd)
    }

    /// Returns the amount of this [`Money`].
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the [`Currency`] of this [`Money`].
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Multiplies this [`Money`] by the provided `times`.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_mul(self, times: u32) -> Option<Self> {
        Some(Self {
            amount: self.amount.checked_mul(times.into())?.normalize(),
            currency: self.currency,
        })
    }

    /// Adds the `other` [`Money`] to this one.
    ///
    /// [`None`] is returned if the currencies differ or on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency == other.currency).then_some(())?;
        Some(Self {
            amount: self.amount.checked_add(other.amount)?.normalize(),
            currency: self.currency,
        })
    }

    /// Scales this [`Money`] by the provided non-negative `ratio` exactly,
    /// keeping any sub-cent digits.
    ///
    /// [`None`] is returned if the `ratio` is negative or on overflow.
    #[must_use]
    pub fn checked_scale(self, ratio: Decimal) -> Option<Self> {
        if ratio < Decimal::ZERO {
            return None;
        }
        Some(Self {
            amount: self.amount.checked_mul(ratio)?.normalize(),
            currency: self.currency,
        })
    }

    /// Rounds this [`Money`] to whole cents, with half a cent rounded away
    /// from zero.
    #[must_use]
    pub fn round_to_cents(self) -> Self {
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
            currency: self.currency,
        }
    }
}

impl ops::Add for Money {
    type Output = Option<Self>;

    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(rhs)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        write!(f, "{}{currency}", amount.normalize())
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 || !s.is_char_boundary(s.len() - 3) {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Self::new(amount, currency).ok_or("negative amount")
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    use super::Money;

    impl Serialize for Money {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Money {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let s = String::deserialize(d)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Non-negative money in `{major}.{minor}{currency}` format, where:
    /// - `major` is an integer;
    /// - `minor` is an optional integer;
    /// - `currency` is a three-letter currency code.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Money = super::Money;

    impl Money {
        fn to_output<S: ScalarValue>(m: &Money) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Money` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Money` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn usd(s: &str) -> Money {
        Money::new(s.parse::<Decimal>().unwrap(), Currency::Usd).unwrap()
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::new(Decimal::NEGATIVE_ONE, Currency::Usd).is_none());
        assert!(Money::from_str("-1USD").is_err());
        assert_eq!(Money::new(Decimal::ZERO, Currency::Usd).unwrap(), Money::zero(Currency::Usd));
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("123.45USD").unwrap(), usd("123.45"));
        assert_eq!(Money::from_str("123USD").unwrap(), usd("123.00"));

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45EUR").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("USD").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(usd("123.45").to_string(), "123.45USD");
        assert_eq!(usd("123.00").to_string(), "123USD");
        assert_eq!(usd("100.0").to_string(), "100USD");
        assert_eq!(Money::usd_cents(2050).unwrap().to_string(), "20.5USD");
    }

    #[test]
    fn multiplies_exactly() {
        assert_eq!(usd("20").checked_mul(5).unwrap(), usd("100"));
        assert_eq!(usd("19.99").checked_mul(3).unwrap(), usd("59.97"));
        assert_eq!(usd("19.99").checked_mul(0).unwrap(), usd("0"));
    }

    #[test]
    fn adds_same_currency() {
        assert_eq!((usd("1.50") + usd("2.25")).unwrap(), usd("3.75"));
    }

    #[test]
    fn scales_exactly() {
        let ratio = Decimal::new(3, 2);
        assert_eq!(usd("100").checked_scale(ratio).unwrap(), usd("3"));
        assert_eq!(usd("33.33").checked_scale(ratio).unwrap(), usd("0.9999"));
        assert_eq!(
            usd("0.75").checked_scale(Decimal::new(6, 2)).unwrap(),
            usd("0.045"),
        );
        assert!(usd("1").checked_scale(Decimal::NEGATIVE_ONE).is_none());
        assert!(Money::new(Decimal::MAX, Currency::Usd)
            .unwrap()
            .checked_scale(Decimal::TWO)
            .is_none());
    }

    #[test]
    fn rounds_half_cents_away_from_zero() {
        assert_eq!(usd("0.045").round_to_cents(), usd("0.05"));
        assert_eq!(usd("0.0025").round_to_cents(), usd("0"));
        assert_eq!(usd("1.1994").round_to_cents(), usd("1.2"));
        assert_eq!(usd("0.125").round_to_cents(), usd("0.13"));
    }
}
