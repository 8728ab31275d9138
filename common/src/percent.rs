//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;

use crate::Money;

/// Floating-point percentage in the `[0; 100]` range.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[display("{_0}%")]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Percent(Decimal);

impl Percent {
    /// Creates a new [`Percent`] by checking the provided value is not less
    /// than `0` and not greater than `100`.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        if val < Decimal::ZERO || val > Decimal::ONE_HUNDRED {
            None
        } else {
            #[expect(
                clippy::allow_attributes,
                reason = "`#[expect]` is not fulfilled inside expression"
            )]
            #[allow(unsafe_code, reason = "invariants checked already")]
            Some(unsafe { Self::new_unchecked(val) })
        }
    }

    /// Creates a new [`Percent`] without performing any validation.
    ///
    /// # Safety
    ///
    /// The provided value must be in the `[0; 100]` range.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(val: Decimal) -> Self {
        Self(val)
    }

    /// Creates a new [`Percent`] out of the provided whole number.
    #[must_use]
    pub fn whole(val: u8) -> Option<Self> {
        Self::new(val.into())
    }

    /// Returns this [`Percent`] as a ratio in the `[0; 1]` range.
    #[must_use]
    pub fn ratio(self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// Calculates this [`Percent`] of the provided [`Money`] exactly.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn of(self, money: Money) -> Option<Money> {
        money.checked_scale(self.ratio())
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim_end_matches('%'))
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use std::str::FromStr as _;

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Floating-point percentage.
    #[graphql_scalar(with = Self, parse_token(String))]
    type Percent = super::Percent;

    impl Percent {
        fn to_output<S: ScalarValue>(m: &Percent) -> Value<S> {
            Value::scalar(m.to_string())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `Percent` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_str(s).map_err(|e| {
                        format!("Cannot parse `Percent` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Money, Percent};
    use crate::money::Currency;

    #[test]
    fn bounds() {
        assert!(Percent::whole(0).is_some());
        assert!(Percent::whole(100).is_some());
        assert!(Percent::whole(101).is_none());
        assert!(Percent::from_str("-1").is_err());
        assert_eq!(Percent::from_str("25%").unwrap(), Percent::whole(25).unwrap());
    }

    #[test]
    fn of_money() {
        let price = Money::usd_cents(10_000).unwrap();

        assert_eq!(
            Percent::whole(3).unwrap().of(price),
            Money::usd_cents(300),
        );
        assert_eq!(
            Percent::whole(25).unwrap().of(price),
            Money::usd_cents(2500),
        );
        assert_eq!(
            Percent::whole(6).unwrap().of(Money::usd_cents(1999).unwrap()),
            Money::new(Decimal::new(11_994, 4), Currency::Usd),
        );
    }

    #[test]
    fn of_keeps_sub_cent_digits() {
        let huge = Money::new(Decimal::MAX, Currency::Usd).unwrap();

        assert_eq!(Percent::whole(100).unwrap().of(huge), Some(huge));
        assert_eq!(
            Percent::whole(25).unwrap().of(Money::usd_cents(1).unwrap()),
            Money::new(Decimal::new(25, 4), Currency::Usd),
        );
    }
}
