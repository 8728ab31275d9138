//! Deadline and pricing computations of orders.

use std::time::Duration;

use common::{datetime::SECS_PER_DAY, DateTimeOf, Money, Percent};
use rust_decimal::Decimal;

use crate::domain::order::record::{ArrivalDateTime, Kind, ReturnDateTime};

/// Number of days an item is expected to be in transit.
pub const SHIPPING_DAYS: u32 = 3;

/// [`Percent`] of a rent total charged as a transaction fee.
#[expect(unsafe_code, reason = "value within range")]
pub const RENT_FEE: Percent =
    unsafe { Percent::new_unchecked(Decimal::from_parts(3, 0, 0, false, 0)) };

/// [`Percent`] of a purchase price charged as a transaction fee.
#[expect(unsafe_code, reason = "value within range")]
pub const PURCHASE_FEE: Percent =
    unsafe { Percent::new_unchecked(Decimal::from_parts(6, 0, 0, false, 0)) };

/// [`Percent`] of a purchase price held as an insurance for a rented item.
#[expect(unsafe_code, reason = "value within range")]
pub const INSURANCE_HOLD: Percent =
    unsafe { Percent::new_unchecked(Decimal::from_parts(25, 0, 0, false, 0)) };

/// Calculates when a shipped item is expected to arrive.
#[must_use]
pub fn expected_arrival<Of: ?Sized>(now: DateTimeOf<Of>) -> ArrivalDateTime {
    now.coerce().add_days(SHIPPING_DAYS)
}

/// Calculates when a rented item is expected to be returned.
#[must_use]
pub fn expected_return<Of: ?Sized>(
    now: DateTimeOf<Of>,
    rent_days: u32,
) -> ReturnDateTime {
    now.coerce()
        .add_days(SHIPPING_DAYS)
        .add_days(rent_days)
}

/// Calculates the total price of renting for the provided number of days.
///
/// [`None`] is returned on overflow.
#[must_use]
pub fn rent_total(per_day: Money, days: u32) -> Option<Money> {
    per_day.checked_mul(days)
}

/// Calculates the exact transaction fee of an order of the provided [`Kind`].
///
/// The `price` is the order price (already multiplied by days for rents).
///
/// [`None`] is returned on overflow.
#[must_use]
pub fn transaction_fee(kind: Kind, price: Money) -> Option<Money> {
    match kind {
        Kind::Rent => RENT_FEE.of(price),
        Kind::Purchase | Kind::Comment | Kind::Like | Kind::Return => {
            PURCHASE_FEE.of(price)
        }
    }
}

/// Calculates the exact insurance held for renting an item of the provided
/// `purchase_price`.
///
/// [`None`] is returned on overflow.
#[must_use]
pub fn insurance_hold(purchase_price: Money) -> Option<Money> {
    INSURANCE_HOLD.of(purchase_price)
}

/// Price breakdown of an order displayed before requesting it.
///
/// Amounts are exact and may carry fractions of a cent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quote {
    /// [`Kind`] of the quoted order.
    pub kind: Kind,

    /// Price of the item (rent total for rents).
    pub price: Money,

    /// Transaction fee on top of the `price`.
    pub fee: Money,

    /// Insurance held for a rented item.
    pub insurance_hold: Money,

    /// Total amount to be paid.
    pub total: Money,
}

impl Quote {
    /// Quotes a purchase for the provided `price`.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn purchase(price: Money) -> Option<Self> {
        let fee = transaction_fee(Kind::Purchase, price)?;
        Some(Self {
            kind: Kind::Purchase,
            price,
            fee,
            insurance_hold: Money::zero(price.currency()),
            total: (price + fee)?,
        })
    }

    /// Quotes a rent for the provided `rent_total`.
    ///
    /// No insurance is held if `purchase_price` is unknown.
    ///
    /// [`None`] is returned on overflow or currency mismatch.
    #[must_use]
    pub fn rent(rent_total: Money, purchase_price: Option<Money>) -> Option<Self> {
        let fee = transaction_fee(Kind::Rent, rent_total)?;
        let hold = match purchase_price {
            Some(p) => insurance_hold(p)?,
            None => Money::zero(rent_total.currency()),
        };
        Some(Self {
            kind: Kind::Rent,
            price: rent_total,
            fee,
            insurance_hold: hold,
            total: ((rent_total + fee)? + hold)?,
        })
    }
}

/// Time remaining until a deadline, floored to whole seconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Countdown {
    /// Whole days remaining.
    pub days: u64,

    /// Whole hours remaining after `days`.
    pub hours: u8,

    /// Whole minutes remaining after `hours`.
    pub minutes: u8,

    /// Whole seconds remaining after `minutes`.
    pub seconds: u8,
}

impl Countdown {
    /// Interval the [`Countdown`] should be recomputed at while displayed.
    pub const TICK: Duration = Duration::from_secs(1);

    /// Calculates the [`Countdown`] from `now` until the `deadline`.
    ///
    /// Clamps at zero once the `deadline` has passed.
    #[expect(clippy::cast_possible_truncation, reason = "modulo bounded")]
    #[must_use]
    pub fn until<A: ?Sized, B: ?Sized>(
        deadline: DateTimeOf<A>,
        now: DateTimeOf<B>,
    ) -> Self {
        let secs = deadline.saturating_since(now).as_secs();
        Self {
            days: secs / SECS_PER_DAY,
            hours: (secs % SECS_PER_DAY / 3600) as u8,
            minutes: (secs % 3600 / 60) as u8,
            seconds: (secs % 60) as u8,
        }
    }

    /// Indicates whether the deadline has passed.
    #[must_use]
    pub const fn is_overdue(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, DateTime, Money};
    use rust_decimal::Decimal;

    use super::{
        expected_arrival, expected_return, insurance_hold, rent_total,
        transaction_fee, Countdown, Kind, Quote,
    };

    fn usd(cents: i64) -> Money {
        Money::usd_cents(cents).unwrap()
    }

    fn at(s: &str) -> DateTime {
        DateTime::from_rfc3339(s).unwrap()
    }

    #[test]
    fn deadlines() {
        let now = at("2024-05-01T10:00:00Z");

        assert_eq!(
            expected_arrival(now).coerce::<()>(),
            at("2024-05-04T10:00:00Z"),
        );
        assert_eq!(
            expected_return(now, 7).coerce::<()>(),
            at("2024-05-11T10:00:00Z"),
        );
    }

    #[test]
    fn rent_total_is_exact() {
        assert_eq!(rent_total(usd(2000), 5), Some(usd(10_000)));
        assert_eq!(rent_total(usd(1999), 3), Some(usd(5997)));
    }

    #[test]
    fn fees() {
        assert_eq!(transaction_fee(Kind::Rent, usd(10_000)), Some(usd(300)));
        assert_eq!(transaction_fee(Kind::Purchase, usd(10_000)), Some(usd(600)));
        assert_eq!(insurance_hold(usd(8000)), Some(usd(2000)));
    }

    #[test]
    fn fees_are_not_rounded() {
        let exact = |units, scale| {
            Money::new(Decimal::new(units, scale), Currency::Usd).unwrap()
        };

        assert_eq!(transaction_fee(Kind::Purchase, usd(75)), Some(exact(45, 3)));
        assert_eq!(
            transaction_fee(Kind::Purchase, usd(1999)),
            Some(exact(11_994, 4)),
        );
        assert_eq!(transaction_fee(Kind::Rent, usd(50)), Some(exact(15, 3)));
        assert_eq!(insurance_hold(usd(1)), Some(exact(25, 4)));
    }

    #[test]
    fn quotes() {
        let purchase = Quote::purchase(usd(5000)).unwrap();
        assert_eq!(purchase.fee, usd(300));
        assert_eq!(purchase.insurance_hold, usd(0));
        assert_eq!(purchase.total, usd(5300));

        let rent = Quote::rent(usd(10_000), Some(usd(8000))).unwrap();
        assert_eq!(rent.fee, usd(300));
        assert_eq!(rent.insurance_hold, usd(2000));
        assert_eq!(rent.total, usd(12_300));

        let uninsured = Quote::rent(usd(10_000), None).unwrap();
        assert_eq!(uninsured.total, usd(10_300));
    }

    #[test]
    fn overflowing_quotes_are_none() {
        let huge = Money::new(Decimal::MAX, Currency::Usd).unwrap();

        assert_eq!(Quote::purchase(huge), None);
        assert_eq!(Quote::rent(huge, None), None);
        assert_eq!(Quote::rent(usd(100), Some(huge)), None);
    }

    #[test]
    fn countdown_floors_and_clamps() {
        let now = at("2024-05-01T10:00:00Z");

        assert_eq!(
            Countdown::until(at("2024-05-03T13:04:05.900Z"), now),
            Countdown {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5,
            },
        );

        let overdue = Countdown::until(at("2024-04-30T10:00:00Z"), now);
        assert!(overdue.is_overdue());
        assert_eq!(overdue.days, 0);

        assert!(!Countdown::until(at("2024-05-01T10:00:01Z"), now).is_overdue());
    }
}
