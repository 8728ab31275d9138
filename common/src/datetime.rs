//! UTC timestamps with microsecond precision.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{cmp::Ordering, marker::PhantomData, ops, time::Duration};

use derive_more::{Debug, Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

/// Number of seconds in a day.
pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// [`DateTimeOf`] of no particular meaning.
pub type DateTime = DateTimeOf;

/// UTC timestamp, truncated to microseconds as Postgres stores it.
///
/// The `Of` parameter tags what the timestamp means (creation, expected
/// arrival, etc.), so different timestamps can't be mixed up by accident.
/// Use [`DateTimeOf::coerce()`] to retag one explicitly.
#[derive(Debug)]
pub struct DateTimeOf<Of: ?Sized = ()> {
    /// Underlying UTC timestamp.
    inner: OffsetDateTime,

    /// Meaning of this timestamp.
    #[debug(skip)]
    _of: PhantomData<Of>,
}

impl<Of: ?Sized> DateTimeOf<Of> {
    /// Wraps the provided timestamp, normalizing it to UTC microseconds.
    fn wrap(dt: OffsetDateTime) -> Result<Self, time::error::ComponentRange> {
        let inner = dt
            .to_offset(UtcOffset::UTC)
            .replace_microsecond(dt.microsecond())?;
        Ok(Self {
            inner,
            _of: PhantomData,
        })
    }

    /// Returns the current moment.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn now() -> Self {
        // Truncating nanoseconds of a valid timestamp can't go out of range.
        Self::wrap(OffsetDateTime::now_utc()).expect("valid timestamp")
    }

    /// Creates a [`DateTimeOf`] from the number of seconds since the Unix
    /// epoch.
    ///
    /// [`None`] is returned if the `timestamp` is out of range.
    #[must_use]
    pub fn from_unix_timestamp(timestamp: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(timestamp)
            .ok()
            .and_then(|dt| Self::wrap(dt).ok())
    }

    /// Returns the number of seconds since the Unix epoch.
    #[must_use]
    pub fn unix_timestamp(&self) -> i64 {
        self.inner.unix_timestamp()
    }

    /// Parses an [RFC 3339] string.
    ///
    /// # Errors
    ///
    /// If the `input` isn't a valid [RFC 3339] timestamp.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub fn from_rfc3339(input: &str) -> Result<Self, ParseError> {
        let dt = OffsetDateTime::parse(input, &Rfc3339)
            .map_err(ParseError::Parse)?;
        Self::wrap(dt).map_err(ParseError::ComponentRange)
    }

    /// Formats this [`DateTimeOf`] as an [RFC 3339] string.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        // UTC timestamps always fit RFC 3339.
        self.inner.format(&Rfc3339).expect("RFC 3339 formattable")
    }

    /// Returns this [`DateTimeOf`] shifted forward by the provided number of
    /// whole days.
    #[must_use]
    pub fn add_days(self, days: u32) -> Self {
        self + Duration::from_secs(u64::from(days) * SECS_PER_DAY)
    }

    /// Returns the [`Duration`] elapsing from `earlier` till this
    /// [`DateTimeOf`], or [`Duration::ZERO`] if `earlier` is not earlier.
    #[must_use]
    pub fn saturating_since<O: ?Sized>(
        &self,
        earlier: DateTimeOf<O>,
    ) -> Duration {
        Duration::try_from(self.inner - earlier.inner).unwrap_or(Duration::ZERO)
    }

    /// Retags this [`DateTimeOf`] with another meaning.
    #[must_use]
    pub fn coerce<NewOf: ?Sized>(self) -> DateTimeOf<NewOf> {
        DateTimeOf {
            inner: self.inner,
            _of: PhantomData,
        }
    }
}

/// Error of parsing a [`DateTimeOf`] from an [RFC 3339] string.
///
/// [RFC 3339]: https://tools.ietf.org/html/rfc3339
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ParseError {
    /// Input is malformed.
    Parse(time::error::Parse),

    /// Input is well-formed, but some component is out of range.
    ComponentRange(time::error::ComponentRange),
}

// Implemented manually, as deriving would require `Of` to implement them too.
impl<Of: ?Sized> Copy for DateTimeOf<Of> {}
impl<Of: ?Sized> Clone for DateTimeOf<Of> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Of: ?Sized> Eq for DateTimeOf<Of> {}
impl<Of: ?Sized> PartialEq for DateTimeOf<Of> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<Of: ?Sized> Ord for DateTimeOf<Of> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<Of: ?Sized> PartialOrd for DateTimeOf<Of> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Of: ?Sized> ops::Add<Duration> for DateTimeOf<Of> {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self {
            inner: self.inner + rhs,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> ops::Sub<Duration> for DateTimeOf<Of> {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self {
            inner: self.inner - rhs,
            _of: PhantomData,
        }
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> FromSql<'_> for DateTimeOf<Of> {
    accepts!(TIMESTAMPTZ);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(Self::wrap(OffsetDateTime::from_sql(ty, raw)?)?)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> ToSql for DateTimeOf<Of> {
    accepts!(TIMESTAMPTZ);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.inner.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
pub mod serde {
    //! [`serde`] representations of [`DateTimeOf`].

    pub mod unix_timestamp {
        //! [`DateTimeOf`] as the number of seconds since the Unix epoch, as
        //! JWT claims carry it.
        //!
        //! [`DateTimeOf`]: crate::DateTimeOf

        use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

        use crate::DateTimeOf;

        /// Serializes the `dt` as a Unix timestamp.
        ///
        /// # Errors
        ///
        /// If the `serializer` fails.
        pub fn serialize<Of, S>(
            dt: &DateTimeOf<Of>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            Of: ?Sized,
            S: Serializer,
        {
            serializer.serialize_i64(dt.unix_timestamp())
        }

        /// Deserializes a [`DateTimeOf`] from a Unix timestamp.
        ///
        /// # Errors
        ///
        /// If the input isn't an integer, or is out of range.
        pub fn deserialize<'de, Of, D>(
            deserializer: D,
        ) -> Result<DateTimeOf<Of>, D::Error>
        where
            Of: ?Sized,
            D: Deserializer<'de>,
        {
            let secs = i64::deserialize(deserializer)?;
            DateTimeOf::from_unix_timestamp(secs).ok_or_else(|| {
                D::Error::custom(format!("timestamp {secs} is out of range"))
            })
        }
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! [`juniper`] scalar of [`DateTime`].

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// UTC timestamp in [RFC 3339] format with microsecond precision.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    #[graphql_scalar(with = Self, parse_token(String))]
    type DateTime = crate::DateTime;

    impl DateTime {
        fn to_output<S: ScalarValue>(dt: &DateTime) -> Value<S> {
            Value::scalar(dt.to_rfc3339())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            let s = input.as_string_value().ok_or_else(|| {
                format!("Invalid `DateTime` value: expected string, found {input}")
            })?;
            Self::from_rfc3339(s)
                .map_err(|e| format!("Invalid `DateTime` value \"{s}\": {e}"))
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{DateTime, SECS_PER_DAY};

    #[test]
    fn adds_whole_days() {
        let now = DateTime::from_rfc3339("2024-03-01T12:00:00Z").unwrap();

        assert_eq!(
            now.add_days(3),
            DateTime::from_rfc3339("2024-03-04T12:00:00Z").unwrap(),
        );
        assert_eq!(now.add_days(0), now);
    }

    #[test]
    fn subtracts_durations() {
        let now = DateTime::from_rfc3339("2024-03-01T12:00:00Z").unwrap();

        assert_eq!(
            now - Duration::from_secs(90),
            DateTime::from_rfc3339("2024-03-01T11:58:30Z").unwrap(),
        );
        assert_eq!(now.add_days(2) - Duration::from_secs(2 * SECS_PER_DAY), now);
    }

    #[test]
    fn saturates_negative_spans() {
        let now = DateTime::from_rfc3339("2024-03-01T12:00:00Z").unwrap();
        let later = now.add_days(1);

        assert_eq!(
            later.saturating_since(now),
            Duration::from_secs(SECS_PER_DAY),
        );
        assert_eq!(now.saturating_since(later), Duration::ZERO);
    }

    #[test]
    fn rfc3339_keeps_microseconds() {
        let dt =
            DateTime::from_rfc3339("2024-03-01T12:00:00.123456789Z").unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:00:00.123456Z");
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        let dt = DateTime::from_rfc3339("2024-03-01T15:00:00+03:00").unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:00:00Z");
    }

    #[test]
    fn unix_timestamp_round_trips() {
        let dt = DateTime::from_unix_timestamp(1_709_294_400).unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:00:00Z");
        assert_eq!(dt.unix_timestamp(), 1_709_294_400);
    }
}
