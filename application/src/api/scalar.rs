//! Custom GraphQL scalars backed by domain types.

use std::{fmt, marker::PhantomData, str::FromStr};

use juniper::{
    GraphQLType, InputValue, ParseScalarResult, ParseScalarValue, ScalarToken,
    ScalarValue, Value,
};

/// Adapter for `#[graphql(with = ..)]`, representing a GraphQL scalar as a
/// string via the [`FromStr`] and [`Display`] impls of the `Domain` type.
///
/// The scalar type wraps the `Domain` one, so it must implement
/// [`AsRef`]`<Domain>` and [`TryFrom`]`<Domain>`.
///
/// [`Display`]: fmt::Display
#[derive(Debug)]
pub struct Via<Domain>(PhantomData<Domain>);

impl<Domain> Via<Domain> {
    /// Renders the scalar as a string.
    pub fn to_output<T, S>(value: &T) -> Value<S>
    where
        Domain: fmt::Display,
        T: AsRef<Domain>,
        S: ScalarValue,
    {
        Value::scalar(value.as_ref().to_string())
    }

    /// Parses the scalar from a string input.
    ///
    /// # Errors
    ///
    /// If the input isn't a string, or the `Domain` type rejects it.
    pub fn from_input<T, S>(input: &InputValue<S>) -> Result<T, String>
    where
        Domain: FromStr,
        Domain::Err: fmt::Display,
        T: TryFrom<Domain> + GraphQLType<S, TypeInfo = ()>,
        T::Error: fmt::Display,
        S: ScalarValue,
    {
        let invalid = |reason: &dyn fmt::Display| {
            let name = T::name(&()).unwrap_or("scalar");
            format!("Invalid `{name}` value: {reason}")
        };

        let raw = input
            .as_string_value()
            .ok_or_else(|| invalid(&format_args!("expected string, found {input}")))?;
        let parsed = raw
            .parse::<Domain>()
            .map_err(|e| invalid(&format_args!("\"{raw}\" is rejected: {e}")))?;
        T::try_from(parsed).map_err(|e| invalid(&e))
    }

    /// Parses a literal of the scalar from a GraphQL document.
    ///
    /// # Errors
    ///
    /// If the literal isn't a string.
    pub fn parse_token<S: ScalarValue>(
        token: ScalarToken<'_>,
    ) -> ParseScalarResult<S> {
        <String as ParseScalarValue<S>>::from_str(token)
    }
}

#[cfg(test)]
mod spec {
    use juniper::{DefaultScalarValue, InputValue};

    use crate::api::user::Name;

    use super::Via;

    type Scalar = DefaultScalarValue;

    #[test]
    fn parses_valid_string() {
        let input = InputValue::<Scalar>::scalar("Jane Doe".to_owned());

        let name: Name =
            Via::<service::domain::user::Name>::from_input(&input).unwrap();

        assert_eq!(name.as_ref().to_string(), "Jane Doe");
    }

    #[test]
    fn rejects_non_string_input() {
        let input = InputValue::<Scalar>::scalar(42);

        let err = Via::<service::domain::user::Name>::from_input::<Name, _>(
            &input,
        )
        .unwrap_err();

        assert!(err.starts_with("Invalid `UserName` value"), "{err}");
    }
}
