//! [`Error`]s returned by the GraphQL API.

use std::fmt;

use axum_extra::typed_header::TypedHeaderRejection;
use derive_more::Error as StdError;
use itertools::Itertools as _;
use juniper::{FieldError, IntoFieldError, Object, Value};
use service::infra::database;
use tracerr::{Trace, Traced};

/// Declares a fieldless error enum along with its conversion into a client
/// facing [`Error`].
///
/// Every variant carries its GraphQL `code`, the HTTP `status` to respond
/// with, and a human-readable `message`.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[status = $status_code:ident]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Client-facing error.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                let status = match err {
                    $( $name::$variant => ::http::StatusCode::$status_code, )*
                };
                let code = match err {
                    $( $name::$variant => $code, )*
                };
                Self::new(code, status, err)
            }
        }
    };
}

/// Error reported to a GraphQL client.
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// Machine-readable code of this [`Error`].
    pub code: Code,

    /// HTTP status to respond with.
    pub status_code: http::StatusCode,

    /// Where this [`Error`] originated, if known.
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// Human-readable description.
    pub message: String,
}

impl Error {
    /// Creates a new [`Error`] without a backtrace.
    #[must_use]
    pub fn new(
        code: Code,
        status_code: http::StatusCode,
        message: impl fmt::Display,
    ) -> Self {
        Self {
            code,
            status_code,
            backtrace: None,
            message: message.to_string(),
        }
    }

    /// Creates a new `INTERNAL_SERVER_ERROR` [`Error`].
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self::new(
            "INTERNAL_SERVER_ERROR",
            http::StatusCode::INTERNAL_SERVER_ERROR,
            msg.to_string(),
        )
    }

    /// Returns the frames of this [`Error`]'s backtrace, if any.
    fn frames(&self) -> impl Iterator<Item = String> + '_ {
        self.backtrace
            .iter()
            .flat_map(|trace| trace.iter())
            .map(ToString::to_string)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.code, self.message)?;
        if self.backtrace.is_some() {
            write!(f, "\n{}", self.frames().join("\n"))?;
        }
        Ok(())
    }
}

impl<S> IntoFieldError<S> for Error
where
    S: From<String>,
{
    fn into_field_error(self) -> FieldError<S> {
        let mut ext = Object::with_capacity(2);
        drop(ext.add_field("code", Value::scalar(self.code.to_owned())));
        drop(ext.add_field(
            "backtrace",
            Value::list(self.frames().map(Value::scalar).collect()),
        ));
        FieldError::new(self.message, Value::object(ext))
    }
}

/// Code of an [`Error`].
pub type Code = &'static str;

/// Conversion of an error into a client-facing [`Error`].
pub trait AsError {
    /// Returns the client-facing [`Error`] for this one.
    ///
    /// [`None`] means this error is internal and mustn't be exposed as is.
    fn try_as_error(&self) -> Option<Error>;

    /// Same as [`AsError::try_as_error()`], but falls back to
    /// [`Error::internal()`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Same as [`AsError::as_error()`], but consumes this error.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for TypedHeaderRejection {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error::new(
            "BAD_REQUEST",
            http::StatusCode::BAD_REQUEST,
            self,
        ))
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

#[cfg(test)]
mod spec {
    use super::{AsError, Error};

    crate::define_error! {
        enum SampleError {
            #[code = "SOLD_OUT"]
            #[status = CONFLICT]
            #[message = "Listing is sold out"]
            SoldOut,
        }
    }

    #[test]
    fn defined_error_carries_code_and_status() {
        let err = Error::from(SampleError::SoldOut);

        assert_eq!(err.code, "SOLD_OUT");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
        assert_eq!(err.message, "Listing is sold out");
        assert_eq!(err.to_string(), "[SOLD_OUT]: Listing is sold out");
    }

    #[test]
    fn internal_errors_are_hidden_behind_fallback() {
        struct Opaque;
        impl std::fmt::Display for Opaque {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("pool exhausted")
            }
        }
        impl AsError for Opaque {
            fn try_as_error(&self) -> Option<Error> {
                None
            }
        }

        let err = Opaque.into_error();

        assert_eq!(err.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(err.status_code, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "pool exhausted");
    }
}
