//! [`Handler`] abstraction.
//!
//! Every layer of the marketplace speaks through this single trait: commands
//! and queries of the service, operations of a database and deliveries of a
//! notifier are all [`Handler`]s parametrized by the argument they accept.

use std::future::Future;

/// Asynchronous handler of `Args`.
pub trait Handler<Args = ()> {
    /// Successful outcome of handling `Args`.
    type Ok;

    /// Error of handling `Args`.
    type Err;

    /// Handles the provided `args`.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
