//! [`Database`] backed by Postgres.

pub mod client;
pub mod connection;
mod impls;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio_postgres::NoTls;
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::{
    client::{NonTx, Tx},
    connection::Connection,
};

pub use deadpool_postgres::{Config, PoolConfig};

/// Postgres-backed [`Database`], either plain ([`NonTx`]) or inside a
/// transaction ([`Tx`]).
#[derive(Clone, Copy, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

impl Postgres {
    /// Sets up a connection pool described by the provided [`Config`].
    ///
    /// No connection is opened until the first statement runs.
    ///
    /// # Errors
    ///
    /// If the [`Config`] doesn't describe a valid pool.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx::from_pool(pool)))
    }
}

/// Failure of talking to Postgres.
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Statement or transaction failed.
    #[display("Postgres statement failed: {_0}")]
    Connection(connection::Error),

    /// [`Config`] is invalid.
    #[display("Cannot set up Postgres pool: {_0}")]
    PoolCreationError(connection::PoolCreationError),

    /// No connection could be taken from the pool.
    #[display("Cannot get Postgres connection: {_0}")]
    PoolError(connection::PoolError),
}
