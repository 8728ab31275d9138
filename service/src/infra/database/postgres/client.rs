//! Postgres clients acquiring their pooled connection on first use.

use std::{future::Future, sync::Arc};

use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tokio_postgres::{types::ToSql, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{self, connection, Connection},
};

/// Connection slot filled on first use and shared between clones of a client.
#[derive(Debug)]
struct Slot<C>(RwLock<Option<C>>);

impl<C> Slot<C> {
    /// Creates an unfilled [`Slot`].
    fn empty() -> Self {
        Self(RwLock::new(None))
    }

    /// Returns the connection in this [`Slot`], filling it with the `init`
    /// result if it's empty.
    async fn get_or_try_init<F>(
        &self,
        init: F,
    ) -> Result<RwLockReadGuard<'_, C>, Traced<database::Error>>
    where
        F: Future<Output = Result<C, Traced<database::Error>>>,
    {
        let filled = self.0.read().await;
        let guard = if filled.is_some() {
            filled
        } else {
            drop(filled);
            let mut slot = self.0.write().await;
            if slot.is_none() {
                *slot = Some(init.await.map_err(tracerr::wrap!())?);
            }
            slot.downgrade()
        };
        Ok(RwLockReadGuard::map(guard, |c| {
            c.as_ref().expect("slot is filled while guard is held")
        }))
    }

    /// Empties this [`Slot`], so the next use acquires a fresh connection.
    async fn take(&self) -> Option<C> {
        self.0.write().await.take()
    }
}

/// Takes a fresh connection out of the `pool`.
async fn acquire(
    pool: &connection::Pool,
) -> Result<connection::NonTx, Traced<database::Error>> {
    pool.get()
        .await
        .map_err(tracerr::from_and_wrap!(=> postgres::Error))
        .map_err(tracerr::map_from)
}

/// Postgres client running every statement on its own.
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] the connection is taken from.
    pool: connection::Pool,

    /// Connection taken from the [`connection::Pool`], once used.
    conn: Arc<Slot<connection::NonTx>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client over the provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            conn: Arc::new(Slot::empty()),
        }
    }

    /// Returns the [`connection::Pool`] of this [`NonTx`] client.
    #[must_use]
    pub(crate) const fn pool(&self) -> &connection::Pool {
        &self.pool
    }

    /// Returns the connection of this [`NonTx`] client, acquiring it if
    /// needed.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::NonTx>, Traced<database::Error>>
    {
        self.conn.get_or_try_init(acquire(&self.pool)).await
    }
}

/// Postgres client running all its statements in a single transaction.
///
/// The transaction begins on the first statement and lasts until
/// [`Tx::commit()`]. Dropping an uncommitted [`Tx`] rolls it back.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`connection::Pool`] to take a connection from if `origin` has none.
    pool: connection::Pool,

    /// [`NonTx`] client whose connection is reused by the transaction.
    origin: Arc<Mutex<Option<NonTx>>>,

    /// Connection with the open transaction, once used.
    conn: Arc<Slot<connection::Tx>>,
}

impl Tx {
    /// Creates a new [`Tx`] client, reusing the connection of the provided
    /// [`NonTx`] one, if it has any.
    #[must_use]
    pub fn from_non_tx(origin: NonTx) -> Self {
        Self {
            pool: origin.pool.clone(),
            origin: Arc::new(Mutex::new(Some(origin))),
            conn: Arc::new(Slot::empty()),
        }
    }

    /// Begins the transaction on a reused or freshly acquired connection.
    async fn begin(&self) -> Result<connection::Tx, Traced<database::Error>> {
        let origin = self.origin.lock().await.take();
        let reused = match origin {
            Some(client) => client.conn.take().await,
            None => None,
        };
        let conn = match reused {
            Some(conn) => conn,
            None => acquire(&self.pool).await.map_err(tracerr::wrap!())?,
        };
        connection::Tx::begin(conn).await.map_err(tracerr::wrap!())
    }

    /// Returns the connection of this [`Tx`] client, beginning the
    /// transaction if needed.
    async fn connection(
        &self,
    ) -> Result<RwLockReadGuard<'_, connection::Tx>, Traced<database::Error>>
    {
        self.conn.get_or_try_init(self.begin()).await
    }

    /// Commits the transaction of this [`Tx`] client.
    ///
    /// Does nothing if no statement has been run yet.
    ///
    /// # Errors
    ///
    /// If Postgres fails to `COMMIT`.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        match self.conn.take().await {
            Some(tx) => tx.commit().await.map_err(tracerr::wrap!()),
            None => Ok(()),
        }
    }
}

/// Implements [`Connection`] for a client by running statements on its
/// lazily acquired connection.
macro_rules! run_on_connection {
    ($($ty:ty),+) => {$(
        impl Connection for $ty {
            async fn query<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Vec<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.connection().await.map_err(tracerr::wrap!())?;
                conn.query(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn query_opt<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<Option<Row>, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.connection().await.map_err(tracerr::wrap!())?;
                conn.query_opt(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn exec<T>(
                &self,
                stmt: &T,
                params: &[&(dyn ToSql + Sync)],
            ) -> Result<u64, Traced<database::Error>>
            where
                T: ToStatement + ?Sized,
            {
                let conn = self.connection().await.map_err(tracerr::wrap!())?;
                conn.exec(stmt, params).await.map_err(tracerr::wrap!())
            }

            async fn batch_exec(
                &self,
                stmt: &str,
            ) -> Result<(), Traced<database::Error>> {
                let conn = self.connection().await.map_err(tracerr::wrap!())?;
                conn.batch_exec(stmt).await.map_err(tracerr::wrap!())
            }
        }
    )+};
}

run_on_connection!(NonTx, Tx);
