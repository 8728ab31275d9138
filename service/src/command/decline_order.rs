//! [`Command`] for declining an approved [`Order`].

use common::operations::{
    By, Commit, Delete, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::{
        order::{self, record, Stage, TransitionError},
        user, Order, Record,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for declining an approved [`Order`] by the seller.
///
/// Removes the pending [`Record`] from the seller inbox and cancels the
/// [`Order`]. Nobody is notified.
#[derive(Clone, Copy, Debug)]
pub struct DeclineOrder {
    /// ID of the approved [`Record`] in the seller inbox.
    pub record_id: record::Id,

    /// ID of the seller [`User`].
    pub seller_id: user::Id,
}

impl<Db, N> Command<DeclineOrder> for Service<Db, N>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Record>, record::Id>>,
            Ok = Option<Record>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Record, record::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Record;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: DeclineOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeclineOrder {
            record_id,
            seller_id,
        } = cmd;

        let order_id = self
            .database()
            .execute(Select(By::<Option<Record>, _>::new(record_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?
            .order_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let mut declined = order
            .pending(
                record_id,
                seller_id,
                record::Transition::Approved,
                Stage::SellerActionPending,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?
            .clone();

        tx.execute(Delete(By::<Record, _>::new(record_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        declined.deleted_at = Some(record::DeletionDateTime::now());
        Ok(declined)
    }
}

/// Error of [`DeclineOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Order`] cannot be declined.
    #[display("{_0}")]
    Transition(TransitionError),
}
