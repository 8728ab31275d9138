//! [`Command`] for marking an inbox as read.

use common::operations::{By, Update};
use derive_more::From;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Record, User};
use crate::{
    domain::{order::record, user},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for marking all the [`Record`]s addressed to a [`User`] as
/// read at once.
///
/// Repeating it is a no-op.
#[derive(Clone, Copy, Debug, From)]
pub struct MarkInboxRead {
    /// ID of the [`User`] owning the inbox.
    pub user_id: user::Id,
}

impl<Db, N> Command<MarkInboxRead> for Service<Db, N>
where
    Db: Database<
        Update<By<record::Read, user::Id>>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(
        &self,
        MarkInboxRead { user_id }: MarkInboxRead,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Update(By::new(user_id)))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`MarkInboxRead`] [`Command`] execution.
pub type ExecutionError = Traced<database::Error>;
