//! [`Inbox`] [`Query`].

use common::operations::{By, Select};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::{user, Record},
    infra::{database, Database},
    read, Query, Service,
};

/// [`Query`] of the [`read::Inbox`] of a [`User`].
#[derive(Clone, Copy, Debug)]
pub struct Inbox {
    /// ID of the [`User`] owning the inbox.
    pub user_id: user::Id,
}

impl<Db, N> Query<Inbox> for Service<Db, N>
where
    Db: Database<
        Select<By<Vec<Record>, user::Id>>,
        Ok = Vec<Record>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::Inbox;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Inbox { user_id }: Inbox,
    ) -> Result<Self::Ok, Self::Err> {
        let records = self
            .database()
            .execute(Select(By::new(user_id)))
            .await
            .map_err(tracerr::wrap!())?;
        Ok(read::Inbox::new(records))
    }
}
