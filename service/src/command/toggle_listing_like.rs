//! [`Command`] for liking or unliking a [`Listing`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing,
        order::record::{self, Transition},
        user, Listing, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for liking a [`Listing`], or unliking an already liked one.
#[derive(Clone, Copy, Debug)]
pub struct ToggleListingLike {
    /// ID of the [`Listing`] to toggle the like of.
    pub listing_id: listing::Id,

    /// ID of the [`User`] toggling the like.
    pub user_id: user::Id,
}

/// Output of [`ToggleListingLike`] [`Command`].
#[derive(Debug)]
pub struct Output {
    /// Updated [`Listing`].
    pub listing: Listing,

    /// Indicator whether the [`Listing`] is liked by the [`User`] now.
    pub liked: bool,

    /// Notification of the [`Listing`] owner about the like, if any.
    pub notification: Option<Dispatched>,
}

impl<Db, N> Command<ToggleListingLike> for Service<Db, N>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<Listing>, Ok = (), Err = Traced<database::Error>>
        + Database<Insert<Record>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Self: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ToggleListingLike,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ToggleListingLike {
            listing_id,
            user_id,
        } = cmd;

        let user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid lost updates of `Listing::liked_by`.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        tx.execute(Select(By::<Option<User>, _>::new(listing.owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|owner| !owner.has_blocked(user.id))
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let liked = if listing.liked_by.remove(&user.id) {
            false
        } else {
            _ = listing.liked_by.insert(user.id);
            true
        };
        tx.execute(Update(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let record = (liked && listing.owner_id != user.id).then(|| {
            Record::listing_activity(&listing, &user, Transition::Liked, None)
        });
        if let Some(r) = &record {
            tx.execute(Insert(r.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let notification = match record {
            Some(r) => Some(self.dispatch(r).await),
            None => None,
        };
        Ok(Output {
            listing,
            liked,
            notification,
        })
    }
}

/// Error of [`ToggleListingLike`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] doesn't exist or is hidden from the [`User`].
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::Insert;

    use crate::{
        command::request_order,
        domain::{listing::SaleOption, order::record::Kind, user, User},
        infra::Database as _,
        Command as _,
    };

    use super::ToggleListingLike;

    #[tokio::test]
    async fn toggles_and_notifies_owner_on_like() {
        let svc = crate::spec::service();
        let fan = User::new(user::Name::new("fan").unwrap());
        let owner = User::new(user::Name::new("owner").unwrap());
        let listing = request_order::spec::listing(&owner, SaleOption::Rent);
        svc.database().execute(Insert(fan.clone())).await.unwrap();
        svc.database().execute(Insert(owner.clone())).await.unwrap();
        svc.database().execute(Insert(listing.clone())).await.unwrap();
        let cmd = ToggleListingLike {
            listing_id: listing.id,
            user_id: fan.id,
        };

        let liked = svc.execute(cmd).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.listing.likes_count(), 1);
        let record = liked.notification.unwrap().record;
        assert_eq!(record.recipient_id, owner.id);
        assert_eq!(record.kind, Kind::Like);
        assert_eq!(record.notification_text(), "fan liked your post");

        let unliked = svc.execute(cmd).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.listing.likes_count(), 0);
        assert!(unliked.notification.is_none());
    }

    #[tokio::test]
    async fn own_like_is_silent() {
        let svc = crate::spec::service();
        let owner = User::new(user::Name::new("owner").unwrap());
        let listing = request_order::spec::listing(&owner, SaleOption::Rent);
        svc.database().execute(Insert(owner.clone())).await.unwrap();
        svc.database().execute(Insert(listing.clone())).await.unwrap();

        let out = svc
            .execute(ToggleListingLike {
                listing_id: listing.id,
                user_id: owner.id,
            })
            .await
            .unwrap();

        assert!(out.liked);
        assert!(out.notification.is_none());
    }
}
