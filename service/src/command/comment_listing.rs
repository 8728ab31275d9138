//! [`Command`] for commenting a [`Listing`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing::{self, Comment},
        order::record::{self, Transition},
        user, Listing, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for leaving a [`Comment`] under a [`Listing`].
#[derive(Clone, Debug)]
pub struct CommentListing {
    /// ID of the [`Listing`] to comment.
    pub listing_id: listing::Id,

    /// ID of the [`User`] leaving the [`Comment`].
    pub author_id: user::Id,

    /// Text of the [`Comment`].
    pub text: record::Note,
}

/// Output of [`CommentListing`] [`Command`].
#[derive(Debug)]
pub struct Output {
    /// Updated [`Listing`].
    pub listing: Listing,

    /// Notification of the [`Listing`] owner about the [`Comment`], if any.
    pub notification: Option<Dispatched>,
}

impl<Db, N> Command<CommentListing> for Service<Db, N>
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
        cmd: CommentListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CommentListing {
            listing_id,
            author_id,
            text,
        } = cmd;

        let author = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(author_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(author_id))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid lost updates of `Listing::comments`.
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
            .filter(|owner| !owner.has_blocked(author.id))
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        listing.comments.push(Comment {
            author_id: author.id,
            text: text.clone(),
            created_at: listing::CommentDateTime::now(),
        });
        tx.execute(Update(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let record = (listing.owner_id != author.id).then(|| {
            Record::listing_activity(
                &listing,
                &author,
                Transition::Commented,
                Some(text),
            )
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
            notification,
        })
    }
}

/// Error of [`CommentListing`] [`Command`] execution.
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
        domain::{
            listing::SaleOption,
            order::record::{Kind, Note},
            user, User,
        },
        infra::Database as _,
        Command as _,
    };

    use super::CommentListing;

    #[tokio::test]
    async fn appends_comment_and_notifies_owner() {
        let svc = crate::spec::service();
        let author = User::new(user::Name::new("author").unwrap());
        let owner = User::new(user::Name::new("owner").unwrap());
        let listing =
            request_order::spec::listing(&owner, SaleOption::Purchase);
        svc.database().execute(Insert(author.clone())).await.unwrap();
        svc.database().execute(Insert(owner.clone())).await.unwrap();
        svc.database().execute(Insert(listing.clone())).await.unwrap();

        for text in ["Love it", "Still available?"] {
            _ = svc
                .execute(CommentListing {
                    listing_id: listing.id,
                    author_id: author.id,
                    text: Note::new(text).unwrap(),
                })
                .await
                .unwrap();
        }
        let out = svc
            .execute(CommentListing {
                listing_id: listing.id,
                author_id: owner.id,
                text: Note::new("Yes!").unwrap(),
            })
            .await
            .unwrap();

        let texts = out
            .listing
            .comments
            .iter()
            .map(|c| c.text.to_string())
            .collect::<Vec<_>>();
        assert_eq!(texts, ["Love it", "Still available?", "Yes!"]);
        assert!(out.notification.is_none(), "owner notified about own reply");
    }

    #[tokio::test]
    async fn notification_carries_comment() {
        let svc = crate::spec::service();
        let author = User::new(user::Name::new("author").unwrap());
        let owner = User::new(user::Name::new("owner").unwrap());
        let listing =
            request_order::spec::listing(&owner, SaleOption::Purchase);
        svc.database().execute(Insert(author.clone())).await.unwrap();
        svc.database().execute(Insert(owner.clone())).await.unwrap();
        svc.database().execute(Insert(listing.clone())).await.unwrap();

        let record = svc
            .execute(CommentListing {
                listing_id: listing.id,
                author_id: author.id,
                text: Note::new("Love it").unwrap(),
            })
            .await
            .unwrap()
            .notification
            .unwrap()
            .record;

        assert_eq!(record.kind, Kind::Comment);
        assert_eq!(record.recipient_id, owner.id);
        assert_eq!(record.note, Note::new("Love it"));
    }
}
