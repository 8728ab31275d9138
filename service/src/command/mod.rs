//! [`Command`] definition.

pub mod approve_order;
pub mod authorize_user_session;
pub mod comment_listing;
pub mod decline_order;
pub mod deliver_notification;
pub mod fulfill_order;
pub mod mark_inbox_read;
pub mod request_order;
pub mod return_order;
pub mod toggle_listing_like;

use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    domain::{order::record, Record},
    Service,
};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    approve_order::ApproveOrder, authorize_user_session::AuthorizeUserSession,
    comment_listing::CommentListing, decline_order::DeclineOrder,
    deliver_notification::DeliverNotification, fulfill_order::FulfillOrder,
    mark_inbox_read::MarkInboxRead, request_order::RequestOrder,
    return_order::ReturnOrder, toggle_listing_like::ToggleListingLike,
};

/// Persisted [`Record`] along with the outcome of notifying its recipient.
///
/// A failed delivery doesn't undo the [`Record`] creation and is retried by
/// [`task::RedeliverNotifications`].
///
/// [`task::RedeliverNotifications`]: crate::task::RedeliverNotifications
#[derive(Debug)]
pub struct Dispatched {
    /// Created [`Record`].
    pub record: Record,

    /// Outcome of notifying the recipient [`User`].
    pub delivery:
        Result<record::Delivery, Traced<deliver_notification::ExecutionError>>,
}

impl<Db, N> Service<Db, N>
where
    Self: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    /// Notifies the recipient of the provided persisted [`Record`].
    ///
    /// The returned [`Record`] carries the delivery bookkeeping as stored.
    async fn dispatch(&self, mut record: Record) -> Dispatched {
        let delivery = self
            .execute(DeliverNotification {
                record: record.clone(),
            })
            .await;
        match &delivery {
            Ok(d) => record.apply(*d),
            Err(e) => {
                log::warn!(
                    "failed to notify `User(id: {})` about `Record(id: {})`: \
                     {e}",
                    record.recipient_id,
                    record.id,
                );
                // `Notifier` fails only after the attempt is stored.
                if matches!(
                    e.as_ref(),
                    deliver_notification::ExecutionError::Notifier(_),
                ) {
                    record.delivery_attempts =
                        record.delivery_attempts.incremented();
                }
            }
        }
        Dispatched { record, delivery }
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Insert, Select};

    use crate::{
        domain::{
            order::record::{spec::record, Kind, Transition},
            user, Record, User,
        },
        infra::{database, notifier, Database as _},
    };

    async fn seeded() -> (crate::Service<database::Memory, notifier::Memory>, Record)
    {
        let svc = crate::spec::service();
        let mut recipient = User::new(user::Name::new("seller").unwrap());
        recipient.push_token = user::PushToken::new("device-1");
        svc.database().execute(Insert(recipient.clone())).await.unwrap();

        let mut rec = record(Kind::Purchase, Transition::Requested);
        rec.recipient_id = recipient.id;
        svc.database().execute(Insert(rec.clone())).await.unwrap();
        (svc, rec)
    }

    async fn stored(
        svc: &crate::Service<database::Memory, notifier::Memory>,
        rec: &Record,
    ) -> Record {
        svc.database()
            .execute(Select(By::<Option<Record>, _>::new(rec.id)))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn dispatched_record_matches_stored_one() {
        let (svc, rec) = seeded().await;

        let dispatched = svc.dispatch(rec.clone()).await;

        assert!(dispatched.delivery.is_ok());
        assert!(dispatched.record.notified_at.is_some());
        assert_eq!(i16::from(dispatched.record.delivery_attempts), 1);
        assert_eq!(dispatched.record, stored(&svc, &rec).await);
    }

    #[tokio::test]
    async fn failed_dispatch_counts_attempt() {
        let (svc, rec) = seeded().await;
        svc.notifier().set_unavailable(true);

        let dispatched = svc.dispatch(rec.clone()).await;

        assert!(dispatched.delivery.is_err());
        assert!(dispatched.record.notified_at.is_none());
        assert_eq!(i16::from(dispatched.record.delivery_attempts), 1);
        assert_eq!(dispatched.record, stored(&svc, &rec).await);
    }
}
