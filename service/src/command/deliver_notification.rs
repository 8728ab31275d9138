//! [`Command`] for notifying the recipient of a [`Record`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{order::record, user, Record, User},
    infra::{database, notifier, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for notifying the recipient of a [`Record`].
///
/// Already notified [`Record`]s are skipped, so it's safe to re-execute.
#[derive(Clone, Debug, From)]
pub struct DeliverNotification {
    /// [`Record`] to notify about.
    pub record: Record,
}

impl<Db, N> Command<DeliverNotification> for Service<Db, N>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Update<record::Delivery>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    N: Notifier<
        notifier::Notification,
        Ok = (),
        Err = Traced<notifier::Error>,
    >,
{
    type Ok = record::Delivery;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DeliverNotification,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeliverNotification { record } = cmd;

        if record.notified_at.is_some() {
            return Ok(record::Delivery {
                record_id: record.id,
                attempts: record.delivery_attempts,
                notified_at: record.notified_at,
            });
        }

        let push_token = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(record.recipient_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .and_then(|u| u.push_token);
        let Some(push_token) = push_token else {
            // Nowhere to deliver, so consider it settled.
            let delivery = record::Delivery {
                record_id: record.id,
                attempts: record.delivery_attempts,
                notified_at: Some(record::NotificationDateTime::now()),
            };
            self.database()
                .execute(Update(delivery))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            return Ok(delivery);
        };

        let sent = self
            .notifier()
            .execute(notifier::Notification {
                push_token,
                title: record.product_info.to_string(),
                body: record.notification_text(),
            })
            .await;

        let delivery = record::Delivery {
            record_id: record.id,
            attempts: record.delivery_attempts.incremented(),
            notified_at: sent
                .is_ok()
                .then(record::NotificationDateTime::now),
        };
        self.database()
            .execute(Update(delivery))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        sent.map_err(tracerr::map_from_and_wrap!(=> E))?;
        Ok(delivery)
    }
}

/// Error of [`DeliverNotification`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Notifier`] error.
    #[display("`Notifier` failed: {_0}")]
    Notifier(notifier::Error),
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
        Command as _,
    };

    use super::{DeliverNotification, ExecutionError};

    async fn seeded(
        push_token: Option<&str>,
    ) -> (crate::Service<database::Memory, notifier::Memory>, Record) {
        let svc = crate::spec::service();
        let mut recipient = User::new(user::Name::new("seller").unwrap());
        recipient.push_token = push_token.and_then(user::PushToken::new);
        svc.database().execute(Insert(recipient.clone())).await.unwrap();

        let mut rec = record(Kind::Rent, Transition::Requested);
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
    async fn pushes_notification_once() {
        let (svc, rec) = seeded(Some("device-1")).await;

        let delivery = svc
            .execute(DeliverNotification::from(rec.clone()))
            .await
            .unwrap();
        assert!(delivery.notified_at.is_some());
        assert_eq!(i16::from(delivery.attempts), 1);

        let sent = svc.notifier().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "buyer wants to rent your item");

        let rec = stored(&svc, &rec).await;
        _ = svc.execute(DeliverNotification::from(rec)).await.unwrap();
        assert_eq!(svc.notifier().sent().len(), 1, "notified twice");
    }

    #[tokio::test]
    async fn settles_without_push_token() {
        let (svc, rec) = seeded(None).await;

        let delivery =
            svc.execute(DeliverNotification::from(rec)).await.unwrap();

        assert!(delivery.notified_at.is_some());
        assert!(svc.notifier().sent().is_empty());
    }

    #[tokio::test]
    async fn records_failed_attempt() {
        let (svc, rec) = seeded(Some("device-1")).await;
        svc.notifier().set_unavailable(true);

        let err = svc
            .execute(DeliverNotification::from(rec.clone()))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Notifier(notifier::Error::Unavailable),
        ));

        let rec = stored(&svc, &rec).await;
        assert!(rec.notified_at.is_none());
        assert_eq!(i16::from(rec.delivery_attempts), 1);
    }
}
