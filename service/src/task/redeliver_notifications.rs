//! [`RedeliverNotifications`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::User;
use crate::{
    command::{deliver_notification, DeliverNotification},
    domain::{order::record, Record},
    infra::{database, Database},
    read, Command, Service,
};

use super::Task;

/// Configuration for [`RedeliverNotifications`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between redelivery rounds.
    ///
    /// Only [`Record`]s older than this interval are redelivered, so the
    /// ones being notified right now are not touched.
    #[default(time::Duration::from_secs(60))]
    pub interval: time::Duration,

    /// Number of failed attempts after which a [`Record`] is abandoned.
    #[default(record::DeliveryAttempts::from(5))]
    pub max_attempts: record::DeliveryAttempts,

    /// Maximum number of [`Record`]s redelivered in a single round.
    #[default(100)]
    pub batch_size: usize,
}

/// [`Task`] for notifying [`User`]s about [`Record`]s whose notification
/// failed.
#[derive(Clone, Copy, Debug)]
pub struct RedeliverNotifications<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, N> Task<Start<By<RedeliverNotifications<Self>, Config>>>
    for Service<Db, N>
where
    RedeliverNotifications<Service<Db, N>>:
        Task<Perform<()>, Ok = usize, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<RedeliverNotifications<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = RedeliverNotifications {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => log::info!("redelivered {n} notifications"),
                Err(e) => {
                    log::error!("`task::RedeliverNotifications` failed: {e}");
                }
            }
        }
    }
}

impl<Db, N> Task<Perform<()>> for RedeliverNotifications<Service<Db, N>>
where
    Db: Database<
        Select<By<Vec<Record>, read::record::Undelivered>>,
        Ok = Vec<Record>,
        Err = Traced<database::Error>,
    >,
    Service<Db, N>: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    type Ok = usize;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let pending = self
            .service
            .database()
            .execute(Select(By::new(read::record::Undelivered {
                max_attempts: self.config.max_attempts,
                created_before: record::CreationDateTime::now()
                    - self.config.interval,
                limit: self.config.batch_size,
            })))
            .await
            .map_err(tracerr::wrap!())?;

        let mut delivered = 0;
        for record in pending {
            let id = record.id;
            match self.service.execute(DeliverNotification { record }).await {
                Ok(d) if d.notified_at.is_some() => delivered += 1,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("`Record(id: {id})` is still undelivered: {e}");
                }
            }
        }
        Ok(delivered)
    }
}

/// Error of [`RedeliverNotifications`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Insert, Perform, Select},
        DateTime,
    };

    use crate::{
        domain::{
            order::record::{spec::record, DeliveryAttempts, Kind, Transition},
            user, Record, User,
        },
        infra::Database as _,
        Task as _,
    };

    use super::{Config, RedeliverNotifications};

    #[tokio::test]
    async fn retries_failed_notifications() {
        let svc = crate::spec::service();
        let mut recipient = User::new(user::Name::new("seller").unwrap());
        recipient.push_token = user::PushToken::new("device-1");
        svc.database().execute(Insert(recipient.clone())).await.unwrap();

        let stale = DateTime::from_unix_timestamp(
            DateTime::now().unix_timestamp() - 3600,
        )
        .unwrap();
        let mut failed = record(Kind::Purchase, Transition::Approved);
        failed.recipient_id = recipient.id;
        failed.created_at = stale.coerce();
        failed.delivery_attempts = DeliveryAttempts::from(1);
        let mut abandoned = failed.clone();
        abandoned.id = crate::domain::order::record::Id::new();
        abandoned.delivery_attempts = DeliveryAttempts::from(3);
        let mut fresh = failed.clone();
        fresh.id = crate::domain::order::record::Id::new();
        fresh.created_at = DateTime::now().coerce();
        for r in [&failed, &abandoned, &fresh] {
            svc.database().execute(Insert(r.clone())).await.unwrap();
        }

        let task = RedeliverNotifications {
            config: Config {
                interval: Duration::from_secs(60),
                max_attempts: DeliveryAttempts::from(3),
                batch_size: 10,
            },
            service: svc.clone(),
        };
        assert_eq!(task.execute(Perform(())).await.unwrap(), 1);
        assert_eq!(task.execute(Perform(())).await.unwrap(), 0);

        let failed = svc
            .database()
            .execute(Select(By::<Option<Record>, _>::new(failed.id)))
            .await
            .unwrap()
            .unwrap();
        assert!(failed.notified_at.is_some());
        assert_eq!(svc.notifier().sent().len(), 1);
    }
}
