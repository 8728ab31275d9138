//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use common::operations::{By, Start};
use derive_more::{Debug, Error};

use crate::domain::user;
#[cfg(doc)]
use crate::{
    domain::User,
    infra::{Database, Notifier},
};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] decoding key of the identity provider issuing [`Session`]s.
    ///
    /// [`Session`]: domain::user::Session
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// ID of the [`User`] reviewing every requested order.
    pub admin_id: user::Id,

    /// [`task::RedeliverNotifications`] configuration.
    pub redeliver_notifications: task::redeliver_notifications::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, N> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: N,
}

impl<Db, N> Service<Db, N> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        notifier: N,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::RedeliverNotifications<Self>,
                        task::redeliver_notifications::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            notifier,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("redeliver_notifications", async move {
            svc.execute(Start(By::new(svc.config().redeliver_notifications)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::user,
        infra::{database, notifier},
        task, Config, Service,
    };

    /// Creates a [`Service`] backed by in-memory infrastructure.
    pub(crate) fn service() -> Service<database::Memory, notifier::Memory> {
        Service {
            config: Config {
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"secret",
                ),
                admin_id: user::Id::new(),
                redeliver_notifications:
                    task::redeliver_notifications::Config::default(),
            },
            database: database::Memory::new(),
            notifier: notifier::Memory::new(),
        }
    }
}
