//! [`Notifier`]-related implementations.

mod log;
mod memory;

use derive_more::{Display, Error as StdError};

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

pub use self::{log::Log, memory::Memory};

/// Push notification delivery.
pub use common::Handler as Notifier;

/// Push notification to be delivered to a device of a [`User`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    /// [`user::PushToken`] of the device to deliver to.
    pub push_token: user::PushToken,

    /// Title of this [`Notification`].
    pub title: String,

    /// Body of this [`Notification`].
    pub body: String,
}

/// [`Notifier`] error.
#[derive(Clone, Debug, Display, StdError, Eq, PartialEq)]
pub enum Error {
    /// Push service cannot be reached.
    #[display("push service is unavailable")]
    Unavailable,
}
