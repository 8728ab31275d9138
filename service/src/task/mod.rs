//! Background [`Task`]s definitions.

mod background;
pub mod redeliver_notifications;

pub use common::Handler as Task;

pub use self::{
    background::{Background, Failure},
    redeliver_notifications::RedeliverNotifications,
};
