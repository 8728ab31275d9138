//! [`Log`] [`Notifier`] implementation.

use tracerr::Traced;
use tracing as log;

use super::{Error, Notification, Notifier};

/// [`Notifier`] writing [`Notification`]s to the log instead of pushing them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Notification> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        notification: Notification,
    ) -> Result<Self::Ok, Self::Err> {
        let Notification {
            push_token,
            title,
            body,
        } = notification;
        log::info!(token = %push_token, "push `{title}`: {body}");
        Ok(())
    }
}
