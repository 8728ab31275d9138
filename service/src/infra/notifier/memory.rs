//! [`Memory`] [`Notifier`] implementation.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use tracerr::Traced;

use super::{Error, Notification, Notifier};

/// [`Notifier`] collecting [`Notification`]s in memory.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Delivered [`Notification`]s.
    sent: Arc<Mutex<Vec<Notification>>>,

    /// Indicator whether deliveries should fail.
    unavailable: Arc<AtomicBool>,
}

impl Memory {
    /// Creates a new empty [`Memory`] notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes all further deliveries fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns all the [`Notification`]s delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier<Notification> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        notification: Notification,
    ) -> Result<Self::Ok, Self::Err> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(tracerr::new!(Error::Unavailable));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}
