//! [`Record`] read model definition.

use crate::domain::order::record;
#[cfg(doc)]
use crate::domain::Record;

/// Selector of [`Record`]s whose recipients haven't been notified yet.
#[derive(Clone, Copy, Debug)]
pub struct Undelivered {
    /// [`record::DeliveryAttempts`] after which a [`Record`] is abandoned.
    pub max_attempts: record::DeliveryAttempts,

    /// Only [`Record`]s created before this moment are selected, so the ones
    /// being delivered right now are left alone.
    pub created_before: record::CreationDateTime,

    /// Maximum number of [`Record`]s to select.
    pub limit: usize,
}
