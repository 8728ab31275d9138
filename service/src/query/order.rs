//! [`Query`] collection related to a single [`Order`].

use common::operations::By;

use crate::domain::{order, Order};
#[cfg(doc)]
use crate::{domain::Record, Query};

use super::DatabaseQuery;

/// Queries an [`Order`] with all of its [`Record`]s by its [`order::Id`].
pub type ById = DatabaseQuery<By<Option<Order>, order::Id>>;
