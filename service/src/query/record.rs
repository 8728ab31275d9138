//! [`Query`] collection related to a single [`Record`].

use common::operations::By;

use crate::domain::{order::record, Record};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Record`] by its [`record::Id`].
///
/// Records removed from the inbox are not returned.
pub type ById = DatabaseQuery<By<Option<Record>, record::Id>>;
