//! [`Query`] collection related to a single [`Listing`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing::{self, TermsError},
        pricing, Listing,
    },
    infra::{database, Database},
    Query, Service,
};

use super::DatabaseQuery;

/// Queries a [`Listing`] by its [`listing::Id`].
pub type ById = DatabaseQuery<By<Option<Listing>, listing::Id>>;

/// [`Query`] of a [`pricing::Quote`] for ordering a [`Listing`] item.
#[derive(Clone, Copy, Debug)]
pub struct Quote {
    /// ID of the [`Listing`] to quote.
    pub listing_id: listing::Id,

    /// Number of days to rent the item for.
    ///
    /// [`None`] quotes a purchase.
    pub rent_days: Option<u32>,
}

impl<Db, N> Query<Quote> for Service<Db, N>
where
    Db: Database<
        Select<By<Option<Listing>, listing::Id>>,
        Ok = Option<Listing>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = pricing::Quote;
    type Err = Traced<QuoteError>;

    async fn execute(
        &self,
        Quote {
            listing_id,
            rent_days,
        }: Quote,
    ) -> Result<Self::Ok, Self::Err> {
        use QuoteError as E;

        self.database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?
            .terms
            .quote(rent_days)
            .map_err(tracerr::from_and_wrap!(=> E))
    }
}

/// Error of [`Quote`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum QuoteError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] doesn't exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Listing`] terms don't allow the quoted order.
    #[display("{_0}")]
    #[from]
    Terms(TermsError),
}
