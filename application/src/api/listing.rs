//! [`Listing`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::{self, order::Note, scalar},
    define_error, AsError, Context, Error,
};

/// A [`Listing`] of a clothing item.
#[derive(Clone, Debug, From)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// Underlying [`domain::Listing`].
    listing: OnceCell<domain::Listing>,
}

impl From<domain::Listing> for Listing {
    fn from(listing: domain::Listing) -> Self {
        Self {
            id: listing.id.into(),
            listing: OnceCell::new_with(Some(listing)),
        }
    }
}

impl Listing {
    /// Creates a new [`Listing`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Listing`] with the provided ID exists,
    /// otherwise accessing this [`Listing`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            listing: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Listing`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Listing`] doesn't exist.
    async fn listing(&self, ctx: &Context) -> Result<&domain::Listing, Error> {
        let id = self.id.into();
        self.listing
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::listing::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|l| {
                        future::ready(l.ok_or_else(|| {
                            api::query::ListingError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A posted clothing item available for purchase or rent.
#[graphql_object(context = Context)]
impl Listing {
    /// Unique identifier of this `Listing`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `User` who posted this `Listing`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.owner",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn owner(&self, ctx: &Context) -> Result<api::User, Error> {
        let owner_id = self.listing(ctx).await?.owner_id;
        #[expect(
            unsafe_code,
            reason = "`Listing` loaded from repository guarantees `User` \
                      existence"
        )]
        Ok(unsafe { api::User::new_unchecked(owner_id) })
    }

    /// Title of this `Listing`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.title",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn title(&self, ctx: &Context) -> Result<Title, Error> {
        Ok(self.listing(ctx).await?.details.title.clone().into())
    }

    /// Tags describing this `Listing` item (category, season, occasion,
    /// color and gender).
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.details",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn details(&self, ctx: &Context) -> Result<Details, Error> {
        Ok(self.listing(ctx).await?.details.clone().into())
    }

    /// Photos of this `Listing` item.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.imageUrls",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn image_urls(&self, ctx: &Context) -> Result<Vec<ImageUrl>, Error> {
        Ok(self
            .listing(ctx)
            .await?
            .image_urls
            .iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// Sizes this `Listing` item is available in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.sizes",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn sizes(&self, ctx: &Context) -> Result<Vec<Size>, Error> {
        Ok(self
            .listing(ctx)
            .await?
            .sizes
            .iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// Way this `Listing` item is offered.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.saleOption",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn sale_option(&self, ctx: &Context) -> Result<SaleOption, Error> {
        Ok(self.listing(ctx).await?.terms.sale_option().into())
    }

    /// Price to purchase this `Listing` item.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.purchasePrice",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn purchase_price(
        &self,
        ctx: &Context,
    ) -> Result<Option<Money>, Error> {
        Ok(self.listing(ctx).await?.terms.purchase_price())
    }

    /// Price to rent this `Listing` item for a single day.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.rentPricePerDay",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn rent_price_per_day(
        &self,
        ctx: &Context,
    ) -> Result<Option<Money>, Error> {
        Ok(self.listing(ctx).await?.terms.rent_price_per_day())
    }

    /// Range of days this `Listing` item may be rented for, if limited.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.rentDays",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn rent_days(
        &self,
        ctx: &Context,
    ) -> Result<Option<RentDays>, Error> {
        Ok(self.listing(ctx).await?.terms.rent_days().map(|r| RentDays {
            min: i32::try_from(r.min()).unwrap_or(i32::MAX),
            max: i32::try_from(r.max()).unwrap_or(i32::MAX),
        }))
    }

    /// Price breakdown of ordering this `Listing` item.
    ///
    /// Providing `rentDays` quotes a rent, otherwise a purchase is quoted.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `NOT_PURCHASABLE` - the item can only be rented;
    /// - `NOT_RENTABLE` - the item can only be purchased;
    /// - `RENT_DAYS_OUT_OF_RANGE` - the item cannot be rented for `rentDays`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.quote",
            otel.name = api::Query::SPAN_NAME,
            rent_days = ?rent_days,
        ),
    )]
    pub async fn quote(
        &self,
        rent_days: Option<i32>,
        ctx: &Context,
    ) -> Result<Quote, Error> {
        ctx.service()
            .execute(query::listing::Quote {
                listing_id: self.id.into(),
                rent_days: rent_days.map(|d| u32::try_from(d).unwrap_or(0)),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Number of likes of this `Listing`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.likesCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn likes_count(&self, ctx: &Context) -> Result<i32, Error> {
        let count = self.listing(ctx).await?.likes_count();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Indicator whether the authenticated `User` likes this `Listing`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.likedByMe",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn liked_by_me(&self, ctx: &Context) -> Result<bool, Error> {
        let Some(session) = ctx.try_current_session().await? else {
            return Ok(false);
        };
        let my_id: domain::user::Id = session.user_id.into();
        Ok(self.listing(ctx).await?.liked_by.contains(&my_id))
    }

    /// Comments left under this `Listing`, oldest first.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.comments",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn comments(&self, ctx: &Context) -> Result<Vec<Comment>, Error> {
        Ok(self
            .listing(ctx)
            .await?
            .comments
            .iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// `DateTime` when this `Listing` was posted.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Listing.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.listing(ctx).await?.created_at.coerce())
    }
}

/// Comment left under a [`Listing`].
#[derive(Clone, Debug, From)]
pub struct Comment(domain::listing::Comment);

/// Comment left under a `Listing`.
#[graphql_object(name = "ListingComment", context = Context)]
impl Comment {
    /// `User` who left this `ListingComment`.
    #[must_use]
    pub fn author(&self) -> api::User {
        #[expect(
            unsafe_code,
            reason = "`Comment` loaded from repository guarantees `User` \
                      existence"
        )]
        unsafe {
            api::User::new_unchecked(self.0.author_id)
        }
    }

    /// Text of this `ListingComment`.
    #[must_use]
    pub fn text(&self) -> Note {
        self.0.text.clone().into()
    }

    /// `DateTime` when this `ListingComment` was left.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }
}

/// Tags describing a `Listing` item.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(name = "ListingDetails")]
pub struct Details {
    /// Category of the item.
    pub category: Option<String>,

    /// Season the item fits.
    pub season: Option<String>,

    /// Occasion the item fits.
    pub occasion: Option<String>,

    /// Color of the item.
    pub color: Option<String>,

    /// Gender the item is designed for.
    pub gender: Option<String>,
}

impl From<domain::listing::Details> for Details {
    fn from(details: domain::listing::Details) -> Self {
        let tag = |t: Option<domain::listing::Tag>| t.map(|t| t.to_string());
        Self {
            category: tag(details.category),
            season: tag(details.season),
            occasion: tag(details.occasion),
            color: tag(details.color),
            gender: tag(details.gender),
        }
    }
}

/// Inclusive range of days a `Listing` item may be rented for.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "ListingRentDays")]
pub struct RentDays {
    /// Minimal number of days.
    pub min: i32,

    /// Maximal number of days.
    pub max: i32,
}

/// Price breakdown of ordering a `Listing` item.
///
/// Amounts are rounded to cents, with half a cent rounded up.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "OrderQuote")]
pub struct Quote {
    /// Kind of the quoted order.
    pub kind: api::order::Kind,

    /// Price of the item (total of all days for rents).
    pub price: Money,

    /// Transaction fee on top of the `price`.
    pub fee: Money,

    /// Insurance held for a rented item.
    pub insurance_hold: Money,

    /// Total amount to be paid.
    pub total: Money,
}

impl From<domain::pricing::Quote> for Quote {
    fn from(quote: domain::pricing::Quote) -> Self {
        let domain::pricing::Quote {
            kind,
            price,
            fee,
            insurance_hold,
            total,
        } = quote;
        Self {
            kind: kind.into(),
            price: price.round_to_cents(),
            fee: fee.round_to_cents(),
            insurance_hold: insurance_hold.round_to_cents(),
            total: total.round_to_cents(),
        }
    }
}

/// Way a `Listing` item is offered.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "ListingSaleOption")]
pub enum SaleOption {
    /// Item can only be purchased.
    Purchase,

    /// Item can only be rented.
    Rent,

    /// Item can be either purchased or rented.
    PurchaseOrRent,
}

impl From<domain::listing::SaleOption> for SaleOption {
    fn from(option: domain::listing::SaleOption) -> Self {
        use domain::listing::SaleOption as O;
        match option {
            O::Purchase => Self::Purchase,
            O::Rent => Self::Rent,
            O::PurchaseOrRent => Self::PurchaseOrRent,
        }
    }
}

/// Unique identifier of a `Listing`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::listing::Id)]
#[into(domain::listing::Id)]
#[graphql(name = "ListingId", transparent)]
pub struct Id(Uuid);

/// Title of a `Listing`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "ListingTitle",
    with = scalar::Via::<domain::listing::Title>,
)]
pub struct Title(domain::listing::Title);

/// Size label of a `Listing` item.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "ListingSize",
    with = scalar::Via::<domain::listing::Size>,
)]
pub struct Size(domain::listing::Size);

/// URL of a photo.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "ImageUrl",
    with = scalar::Via::<domain::listing::ImageUrl>,
)]
pub struct ImageUrl(domain::listing::ImageUrl);

impl AsError for query::listing::QuoteError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => {
                Some(api::query::ListingError::NotExists.into())
            }
            Self::Terms(e) => e.try_as_error(),
        }
    }
}

impl AsError for domain::listing::TermsError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "NOT_PURCHASABLE"]
                #[status = BAD_REQUEST]
                #[message = "`Listing` item can only be rented"]
                NotPurchasable,

                #[code = "NOT_RENTABLE"]
                #[status = BAD_REQUEST]
                #[message = "`Listing` item can only be purchased"]
                NotRentable,

                #[code = "RENT_DAYS_OUT_OF_RANGE"]
                #[status = BAD_REQUEST]
                #[message = "`Listing` item cannot be rented for the \
                             specified number of days"]
                RentDaysOutOfRange,
            }
        }

        match self {
            Self::NotPurchasable => Some(Error::NotPurchasable.into()),
            Self::NotRentable => Some(Error::NotRentable.into()),
            Self::DaysOutOfRange(_) => Some(Error::RentDaysOutOfRange.into()),
            Self::Overflow => None,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Money;
    use service::domain::{order::record::Kind, pricing};

    use super::Quote;

    fn usd(s: &str) -> Money {
        format!("{s}USD").parse().unwrap()
    }

    #[test]
    fn quote_rounds_half_cents_up() {
        let quote = Quote::from(pricing::Quote {
            kind: Kind::Purchase,
            price: usd("0.75"),
            fee: usd("0.045"),
            insurance_hold: usd("0.0025"),
            total: usd("0.795"),
        });

        assert_eq!(quote.price, usd("0.75"));
        assert_eq!(quote.fee, usd("0.05"));
        assert_eq!(quote.insurance_hold, usd("0"));
        assert_eq!(quote.total, usd("0.8"));
    }
}
