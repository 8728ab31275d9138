//! GraphQL [`Mutation`]s definitions.

use juniper::{graphql_object, GraphQLObject};
use service::{command, domain, query, Command as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Requests to purchase or rent the item of the specified `Listing`.
    ///
    /// Providing `rentDays` requests a rent, otherwise a purchase. The request
    /// is reviewed by the admin before reaching the seller.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `LISTING_NOT_EXISTS` - the `Listing` does not exist;
    /// - `OWN_LISTING` - the `Listing` is posted by the authenticated `User`;
    /// - `SIZE_UNAVAILABLE` - the item is not available in the `size`;
    /// - `NOT_PURCHASABLE` - the item can only be rented;
    /// - `NOT_RENTABLE` - the item can only be purchased;
    /// - `RENT_DAYS_OUT_OF_RANGE` - the item cannot be rented for `rentDays`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "requestOrder",
            listing_id = %listing_id,
            otel.name = Self::SPAN_NAME,
            rent_days = ?rent_days,
            size = %size,
        ),
    )]
    pub async fn request_order(
        listing_id: api::listing::Id,
        size: api::listing::Size,
        rent_days: Option<i32>,
        note: Option<api::order::Note>,
        venmo_handle: Option<api::user::VenmoHandle>,
        ctx: &Context,
    ) -> Result<api::order::Dispatched, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::RequestOrder {
                buyer_id: my_id,
                listing_id: listing_id.into(),
                size: size.into(),
                rent_days: rent_days.map(|d| u32::try_from(d).unwrap_or(0)),
                note: note.map(Into::into),
                venmo_handle: venmo_handle.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Approves the requested `Order` and forwards it to the seller.
    ///
    /// Only the admin may approve `Order`s.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `NOT_ADMIN` - the authenticated `User` is not the admin;
    /// - `RECORD_NOT_EXISTS` - the `OrderRecord` does not exist;
    /// - `NOT_RECIPIENT` - the `OrderRecord` is addressed to another `User`;
    /// - `INVALID_TRANSITION` - the `Order` is not awaiting an approval.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "approveOrder",
            otel.name = Self::SPAN_NAME,
            record_id = %record_id,
        ),
    )]
    pub async fn approve_order(
        record_id: api::order::RecordId,
        ctx: &Context,
    ) -> Result<api::order::Dispatched, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::ApproveOrder {
                record_id: record_id.into(),
                admin_id: my_id,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Confirms the shipment of the approved `Order` item to the buyer.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `SHIPMENT_PROOF_REQUIRED` - no `shipProof` provided;
    /// - `RECORD_NOT_EXISTS` - the `OrderRecord` does not exist;
    /// - `NOT_RECIPIENT` - the `OrderRecord` is addressed to another `User`;
    /// - `INVALID_TRANSITION` - the `Order` is not awaiting a shipment.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "fulfillOrder",
            otel.name = Self::SPAN_NAME,
            record_id = %record_id,
        ),
    )]
    pub async fn fulfill_order(
        record_id: api::order::RecordId,
        ship_proof: Option<api::listing::ImageUrl>,
        note: Option<api::order::Note>,
        ctx: &Context,
    ) -> Result<api::order::Dispatched, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::FulfillOrder {
                record_id: record_id.into(),
                seller_id: my_id,
                ship_proof: ship_proof.map(Into::into),
                note: note.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Declines the approved `Order`.
    ///
    /// The buyer is not notified.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `RECORD_NOT_EXISTS` - the `OrderRecord` does not exist;
    /// - `NOT_RECIPIENT` - the `OrderRecord` is addressed to another `User`;
    /// - `INVALID_TRANSITION` - the `Order` is not awaiting a shipment.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "declineOrder",
            otel.name = Self::SPAN_NAME,
            record_id = %record_id,
        ),
    )]
    pub async fn decline_order(
        record_id: api::order::RecordId,
        ctx: &Context,
    ) -> Result<api::order::Record, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::DeclineOrder {
                record_id: record_id.into(),
                seller_id: my_id,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Confirms the rented item is shipped back to the seller.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `SHIPMENT_PROOF_REQUIRED` - no `shipProof` provided;
    /// - `RECORD_NOT_EXISTS` - the `OrderRecord` does not exist;
    /// - `NOT_RECIPIENT` - the `OrderRecord` is addressed to another `User`;
    /// - `INVALID_TRANSITION` - the `Order` is not a shipped rent.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "returnOrder",
            otel.name = Self::SPAN_NAME,
            record_id = %record_id,
        ),
    )]
    pub async fn return_order(
        record_id: api::order::RecordId,
        ship_proof: Option<api::listing::ImageUrl>,
        ctx: &Context,
    ) -> Result<api::order::Dispatched, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::ReturnOrder {
                record_id: record_id.into(),
                buyer_id: my_id,
                ship_proof: ship_proof.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Likes the specified `Listing`, or unlikes it if already liked.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `LISTING_NOT_EXISTS` - the `Listing` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "toggleListingLike",
            listing_id = %listing_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn toggle_listing_like(
        listing_id: api::listing::Id,
        ctx: &Context,
    ) -> Result<ToggleLikeResult, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::ToggleListingLike {
                listing_id: listing_id.into(),
                user_id: my_id,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|out| ToggleLikeResult {
                listing: out.listing.into(),
                liked: out.liked,
            })
    }

    /// Leaves a comment under the specified `Listing`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `LISTING_NOT_EXISTS` - the `Listing` does not exist.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "commentListing",
            listing_id = %listing_id,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn comment_listing(
        listing_id: api::listing::Id,
        text: api::order::Note,
        ctx: &Context,
    ) -> Result<api::Listing, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::CommentListing {
                listing_id: listing_id.into(),
                author_id: my_id,
                text: text.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|out| out.listing.into())
    }

    /// Marks the whole inbox of the authenticated `User` as read.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "markInboxRead",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn mark_inbox_read(
        ctx: &Context,
    ) -> Result<api::order::Inbox, Error> {
        let my_id = ctx.my_id().await?;

        ctx.service()
            .execute(command::MarkInboxRead { user_id: my_id })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;
        ctx.service()
            .execute(query::Inbox { user_id: my_id })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

/// Result of toggling a like of a `Listing`.
#[derive(Debug, GraphQLObject)]
#[graphql(context = Context)]
pub struct ToggleLikeResult {
    /// Updated `Listing`.
    pub listing: api::Listing,

    /// Indicator whether the `Listing` is liked by the authenticated `User`
    /// now.
    pub liked: bool,
}

define_error! {
    enum ShipmentError {
        #[code = "SHIPMENT_PROOF_REQUIRED"]
        #[status = BAD_REQUEST]
        #[message = "Photo of the shipped item is required"]
        ProofRequired,
    }
}

impl AsError for domain::order::TransitionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "RECORD_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`OrderRecord` with the specified ID does not \
                             exist"]
                RecordNotExists,

                #[code = "NOT_RECIPIENT"]
                #[status = FORBIDDEN]
                #[message = "`OrderRecord` is addressed to another `User`"]
                NotRecipient,

                #[code = "INVALID_TRANSITION"]
                #[status = CONFLICT]
                #[message = "`Order` cannot make the requested transition"]
                Invalid,
            }
        }

        Some(match self {
            Self::RecordNotExists(_) => Error::RecordNotExists.into(),
            Self::NotRecipient(_) => Error::NotRecipient.into(),
            Self::Invalid(_) => Error::Invalid.into(),
        })
    }
}

impl AsError for command::request_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "OWN_LISTING"]
                #[status = CONFLICT]
                #[message = "`Listing` cannot be ordered by its owner"]
                OwnListing,

                #[code = "SIZE_UNAVAILABLE"]
                #[status = BAD_REQUEST]
                #[message = "`Listing` item is not available in the \
                             specified size"]
                SizeUnavailable,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => {
                Some(api::query::ListingError::NotExists.into())
            }
            Self::OwnListing(_) => Some(Error::OwnListing.into()),
            Self::SizeUnavailable(_) => Some(Error::SizeUnavailable.into()),
            Self::Terms(e) => e.try_as_error(),
            Self::UserNotExists(_) => None,
        }
    }
}

impl AsError for command::approve_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "NOT_ADMIN"]
                #[status = FORBIDDEN]
                #[message = "Authenticated `User` must be the admin"]
                NotAdmin,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::NotAdmin(_) => Some(Error::NotAdmin.into()),
            Self::Transition(e) => e.try_as_error(),
            Self::UserNotExists(_) => None,
        }
    }
}

impl AsError for command::fulfill_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::MissingShipmentProof => {
                Some(ShipmentError::ProofRequired.into())
            }
            Self::Transition(e) => e.try_as_error(),
            Self::UserNotExists(_) => None,
        }
    }
}

impl AsError for command::decline_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Transition(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::return_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::MissingShipmentProof => {
                Some(ShipmentError::ProofRequired.into())
            }
            Self::Transition(e) => e.try_as_error(),
            Self::UserNotExists(_) => None,
        }
    }
}

impl AsError for command::toggle_listing_like::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => {
                Some(api::query::ListingError::NotExists.into())
            }
            Self::UserNotExists(_) => None,
        }
    }
}

impl AsError for command::comment_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => {
                Some(api::query::ListingError::NotExists.into())
            }
            Self::UserNotExists(_) => None,
        }
    }
}
