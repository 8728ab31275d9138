//! [`Order`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLEnum, GraphQLObject, GraphQLScalar};
use service::{command, domain, read};
use uuid::Uuid;

use crate::{
    api::{self, listing::ImageUrl, scalar},
    Context, Error,
};

/// Step of an [`Order`] addressed to a single [`api::User`].
#[derive(Clone, Debug, From)]
pub struct Record(domain::Record);

impl Record {
    /// Indicates whether the buyer contact details of this [`Record`] may be
    /// revealed to the current session.
    async fn reveals_buyer(&self, ctx: &Context) -> Result<bool, Error> {
        let Some(session) = ctx.try_current_session().await? else {
            return Ok(false);
        };
        let my_id: domain::user::Id = session.user_id.into();
        Ok(my_id == self.0.seller_id || ctx.is_admin(my_id))
    }
}

/// Step of an `Order` delivered to the inbox of a `User`.
#[graphql_object(name = "OrderRecord", context = Context)]
impl Record {
    /// Unique identifier of this `OrderRecord`.
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.0.id.into()
    }

    /// ID of the `Order` this `OrderRecord` belongs to.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        self.0.order_id.into()
    }

    /// `User` this `OrderRecord` is addressed to.
    #[must_use]
    pub fn recipient(&self) -> api::User {
        #[expect(unsafe_code, reason = "`Record` references existing `User`")]
        unsafe {
            api::User::new_unchecked(self.0.recipient_id)
        }
    }

    /// `User` who caused this `OrderRecord`.
    #[must_use]
    pub fn actor(&self) -> api::User {
        #[expect(unsafe_code, reason = "`Record` references existing `User`")]
        unsafe {
            api::User::new_unchecked(self.0.actor_id)
        }
    }

    /// Name of the `actor` at the moment of this `OrderRecord` creation.
    #[must_use]
    pub fn actor_name(&self) -> api::user::Name {
        self.0.actor_name.clone().into()
    }

    /// Kind of this `OrderRecord`.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.0.kind.into()
    }

    /// Transition which created this `OrderRecord`.
    #[must_use]
    pub fn transition(&self) -> Transition {
        self.0.transition.into()
    }

    /// Human-readable notification text, prefixed with the `actorName`.
    #[must_use]
    pub fn text(&self) -> String {
        self.0.notification_text()
    }

    /// `Listing` this `OrderRecord` is about.
    #[must_use]
    pub fn listing(&self) -> api::Listing {
        #[expect(
            unsafe_code,
            reason = "`Record` references existing `Listing`"
        )]
        unsafe {
            api::Listing::new_unchecked(self.0.listing_id)
        }
    }

    /// `User` selling or renting out the item.
    #[must_use]
    pub fn seller(&self) -> api::User {
        #[expect(unsafe_code, reason = "`Record` references existing `User`")]
        unsafe {
            api::User::new_unchecked(self.0.seller_id)
        }
    }

    /// Short description of the item.
    #[must_use]
    pub fn product_info(&self) -> String {
        self.0.product_info.to_string()
    }

    /// Price of the item (rent total for rents).
    #[must_use]
    pub fn price(&self) -> Option<Money> {
        self.0.price
    }

    /// Requested size of the item.
    #[must_use]
    pub fn size(&self) -> Option<api::listing::Size> {
        self.0.size.clone().map(Into::into)
    }

    /// Requested rent duration, as it was entered.
    #[must_use]
    pub fn rent_duration(&self) -> Option<String> {
        self.0.rent_duration.as_ref().map(ToString::to_string)
    }

    /// Note attached by the `actor`.
    #[must_use]
    pub fn note(&self) -> Option<Note> {
        self.0.note.clone().map(Into::into)
    }

    /// Venmo handle the buyer pays from.
    #[must_use]
    pub fn venmo_handle(&self) -> Option<api::user::VenmoHandle> {
        self.0.venmo_handle.clone().map(Into::into)
    }

    /// Buyer details at the moment of the request.
    ///
    /// Visible to the seller and the admin only.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "OrderRecord.buyer",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn buyer(&self, ctx: &Context) -> Result<Option<Buyer>, Error> {
        if !self.reveals_buyer(ctx).await? {
            return Ok(None);
        }
        Ok(self.0.buyer.clone().map(Into::into))
    }

    /// Photos of the item.
    #[must_use]
    pub fn image_urls(&self) -> Vec<ImageUrl> {
        self.0.image_urls.iter().cloned().map(Into::into).collect()
    }

    /// Photo proving the item was shipped.
    #[must_use]
    pub fn ship_proof(&self) -> Option<ImageUrl> {
        self.0.ship_proof.clone().map(Into::into)
    }

    /// `DateTime` when the shipped item is expected to arrive.
    #[must_use]
    pub fn expected_arrival_at(&self) -> Option<DateTime> {
        self.0.expected_arrival_at.map(|at| at.coerce())
    }

    /// `DateTime` when the rented item is expected to be returned.
    #[must_use]
    pub fn expected_return_at(&self) -> Option<DateTime> {
        self.0.expected_return_at.map(|at| at.coerce())
    }

    /// Indicator whether this `OrderRecord` is unread.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.0.is_new
    }

    /// `DateTime` when this `OrderRecord` was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }

    /// `DateTime` when the recipient was notified about this `OrderRecord`.
    #[must_use]
    pub fn notified_at(&self) -> Option<DateTime> {
        self.0.notified_at.map(|at| at.coerce())
    }
}

/// Buyer details captured when an `Order` was requested.
#[derive(Clone, Debug, From)]
pub struct Buyer(domain::order::record::BuyerSnapshot);

/// Buyer details captured when an `Order` was requested.
#[graphql_object(name = "OrderBuyer", context = Context)]
impl Buyer {
    /// Buyer `User`.
    #[must_use]
    pub fn user(&self) -> api::User {
        #[expect(unsafe_code, reason = "`Record` references existing `User`")]
        unsafe {
            api::User::new_unchecked(self.0.user_id)
        }
    }

    /// Username of the buyer.
    #[must_use]
    pub fn name(&self) -> api::user::Name {
        self.0.name.clone().into()
    }

    /// Email of the buyer.
    #[must_use]
    pub fn email(&self) -> Option<api::user::Email> {
        self.0.email.clone().map(Into::into)
    }

    /// Phone number of the buyer.
    #[must_use]
    pub fn phone(&self) -> Option<api::user::Phone> {
        self.0.phone.clone().map(Into::into)
    }

    /// Shipping address of the buyer.
    #[must_use]
    pub fn address(&self) -> Option<api::user::Address> {
        self.0.address.clone().map(Into::into)
    }

    /// Number of followers of the buyer.
    #[must_use]
    pub fn followers_count(&self) -> i32 {
        self.0.followers_count
    }

    /// Number of orders the buyer had fulfilled before.
    #[must_use]
    pub fn buy_rent_count(&self) -> i32 {
        self.0.buy_rent_count.into()
    }
}

/// Chain of [`Record`]s of one transaction attempt.
#[derive(Clone, Debug, From)]
pub struct Order(domain::Order);

/// Chain of `OrderRecord`s of one transaction attempt.
#[graphql_object(context = Context)]
impl Order {
    /// Unique identifier of this `Order`.
    #[must_use]
    pub fn id(&self) -> OrderId {
        self.0.id.into()
    }

    /// Current stage of this `Order`.
    ///
    /// `null` for likes and comments.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.0.stage().map(Into::into)
    }

    /// `OrderRecord`s of this `Order`, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.0.records.iter().cloned().map(Into::into).collect()
    }
}

/// Notification inbox of a `User`.
#[derive(Clone, Debug, From)]
pub struct Inbox(read::Inbox);

/// Notification inbox of a `User`, newest first.
#[graphql_object(context = Context)]
impl Inbox {
    /// Unread `OrderRecord`s.
    #[must_use]
    pub fn unread(&self) -> Vec<Record> {
        self.0.unread.iter().cloned().map(Into::into).collect()
    }

    /// Already read `OrderRecord`s.
    #[must_use]
    pub fn read(&self) -> Vec<Record> {
        self.0.read.iter().cloned().map(Into::into).collect()
    }

    /// Number of unread `OrderRecord`s.
    #[must_use]
    pub fn unread_count(&self) -> i32 {
        i32::try_from(self.0.unread_count()).unwrap_or(i32::MAX)
    }
}

/// Created `OrderRecord` along with the outcome of notifying its recipient.
#[derive(Debug, From)]
pub struct Dispatched(command::Dispatched);

/// Created `OrderRecord` along with the outcome of notifying its recipient.
#[graphql_object(name = "DispatchedRecord", context = Context)]
impl Dispatched {
    /// Created `OrderRecord`.
    #[must_use]
    pub fn record(&self) -> Record {
        self.0.record.clone().into()
    }

    /// Indicator whether the recipient was notified already.
    ///
    /// Failed notifications are retried in background.
    #[must_use]
    pub fn notified(&self) -> bool {
        self.0
            .delivery
            .as_ref()
            .is_ok_and(|d| d.notified_at.is_some())
    }
}

/// Time remaining until a rented item is expected to be returned.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "ReturnCountdown")]
pub struct Countdown {
    /// Whole days remaining.
    pub days: i32,

    /// Whole hours remaining after `days`.
    pub hours: i32,

    /// Whole minutes remaining after `hours`.
    pub minutes: i32,

    /// Whole seconds remaining after `minutes`.
    pub seconds: i32,

    /// Indicator whether the return is overdue.
    pub is_overdue: bool,
}

impl From<domain::pricing::Countdown> for Countdown {
    fn from(countdown: domain::pricing::Countdown) -> Self {
        Self {
            days: i32::try_from(countdown.days).unwrap_or(i32::MAX),
            hours: countdown.hours.into(),
            minutes: countdown.minutes.into(),
            seconds: countdown.seconds.into(),
            is_overdue: countdown.is_overdue(),
        }
    }
}

/// Kind of an `OrderRecord`.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "OrderKind")]
pub enum Kind {
    /// Comment left under a `Listing`.
    Comment,

    /// Purchase of a `Listing` item.
    Purchase,

    /// Rent of a `Listing` item.
    Rent,

    /// Like of a `Listing`.
    Like,

    /// Return of a rented `Listing` item.
    Return,
}

impl From<domain::order::record::Kind> for Kind {
    fn from(kind: domain::order::record::Kind) -> Self {
        use domain::order::record::Kind as K;
        match kind {
            K::Comment => Self::Comment,
            K::Purchase => Self::Purchase,
            K::Rent => Self::Rent,
            K::Like => Self::Like,
            K::Return => Self::Return,
        }
    }
}

/// Transition of an `Order` creating an `OrderRecord`.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "OrderTransition")]
pub enum Transition {
    /// Buyer requested the item.
    Requested,

    /// Admin approved the request.
    Approved,

    /// Seller shipped the item.
    Fulfilled,

    /// Buyer shipped the rented item back.
    Returned,

    /// `User` liked a `Listing`.
    Liked,

    /// `User` commented a `Listing`.
    Commented,
}

impl From<domain::order::record::Transition> for Transition {
    fn from(transition: domain::order::record::Transition) -> Self {
        use domain::order::record::Transition as T;
        match transition {
            T::Requested => Self::Requested,
            T::Approved => Self::Approved,
            T::Fulfilled => Self::Fulfilled,
            T::Returned => Self::Returned,
            T::Liked => Self::Liked,
            T::Commented => Self::Commented,
        }
    }
}

/// Stage of an `Order` fulfillment.
#[derive(Clone, Copy, Debug, GraphQLEnum)]
#[graphql(name = "OrderStage")]
pub enum Stage {
    /// Request awaits the admin approval.
    AdminReview,

    /// Approved request awaits the seller to ship or decline.
    SellerActionPending,

    /// Item is shipped to the buyer.
    BuyerConfirmed,

    /// Rented item is shipped back to the seller.
    SellerReturnReceived,

    /// Seller declined the request.
    Cancelled,
}

impl From<domain::order::Stage> for Stage {
    fn from(stage: domain::order::Stage) -> Self {
        use domain::order::Stage as S;
        match stage {
            S::AdminReview => Self::AdminReview,
            S::SellerActionPending => Self::SellerActionPending,
            S::BuyerConfirmed => Self::BuyerConfirmed,
            S::SellerReturnReceived => Self::SellerReturnReceived,
            S::Cancelled => Self::Cancelled,
        }
    }
}

/// Unique identifier of an `OrderRecord`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::order::record::Id)]
#[into(domain::order::record::Id)]
#[graphql(name = "OrderRecordId", transparent)]
pub struct RecordId(Uuid);

/// Unique identifier of an `Order`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::order::Id)]
#[into(domain::order::Id)]
#[graphql(name = "OrderId", transparent)]
pub struct OrderId(Uuid);

/// Free-form text attached to an `OrderRecord` or a `ListingComment`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "Note",
    with = scalar::Via::<domain::order::record::Note>,
)]
pub struct Note(domain::order::record::Note);
