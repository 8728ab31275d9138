//! [`Record`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Order;
use crate::domain::{
    listing::{self, ImageUrl},
    order, user, Listing, User,
};

/// Single step of an [`Order`] delivered to the inbox of its recipient.
///
/// Doubles as an inbox notification: likes and comments are [`Record`]s
/// outside of any fulfillment workflow.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// ID of this [`Record`].
    pub id: Id,

    /// ID of the [`Order`] this [`Record`] is a step of.
    pub order_id: order::Id,

    /// ID of the [`User`] whose inbox this [`Record`] belongs to.
    pub recipient_id: user::Id,

    /// ID of the [`User`] whose action created this [`Record`].
    pub actor_id: user::Id,

    /// Name of the [`User`] whose action created this [`Record`].
    pub actor_name: user::Name,

    /// [`Kind`] of this [`Record`].
    pub kind: Kind,

    /// [`Transition`] that created this [`Record`].
    pub transition: Transition,

    /// Human-readable description of the [`Transition`].
    pub action_text: ActionText,

    /// ID of the [`Listing`] this [`Record`] is about.
    pub listing_id: listing::Id,

    /// ID of the [`User`] owning the [`Listing`].
    pub seller_id: user::Id,

    /// [`ProductInfo`] of the [`Listing`] item.
    pub product_info: ProductInfo,

    /// Price of the order, already multiplied by days for rents.
    pub price: Option<Money>,

    /// Ordered [`listing::Size`].
    pub size: Option<listing::Size>,

    /// Requested [`RentDuration`].
    pub rent_duration: Option<RentDuration>,

    /// [`Note`] left by the actor (or a comment text).
    pub note: Option<Note>,

    /// [`user::VenmoHandle`] the buyer pays from.
    pub venmo_handle: Option<user::VenmoHandle>,

    /// [`BuyerSnapshot`] taken at the time of the request.
    pub buyer: Option<BuyerSnapshot>,

    /// Photos of the [`Listing`] item.
    pub image_urls: Vec<ImageUrl>,

    /// Photo proving the item was shipped.
    pub ship_proof: Option<ImageUrl>,

    /// [`DateTime`] when the shipped item is expected to arrive.
    pub expected_arrival_at: Option<ArrivalDateTime>,

    /// [`DateTime`] when the rented item is expected to be returned.
    pub expected_return_at: Option<ReturnDateTime>,

    /// Indicator whether the recipient hasn't read this [`Record`] yet.
    pub is_new: bool,

    /// [`DateTime`] when this [`Record`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when the notification about this [`Record`] was settled.
    pub notified_at: Option<NotificationDateTime>,

    /// Number of attempts to notify the recipient.
    pub delivery_attempts: DeliveryAttempts,

    /// [`DateTime`] when this [`Record`] was removed from the inbox.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Record {
    /// Applies the provided [`Delivery`] bookkeeping to this [`Record`].
    pub fn apply(&mut self, delivery: Delivery) {
        self.delivery_attempts = delivery.attempts;
        self.notified_at = delivery.notified_at;
    }

    /// Creates a [`Record`] notifying the owner of the provided [`Listing`]
    /// about the `actor` liking or commenting it.
    ///
    /// Such a [`Record`] starts its own [`Order`] outside of any fulfillment
    /// workflow.
    #[must_use]
    pub fn listing_activity(
        listing: &Listing,
        actor: &User,
        transition: Transition,
        note: Option<Note>,
    ) -> Self {
        let kind = if transition == Transition::Liked {
            Kind::Like
        } else {
            Kind::Comment
        };
        Self {
            id: Id::new(),
            order_id: order::Id::new(),
            recipient_id: listing.owner_id,
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            kind,
            transition,
            action_text: ActionText::new(transition, kind),
            listing_id: listing.id,
            seller_id: listing.owner_id,
            product_info: listing.details.title.clone().into(),
            price: None,
            size: None,
            rent_duration: None,
            note,
            venmo_handle: None,
            buyer: None,
            image_urls: listing.image_urls.clone(),
            ship_proof: None,
            expected_arrival_at: None,
            expected_return_at: None,
            is_new: true,
            created_at: CreationDateTime::now(),
            notified_at: None,
            delivery_attempts: DeliveryAttempts::default(),
            deleted_at: None,
        }
    }

    /// Creates the next [`Record`] of the same [`Order`] addressed to the
    /// `recipient_id`.
    ///
    /// Commercial fields, the [`BuyerSnapshot`] and the shipping details are
    /// carried over unchanged.
    #[must_use]
    pub fn forward(
        &self,
        transition: Transition,
        recipient_id: user::Id,
        actor_id: user::Id,
        actor_name: user::Name,
    ) -> Self {
        let kind = if transition == Transition::Returned {
            Kind::Return
        } else {
            self.kind
        };
        Self {
            id: Id::new(),
            order_id: self.order_id,
            recipient_id,
            actor_id,
            actor_name,
            kind,
            transition,
            action_text: ActionText::new(transition, kind),
            listing_id: self.listing_id,
            seller_id: self.seller_id,
            product_info: self.product_info.clone(),
            price: self.price,
            size: self.size.clone(),
            rent_duration: self.rent_duration.clone(),
            note: self.note.clone(),
            venmo_handle: self.venmo_handle.clone(),
            buyer: self.buyer.clone(),
            image_urls: self.image_urls.clone(),
            ship_proof: self.ship_proof.clone(),
            expected_arrival_at: self.expected_arrival_at,
            expected_return_at: self.expected_return_at,
            is_new: true,
            created_at: CreationDateTime::now(),
            notified_at: None,
            delivery_attempts: DeliveryAttempts::default(),
            deleted_at: None,
        }
    }

    /// Returns ID of the buyer of the [`Order`], if any.
    #[must_use]
    pub fn buyer_id(&self) -> Option<user::Id> {
        self.buyer.as_ref().map(|b| b.user_id)
    }

    /// Returns the text of a notification about this [`Record`].
    #[must_use]
    pub fn notification_text(&self) -> String {
        format!("{} {}", self.actor_name, self.action_text)
    }
}

/// ID of a [`Record`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Kind of a [`Record`]."]
    enum Kind {
        #[doc = "Comment left under a [`Listing`]."]
        Comment = 1,

        #[doc = "Purchase of a [`Listing`] item."]
        Purchase = 2,

        #[doc = "Rent of a [`Listing`] item."]
        Rent = 3,

        #[doc = "Like of a [`Listing`]."]
        Like = 4,

        #[doc = "Return of a rented [`Listing`] item."]
        Return = 5,
    }
}

define_kind! {
    #[doc = "Transition of an [`Order`] creating a [`Record`]."]
    enum Transition {
        #[doc = "Buyer requested the item."]
        Requested = 1,

        #[doc = "Admin approved the request."]
        Approved = 2,

        #[doc = "Seller shipped the item."]
        Fulfilled = 3,

        #[doc = "Buyer shipped the rented item back."]
        Returned = 4,

        #[doc = "User liked a [`Listing`]."]
        Liked = 5,

        #[doc = "User commented a [`Listing`]."]
        Commented = 6,
    }
}

impl Transition {
    /// Indicates whether this [`Transition`] is a step of the fulfillment
    /// workflow.
    #[must_use]
    pub const fn is_fulfillment(self) -> bool {
        matches!(
            self,
            Self::Requested | Self::Approved | Self::Fulfilled | Self::Returned,
        )
    }
}

/// Description of a [`Transition`] shown after the actor name.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ActionText(String);

impl ActionText {
    /// Creates the [`ActionText`] describing the provided [`Transition`] of
    /// a [`Record`] of the provided [`Kind`].
    #[must_use]
    pub fn new(transition: Transition, kind: Kind) -> Self {
        Self(
            match (transition, kind) {
                (Transition::Requested, Kind::Rent) => "wants to rent your item",
                (Transition::Requested, _) => "wants to purchase your item",
                (Transition::Approved, _) => {
                    "approved an order, please ship the item"
                }
                (Transition::Fulfilled, _) => "confirmed your order!",
                (Transition::Returned, _) => "returned your item",
                (Transition::Liked, _) => "liked your post",
                (Transition::Commented, _) => "commented on your post",
            }
            .to_owned(),
        )
    }
}

/// Short description of a [`Listing`] item carried by [`Record`]s.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ProductInfo(String);

impl From<listing::Title> for ProductInfo {
    fn from(title: listing::Title) -> Self {
        Self(title.to_string())
    }
}

/// Rent duration in days, stored string-encoded as received.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct RentDuration(String);

impl RentDuration {
    /// Creates a [`RentDuration`] of the provided number of `days`.
    #[must_use]
    pub fn from_days(days: u32) -> Self {
        Self(days.to_string())
    }

    /// Creates a [`RentDuration`] from its raw representation without
    /// parsing it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parses the number of days of this [`RentDuration`].
    ///
    /// # Errors
    ///
    /// If this [`RentDuration`] is not a positive integer.
    pub fn days(&self) -> Result<u32, MalformedDuration> {
        self.0
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| MalformedDuration(self.0.clone()))
    }
}

/// [`RentDuration`] is not a positive integer.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("malformed rent duration: `{_0}`")]
pub struct MalformedDuration(#[error(not(source))] String);

/// Note attached to a [`Record`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Note(String);

impl Note {
    /// Creates a new [`Note`] if the given `text` is valid.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        Self::check(&text).then_some(Self(text))
    }

    /// Checks whether the given `text` is a valid [`Note`].
    fn check(text: impl AsRef<str>) -> bool {
        let text = text.as_ref();
        !text.trim().is_empty() && text.len() <= 1000
    }
}

impl FromStr for Note {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Note`")
    }
}

/// Point-in-time copy of the buyer [`User`] taken when an [`Order`] is
/// requested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuyerSnapshot {
    /// ID of the buyer.
    pub user_id: user::Id,

    /// [`user::Name`] of the buyer.
    pub name: user::Name,

    /// [`user::Email`] of the buyer.
    pub email: Option<user::Email>,

    /// [`user::Phone`] of the buyer.
    pub phone: Option<user::Phone>,

    /// Shipping [`user::Address`] of the buyer.
    pub address: Option<user::Address>,

    /// Number of followers of the buyer.
    pub followers_count: i32,

    /// [`user::BuyRentCount`] of the buyer.
    pub buy_rent_count: user::BuyRentCount,
}

impl From<&User> for BuyerSnapshot {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            address: user.address.clone(),
            followers_count: i32::try_from(user.followers.len())
                .unwrap_or(i32::MAX),
            buy_rent_count: user.buy_rent_count,
        }
    }
}

/// Number of attempts to notify the recipient of a [`Record`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct DeliveryAttempts(i16);

impl DeliveryAttempts {
    /// Returns the next value of these [`DeliveryAttempts`].
    #[must_use]
    pub fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Marker of all [`Record`]s of a recipient being read.
#[derive(Clone, Copy, Debug)]
pub struct Read;

/// Notification bookkeeping of a [`Record`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Delivery {
    /// ID of the [`Record`].
    pub record_id: Id,

    /// Number of attempts to notify the recipient.
    pub attempts: DeliveryAttempts,

    /// [`DateTime`] when the notification was settled.
    pub notified_at: Option<NotificationDateTime>,
}

/// Marker type indicating an expected arrival of a shipped item.
#[derive(Clone, Copy, Debug)]
pub struct Arrival;

/// Marker type indicating an expected return of a rented item.
#[derive(Clone, Copy, Debug)]
pub struct Return;

/// [`DateTime`] when a [`Record`] was created.
pub type CreationDateTime = DateTimeOf<(Record, unit::Creation)>;

/// [`DateTime`] when a [`Record`] was removed from the inbox.
pub type DeletionDateTime = DateTimeOf<(Record, unit::Deletion)>;

/// [`DateTime`] when a notification about a [`Record`] was settled.
pub type NotificationDateTime = DateTimeOf<(Record, unit::Notification)>;

/// [`DateTime`] when a shipped item is expected to arrive.
pub type ArrivalDateTime = DateTimeOf<(Record, Arrival)>;

/// [`DateTime`] when a rented item is expected to be returned.
pub type ReturnDateTime = DateTimeOf<(Record, Return)>;

#[cfg(test)]
pub(crate) mod spec {
    use common::Money;

    use crate::domain::{listing, order, user, User};

    use super::{
        ActionText, BuyerSnapshot, Kind, MalformedDuration, Record,
        RentDuration, Transition,
    };

    /// Creates a [`Record`] of the provided [`Kind`] and [`Transition`]
    /// requested by a fresh buyer.
    pub(crate) fn record(kind: Kind, transition: Transition) -> Record {
        let buyer = User::new(user::Name::new("buyer").unwrap());
        Record {
            id: super::Id::new(),
            order_id: order::Id::new(),
            recipient_id: user::Id::new(),
            actor_id: buyer.id,
            actor_name: buyer.name.clone(),
            kind,
            transition,
            action_text: ActionText::new(transition, kind),
            listing_id: listing::Id::new(),
            seller_id: user::Id::new(),
            product_info: listing::Title::new("Silk dress").unwrap().into(),
            price: Money::usd_cents(10_000),
            size: listing::Size::new("M"),
            rent_duration: (kind == Kind::Rent)
                .then(|| RentDuration::from_days(5)),
            note: None,
            venmo_handle: None,
            buyer: Some(BuyerSnapshot::from(&buyer)),
            image_urls: vec![],
            ship_proof: None,
            expected_arrival_at: None,
            expected_return_at: None,
            is_new: true,
            created_at: super::CreationDateTime::now(),
            notified_at: None,
            delivery_attempts: super::DeliveryAttempts::default(),
            deleted_at: None,
        }
    }

    #[test]
    fn forward_keeps_commercial_fields() {
        let requested = record(Kind::Rent, Transition::Requested);
        let seller = requested.seller_id;
        let admin = requested.recipient_id;

        let approved = requested.forward(
            Transition::Approved,
            seller,
            admin,
            user::Name::new("admin").unwrap(),
        );

        assert_ne!(approved.id, requested.id);
        assert_eq!(approved.order_id, requested.order_id);
        assert_eq!(approved.recipient_id, seller);
        assert_eq!(approved.price, requested.price);
        assert_eq!(approved.size, requested.size);
        assert_eq!(approved.buyer, requested.buyer);
        assert_eq!(approved.kind, Kind::Rent);
        assert!(approved.is_new);
        assert_eq!(
            approved.notification_text(),
            "admin approved an order, please ship the item",
        );
    }

    #[test]
    fn return_changes_kind() {
        let fulfilled = record(Kind::Rent, Transition::Fulfilled);

        let returned = fulfilled.forward(
            Transition::Returned,
            fulfilled.seller_id,
            fulfilled.actor_id,
            fulfilled.actor_name.clone(),
        );

        assert_eq!(returned.kind, Kind::Return);
        assert_eq!(returned.action_text.to_string(), "returned your item");
    }

    #[test]
    fn action_texts_depend_on_kind() {
        assert_eq!(
            ActionText::new(Transition::Requested, Kind::Rent).to_string(),
            "wants to rent your item",
        );
        assert_eq!(
            ActionText::new(Transition::Requested, Kind::Purchase).to_string(),
            "wants to purchase your item",
        );
    }

    #[test]
    fn parses_rent_duration() {
        assert_eq!(RentDuration::from_days(7).days(), Ok(7));
        assert_eq!(RentDuration::from_raw(" 7 ").days(), Ok(7));
        assert_eq!(
            RentDuration::from_raw("seven").days(),
            Err(MalformedDuration("seven".to_owned())),
        );
        assert!(RentDuration::from_raw("0").days().is_err());
        assert!(RentDuration::from_raw("-3").days().is_err());
    }
}
