//! [`Listing`] definitions.

use std::collections::{BTreeSet, HashSet};

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::User;
use crate::domain::{
    order::record,
    pricing::{self, Quote},
    user,
};

/// Clothing item posted for purchase or rent.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the [`User`] owning this [`Listing`].
    pub owner_id: user::Id,

    /// Photos of the item.
    pub image_urls: Vec<ImageUrl>,

    /// Sale [`Terms`] of this [`Listing`].
    pub terms: Terms,

    /// [`Size`]s the item is available in.
    pub sizes: BTreeSet<Size>,

    /// Descriptive [`Details`] of the item.
    pub details: Details,

    /// IDs of [`User`]s who liked this [`Listing`].
    pub liked_by: HashSet<user::Id>,

    /// [`Comment`]s left under this [`Listing`], oldest first.
    pub comments: Vec<Comment>,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Listing`] was deleted.
    pub deleted_at: Option<DeletionDateTime>,
}

impl Listing {
    /// Returns the number of likes of this [`Listing`].
    #[must_use]
    pub fn likes_count(&self) -> usize {
        self.liked_by.len()
    }

    /// Indicates whether the item is available in the provided [`Size`].
    #[must_use]
    pub fn has_size(&self, size: &Size) -> bool {
        self.sizes.contains(size)
    }
}

/// ID of a [`Listing`].
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
    #[doc = "Way a [`Listing`] is offered."]
    enum SaleOption {
        #[doc = "Item can only be purchased."]
        Purchase = 1,

        #[doc = "Item can only be rented."]
        Rent = 2,

        #[doc = "Item can be either purchased or rented."]
        PurchaseOrRent = 3,
    }
}

impl SaleOption {
    /// Indicates whether this [`SaleOption`] allows purchasing.
    #[must_use]
    pub const fn is_purchasable(self) -> bool {
        matches!(self, Self::Purchase | Self::PurchaseOrRent)
    }

    /// Indicates whether this [`SaleOption`] allows renting.
    #[must_use]
    pub const fn is_rentable(self) -> bool {
        matches!(self, Self::Rent | Self::PurchaseOrRent)
    }
}

/// Sale terms of a [`Listing`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Terms {
    /// [`SaleOption`] of these [`Terms`].
    sale_option: SaleOption,

    /// Price to purchase the item.
    ///
    /// For a rent-only [`Listing`] this is the retail value the insurance
    /// hold is calculated from, if known.
    purchase_price: Option<Money>,

    /// Price to rent the item for a single day.
    rent_price_per_day: Option<Money>,

    /// Range of days the item may be rented for, if limited.
    rent_days: Option<RentDays>,
}

impl Terms {
    /// Creates new [`Terms`] if the prices required by the provided
    /// [`SaleOption`] are present.
    #[must_use]
    pub fn new(
        sale_option: SaleOption,
        purchase_price: Option<Money>,
        rent_price_per_day: Option<Money>,
        rent_days: Option<RentDays>,
    ) -> Option<Self> {
        let valid = (!sale_option.is_purchasable() || purchase_price.is_some())
            && (!sale_option.is_rentable() || rent_price_per_day.is_some());
        valid.then_some(Self {
            sale_option,
            purchase_price,
            rent_price_per_day,
            rent_days: rent_days.filter(|_| sale_option.is_rentable()),
        })
    }

    /// Returns the [`SaleOption`] of these [`Terms`].
    #[must_use]
    pub const fn sale_option(&self) -> SaleOption {
        self.sale_option
    }

    /// Returns the purchase price of these [`Terms`].
    #[must_use]
    pub const fn purchase_price(&self) -> Option<Money> {
        self.purchase_price
    }

    /// Returns the rent price per day of these [`Terms`].
    #[must_use]
    pub const fn rent_price_per_day(&self) -> Option<Money> {
        self.rent_price_per_day
    }

    /// Returns the [`RentDays`] range of these [`Terms`].
    #[must_use]
    pub const fn rent_days(&self) -> Option<RentDays> {
        self.rent_days
    }

    /// Quotes an order under these [`Terms`].
    ///
    /// Presence of `rent_days` chooses renting over purchasing.
    ///
    /// # Errors
    ///
    /// - [`TermsError::NotPurchasable`] if no `rent_days` provided for a
    ///   rent-only item;
    /// - [`TermsError::NotRentable`] if `rent_days` provided for a
    ///   purchase-only item;
    /// - [`TermsError::DaysOutOfRange`] if `rent_days` is zero or outside the
    ///   allowed [`RentDays`];
    /// - [`TermsError::Overflow`] if the total cannot be represented.
    pub fn quote(&self, rent_days: Option<u32>) -> Result<Quote, TermsError> {
        use TermsError as E;

        let Some(days) = rent_days else {
            let price = self
                .purchase_price
                .filter(|_| self.sale_option.is_purchasable())
                .ok_or(E::NotPurchasable)?;
            return Quote::purchase(price).ok_or(E::Overflow);
        };

        let per_day = self
            .rent_price_per_day
            .filter(|_| self.sale_option.is_rentable())
            .ok_or(E::NotRentable)?;
        if days == 0 || self.rent_days.is_some_and(|r| !r.contains(days)) {
            return Err(E::DaysOutOfRange(days));
        }
        let total = pricing::rent_total(per_day, days).ok_or(E::Overflow)?;

        Quote::rent(total, self.purchase_price).ok_or(E::Overflow)
    }
}

/// Error of quoting an order under [`Terms`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum TermsError {
    /// Item cannot be purchased.
    #[display("item cannot be purchased, rent duration is required")]
    NotPurchasable,

    /// Item cannot be rented.
    #[display("item cannot be rented")]
    NotRentable,

    /// Requested rent duration is not allowed.
    #[display("renting for {_0} days is not allowed")]
    DaysOutOfRange(#[error(not(source))] u32),

    /// Total price overflowed.
    #[display("price overflow")]
    Overflow,
}

/// Inclusive range of days a [`Listing`] may be rented for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RentDays {
    /// Minimal number of days.
    min: u32,

    /// Maximal number of days.
    max: u32,
}

impl RentDays {
    /// Creates a new [`RentDays`] range if `0 < min <= max`.
    #[must_use]
    pub fn new(min: u32, max: u32) -> Option<Self> {
        (min > 0 && min <= max).then_some(Self { min, max })
    }

    /// Returns the minimal number of days.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Returns the maximal number of days.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Indicates whether the provided number of `days` is within this range.
    #[must_use]
    pub const fn contains(&self, days: u32) -> bool {
        self.min <= days && days <= self.max
    }
}

/// Size label of a [`Listing`] item (e.g. `M`, `42`, `XL`).
#[derive(
    AsRef, Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Size(String);

impl Size {
    /// Creates a new [`Size`] if the given `label` is valid.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Option<Self> {
        let label = label.into();
        Self::check(&label).then_some(Self(label))
    }

    /// Checks whether the given `label` is a valid [`Size`].
    fn check(label: impl AsRef<str>) -> bool {
        let label = label.as_ref();
        label.trim() == label && !label.is_empty() && label.len() <= 16
    }
}

impl FromStr for Size {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Size`")
    }
}

/// URL of an uploaded image.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ImageUrl(String);

impl ImageUrl {
    /// Creates a new [`ImageUrl`] if the given `url` is an HTTP(S) URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        Self::check(&url).then_some(Self(url))
    }

    /// Checks whether the given `url` is a valid [`ImageUrl`].
    fn check(url: impl AsRef<str>) -> bool {
        let url = url.as_ref();
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        rest.is_some_and(|r| !r.is_empty() && !r.contains(char::is_whitespace))
            && url.len() <= 2048
    }
}

impl FromStr for ImageUrl {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `ImageUrl`")
    }
}

/// Descriptive metadata of a [`Listing`] item.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Details {
    /// [`Title`] of the item.
    pub title: Title,

    /// Category of the item (e.g. `Dresses`).
    pub category: Option<Tag>,

    /// Season the item suits.
    pub season: Option<Tag>,

    /// Occasion the item suits.
    pub occasion: Option<Tag>,

    /// Color of the item.
    pub color: Option<Tag>,

    /// Gender the item is designed for.
    pub gender: Option<Tag>,
}

/// Title of a [`Listing`] item.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        Self::check(&title).then_some(Self(title))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: impl AsRef<str>) -> bool {
        let title = title.as_ref();
        title.trim() == title && !title.is_empty() && title.len() <= 256
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Free-form classification value of a [`Listing`] item.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Tag(String);

impl Tag {
    /// Creates a new [`Tag`] if the given `tag` is valid.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        (tag.trim() == tag && !tag.is_empty() && tag.len() <= 64)
            .then_some(Self(tag))
    }
}

impl FromStr for Tag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Tag`")
    }
}

/// Comment left under a [`Listing`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    /// ID of the [`User`] who left this [`Comment`].
    pub author_id: user::Id,

    /// Text of this [`Comment`].
    pub text: record::Note,

    /// [`DateTime`] when this [`Comment`] was left.
    pub created_at: CommentDateTime,
}

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;

/// [`DateTime`] when a [`Listing`] was deleted.
pub type DeletionDateTime = DateTimeOf<(Listing, unit::Deletion)>;

/// [`DateTime`] when a [`Comment`] was left.
pub type CommentDateTime = DateTimeOf<(Comment, unit::Creation)>;

#[cfg(test)]
mod spec {
    use common::Money;

    use super::{ImageUrl, RentDays, SaleOption, Terms, TermsError};

    fn usd(cents: i64) -> Money {
        Money::usd_cents(cents).unwrap()
    }

    #[test]
    fn terms_require_prices_of_sale_option() {
        assert!(Terms::new(SaleOption::Purchase, None, Some(usd(100)), None)
            .is_none());
        assert!(Terms::new(SaleOption::Rent, Some(usd(100)), None, None)
            .is_none());
        assert!(
            Terms::new(SaleOption::PurchaseOrRent, Some(usd(100)), None, None)
                .is_none()
        );
        assert!(Terms::new(SaleOption::Rent, None, Some(usd(100)), None)
            .is_some());
    }

    #[test]
    fn purchase_only_rejects_duration() {
        let terms =
            Terms::new(SaleOption::Purchase, Some(usd(5000)), None, None)
                .unwrap();

        assert_eq!(terms.quote(Some(3)), Err(TermsError::NotRentable));
        assert_eq!(terms.quote(None).unwrap().price, usd(5000));
    }

    #[test]
    fn rent_only_requires_duration() {
        let terms =
            Terms::new(SaleOption::Rent, None, Some(usd(2000)), None).unwrap();

        assert_eq!(terms.quote(None), Err(TermsError::NotPurchasable));
        assert_eq!(terms.quote(Some(5)).unwrap().price, usd(10_000));
    }

    #[test]
    fn rent_days_bound_duration() {
        let terms = Terms::new(
            SaleOption::PurchaseOrRent,
            Some(usd(8000)),
            Some(usd(1000)),
            RentDays::new(2, 7),
        )
        .unwrap();

        assert_eq!(terms.quote(Some(0)), Err(TermsError::DaysOutOfRange(0)));
        assert_eq!(terms.quote(Some(1)), Err(TermsError::DaysOutOfRange(1)));
        assert_eq!(terms.quote(Some(8)), Err(TermsError::DaysOutOfRange(8)));
        assert_eq!(terms.quote(Some(7)).unwrap().price, usd(7000));
    }

    #[test]
    fn validates_image_urls() {
        assert!(ImageUrl::new("https://cdn.example.com/a.jpg").is_some());
        assert!(ImageUrl::new("ftp://cdn.example.com/a.jpg").is_none());
        assert!(ImageUrl::new("https://").is_none());
        assert!(ImageUrl::new("https://a b").is_none());
    }
}
