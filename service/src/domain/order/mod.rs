//! [`Order`] definitions.

pub mod record;

use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::record::Record;

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user;

/// Chain of [`Record`]s describing one transaction attempt from its request
/// till its completion.
///
/// Each step of an [`Order`] creates a new [`Record`] in the inbox of the
/// next party, so the [`Order`] is never stored as a whole.
#[derive(Clone, Debug)]
pub struct Order {
    /// ID of this [`Order`].
    pub id: Id,

    /// [`Record`]s of this [`Order`] ordered by their creation.
    pub records: Vec<Record>,
}

impl Order {
    /// Assembles an [`Order`] out of its [`Record`]s.
    ///
    /// [`None`] is returned if no `records` provided.
    #[must_use]
    pub fn new(id: Id, mut records: Vec<Record>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        records.sort_by_key(|r| (r.created_at, r.transition.u8()));
        Some(Self { id, records })
    }

    /// Returns the current [`Stage`] of this [`Order`].
    ///
    /// [`None`] is returned if this [`Order`] is not a fulfillment workflow
    /// (a like or a comment notification).
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        Stage::of(&self.records)
    }

    /// Returns the [`Record`] of this [`Order`] with the provided ID.
    #[must_use]
    pub fn record(&self, id: record::Id) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Returns the [`Record`] awaiting an action of the `initiator_id`.
    ///
    /// The [`Record`] must be created by the `from` [`record::Transition`]
    /// and this [`Order`] must be at the provided [`Stage`].
    ///
    /// # Errors
    ///
    /// - [`TransitionError::RecordNotExists`] if no such [`Record`] in the
    ///   recipient inbox;
    /// - [`TransitionError::NotRecipient`] if the [`Record`] is addressed to
    ///   another [`User`];
    /// - [`TransitionError::Invalid`] if the [`Record`] or this [`Order`] are
    ///   not in the expected state.
    pub fn pending(
        &self,
        record_id: record::Id,
        initiator_id: user::Id,
        from: record::Transition,
        stage: Stage,
    ) -> Result<&Record, TransitionError> {
        use TransitionError as E;

        let record = self
            .record(record_id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(E::RecordNotExists(record_id))?;
        if record.recipient_id != initiator_id {
            return Err(E::NotRecipient(record_id));
        }
        if record.transition != from || self.stage() != Some(stage) {
            return Err(E::Invalid(record_id));
        }
        Ok(record)
    }
}

/// Error of advancing an [`Order`] to its next [`Stage`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum TransitionError {
    /// Action is not allowed for the [`Record`] in its current state.
    #[display("`Record(id: {_0})` does not allow this action")]
    Invalid(#[error(not(source))] record::Id),

    /// [`Record`] is addressed to another [`User`].
    #[display("`Record(id: {_0})` is addressed to another `User`")]
    NotRecipient(#[error(not(source))] record::Id),

    /// [`Record`] does not exist.
    #[display("`Record(id: {_0})` does not exist")]
    RecordNotExists(#[error(not(source))] record::Id),
}

/// ID of an [`Order`] correlating all of its [`Record`]s.
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

/// Stage of an [`Order`] fulfillment.
///
/// ```text
/// AdminReview --approve--> SellerActionPending
/// SellerActionPending --fulfill--> BuyerConfirmed
/// SellerActionPending --decline--> Cancelled
/// BuyerConfirmed --return--> SellerReturnReceived (rent only)
/// ```
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Stage {
    /// Request awaits the admin approval.
    AdminReview,

    /// Approved request awaits the seller to ship the item.
    SellerActionPending,

    /// Item is shipped to the buyer.
    ///
    /// Terminal for purchases.
    BuyerConfirmed,

    /// Rented item is shipped back to the seller.
    SellerReturnReceived,

    /// Seller declined to fulfill the request.
    Cancelled,
}

impl Stage {
    /// Derives the [`Stage`] out of the provided [`Record`]s of a single
    /// [`Order`].
    ///
    /// [`None`] is returned if there are no fulfillment [`Record`]s.
    #[must_use]
    pub fn of<'r>(records: impl IntoIterator<Item = &'r Record>) -> Option<Self> {
        use record::Transition as T;

        let latest = records
            .into_iter()
            .filter(|r| r.transition.is_fulfillment())
            .max_by_key(|r| r.transition.u8())?;
        Some(match latest.transition {
            T::Requested => Self::AdminReview,
            T::Approved if latest.deleted_at.is_some() => Self::Cancelled,
            T::Approved => Self::SellerActionPending,
            T::Fulfilled => Self::BuyerConfirmed,
            T::Returned => Self::SellerReturnReceived,
            T::Liked | T::Commented => return None,
        })
    }

    /// Indicates whether no further transitions are possible from this
    /// [`Stage`] for an [`Order`] of the provided [`record::Kind`].
    #[must_use]
    pub fn is_terminal(self, kind: record::Kind) -> bool {
        match self {
            Self::AdminReview | Self::SellerActionPending => false,
            Self::BuyerConfirmed => kind != record::Kind::Rent,
            Self::SellerReturnReceived | Self::Cancelled => true,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use super::{
        record::{Kind, Transition},
        Order, Stage, TransitionError,
    };
    use crate::domain::order::record::spec::record;

    #[test]
    fn stage_follows_latest_transition() {
        let requested = record(Kind::Rent, Transition::Requested);
        let approved = requested.forward(
            Transition::Approved,
            requested.seller_id,
            requested.recipient_id,
            requested.actor_name.clone(),
        );

        assert_eq!(Stage::of([&requested]), Some(Stage::AdminReview));
        assert_eq!(
            Stage::of([&requested, &approved]),
            Some(Stage::SellerActionPending),
        );

        let fulfilled = approved.forward(
            Transition::Fulfilled,
            requested.actor_id,
            requested.seller_id,
            requested.actor_name.clone(),
        );
        let order = Order::new(
            requested.order_id,
            vec![fulfilled, approved.clone(), requested.clone()],
        )
        .unwrap();
        assert_eq!(order.stage(), Some(Stage::BuyerConfirmed));
        assert_eq!(order.records[0].transition, Transition::Requested);
        assert!(!Stage::BuyerConfirmed.is_terminal(Kind::Rent));
        assert!(Stage::BuyerConfirmed.is_terminal(Kind::Purchase));
    }

    #[test]
    fn declined_approval_cancels() {
        let requested = record(Kind::Purchase, Transition::Requested);
        let mut approved = requested.forward(
            Transition::Approved,
            requested.seller_id,
            requested.recipient_id,
            requested.actor_name.clone(),
        );
        approved.deleted_at = Some(DateTime::now().coerce());

        assert_eq!(Stage::of([&requested, &approved]), Some(Stage::Cancelled));
    }

    #[test]
    fn notifications_have_no_stage() {
        let liked = record(Kind::Like, Transition::Liked);

        assert_eq!(Stage::of([&liked]), None);
        assert!(Order::new(liked.order_id, vec![]).is_none());
    }

    #[test]
    fn pending_checks_recipient_and_stage() {
        let requested = record(Kind::Purchase, Transition::Requested);
        let admin = requested.recipient_id;
        let approved = requested.forward(
            Transition::Approved,
            requested.seller_id,
            admin,
            requested.actor_name.clone(),
        );
        let order = Order::new(
            requested.order_id,
            vec![requested.clone(), approved.clone()],
        )
        .unwrap();

        assert_eq!(
            order
                .pending(
                    approved.id,
                    requested.seller_id,
                    Transition::Approved,
                    Stage::SellerActionPending,
                )
                .unwrap()
                .id,
            approved.id,
        );
        assert_eq!(
            order.pending(
                approved.id,
                admin,
                Transition::Approved,
                Stage::SellerActionPending,
            ),
            Err(TransitionError::NotRecipient(approved.id)),
        );
        // Already approved, so cannot be approved twice.
        assert_eq!(
            order.pending(
                requested.id,
                admin,
                Transition::Requested,
                Stage::AdminReview,
            ),
            Err(TransitionError::Invalid(requested.id)),
        );
    }
}
