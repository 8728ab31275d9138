//! [`Command`] for fulfilling an approved [`Order`].

use common::{
    operations::{
        By, Commit, Increment, Insert, Lock, Select, Transact, Transacted,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        listing::ImageUrl,
        order::{self, record, Stage, TransitionError},
        pricing, user, Order, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for fulfilling an approved [`Order`] by the seller.
///
/// Confirms the shipment to the buyer and counts the [`Order`] in the buyer
/// profile.
#[derive(Clone, Debug)]
pub struct FulfillOrder {
    /// ID of the approved [`Record`] in the seller inbox.
    pub record_id: record::Id,

    /// ID of the seller [`User`].
    pub seller_id: user::Id,

    /// Photo proving the item was shipped.
    pub ship_proof: Option<ImageUrl>,

    /// [`record::Note`] to the buyer.
    pub note: Option<record::Note>,
}

impl<Db, N> Command<FulfillOrder> for Service<Db, N>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Record>, record::Id>>,
            Ok = Option<Record>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<Insert<Record>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Increment<By<user::BuyRentCount, user::Id>>,
            Ok = Option<user::BuyRentCount>,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Self: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    type Ok = Dispatched;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: FulfillOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let FulfillOrder {
            record_id,
            seller_id,
            ship_proof,
            note,
        } = cmd;

        let ship_proof = ship_proof
            .ok_or(E::MissingShipmentProof)
            .map_err(tracerr::wrap!())?;

        let seller = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(seller_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(seller_id))
            .map_err(tracerr::wrap!())?;

        let order_id = self
            .database()
            .execute(Select(By::<Option<Record>, _>::new(record_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?
            .order_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let approved = order
            .pending(
                record_id,
                seller.id,
                record::Transition::Approved,
                Stage::SellerActionPending,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let buyer_id = approved
            .buyer_id()
            .ok_or(TransitionError::Invalid(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let now = DateTime::now();
        let expected_return_at = if approved.kind == record::Kind::Rent {
            let days = approved
                .rent_duration
                .as_ref()
                .map(record::RentDuration::days);
            match days {
                Some(Ok(days)) => Some(pricing::expected_return(now, days)),
                Some(Err(e)) => {
                    log::warn!(
                        "no return date for `Order(id: {order_id})`: {e}"
                    );
                    None
                }
                None => {
                    log::warn!(
                        "no return date for `Order(id: {order_id})`: \
                         rent duration is missing"
                    );
                    None
                }
            }
        } else {
            None
        };

        let fulfilled = Record {
            ship_proof: Some(ship_proof),
            note,
            expected_arrival_at: Some(pricing::expected_arrival(now)),
            expected_return_at,
            created_at: now.coerce(),
            ..approved.forward(
                record::Transition::Fulfilled,
                buyer_id,
                seller.id,
                seller.name.clone(),
            )
        };
        let count = tx
            .execute(Increment(By::<user::BuyRentCount, _>::new(buyer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if count.is_none() {
            log::warn!(
                "`User(id: {buyer_id})` is gone, \
                 `Order(id: {order_id})` is not counted"
            );
        }

        tx.execute(Insert(fulfilled.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(self.dispatch(fulfilled).await)
    }
}

/// Error of [`FulfillOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No photo of the shipped item provided.
    #[display("shipment proof is required")]
    MissingShipmentProof,

    /// [`Order`] cannot be fulfilled.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
