//! [`Command`] for returning a rented item.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing::ImageUrl,
        order::{self, record, Stage, TransitionError},
        user, Order, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for returning a rented item to its seller by the buyer.
///
/// Completes a rent [`Order`], purchases cannot be returned.
#[derive(Clone, Debug)]
pub struct ReturnOrder {
    /// ID of the fulfilled [`Record`] in the buyer inbox.
    pub record_id: record::Id,

    /// ID of the buyer [`User`].
    pub buyer_id: user::Id,

    /// Photo proving the item was shipped back.
    pub ship_proof: Option<ImageUrl>,
}

impl<Db, N> Command<ReturnOrder> for Service<Db, N>
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
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Self: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    type Ok = Dispatched;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ReturnOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ReturnOrder {
            record_id,
            buyer_id,
            ship_proof,
        } = cmd;

        let ship_proof = ship_proof
            .ok_or(E::MissingShipmentProof)
            .map_err(tracerr::wrap!())?;

        let buyer = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(buyer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(buyer_id))
            .map_err(tracerr::wrap!())?;

        let consumed = self
            .database()
            .execute(Select(By::<Option<Record>, _>::new(record_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?;
        if consumed.kind != record::Kind::Rent {
            return Err(tracerr::new!(E::Transition(TransitionError::Invalid(
                record_id
            ))));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Order`.
        tx.execute(Lock(By::new(consumed.order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(consumed.order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(TransitionError::RecordNotExists(record_id))
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let fulfilled = order
            .pending(
                record_id,
                buyer.id,
                record::Transition::Fulfilled,
                Stage::BuyerConfirmed,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let returned = Record {
            ship_proof: Some(ship_proof),
            note: None,
            ..fulfilled.forward(
                record::Transition::Returned,
                fulfilled.seller_id,
                buyer.id,
                buyer.name.clone(),
            )
        };
        tx.execute(Insert(returned.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(self.dispatch(returned).await)
    }
}

/// Error of [`ReturnOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// No photo of the shipped back item provided.
    #[display("shipment proof is required")]
    MissingShipmentProof,

    /// Item cannot be returned.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
