//! [`Command`] for approving a requested [`Order`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        order::{self, record, Stage, TransitionError},
        user, Order, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for approving a requested [`Order`] by the admin.
///
/// Forwards the request to the seller asking to ship the item.
#[derive(Clone, Copy, Debug)]
pub struct ApproveOrder {
    /// ID of the requesting [`Record`] in the admin inbox.
    pub record_id: record::Id,

    /// ID of the admin [`User`] approving the [`Order`].
    pub admin_id: user::Id,
}

impl<Db, N> Command<ApproveOrder> for Service<Db, N>
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

    async fn execute(&self, cmd: ApproveOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveOrder {
            record_id,
            admin_id,
        } = cmd;

        if admin_id != self.config().admin_id {
            return Err(tracerr::new!(E::NotAdmin(admin_id)));
        }
        let admin = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(admin_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(admin_id))
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
        let requested = order
            .pending(
                record_id,
                admin.id,
                record::Transition::Requested,
                Stage::AdminReview,
            )
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let approved = requested.forward(
            record::Transition::Approved,
            requested.seller_id,
            admin.id,
            admin.name.clone(),
        );
        tx.execute(Insert(approved.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(self.dispatch(approved).await)
    }
}

/// Error of [`ApproveOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`User`] is not the admin.
    #[display("`User(id: {_0})` is not the admin")]
    NotAdmin(#[error(not(source))] user::Id),

    /// [`Order`] cannot be approved.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::operations::Insert;

    use crate::{
        command::{request_order, RequestOrder},
        domain::{
            listing::{self, SaleOption},
            order::{record::Transition, TransitionError},
            user, User,
        },
        infra::Database as _,
        Command as _,
    };

    use super::{ApproveOrder, ExecutionError};

    #[tokio::test]
    async fn forwards_request_to_seller_once() {
        let svc = crate::spec::service();
        let mut admin = User::new(user::Name::new("froc").unwrap());
        admin.id = svc.config().admin_id;
        let buyer = User::new(user::Name::new("buyer").unwrap());
        let seller = User::new(user::Name::new("seller").unwrap());
        let listing = request_order::spec::listing(&seller, SaleOption::Rent);
        for u in [&admin, &buyer, &seller] {
            svc.database().execute(Insert(u.clone())).await.unwrap();
        }
        svc.database().execute(Insert(listing.clone())).await.unwrap();
        let requested = svc
            .execute(RequestOrder {
                buyer_id: buyer.id,
                listing_id: listing.id,
                size: listing::Size::new("M").unwrap(),
                rent_days: Some(2),
                note: None,
                venmo_handle: None,
            })
            .await
            .unwrap()
            .record;

        let approved = svc
            .execute(ApproveOrder {
                record_id: requested.id,
                admin_id: admin.id,
            })
            .await
            .unwrap()
            .record;

        assert_eq!(approved.recipient_id, seller.id);
        assert_eq!(approved.transition, Transition::Approved);
        assert_eq!(approved.order_id, requested.order_id);
        assert_eq!(approved.price, requested.price);
        assert_eq!(approved.size, requested.size);
        assert_eq!(approved.buyer, requested.buyer);

        let err = svc
            .execute(ApproveOrder {
                record_id: requested.id,
                admin_id: admin.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::Invalid(_)),
        ));

        let err = svc
            .execute(ApproveOrder {
                record_id: requested.id,
                admin_id: buyer.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotAdmin(_)));
    }
}
