//! [`Command`] for requesting an [`Order`].

use common::operations::{By, Insert, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Order;
use crate::{
    domain::{
        listing::{self, TermsError},
        order::{
            self,
            record::{self, ActionText, BuyerSnapshot, RentDuration},
        },
        user, Listing, Record, User,
    },
    infra::{database, Database},
    Service,
};

use super::{deliver_notification, Command, DeliverNotification, Dispatched};

/// [`Command`] for requesting an [`Order`] of a [`Listing`] item.
///
/// The request is routed to the admin for review, never to the seller
/// directly.
#[derive(Clone, Debug)]
pub struct RequestOrder {
    /// ID of the [`User`] buying or renting the item.
    pub buyer_id: user::Id,

    /// ID of the requested [`Listing`].
    pub listing_id: listing::Id,

    /// Requested [`listing::Size`].
    pub size: listing::Size,

    /// Number of days to rent the item for.
    ///
    /// [`None`] requests a purchase.
    pub rent_days: Option<u32>,

    /// [`record::Note`] to the seller.
    pub note: Option<record::Note>,

    /// [`user::VenmoHandle`] the buyer pays from.
    ///
    /// Defaults to the one of the buyer profile.
    pub venmo_handle: Option<user::VenmoHandle>,
}

impl<Db, N> Command<RequestOrder> for Service<Db, N>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<Insert<Record>, Ok = (), Err = Traced<database::Error>>,
    Self: Command<
        DeliverNotification,
        Ok = record::Delivery,
        Err = Traced<deliver_notification::ExecutionError>,
    >,
{
    type Ok = Dispatched;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RequestOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RequestOrder {
            buyer_id,
            listing_id,
            size,
            rent_days,
            note,
            venmo_handle,
        } = cmd;

        let buyer = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(buyer_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(buyer_id))
            .map_err(tracerr::wrap!())?;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        if listing.owner_id == buyer.id {
            return Err(tracerr::new!(E::OwnListing(listing_id)));
        }

        // Listings of a blocking seller are invisible to the blocked buyer.
        self.database()
            .execute(Select(By::<Option<User>, _>::new(listing.owner_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|owner| !owner.has_blocked(buyer.id))
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        if !listing.has_size(&size) {
            return Err(tracerr::new!(E::SizeUnavailable(size)));
        }
        let quote = listing
            .terms
            .quote(rent_days)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let kind = quote.kind;
        let transition = record::Transition::Requested;
        let record = Record {
            id: record::Id::new(),
            order_id: order::Id::new(),
            recipient_id: self.config().admin_id,
            actor_id: buyer.id,
            actor_name: buyer.name.clone(),
            kind,
            transition,
            action_text: ActionText::new(transition, kind),
            listing_id,
            seller_id: listing.owner_id,
            product_info: listing.details.title.clone().into(),
            price: Some(quote.price),
            size: Some(size),
            rent_duration: rent_days
                .filter(|_| kind == record::Kind::Rent)
                .map(RentDuration::from_days),
            note,
            venmo_handle: venmo_handle.or_else(|| buyer.venmo_handle.clone()),
            buyer: Some(BuyerSnapshot::from(&buyer)),
            image_urls: listing.image_urls.clone(),
            ship_proof: None,
            expected_arrival_at: None,
            expected_return_at: None,
            is_new: true,
            created_at: record::CreationDateTime::now(),
            notified_at: None,
            delivery_attempts: record::DeliveryAttempts::default(),
            deleted_at: None,
        };
        self.database()
            .execute(Insert(record.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(self.dispatch(record).await)
    }
}

/// Error of [`RequestOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] doesn't exist or is hidden from the buyer.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Buyer owns the [`Listing`].
    #[display("`Listing(id: {_0})` cannot be ordered by its owner")]
    OwnListing(#[error(not(source))] listing::Id),

    /// [`Listing`] item is not available in the requested size.
    #[display("size `{_0}` is not available")]
    SizeUnavailable(#[error(not(source))] listing::Size),

    /// [`Listing`] terms don't allow the requested order.
    #[display("{_0}")]
    #[from]
    Terms(TermsError),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
pub(crate) mod spec {
    use std::collections::{BTreeSet, HashSet};

    use common::{operations::Insert, Money};

    use crate::{
        domain::{
            listing::{self, SaleOption, TermsError},
            order::record::{Kind, Transition},
            user, Listing, User,
        },
        infra::{database, notifier, Database as _},
        Command as _, Service,
    };

    use super::{ExecutionError, RequestOrder};

    /// Creates a [`Listing`] owned by the provided [`User`].
    pub(crate) fn listing(owner: &User, sale_option: SaleOption) -> Listing {
        let usd = |c| Money::usd_cents(c).unwrap();
        Listing {
            id: listing::Id::new(),
            owner_id: owner.id,
            image_urls: vec![
                listing::ImageUrl::new("https://cdn.froc.app/1.jpg").unwrap(),
            ],
            terms: listing::Terms::new(
                sale_option,
                sale_option.is_purchasable().then(|| usd(8000)),
                sale_option.is_rentable().then(|| usd(2000)),
                None,
            )
            .unwrap(),
            sizes: BTreeSet::from([listing::Size::new("M").unwrap()]),
            details: listing::Details {
                title: listing::Title::new("Silk dress").unwrap(),
                category: None,
                season: None,
                occasion: None,
                color: None,
                gender: None,
            },
            liked_by: HashSet::new(),
            comments: vec![],
            created_at: listing::CreationDateTime::now(),
            deleted_at: None,
        }
    }

    async fn seeded(
        sale_option: SaleOption,
    ) -> (Service<database::Memory, notifier::Memory>, User, User, Listing)
    {
        let svc = crate::spec::service();
        let mut buyer = User::new(user::Name::new("buyer").unwrap());
        buyer.venmo_handle = user::VenmoHandle::new("buyer-pays");
        let seller = User::new(user::Name::new("seller").unwrap());
        let listing = listing(&seller, sale_option);
        svc.database().execute(Insert(buyer.clone())).await.unwrap();
        svc.database().execute(Insert(seller.clone())).await.unwrap();
        svc.database().execute(Insert(listing.clone())).await.unwrap();
        (svc, buyer, seller, listing)
    }

    fn request(buyer: &User, listing: &Listing) -> RequestOrder {
        RequestOrder {
            buyer_id: buyer.id,
            listing_id: listing.id,
            size: listing::Size::new("M").unwrap(),
            rent_days: None,
            note: None,
            venmo_handle: None,
        }
    }

    #[tokio::test]
    async fn routes_rent_request_to_admin() {
        let (svc, buyer, seller, listing) = seeded(SaleOption::Rent).await;

        let rec = svc
            .execute(RequestOrder {
                rent_days: Some(5),
                ..request(&buyer, &listing)
            })
            .await
            .unwrap()
            .record;

        assert_eq!(rec.recipient_id, svc.config().admin_id);
        assert_eq!(rec.seller_id, seller.id);
        assert_eq!(rec.kind, Kind::Rent);
        assert_eq!(rec.transition, Transition::Requested);
        assert_eq!(rec.price, Money::usd_cents(10_000));
        assert_eq!(rec.rent_duration.as_ref().unwrap().days(), Ok(5));
        assert_eq!(rec.buyer_id(), Some(buyer.id));
        assert_eq!(rec.venmo_handle, buyer.venmo_handle);
        assert!(rec.is_new);
    }

    #[tokio::test]
    async fn purchase_rejects_duration() {
        let (svc, buyer, _, listing) = seeded(SaleOption::Purchase).await;

        let err = svc
            .execute(RequestOrder {
                rent_days: Some(3),
                ..request(&buyer, &listing)
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Terms(TermsError::NotRentable),
        ));
    }

    #[tokio::test]
    async fn rejects_unavailable_size() {
        let (svc, buyer, _, listing) = seeded(SaleOption::Purchase).await;

        let err = svc
            .execute(RequestOrder {
                size: listing::Size::new("XXL").unwrap(),
                ..request(&buyer, &listing)
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::SizeUnavailable(_)));
    }

    #[tokio::test]
    async fn hides_listing_of_blocking_seller() {
        let (svc, buyer, mut seller, listing) =
            seeded(SaleOption::Purchase).await;
        _ = seller.blocked.insert(buyer.id);
        svc.database().execute(Insert(seller)).await.unwrap();

        let err = svc.execute(request(&buyer, &listing)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::ListingNotExists(_)));
    }

    #[tokio::test]
    async fn rejects_own_listing() {
        let (svc, _, seller, listing) = seeded(SaleOption::Purchase).await;

        let err = svc.execute(request(&seller, &listing)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::OwnListing(_)));
    }
}
