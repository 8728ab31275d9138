//! End-to-end scenarios of the order fulfillment workflow.

use std::collections::{BTreeSet, HashSet};

use common::{
    operations::{By, Insert, Select},
    Money,
};
use futures::future;
use service::{
    command::{
        fulfill_order, return_order, ApproveOrder, DeclineOrder, FulfillOrder,
        MarkInboxRead, RequestOrder, ReturnOrder,
    },
    domain::{
        listing::{self, SaleOption, TermsError},
        order::{
            self,
            record::{self, Kind, Transition},
            Stage, TransitionError,
        },
        user, Listing, Record, User,
    },
    infra::{database, notifier, Database as _},
    query, task, Command as _, Config, Query as _, Service,
};

type Svc = Service<database::Memory, notifier::Memory>;

struct World {
    svc: Svc,
    admin: User,
    buyer: User,
    seller: User,
}

impl World {
    async fn new() -> Self {
        let admin = User::new(user::Name::new("froc").unwrap());
        let mut buyer = User::new(user::Name::new("buyer").unwrap());
        buyer.push_token = user::PushToken::new("buyer-device");
        buyer.venmo_handle = user::VenmoHandle::new("buyer-pays");
        let mut seller = User::new(user::Name::new("seller").unwrap());
        seller.push_token = user::PushToken::new("seller-device");

        let (svc, _background) = Service::new(
            Config {
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    b"secret",
                ),
                admin_id: admin.id,
                redeliver_notifications:
                    task::redeliver_notifications::Config::default(),
            },
            database::Memory::new(),
            notifier::Memory::new(),
        );
        for u in [&admin, &buyer, &seller] {
            svc.database().execute(Insert(u.clone())).await.unwrap();
        }

        Self {
            svc,
            admin,
            buyer,
            seller,
        }
    }

    async fn listing(&self, sale_option: SaleOption) -> Listing {
        let usd = |c| Money::usd_cents(c).unwrap();
        let listing = Listing {
            id: listing::Id::new(),
            owner_id: self.seller.id,
            image_urls: vec![listing::ImageUrl::new(
                "https://cdn.froc.app/dress.jpg",
            )
            .unwrap()],
            terms: listing::Terms::new(
                sale_option,
                sale_option.is_purchasable().then(|| usd(12_000)),
                sale_option.is_rentable().then(|| usd(2_000)),
                None,
            )
            .unwrap(),
            sizes: BTreeSet::from([listing::Size::new("S").unwrap()]),
            details: listing::Details {
                title: listing::Title::new("Linen dress").unwrap(),
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
        };
        self.svc
            .database()
            .execute(Insert(listing.clone()))
            .await
            .unwrap();
        listing
    }

    /// Requests the provided [`Listing`] and approves the request, returning
    /// the [`Record`] awaiting the seller.
    async fn approved(&self, listing: &Listing, rent_days: Option<u32>) -> Record {
        let requested = self
            .svc
            .execute(RequestOrder {
                buyer_id: self.buyer.id,
                listing_id: listing.id,
                size: listing::Size::new("S").unwrap(),
                rent_days,
                note: None,
                venmo_handle: None,
            })
            .await
            .unwrap()
            .record;
        self.svc
            .execute(ApproveOrder {
                record_id: requested.id,
                admin_id: self.admin.id,
            })
            .await
            .unwrap()
            .record
    }

    async fn fulfill(
        &self,
        approved: &Record,
    ) -> Result<Record, tracerr::Traced<fulfill_order::ExecutionError>> {
        self.svc
            .execute(FulfillOrder {
                record_id: approved.id,
                seller_id: self.seller.id,
                ship_proof: listing::ImageUrl::new(
                    "https://cdn.froc.app/proof.jpg",
                ),
                note: record::Note::new("Enjoy!"),
            })
            .await
            .map(|d| d.record)
    }

    async fn buy_rent_count(&self) -> user::BuyRentCount {
        self.svc
            .database()
            .execute(Select(By::<Option<User>, _>::new(self.buyer.id)))
            .await
            .unwrap()
            .unwrap()
            .buy_rent_count
    }

    async fn stage(&self, id: order::Id) -> Option<Stage> {
        self.svc
            .execute(query::order::ById::by(id))
            .await
            .unwrap()
            .and_then(|o| o.stage())
    }
}

#[tokio::test]
async fn rent_goes_through_every_stage() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;
    let before = w.buy_rent_count().await;

    let requested = w
        .svc
        .execute(RequestOrder {
            buyer_id: w.buyer.id,
            listing_id: listing.id,
            size: listing::Size::new("S").unwrap(),
            rent_days: Some(5),
            note: record::Note::new("For a wedding"),
            venmo_handle: None,
        })
        .await
        .unwrap()
        .record;
    assert_eq!(requested.recipient_id, w.admin.id);
    assert_eq!(requested.kind, Kind::Rent);
    assert_eq!(requested.price, Money::usd_cents(10_000));
    assert_eq!(
        requested.rent_duration.as_ref().map(|d| d.days()),
        Some(Ok(5)),
    );
    assert_eq!(w.stage(requested.order_id).await, Some(Stage::AdminReview));

    let approved = w
        .svc
        .execute(ApproveOrder {
            record_id: requested.id,
            admin_id: w.admin.id,
        })
        .await
        .unwrap()
        .record;
    assert_eq!(approved.recipient_id, w.seller.id);
    assert_eq!(
        approved.notification_text(),
        "froc approved an order, please ship the item",
    );
    assert_eq!(
        w.stage(approved.order_id).await,
        Some(Stage::SellerActionPending),
    );

    let fulfilled = w.fulfill(&approved).await.unwrap();
    assert_eq!(fulfilled.recipient_id, w.buyer.id);
    assert_eq!(
        fulfilled.expected_arrival_at,
        Some(fulfilled.created_at.coerce().add_days(3)),
    );
    assert_eq!(
        fulfilled.expected_return_at,
        Some(fulfilled.created_at.coerce().add_days(8)),
    );
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(before) + 1,
    );
    assert_eq!(
        w.stage(fulfilled.order_id).await,
        Some(Stage::BuyerConfirmed),
    );

    let returned = w
        .svc
        .execute(ReturnOrder {
            record_id: fulfilled.id,
            buyer_id: w.buyer.id,
            ship_proof: listing::ImageUrl::new("https://cdn.froc.app/back.jpg"),
        })
        .await
        .unwrap()
        .record;
    assert_eq!(returned.kind, Kind::Return);
    assert_eq!(returned.transition, Transition::Returned);
    assert_eq!(returned.recipient_id, w.seller.id);
    assert_eq!(
        w.stage(returned.order_id).await,
        Some(Stage::SellerReturnReceived),
    );

    let sent = w.svc.notifier().sent();
    assert_eq!(sent.len(), 3, "admin has no push token");
    assert!(sent.iter().all(|n| n.title == "Linen dress"));
}

#[tokio::test]
async fn longer_rent_is_returned_later() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;

    let approved = w.approved(&listing, Some(7)).await;
    assert_eq!(approved.price, Money::usd_cents(14_000));
    let fulfilled = w.fulfill(&approved).await.unwrap();

    assert_eq!(
        fulfilled.expected_return_at,
        Some(fulfilled.created_at.coerce().add_days(10)),
    );
}

#[tokio::test]
async fn purchase_has_no_return_date() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;

    let approved = w.approved(&listing, None).await;
    assert_eq!(approved.kind, Kind::Purchase);
    assert_eq!(approved.price, Money::usd_cents(12_000));
    let fulfilled = w.fulfill(&approved).await.unwrap();

    assert!(fulfilled.expected_arrival_at.is_some());
    assert_eq!(fulfilled.expected_return_at, None);
    assert_eq!(
        w.stage(fulfilled.order_id).await,
        Some(Stage::BuyerConfirmed),
    );
}

#[tokio::test]
async fn purchase_rejects_rent_duration() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;

    let err = w
        .svc
        .execute(RequestOrder {
            buyer_id: w.buyer.id,
            listing_id: listing.id,
            size: listing::Size::new("S").unwrap(),
            rent_days: Some(3),
            note: None,
            venmo_handle: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_ref(),
        service::command::request_order::ExecutionError::Terms(
            TermsError::NotRentable
        ),
    ));
}

#[tokio::test]
async fn purchase_cannot_be_returned() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;
    let fulfilled = w.fulfill(&w.approved(&listing, None).await).await.unwrap();

    let err = w
        .svc
        .execute(ReturnOrder {
            record_id: fulfilled.id,
            buyer_id: w.buyer.id,
            ship_proof: listing::ImageUrl::new("https://cdn.froc.app/back.jpg"),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_ref(),
        return_order::ExecutionError::Transition(TransitionError::Invalid(id))
            if *id == fulfilled.id,
    ));
}

#[tokio::test]
async fn declined_order_never_reaches_buyer() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;
    let approved = w.approved(&listing, Some(2)).await;

    let declined = w
        .svc
        .execute(DeclineOrder {
            record_id: approved.id,
            seller_id: w.seller.id,
        })
        .await
        .unwrap();
    assert!(declined.deleted_at.is_some());
    assert_eq!(w.stage(approved.order_id).await, Some(Stage::Cancelled));

    let inbox = w
        .svc
        .execute(query::Inbox {
            user_id: w.buyer.id,
        })
        .await
        .unwrap();
    assert_eq!(inbox.unread.len() + inbox.read.len(), 0);

    let err = w.fulfill(&approved).await.unwrap_err();
    assert!(matches!(
        err.as_ref(),
        fulfill_order::ExecutionError::Transition(
            TransitionError::RecordNotExists(_)
        ),
    ));
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(w.buyer.buy_rent_count),
    );
}

#[tokio::test]
async fn order_is_fulfilled_once() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;
    let approved = w.approved(&listing, None).await;

    let (first, second) = tokio::join!(w.fulfill(&approved), w.fulfill(&approved));

    assert_eq!(
        usize::from(first.is_ok()) + usize::from(second.is_ok()),
        1,
        "exactly one fulfillment succeeds",
    );
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(w.buyer.buy_rent_count) + 1,
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fulfillments_are_all_counted() {
    const ORDERS: usize = 12;

    let w = World::new().await;
    let mut approved = Vec::with_capacity(ORDERS);
    for i in 0..ORDERS {
        let listing = if i % 2 == 0 {
            w.listing(SaleOption::Rent).await
        } else {
            w.listing(SaleOption::Purchase).await
        };
        let rent_days = (i % 2 == 0).then_some(3);
        approved.push(w.approved(&listing, rent_days).await);
    }

    let results =
        future::join_all(approved.iter().map(|rec| w.fulfill(rec))).await;

    assert!(results.iter().all(Result::is_ok), "no fulfillment fails");
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(w.buyer.buy_rent_count) + 12,
    );
    for rec in &approved {
        assert_eq!(
            w.stage(rec.order_id).await,
            Some(Stage::BuyerConfirmed),
        );
    }
}

#[tokio::test]
async fn fulfillment_requires_shipment_proof() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;
    let approved = w.approved(&listing, Some(3)).await;

    let err = w
        .svc
        .execute(FulfillOrder {
            record_id: approved.id,
            seller_id: w.seller.id,
            ship_proof: None,
            note: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_ref(),
        fulfill_order::ExecutionError::MissingShipmentProof,
    ));
    assert_eq!(
        w.stage(approved.order_id).await,
        Some(Stage::SellerActionPending),
    );
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(w.buyer.buy_rent_count),
    );
}

#[tokio::test]
async fn return_requires_shipment_proof() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;
    let fulfilled =
        w.fulfill(&w.approved(&listing, Some(3)).await).await.unwrap();

    let err = w
        .svc
        .execute(ReturnOrder {
            record_id: fulfilled.id,
            buyer_id: w.buyer.id,
            ship_proof: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.as_ref(),
        return_order::ExecutionError::MissingShipmentProof,
    ));
    assert_eq!(
        w.stage(fulfilled.order_id).await,
        Some(Stage::BuyerConfirmed),
    );
}

#[tokio::test]
async fn malformed_rent_duration_leaves_return_date_unknown() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Rent).await;
    let mut approved = w.approved(&listing, Some(3)).await;
    approved.rent_duration = Some(record::RentDuration::from_raw("a week"));
    w.svc
        .database()
        .execute(Insert(approved.clone()))
        .await
        .unwrap();

    let fulfilled = w.fulfill(&approved).await.unwrap();

    assert!(fulfilled.expected_arrival_at.is_some());
    assert_eq!(fulfilled.expected_return_at, None);
    assert_eq!(
        w.stage(fulfilled.order_id).await,
        Some(Stage::BuyerConfirmed),
    );
    assert_eq!(
        i32::from(w.buy_rent_count().await),
        i32::from(w.buyer.buy_rent_count) + 1,
    );
}

#[tokio::test]
async fn failed_delivery_keeps_fulfillment() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;
    let approved = w.approved(&listing, None).await;
    let sent_before = w.svc.notifier().sent().len();
    w.svc.notifier().set_unavailable(true);

    let dispatched = w
        .svc
        .execute(FulfillOrder {
            record_id: approved.id,
            seller_id: w.seller.id,
            ship_proof: listing::ImageUrl::new(
                "https://cdn.froc.app/proof.jpg",
            ),
            note: None,
        })
        .await
        .unwrap();

    assert!(dispatched.delivery.is_err());
    assert_eq!(w.svc.notifier().sent().len(), sent_before);
    assert_eq!(
        w.stage(approved.order_id).await,
        Some(Stage::BuyerConfirmed),
    );
    let stored = w
        .svc
        .database()
        .execute(Select(By::<Option<Record>, _>::new(dispatched.record.id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.notified_at, None);
    assert_eq!(i16::from(stored.delivery_attempts), 1);
    assert_eq!(stored, dispatched.record);
}

#[tokio::test]
async fn marking_inbox_read_is_idempotent() {
    let w = World::new().await;
    let listing = w.listing(SaleOption::Purchase).await;
    _ = w.fulfill(&w.approved(&listing, None).await).await.unwrap();

    let inbox = w
        .svc
        .execute(query::Inbox {
            user_id: w.buyer.id,
        })
        .await
        .unwrap();
    assert_eq!(inbox.unread_count(), 1);

    for _ in 0..2 {
        w.svc.execute(MarkInboxRead::from(w.buyer.id)).await.unwrap();
        let inbox = w
            .svc
            .execute(query::Inbox {
                user_id: w.buyer.id,
            })
            .await
            .unwrap();
        assert_eq!(inbox.unread_count(), 0);
        assert_eq!(inbox.read.len(), 1);
    }
}
