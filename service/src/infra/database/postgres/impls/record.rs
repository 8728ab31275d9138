//! [`Record`]- and [`Order`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Delete, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        order::{
            self,
            record::{self, BuyerSnapshot},
        },
        user, Order, Record,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of the `records` table read into a [`Record`].
macro_rules! columns {
    () => {
        "id, order_id, recipient_id, actor_id, actor_name, \
         kind, transition, action_text, \
         listing_id, seller_id, product_info, \
         price, price_currency, size, rent_duration, note, venmo_handle, \
         buyer_id, buyer_name, buyer_email, buyer_phone, buyer_address, \
         buyer_followers_count, buyer_buy_rent_count, \
         image_urls, ship_proof, expected_arrival_at, expected_return_at, \
         is_new, created_at, notified_at, delivery_attempts, deleted_at"
    };
}

/// Builds a [`Record`] out of the provided `records` table [`Row`].
fn from_row(row: &Row) -> Record {
    let price = row
        .get::<_, Option<Decimal>>("price")
        .zip(row.get::<_, Option<Currency>>("price_currency"))
        .map(|(amount, currency)| {
            Money::new(amount, currency).expect("negative `Money` stored")
        });
    let buyer = row
        .get::<_, Option<user::Id>>("buyer_id")
        .map(|user_id| BuyerSnapshot {
            user_id,
            name: row.get("buyer_name"),
            email: row.get("buyer_email"),
            phone: row.get("buyer_phone"),
            address: row.get("buyer_address"),
            followers_count: row.get("buyer_followers_count"),
            buy_rent_count: row.get("buyer_buy_rent_count"),
        });

    Record {
        id: row.get("id"),
        order_id: row.get("order_id"),
        recipient_id: row.get("recipient_id"),
        actor_id: row.get("actor_id"),
        actor_name: row.get("actor_name"),
        kind: row.get("kind"),
        transition: row.get("transition"),
        action_text: row.get("action_text"),
        listing_id: row.get("listing_id"),
        seller_id: row.get("seller_id"),
        product_info: row.get("product_info"),
        price,
        size: row.get("size"),
        rent_duration: row.get("rent_duration"),
        note: row.get("note"),
        venmo_handle: row.get("venmo_handle"),
        buyer,
        image_urls: row.get("image_urls"),
        ship_proof: row.get("ship_proof"),
        expected_arrival_at: row.get("expected_arrival_at"),
        expected_return_at: row.get("expected_return_at"),
        is_new: row.get("is_new"),
        created_at: row.get("created_at"),
        notified_at: row.get("notified_at"),
        delivery_attempts: row.get("delivery_attempts"),
        deleted_at: row.get("deleted_at"),
    }
}

impl<C> Database<Select<By<Option<Record>, record::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Record>, record::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: record::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM records \
              WHERE id = $1::UUID \
                AND deleted_at IS NULL \
              LIMIT 1",
        );
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Vec<Record>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Record>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let recipient_id: user::Id = by.into_inner();

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM records \
              WHERE recipient_id = $1::UUID \
                AND deleted_at IS NULL \
              ORDER BY created_at DESC",
        );
        Ok(self
            .query(SQL, &[&recipient_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Record>, read::record::Undelivered>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Record>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Record>, read::record::Undelivered>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::record::Undelivered {
            max_attempts,
            created_before,
            limit,
        } = by.into_inner();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM records \
              WHERE notified_at IS NULL \
                AND deleted_at IS NULL \
                AND delivery_attempts < $1::INT2 \
                AND created_at < $2::TIMESTAMPTZ \
              ORDER BY created_at ASC \
              LIMIT $3::INT8",
        );
        Ok(self
            .query(SQL, &[&max_attempts, &created_before, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect())
    }
}

impl<C> Database<Select<By<Option<Order>, order::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Order>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: order::Id = by.into_inner();

        // Removed `Record`s still define the `order::Stage`.
        const SQL: &str = concat!(
            "SELECT ",
            columns!(),
            " FROM records \
              WHERE order_id = $1::UUID",
        );
        let records = self
            .query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(from_row)
            .collect();
        Ok(Order::new(id, records))
    }
}

impl<C> Database<Insert<Record>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<Record>,
    ) -> Result<Self::Ok, Self::Err> {
        let Record {
            id,
            order_id,
            recipient_id,
            actor_id,
            actor_name,
            kind,
            transition,
            action_text,
            listing_id,
            seller_id,
            product_info,
            price,
            size,
            rent_duration,
            note,
            venmo_handle,
            buyer,
            image_urls,
            ship_proof,
            expected_arrival_at,
            expected_return_at,
            is_new,
            created_at,
            notified_at,
            delivery_attempts,
            deleted_at,
        } = record;
        let price_currency = price.map(|p| p.currency());
        let price = price.map(|p| p.amount());
        let buyer_id = buyer.as_ref().map(|b| b.user_id);
        let buyer_name = buyer.as_ref().map(|b| &b.name);
        let buyer_email = buyer.as_ref().and_then(|b| b.email.as_ref());
        let buyer_phone = buyer.as_ref().and_then(|b| b.phone.as_ref());
        let buyer_address = buyer.as_ref().and_then(|b| b.address.as_ref());
        let buyer_followers_count = buyer.as_ref().map(|b| b.followers_count);
        let buyer_buy_rent_count = buyer.as_ref().map(|b| b.buy_rent_count);

        const SQL: &str = concat!(
            "INSERT INTO records (",
            columns!(),
            ") \
             VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, $5::VARCHAR, \
                $6::INT2, $7::INT2, $8::VARCHAR, \
                $9::UUID, $10::UUID, $11::VARCHAR, \
                $12::NUMERIC, $13::INT2, $14::VARCHAR, $15::VARCHAR, \
                $16::VARCHAR, $17::VARCHAR, \
                $18::UUID, $19::VARCHAR, $20::VARCHAR, $21::VARCHAR, \
                $22::VARCHAR, $23::INT4, $24::INT4, \
                $25::VARCHAR[], $26::VARCHAR, \
                $27::TIMESTAMPTZ, $28::TIMESTAMPTZ, \
                $29::BOOL, $30::TIMESTAMPTZ, $31::TIMESTAMPTZ, \
                $32::INT2, $33::TIMESTAMPTZ\
             )",
        );
        self.exec(
            SQL,
            &[
                &id,
                &order_id,
                &recipient_id,
                &actor_id,
                &actor_name,
                &kind,
                &transition,
                &action_text,
                &listing_id,
                &seller_id,
                &product_info,
                &price,
                &price_currency,
                &size,
                &rent_duration,
                &note,
                &venmo_handle,
                &buyer_id,
                &buyer_name,
                &buyer_email,
                &buyer_phone,
                &buyer_address,
                &buyer_followers_count,
                &buyer_buy_rent_count,
                &image_urls,
                &ship_proof,
                &expected_arrival_at,
                &expected_return_at,
                &is_new,
                &created_at,
                &notified_at,
                &delivery_attempts,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Delete<By<Record, record::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Record, record::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: record::Id = by.into_inner();
        let now = record::DeletionDateTime::now();

        const SQL: &str = "\
            UPDATE records \
            SET deleted_at = $2::TIMESTAMPTZ \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL";
        self.exec(SQL, &[&id, &now])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<record::Delivery>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(delivery): Update<record::Delivery>,
    ) -> Result<Self::Ok, Self::Err> {
        let record::Delivery {
            record_id,
            attempts,
            notified_at,
        } = delivery;

        const SQL: &str = "\
            UPDATE records \
            SET delivery_attempts = $2::INT2, \
                notified_at = $3::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&record_id, &attempts, &notified_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<By<record::Read, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<record::Read, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let recipient_id: user::Id = by.into_inner();

        const SQL: &str = "\
            UPDATE records \
            SET is_new = FALSE \
            WHERE recipient_id = $1::UUID \
              AND is_new";
        self.exec(SQL, &[&recipient_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Order, order::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Order, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: order::Id = by.into_inner();

        // Row lock is held till the end of the transaction.
        const SQL: &str = "\
            INSERT INTO orders_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
