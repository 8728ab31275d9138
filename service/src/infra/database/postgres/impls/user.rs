//! [`User`]-related [`Database`] implementations.

use common::operations::{By, Increment, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Builds a [`User`] out of the provided `users` table [`Row`].
fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        venmo_handle: row.get("venmo_handle"),
        followers: row.get::<_, Vec<user::Id>>("followers").into_iter().collect(),
        following: row.get::<_, Vec<user::Id>>("following").into_iter().collect(),
        blocked: row.get::<_, Vec<user::Id>>("blocked").into_iter().collect(),
        buy_rent_count: row.get("buy_rent_count"),
        push_token: row.get("push_token"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, \
                   email, phone, address, venmo_handle, \
                   followers, following, blocked, \
                   buy_rent_count, push_token, \
                   created_at, deleted_at \
            FROM users \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            name,
            email,
            phone,
            address,
            venmo_handle,
            followers,
            following,
            blocked,
            buy_rent_count,
            push_token,
            created_at,
            deleted_at,
        } = user;
        let followers = followers.into_iter().collect::<Vec<_>>();
        let following = following.into_iter().collect::<Vec<_>>();
        let blocked = blocked.into_iter().collect::<Vec<_>>();

        const SQL: &str = "\
            INSERT INTO users (\
                id, name, \
                email, phone, address, venmo_handle, \
                followers, following, blocked, \
                buy_rent_count, push_token, \
                created_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, \
                $3::VARCHAR, $4::VARCHAR, $5::VARCHAR, $6::VARCHAR, \
                $7::UUID[], $8::UUID[], $9::UUID[], \
                $10::INT4, $11::VARCHAR, \
                $12::TIMESTAMPTZ, $13::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                email = EXCLUDED.email, \
                phone = EXCLUDED.phone, \
                address = EXCLUDED.address, \
                venmo_handle = EXCLUDED.venmo_handle, \
                followers = EXCLUDED.followers, \
                following = EXCLUDED.following, \
                blocked = EXCLUDED.blocked, \
                push_token = EXCLUDED.push_token, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &name,
                &email,
                &phone,
                &address,
                &venmo_handle,
                &followers,
                &following,
                &blocked,
                &buy_rent_count,
                &push_token,
                &created_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Increment<By<user::BuyRentCount, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<user::BuyRentCount>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Increment(by): Increment<By<user::BuyRentCount, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        // Single statement, so concurrent increments never lose an update.
        const SQL: &str = "\
            UPDATE users \
            SET buy_rent_count = buy_rent_count + 1 \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL \
            RETURNING buy_rent_count";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| row.get("buy_rent_count")))
    }
}
