//! [`Listing`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{
        listing::{self, Comment, Details, RentDays, Terms},
        user, Listing,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, owner_id, image_urls, \
                   sale_option, currency, \
                   purchase_price, rent_price_per_day, \
                   rent_days_min, rent_days_max, \
                   sizes, title, \
                   category, season, occasion, color, gender, \
                   liked_by, created_at, deleted_at \
            FROM listings \
            WHERE id = $1::UUID \
              AND deleted_at IS NULL \
            LIMIT 1";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let currency: Currency = row.get("currency");
        let money = |column| {
            row.get::<_, Option<Decimal>>(column).map(|amount| {
                Money::new(amount, currency).expect("negative `Money` stored")
            })
        };
        let rent_days = row
            .get::<_, Option<i32>>("rent_days_min")
            .zip(row.get::<_, Option<i32>>("rent_days_max"))
            .and_then(|(min, max)| {
                RentDays::new(u32::try_from(min).ok()?, u32::try_from(max).ok()?)
            });
        let terms = Terms::new(
            row.get("sale_option"),
            money("purchase_price"),
            money("rent_price_per_day"),
            rent_days,
        )
        .expect("invalid `Terms` stored");

        const COMMENTS_SQL: &str = "\
            SELECT author_id, text, created_at \
            FROM listing_comments \
            WHERE listing_id = $1::UUID \
            ORDER BY position ASC";
        let comments = self
            .query(COMMENTS_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Comment {
                author_id: row.get("author_id"),
                text: row.get("text"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(Some(Listing {
            id,
            owner_id: row.get("owner_id"),
            image_urls: row.get("image_urls"),
            terms,
            sizes: row
                .get::<_, Vec<listing::Size>>("sizes")
                .into_iter()
                .collect(),
            details: Details {
                title: row.get("title"),
                category: row.get("category"),
                season: row.get("season"),
                occasion: row.get("occasion"),
                color: row.get("color"),
                gender: row.get("gender"),
            },
            liked_by: row
                .get::<_, Vec<user::Id>>("liked_by")
                .into_iter()
                .collect(),
            comments,
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        }))
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Listing>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(listing)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            owner_id,
            image_urls,
            terms,
            sizes,
            details:
                Details {
                    title,
                    category,
                    season,
                    occasion,
                    color,
                    gender,
                },
            liked_by,
            comments,
            created_at,
            deleted_at,
        } = listing;

        let purchase_price = terms.purchase_price();
        let rent_price_per_day = terms.rent_price_per_day();
        let currency = purchase_price
            .or(rent_price_per_day)
            .map_or(Currency::Usd, |m| m.currency());
        let purchase_price = purchase_price.map(|m| m.amount());
        let rent_price_per_day = rent_price_per_day.map(|m| m.amount());
        let rent_days_min = terms
            .rent_days()
            .and_then(|r| i32::try_from(r.min()).ok());
        let rent_days_max = terms
            .rent_days()
            .and_then(|r| i32::try_from(r.max()).ok());
        let sizes = sizes.into_iter().collect::<Vec<_>>();
        let liked_by = liked_by.into_iter().collect::<Vec<_>>();

        const SQL: &str = "\
            INSERT INTO listings (\
                id, owner_id, image_urls, \
                sale_option, currency, \
                purchase_price, rent_price_per_day, \
                rent_days_min, rent_days_max, \
                sizes, title, \
                category, season, occasion, color, gender, \
                liked_by, created_at, deleted_at\
            ) \
            VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR[], \
                $4::INT2, $5::INT2, \
                $6::NUMERIC, $7::NUMERIC, \
                $8::INT4, $9::INT4, \
                $10::VARCHAR[], $11::VARCHAR, \
                $12::VARCHAR, $13::VARCHAR, $14::VARCHAR, \
                $15::VARCHAR, $16::VARCHAR, \
                $17::UUID[], $18::TIMESTAMPTZ, $19::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET image_urls = EXCLUDED.image_urls, \
                sale_option = EXCLUDED.sale_option, \
                currency = EXCLUDED.currency, \
                purchase_price = EXCLUDED.purchase_price, \
                rent_price_per_day = EXCLUDED.rent_price_per_day, \
                rent_days_min = EXCLUDED.rent_days_min, \
                rent_days_max = EXCLUDED.rent_days_max, \
                sizes = EXCLUDED.sizes, \
                title = EXCLUDED.title, \
                category = EXCLUDED.category, \
                season = EXCLUDED.season, \
                occasion = EXCLUDED.occasion, \
                color = EXCLUDED.color, \
                gender = EXCLUDED.gender, \
                liked_by = EXCLUDED.liked_by, \
                deleted_at = EXCLUDED.deleted_at";
        self.exec(
            SQL,
            &[
                &id,
                &owner_id,
                &image_urls,
                &terms.sale_option(),
                &currency,
                &purchase_price,
                &rent_price_per_day,
                &rent_days_min,
                &rent_days_max,
                &sizes,
                &title,
                &category,
                &season,
                &occasion,
                &color,
                &gender,
                &liked_by,
                &created_at,
                &deleted_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())?;

        // Comments are append-only, so already stored ones are kept as is.
        const COMMENT_SQL: &str = "\
            INSERT INTO listing_comments (\
                listing_id, position, author_id, text, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::INT4, $3::UUID, $4::VARCHAR, $5::TIMESTAMPTZ\
            ) \
            ON CONFLICT (listing_id, position) DO NOTHING";
        for (position, comment) in (0_i32..).zip(&comments) {
            let Comment {
                author_id,
                text,
                created_at,
            } = comment;
            self.exec(
                COMMENT_SQL,
                &[&id, &position, author_id, text, created_at],
            )
            .await
            .map_err(tracerr::wrap!())?;
        }
        Ok(())
    }
}

impl<C> Database<Lock<By<Listing, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        // Row lock is held till the end of the transaction.
        const SQL: &str = "\
            INSERT INTO listings_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE \
            SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
