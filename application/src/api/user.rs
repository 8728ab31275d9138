//! [`User`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{graphql_object, GraphQLScalar};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::{self, scalar},
    AsError, Context, Error,
};

/// A [`User`] of the marketplace.
#[derive(Clone, Debug, From)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`domain::User`] representing this [`User`].
    user: OnceCell<domain::User>,
}

impl From<domain::User> for User {
    fn from(user: domain::User) -> Self {
        Self {
            id: user.id.into(),
            user: OnceCell::new_with(Some(user)),
        }
    }
}

impl User {
    /// Creates a new [`User`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`User`] with the provided ID exists,
    /// otherwise accessing this [`User`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            user: OnceCell::new(),
        }
    }

    /// Returns the [`domain::User`] representing this [`User`].
    ///
    /// # Errors
    ///
    /// Error if the [`domain::User`] doesn't exist.
    async fn user(&self, ctx: &Context) -> Result<&domain::User, Error> {
        let id = self.id.into();
        self.user
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::user::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|u| {
                        future::ready(u.ok_or_else(|| {
                            api::query::UserError::NotExists.into()
                        }))
                    })
            })
            .await
    }

    /// Returns the private part of this [`User`] if the current session
    /// belongs to it.
    async fn private(
        &self,
        ctx: &Context,
    ) -> Result<Option<&domain::User>, Error> {
        let my_id = ctx.try_current_session().await?.map(|s| s.user_id);
        if my_id == Some(self.id) {
            self.user(ctx).await.map(Some)
        } else {
            Ok(None)
        }
    }
}

/// A `User` of the marketplace.
#[graphql_object(context = Context)]
impl User {
    /// Unique identifier of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Username of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.name",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn name(&self, ctx: &Context) -> Result<Name, Error> {
        Ok(self.user(ctx).await?.name.clone().into())
    }

    /// Email of this `User`.
    ///
    /// Visible to this `User` only.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.email",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn email(&self, ctx: &Context) -> Result<Option<Email>, Error> {
        Ok(self
            .private(ctx)
            .await?
            .and_then(|u| u.email.clone())
            .map(Into::into))
    }

    /// Phone of this `User`.
    ///
    /// Visible to this `User` only.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.phone",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn phone(&self, ctx: &Context) -> Result<Option<Phone>, Error> {
        Ok(self
            .private(ctx)
            .await?
            .and_then(|u| u.phone.clone())
            .map(Into::into))
    }

    /// Shipping address of this `User`.
    ///
    /// Visible to this `User` only.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.address",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn address(
        &self,
        ctx: &Context,
    ) -> Result<Option<Address>, Error> {
        Ok(self
            .private(ctx)
            .await?
            .and_then(|u| u.address.clone())
            .map(Into::into))
    }

    /// Venmo handle this `User` pays from.
    ///
    /// Visible to this `User` only.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.venmoHandle",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn venmo_handle(
        &self,
        ctx: &Context,
    ) -> Result<Option<VenmoHandle>, Error> {
        Ok(self
            .private(ctx)
            .await?
            .and_then(|u| u.venmo_handle.clone())
            .map(Into::into))
    }

    /// Number of `User`s following this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.followersCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn followers_count(&self, ctx: &Context) -> Result<i32, Error> {
        let count = self.user(ctx).await?.followers.len();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Number of `User`s this `User` follows.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.followingCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn following_count(&self, ctx: &Context) -> Result<i32, Error> {
        let count = self.user(ctx).await?.following.len();
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Number of purchases and rents fulfilled for this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.buyRentCount",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn buy_rent_count(&self, ctx: &Context) -> Result<i32, Error> {
        Ok(self.user(ctx).await?.buy_rent_count.into())
    }

    /// `DateTime` when this `User` joined.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.user(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `User`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::user::Id)]
#[into(domain::user::Id)]
#[graphql(name = "UserId", transparent)]
pub struct Id(Uuid);

/// Username of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserName",
    with = scalar::Via::<domain::user::Name>,
)]
pub struct Name(domain::user::Name);

/// Email of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserEmail",
    with = scalar::Via::<domain::user::Email>,
)]
pub struct Email(domain::user::Email);

/// Phone of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserPhone",
    with = scalar::Via::<domain::user::Phone>,
)]
pub struct Phone(domain::user::Phone);

/// Shipping address of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserAddress",
    with = scalar::Via::<domain::user::Address>,
)]
pub struct Address(domain::user::Address);

/// Venmo handle of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserVenmoHandle",
    with = scalar::Via::<domain::user::VenmoHandle>,
)]
pub struct VenmoHandle(domain::user::VenmoHandle);
