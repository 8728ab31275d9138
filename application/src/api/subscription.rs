//! GraphQL [`Subscription`]s definitions.

use common::DateTime;
use futures::{
    stream::{self, BoxStream},
    StreamExt as _,
};
use juniper::graphql_subscription;
use service::{
    domain::pricing::Countdown,
    query, Query as _,
};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL subscription.
#[derive(Clone, Copy, Debug)]
pub struct Subscription;

#[graphql_subscription(context = Context)]
impl Subscription {
    /// Streams the time remaining until the rented item of the specified
    /// `OrderRecord` is expected to be returned.
    ///
    /// Emits every second and completes once the return is overdue.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - the request is not authenticated;
    /// - `RECORD_NOT_EXISTS` - the `OrderRecord` does not exist or is
    ///                         addressed to another `User`;
    /// - `NO_RETURN_DATE` - the `OrderRecord` has no expected return date.
    pub async fn return_countdown(
        &self,
        record_id: api::order::RecordId,
        ctx: &Context,
    ) -> Result<BoxStream<'static, Result<api::order::Countdown, Error>>, Error>
    {
        let my_id = ctx.my_id().await?;

        let deadline = ctx
            .service()
            .execute(query::record::ById::by(record_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .filter(|r| r.recipient_id == my_id)
            .ok_or_else(|| CountdownError::RecordNotExists.into())
            .map_err(ctx.error())?
            .expected_return_at
            .ok_or_else(|| CountdownError::NoReturnDate.into())
            .map_err(ctx.error())?;

        Ok(stream::unfold(Some(true), move |state| async move {
            let first = state?;
            if !first {
                tokio::time::sleep(Countdown::TICK).await;
            }
            let countdown = Countdown::until(deadline, DateTime::now());
            let next = (!countdown.is_overdue()).then_some(false);
            Some((Ok(countdown.into()), next))
        })
        .boxed())
    }
}

define_error! {
    enum CountdownError {
        #[code = "RECORD_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`OrderRecord` with the specified ID does not exist"]
        RecordNotExists,

        #[code = "NO_RETURN_DATE"]
        #[status = CONFLICT]
        #[message = "`OrderRecord` has no expected return date"]
        NoReturnDate,
    }
}
