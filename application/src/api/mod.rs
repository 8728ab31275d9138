//! GraphQL API definitions.

pub mod listing;
mod mutation;
pub mod order;
mod query;
pub mod scalar;
mod subscription;
pub mod user;

pub use self::{
    listing::Listing,
    mutation::Mutation,
    order::{Order, Record},
    query::Query,
    subscription::Subscription,
    user::User,
};

/// GraphQL schema.
pub type Schema = juniper::RootNode<'static, Query, Mutation, Subscription>;
