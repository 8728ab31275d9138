//! Domain definitions.

pub mod listing;
pub mod order;
pub mod pricing;
pub mod user;

pub use self::{
    listing::Listing,
    order::{Order, Record},
    user::User,
};
