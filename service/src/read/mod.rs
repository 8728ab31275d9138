//! Read entities definitions.

pub mod inbox;
pub mod record;

pub use self::inbox::Inbox;
