//! Marker types describing what a [`DateTimeOf`] stands for.
//!
//! [`DateTimeOf`]: crate::DateTimeOf

/// Marker of an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker of an entity deletion.
#[derive(Clone, Copy, Debug)]
pub struct Deletion;

/// Marker of a notification about an entity being settled.
#[derive(Clone, Copy, Debug)]
pub struct Notification;
