//! Reactive primitives shared by the registry and change streams.

pub mod broadcast;

pub use broadcast::{Broadcast, Subscription};
