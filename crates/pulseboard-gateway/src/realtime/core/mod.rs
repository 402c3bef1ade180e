//! Realtime core components.
//!
//! Subscriber registry (who is connected) and the broadcaster (what they are
//! told, and in which order).

mod broadcaster;
mod subscriber_registry;

pub use broadcaster::{Broadcaster, Subscription};
pub use subscriber_registry::{
    Connection, EvictReason, FanOut, SubscriberId, SubscriberRegistry, SubscriberState,
};
