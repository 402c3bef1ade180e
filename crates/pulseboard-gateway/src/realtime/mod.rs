//! Realtime fan-out for dashboard subscribers.
//!
//! Subscriber registry + broadcaster. Every message is serialized once and
//! enqueued without awaiting on each subscriber's bounded queue.

pub mod core;
pub mod types;

pub use self::core::{Broadcaster, SubscriberId, SubscriberRegistry, SubscriberState, Subscription};
pub use types::PreparedMsg;
