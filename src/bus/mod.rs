mod event_bus;
mod matcher;
mod subscriber;

pub use event_bus::{EventBus, SubscriptionHandle};
pub use matcher::Matcher;
pub use subscriber::{ChannelSubscriber, FnSubscriber, Subscriber, SubscriberError};
