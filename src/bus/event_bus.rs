use crate::bus::matcher::Matcher;
use crate::bus::subscriber::{FnSubscriber, Subscriber, SubscriberError};
use crate::domain::events::BusEvent;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, trace, warn};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SubscriptionHandle(u64);

impl Display for SubscriptionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Subscription {
    handle: SubscriptionHandle,
    matcher: Matcher,
    subscriber: Arc<dyn Subscriber>,
}

/// Delivers events to subscribers synchronously, in registration order.
///
/// Subscribers are invoked on a snapshot of the subscription list, so they may subscribe or
/// unsubscribe from within a callback. A subscriber that fails or panics is logged and skipped.
#[derive(Debug, Default)]
pub struct EventBus {
    next_handle: AtomicU64,
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn subscribe(&self, matcher: Matcher, subscriber: Arc<dyn Subscriber>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!("📬 Subscribing '{}' as {} to {:?}", subscriber.name(), handle, matcher);

        self.subscriptions.write().unwrap_or_else(PoisonError::into_inner).push(Arc::new(Subscription {
            handle,
            matcher,
            subscriber,
        }));
        handle
    }

    pub fn subscribe_fn<F>(&self, name: &str, matcher: Matcher, callback: F) -> SubscriptionHandle
    where
        F: Fn(&BusEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribe(matcher, Arc::new(FnSubscriber::new(name, callback)))
    }

    /// Returns false when the handle was not subscribed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.handle != handle);

        let removed = subscriptions.len() != before;
        debug!("📭 Unsubscribing {}... {}", handle, if removed { "OK" } else { "not subscribed" });
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Hands `event` to every matching subscriber and returns how many accepted it.
    pub fn publish_event(&self, event: &BusEvent) -> usize {
        let subscriptions = self.subscriptions.read().unwrap_or_else(PoisonError::into_inner).clone();

        let mut delivered = 0;
        for subscription in subscriptions.iter().filter(|subscription| subscription.matcher.matches(event)) {
            let name = subscription.subscriber.name();
            match catch_unwind(AssertUnwindSafe(|| subscription.subscriber.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(address = event.address(), "⚠️ Subscriber '{}' failed: {}", name, e),
                Err(payload) => error!(address = event.address(), "❌ Subscriber '{}' panicked: {}", name, panic_message(&*payload)),
            }
        }

        trace!(address = event.address(), "Delivered event to {} subscriber(s)", delivered);
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{OnOff, State};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn update(address: &str) -> BusEvent {
        BusEvent::StateUpdated {
            address: address.to_string(),
            value_name: "ON".to_string(),
            state: State::OnOff(OnOff::On),
            items: vec![],
        }
    }

    fn recorder(bus: &EventBus, name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> SubscriptionHandle {
        let log = log.clone();
        bus.subscribe_fn(name, Matcher::All, move |event| {
            log.lock().unwrap().push(format!("{}:{}", name, event.address()));
            Ok(())
        })
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(vec![]));
        recorder(&bus, "first", &log);
        recorder(&bus, "second", &log);

        let delivered = bus.publish_event(&update("01"));

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec!["first:01", "second:01"]);
    }

    #[test]
    fn only_matching_subscribers_receive_the_event() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(vec![]));
        let captured = log.clone();
        bus.subscribe_fn("device-02", Matcher::Device("02".to_string()), move |event| {
            captured.lock().unwrap().push(event.address().to_string());
            Ok(())
        });

        bus.publish_event(&update("01"));
        bus.publish_event(&update("02"));

        assert_eq!(*log.lock().unwrap(), vec!["02"]);
    }

    #[test_log::test]
    fn a_failing_subscriber_does_not_stop_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(vec![]));
        bus.subscribe_fn("failing", Matcher::All, |_| Err(SubscriberError::Failed("boom".to_string())));
        recorder(&bus, "after", &log);

        let delivered = bus.publish_event(&update("01"));

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["after:01"]);
    }

    #[test_log::test]
    fn a_panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(vec![]));
        recorder(&bus, "before", &log);
        bus.subscribe_fn("panicking", Matcher::All, |_| panic!("subscriber bug"));
        recorder(&bus, "after", &log);

        bus.publish_event(&update("01"));
        bus.publish_event(&update("02"));

        assert_eq!(*log.lock().unwrap(), vec!["before:01", "after:01", "before:02", "after:02"]);
    }

    #[test]
    fn unsubscribed_handles_receive_nothing() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(vec![]));
        let handle = recorder(&bus, "gone", &log);

        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.publish_event(&update("01"));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_may_subscribe_while_being_notified() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.subscribe_fn("reentrant", Matcher::All, move |_| {
            inner.subscribe_fn("late", Matcher::All, |_| Ok(()));
            Ok(())
        });

        let delivered = bus.publish_event(&update("01"));

        assert_eq!(delivered, 1);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
