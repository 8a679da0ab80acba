use crate::domain::events::BusEvent;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

/// Receives bus events. Called synchronously on the publishing task, so implementations
/// must not block for long; hand work off to a task instead.
pub trait Subscriber: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &BusEvent) -> Result<(), SubscriberError>;
}

#[derive(Error, Debug, PartialEq)]
pub enum SubscriberError {
    #[error("subscriber '{0}' is closed")]
    Closed(String),
    #[error("subscriber '{0}' is lagging behind, event dropped")]
    Lagging(String),
    #[error("{0}")]
    Failed(String),
}

/// Adapts a closure into a subscriber.
pub struct FnSubscriber<F> {
    name: String,
    callback: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&BusEvent) -> Result<(), SubscriberError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        FnSubscriber { name: name.into(), callback }
    }
}

impl<F> Debug for FnSubscriber<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSubscriber").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&BusEvent) -> Result<(), SubscriberError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &BusEvent) -> Result<(), SubscriberError> {
        (self.callback)(event)
    }
}

/// Forwards events into a bounded channel so an async task can consume them.
#[derive(Debug)]
pub struct ChannelSubscriber {
    name: String,
    tx: Sender<BusEvent>,
}

impl ChannelSubscriber {
    pub fn new(name: impl Into<String>, tx: Sender<BusEvent>) -> Self {
        ChannelSubscriber { name: name.into(), tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, event: &BusEvent) -> Result<(), SubscriberError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SubscriberError::Lagging(self.name.clone()),
            TrySendError::Closed(_) => SubscriberError::Closed(self.name.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn removed() -> BusEvent {
        BusEvent::DeviceRemoved { address: "01".to_string() }
    }

    #[tokio::test]
    async fn channel_subscriber_forwards_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let subscriber = ChannelSubscriber::new("ui", tx);

        subscriber.on_event(&removed()).unwrap();

        assert_eq!(rx.recv().await.map(|event| event.address().to_string()), Some("01".to_string()));
    }

    #[test]
    fn channel_subscriber_reports_a_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let subscriber = ChannelSubscriber::new("ui", tx);

        subscriber.on_event(&removed()).unwrap();
        let result = subscriber.on_event(&removed());

        assert_eq!(result, Err(SubscriberError::Lagging("ui".to_string())));
    }

    #[test]
    fn channel_subscriber_reports_a_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let subscriber = ChannelSubscriber::new("ui", tx);

        assert_eq!(subscriber.on_event(&removed()), Err(SubscriberError::Closed("ui".to_string())));
    }
}
