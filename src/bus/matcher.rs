use crate::domain::events::BusEvent;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Selects the events a subscriber receives.
#[derive(Clone)]
pub enum Matcher {
    /// Every event, state updates and topology changes alike.
    All,
    /// State updates of a device and of its channels.
    Device(String),
    /// State updates of one value of one device or channel address.
    Value { address: String, value_name: String },
    /// State updates for a bound item.
    Item(String),
    /// Devices being added to or removed from the cache.
    Topology,
    Custom(Arc<dyn Fn(&BusEvent) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn value(address: impl Into<String>, value_name: impl Into<String>) -> Self {
        Matcher::Value {
            address: address.into(),
            value_name: value_name.into(),
        }
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&BusEvent) -> bool + Send + Sync + 'static,
    {
        Matcher::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, event: &BusEvent) -> bool {
        match (self, event) {
            (Matcher::All, _) => true,
            (Matcher::Topology, event) => event.is_topology(),
            (Matcher::Custom(predicate), event) => predicate(event),
            (Matcher::Device(device), BusEvent::StateUpdated { address, .. }) => is_same_device(device, address),
            (Matcher::Value { address, value_name }, BusEvent::StateUpdated { address: a, value_name: v, .. }) => address == a && value_name == v,
            (Matcher::Item(item), BusEvent::StateUpdated { items, .. }) => items.iter().any(|name| name == item),
            _ => false,
        }
    }
}

/// Channel addresses are the device address followed by `:` and the channel index.
fn is_same_device(device: &str, address: &str) -> bool {
    address
        .strip_prefix(device)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::All => write!(f, "All"),
            Matcher::Device(address) => f.debug_tuple("Device").field(address).finish(),
            Matcher::Value { address, value_name } => f.debug_struct("Value").field("address", address).field("value_name", value_name).finish(),
            Matcher::Item(item) => f.debug_tuple("Item").field(item).finish(),
            Matcher::Topology => write!(f, "Topology"),
            Matcher::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{OnOff, State};
    use rstest::rstest;

    fn update(address: &str, value_name: &str) -> BusEvent {
        BusEvent::StateUpdated {
            address: address.to_string(),
            value_name: value_name.to_string(),
            state: State::OnOff(OnOff::On),
            items: vec!["lamp1".to_string()],
        }
    }

    fn removed(address: &str) -> BusEvent {
        BusEvent::DeviceRemoved { address: address.to_string() }
    }

    #[rstest]
    #[case(Matcher::All, update("01", "ON"), true)]
    #[case(Matcher::All, removed("01"), true)]
    #[case(Matcher::Device("01".to_string()), update("01", "ON"), true)]
    #[case(Matcher::Device("01".to_string()), update("01:2", "ON"), true)]
    #[case(Matcher::Device("01".to_string()), update("012", "ON"), false)]
    #[case(Matcher::Device("01".to_string()), removed("01"), false)]
    #[case(Matcher::value("01", "ON"), update("01", "ON"), true)]
    #[case(Matcher::value("01", "ON"), update("01", "BRIGHTNESS"), false)]
    #[case(Matcher::Item("lamp1".to_string()), update("01", "ON"), true)]
    #[case(Matcher::Item("lamp2".to_string()), update("01", "ON"), false)]
    #[case(Matcher::Topology, removed("01"), true)]
    #[case(Matcher::Topology, update("01", "ON"), false)]
    #[case(Matcher::custom(|event| event.value_name() == Some("ON")), update("02", "ON"), true)]
    fn matches_events(#[case] matcher: Matcher, #[case] event: BusEvent, #[case] expected: bool) {
        assert_eq!(matcher.matches(&event), expected);
    }
}
