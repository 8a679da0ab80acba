use crate::domain::state::State;
use serde::Serialize;

/// Everything that travels over the bus towards subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    StateUpdated {
        address: String,
        value_name: String,
        state: State,
        items: Vec<String>,
    },
    DeviceAdded {
        address: String,
        device_type: String,
    },
    DeviceRemoved {
        address: String,
    },
}

impl BusEvent {
    pub fn address(&self) -> &str {
        match self {
            BusEvent::StateUpdated { address, .. } | BusEvent::DeviceAdded { address, .. } | BusEvent::DeviceRemoved { address } => address,
        }
    }

    pub fn value_name(&self) -> Option<&str> {
        match self {
            BusEvent::StateUpdated { value_name, .. } => Some(value_name),
            _ => None,
        }
    }

    pub fn is_topology(&self) -> bool {
        matches!(self, BusEvent::DeviceAdded { .. } | BusEvent::DeviceRemoved { .. })
    }
}
