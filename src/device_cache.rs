use crate::bus::EventBus;
use crate::domain::device::Device;
use crate::domain::events::BusEvent;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug, PartialEq)]
pub enum DeviceFactoryError {
    #[error("unsupported device type '{0}'")]
    UnsupportedType(String),
    #[error("device type is unknown for address '{0}'")]
    MissingType(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum CacheError {
    #[error("could not create device '{address}': {source}")]
    Factory {
        address: String,
        #[source]
        source: DeviceFactoryError,
    },
}

/// Owns one shared instance per device address.
///
/// Creation happens under the cache lock, so concurrent callers for the same address
/// observe a single factory invocation and the same instance.
///
/// Topology events are queued while the cache lock is held and delivered in that order once
/// it is released. A mutation made while another caller is delivering is delivered by that
/// caller, after the events queued before it.
#[derive(Debug)]
pub struct DeviceCache {
    devices: Mutex<HashMap<String, Arc<Device>>>,
    topology: Mutex<TopologyQueue>,
    bus: Arc<EventBus>,
}

#[derive(Debug, Default)]
struct TopologyQueue {
    pending: VecDeque<BusEvent>,
    delivering: bool,
}

impl DeviceCache {
    pub fn new(bus: Arc<EventBus>) -> Self {
        DeviceCache {
            devices: Mutex::new(HashMap::new()),
            topology: Mutex::new(TopologyQueue::default()),
            bus,
        }
    }

    /// Returns the cached device or builds, stores and announces a new one.
    /// Nothing is cached when the factory fails.
    #[instrument(level = "debug", skip(self, factory))]
    pub fn get_or_create<F>(&self, address: &str, factory: F) -> Result<Arc<Device>, CacheError>
    where
        F: FnOnce(&str) -> Result<Device, DeviceFactoryError>,
    {
        let device = {
            let mut devices = self.lock();
            if let Some(device) = devices.get(address) {
                return Ok(device.clone());
            }

            debug!(device_id = address, "🔵 Creating device '{}'...", address);
            let device = Arc::new(factory(address).map_err(|source| CacheError::Factory {
                address: address.to_string(),
                source,
            })?);
            devices.insert(address.to_string(), device.clone());
            self.enqueue(BusEvent::DeviceAdded {
                address: device.address().to_string(),
                device_type: device.device_type().to_string(),
            });
            device
        };

        info!(device_id = address, "🔵 Creating device '{}'... OK, type '{}'", address, device.device_type());
        self.deliver_topology();
        Ok(device)
    }

    pub fn get(&self, address: &str) -> Option<Arc<Device>> {
        self.lock().get(address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lock().contains_key(address)
    }

    /// Evicts the device and announces its removal. Holders of the old instance keep it alive.
    pub fn remove(&self, address: &str) -> Option<Arc<Device>> {
        let removed = {
            let mut devices = self.lock();
            let removed = devices.remove(address);
            if removed.is_some() {
                self.enqueue(BusEvent::DeviceRemoved {
                    address: address.to_string(),
                });
            }
            removed
        };
        let Some(device) = removed else {
            warn!(device_id = address, "⚠️ Cannot remove unknown device '{}'", address);
            return None;
        };

        info!(device_id = address, "🔴 Removed device '{}'", address);
        self.deliver_topology();
        Some(device)
    }

    pub fn all_devices(&self) -> Vec<Arc<Device>> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Device>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the cache lock held.
    fn enqueue(&self, event: BusEvent) {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner).pending.push_back(event);
    }

    /// Publishes queued topology events without holding the cache lock. Only one caller
    /// delivers at a time, which keeps subscribers seeing events in mutation order.
    fn deliver_topology(&self) {
        {
            let mut queue = self.topology.lock().unwrap_or_else(PoisonError::into_inner);
            if queue.delivering {
                return;
            }
            queue.delivering = true;
        }

        loop {
            let event = {
                let mut queue = self.topology.lock().unwrap_or_else(PoisonError::into_inner);
                match queue.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        queue.delivering = false;
                        return;
                    }
                }
            };
            self.bus.publish_event(&event);
        }
    }
}
