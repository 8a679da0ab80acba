use crate::binding::{BindingAdapter, EncodeError, TransmitError};
use crate::bus::{EventBus, Matcher, Subscriber, SubscriberError, SubscriptionHandle};
use crate::converter::ConverterRegistry;
use crate::device_cache::DeviceCache;
use crate::domain::commands::{Command, CommandKind};
use crate::domain::events::BusEvent;
use crate::domain::item::ItemBinding;
use crate::domain::state::{ConversionError, State};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("binding '{0}' is not active")]
    UnknownBinding(String),
    #[error("unknown device '{0}'")]
    UnknownDevice(String),
    #[error("no converter for '{value_name}' accepts {command_kind}")]
    NoConverter { value_name: String, command_kind: CommandKind },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("command for '{item}' was not acknowledged within {timeout:?}")]
    CommandTimeout { item: String, timeout: Duration },
    #[error("command for '{item}' was rejected: {reason}")]
    CommandRejected { item: String, reason: String },
    #[error("transport failed: {0}")]
    Transport(TransmitError),
}

/// Routes typed values to subscribers and commands to the binding that owns the target device.
#[derive(Debug)]
pub struct EventDispatcher {
    bus: Arc<EventBus>,
    cache: Arc<DeviceCache>,
    registry: Arc<ConverterRegistry>,
    items: RwLock<HashMap<String, ItemBinding>>,
    bindings: RwLock<HashMap<&'static str, Arc<dyn BindingAdapter>>>,
    command_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(bus: Arc<EventBus>, cache: Arc<DeviceCache>, registry: Arc<ConverterRegistry>, command_timeout: Duration) -> Self {
        EventDispatcher {
            bus,
            cache,
            registry,
            items: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            command_timeout,
        }
    }

    pub fn subscribe(&self, matcher: Matcher, subscriber: Arc<dyn Subscriber>) -> SubscriptionHandle {
        self.bus.subscribe(matcher, subscriber)
    }

    pub fn subscribe_fn<F>(&self, name: &str, matcher: Matcher, callback: F) -> SubscriptionHandle
    where
        F: Fn(&BusEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.bus.subscribe_fn(name, matcher, callback)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// Publishes a typed value to the matching subscribers, tagged with the items bound to it.
    pub fn publish(&self, address: &str, value_name: &str, state: State) -> usize {
        let items = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, item)| item.matches(address, value_name))
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        debug!(device_id = address, value_name, "📣 Publishing {} = {}", value_name, state);
        self.bus.publish_event(&BusEvent::StateUpdated {
            address: address.to_string(),
            value_name: value_name.to_string(),
            state,
            items,
        })
    }

    pub fn bind_item(&self, name: impl Into<String>, item: ItemBinding) {
        let name = name.into();
        debug!(item = name, "🔗 Binding item '{}' to {} '{}'", name, item.binding, item.value_address());
        self.items.write().unwrap_or_else(PoisonError::into_inner).insert(name, item);
    }

    pub fn item(&self, name: &str) -> Option<ItemBinding> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub(crate) fn register_binding(&self, adapter: Arc<dyn BindingAdapter>) {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner).insert(adapter.id(), adapter);
    }

    pub(crate) fn remove_binding(&self, id: &str) -> Option<Arc<dyn BindingAdapter>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner).remove(id)
    }

    fn binding(&self, id: &str) -> Option<Arc<dyn BindingAdapter>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// Converts `command` for the item's device and transmits it, waiting at most the command timeout
    /// for the acknowledgement. The state map is left alone; the device reports the new value itself.
    #[instrument(skip(self, command), fields(command = %command))]
    pub async fn send_command(&self, item: &str, command: Command) -> Result<(), DispatchError> {
        let binding = self.item(item).ok_or_else(|| DispatchError::UnknownItem(item.to_string()))?;
        let adapter = self.binding(&binding.binding).ok_or_else(|| DispatchError::UnknownBinding(binding.binding.clone()))?;
        let device = self.cache.get(&binding.address).ok_or_else(|| DispatchError::UnknownDevice(binding.address.clone()))?;
        let value_address = device
            .value_address(binding.channel)
            .ok_or_else(|| DispatchError::UnknownDevice(binding.value_address()))?
            .to_string();

        let current = device.state_map(binding.channel).and_then(|state| state.get(&binding.value_name));
        let no_converter = || DispatchError::NoConverter {
            value_name: binding.value_name.clone(),
            command_kind: command.kind(),
        };

        let command_converter = self
            .registry
            .resolve_command_converter(&binding.value_name, command.kind())
            .ok_or_else(no_converter)?;
        let target = command_converter.convert(&command, current.as_ref())?;
        let state_converter = self.registry.resolve_from_typed(&binding.value_name, target.kind()).ok_or_else(no_converter)?;
        let raw = state_converter.from_state(&target)?;
        let frame = adapter.encode(&value_address, &binding.value_name, &raw)?;

        debug!(item, device_id = value_address, "📤 Sending {} to '{}'...", target, item);
        match timeout(self.command_timeout, adapter.transmit(frame)).await {
            Ok(Ok(())) => {
                info!(item, device_id = value_address, "📤 Sending {} to '{}'... OK", target, item);
                Ok(())
            }
            Ok(Err(TransmitError::Rejected(reason))) => {
                warn!(item, device_id = value_address, "⚠️ Sending {} to '{}'... rejected: {}", target, item, reason);
                Err(DispatchError::CommandRejected {
                    item: item.to_string(),
                    reason,
                })
            }
            Ok(Err(e)) => {
                warn!(item, device_id = value_address, "⚠️ Sending {} to '{}'... failed: {}", target, item, e);
                Err(DispatchError::Transport(e))
            }
            Err(_) => {
                warn!(item, device_id = value_address, "⏳ Sending {} to '{}'... no acknowledgement within {:?}", target, item, self.command_timeout);
                Err(DispatchError::CommandTimeout {
                    item: item.to_string(),
                    timeout: self.command_timeout,
                })
            }
        }
    }
}
