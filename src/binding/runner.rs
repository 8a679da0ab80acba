use crate::binding::{BindingAdapter, ParseError, ProtocolEvent};
use crate::converter::ConverterRegistry;
use crate::device_cache::{CacheError, DeviceCache};
use crate::dispatcher::EventDispatcher;
use crate::domain::RawValue;
use crate::domain::state::ConversionError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("could not decode frame: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("device '{address}' has no channel {channel}")]
    UnknownChannel { address: String, channel: u32 },
    #[error("no converter for '{value_name}' of device '{address}'")]
    NoConverter { address: String, value_name: String },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Feeds inbound frames of one binding into the core: decode, convert, deduplicate, publish.
#[derive(Debug, Clone)]
pub struct BindingRunner {
    adapter: Arc<dyn BindingAdapter>,
    cache: Arc<DeviceCache>,
    registry: Arc<ConverterRegistry>,
    dispatcher: Arc<EventDispatcher>,
}

impl BindingRunner {
    pub fn new(adapter: Arc<dyn BindingAdapter>, cache: Arc<DeviceCache>, registry: Arc<ConverterRegistry>, dispatcher: Arc<EventDispatcher>) -> Self {
        BindingRunner {
            adapter,
            cache,
            registry,
            dispatcher,
        }
    }

    pub fn binding_id(&self) -> &'static str {
        self.adapter.id()
    }

    #[instrument(skip_all, fields(binding = self.adapter.id()))]
    pub async fn run(self, mut rx: Receiver<Vec<u8>>) {
        info!("🔌 Listening for frames...");
        while let Some(frame) = rx.recv().await {
            match self.handle_frame(&frame) {
                Ok(()) => {}
                Err(e @ BindingError::Cache(_)) => error!("❌ Dropping frame '{}': {}", String::from_utf8_lossy(&frame).trim(), e),
                Err(e) => warn!("⚠️ Dropping frame '{}': {}", String::from_utf8_lossy(&frame).trim(), e),
            }
        }
        info!("🔌 Frame channel closed, stopped listening");
    }

    /// Handles one inbound frame. Errors leave every other device untouched.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<(), BindingError> {
        let event = self.adapter.decode(frame)?;
        trace!("🔸 Decoded {:?}", event);

        match event {
            ProtocolEvent::Value {
                address,
                channel,
                value_name,
                raw,
            } => {
                self.update_value(&address, channel, &value_name, &raw)?;
            }
            ProtocolEvent::DeviceDiscovered { address, device_type } => {
                self.cache
                    .get_or_create(&address, |address| self.adapter.create_device(address, Some(&device_type)))?;
            }
            ProtocolEvent::DeviceRemoved { address } => {
                self.cache.remove(&address);
            }
            ProtocolEvent::Acknowledged => self.adapter.acknowledge(Ok(())),
            ProtocolEvent::Rejected(reason) => self.adapter.acknowledge(Err(reason)),
        }
        Ok(())
    }

    /// Converts and stores the value, publishing it only when it changed. Returns whether it was published.
    pub fn update_value(&self, address: &str, channel: Option<u32>, value_name: &str, raw: &RawValue) -> Result<bool, BindingError> {
        let device = self.cache.get_or_create(address, |address| self.adapter.create_device(address, None))?;
        let (Some(state_map), Some(value_address)) = (device.state_map(channel), device.value_address(channel)) else {
            return Err(BindingError::UnknownChannel {
                address: address.to_string(),
                channel: channel.unwrap_or_default(),
            });
        };

        let accepted = device.accepted_kinds(channel, value_name);
        let converter = self
            .registry
            .resolve_to_typed(value_name, &accepted)
            .ok_or_else(|| BindingError::NoConverter {
                address: address.to_string(),
                value_name: value_name.to_string(),
            })?;
        let state = converter.to_state(raw)?;

        if !state_map.apply(value_name, state.clone()) {
            trace!(device_id = value_address, value_name, "Unchanged {} = {}", value_name, state);
            return Ok(false);
        }

        debug!(device_id = value_address, value_name, "🟢 Updated '{}' to {}", value_name, state);
        self.dispatcher.publish(value_address, value_name, state);
        Ok(true)
    }
}
