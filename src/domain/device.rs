use crate::domain::StateMap;
use crate::domain::state::StateKind;

/// A physical or logical device, shared between the cache and everyone holding a reference to it.
///
/// The device only knows the id of the binding that owns it; the binding and the cache own the device.
#[derive(Debug)]
pub struct Device {
    address: String,
    device_type: String,
    binding_id: &'static str,
    channels: Vec<Channel>,
    state: StateMap,
}

/// A sub-addressable unit of a device, e.g. one relay of a multi-relay switch.
#[derive(Debug)]
pub struct Channel {
    index: u32,
    address: String,
    parameters: StateMap,
    conversions: Vec<ConversionBinding>,
}

/// Declares that values for `protocol_key` are presented as `kind`.
#[derive(Clone, PartialEq, Debug)]
pub struct ConversionBinding {
    pub protocol_key: String,
    pub kind: StateKind,
}

impl Device {
    pub fn builder(address: impl Into<String>, device_type: impl Into<String>, binding_id: &'static str) -> DeviceBuilder {
        DeviceBuilder::new(address.into(), device_type.into(), binding_id)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn binding_id(&self) -> &'static str {
        self.binding_id
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: u32) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.index == index)
    }

    /// The device level state map.
    pub fn state(&self) -> &StateMap {
        &self.state
    }

    /// The state map holding values for the given channel, or the device level map when no channel is given.
    pub fn state_map(&self, channel: Option<u32>) -> Option<&StateMap> {
        match channel {
            None => Some(&self.state),
            Some(index) => self.channel(index).map(|channel| &channel.parameters),
        }
    }

    /// The address values for the given channel are published under.
    pub fn value_address(&self, channel: Option<u32>) -> Option<&str> {
        match channel {
            None => Some(&self.address),
            Some(index) => self.channel(index).map(|channel| channel.address.as_str()),
        }
    }

    /// The kinds a value for `protocol_key` may be presented as. Without any declared
    /// conversion every defined kind is acceptable.
    pub fn accepted_kinds(&self, channel: Option<u32>, protocol_key: &str) -> Vec<StateKind> {
        let declared = match channel.and_then(|index| self.channel(index)) {
            Some(channel) => channel.kinds_for(protocol_key),
            None => self.channels.iter().flat_map(|channel| channel.kinds_for(protocol_key)).collect(),
        };

        if declared.is_empty() { StateKind::DEFINED.to_vec() } else { declared }
    }
}

impl Channel {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn parameters(&self) -> &StateMap {
        &self.parameters
    }

    pub fn conversions(&self) -> &[ConversionBinding] {
        &self.conversions
    }

    fn kinds_for(&self, protocol_key: &str) -> Vec<StateKind> {
        self.conversions
            .iter()
            .filter(|conversion| conversion.protocol_key == protocol_key)
            .map(|conversion| conversion.kind)
            .collect()
    }
}

pub struct DeviceBuilder {
    address: String,
    device_type: String,
    binding_id: &'static str,
    channels: Vec<Channel>,
}

impl DeviceBuilder {
    pub fn new(address: String, device_type: String, binding_id: &'static str) -> Self {
        DeviceBuilder {
            address,
            device_type,
            binding_id,
            channels: Vec::new(),
        }
    }

    /// Adds a channel accepting the given (protocol key, kind) conversions.
    pub fn channel<K: Into<String>>(mut self, index: u32, conversions: impl IntoIterator<Item = (K, StateKind)>) -> Self {
        let conversions = conversions
            .into_iter()
            .map(|(protocol_key, kind)| ConversionBinding {
                protocol_key: protocol_key.into(),
                kind,
            })
            .collect();

        self.channels.push(Channel {
            index,
            address: format!("{}:{}", self.address, index),
            parameters: StateMap::new(),
            conversions,
        });
        self
    }

    pub fn build(mut self) -> Device {
        self.channels.sort_by_key(|channel| channel.index);
        Device {
            address: self.address,
            device_type: self.device_type,
            binding_id: self.binding_id,
            channels: self.channels,
            state: StateMap::new(),
        }
    }
}
