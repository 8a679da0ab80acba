use crate::converter::BindingRegistrar;
use crate::device_cache::DeviceFactoryError;
use crate::domain::RawValue;
use crate::domain::device::Device;
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// What a binding decoded from one inbound frame.
#[derive(Clone, PartialEq, Debug)]
pub enum ProtocolEvent {
    Value {
        address: String,
        channel: Option<u32>,
        value_name: String,
        raw: RawValue,
    },
    DeviceDiscovered {
        address: String,
        device_type: String,
    },
    DeviceRemoved {
        address: String,
    },
    Acknowledged,
    Rejected(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("empty frame")]
    Empty,
    #[error("frame is not valid UTF-8")]
    NotUtf8,
    #[error("malformed frame '{frame}': {reason}")]
    Malformed { frame: String, reason: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum EncodeError {
    #[error("value '{value_name}' cannot be written")]
    ReadOnly { value_name: String },
    #[error("cannot encode {raw} for '{value_name}'")]
    Unsupported { value_name: String, raw: RawValue },
}

#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("rejected by the device: {0}")]
    Rejected(String),
    #[error("transport is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A protocol specific integration. The core never parses frames or addresses itself.
#[async_trait]
pub trait BindingAdapter: Debug + Send + Sync {
    fn id(&self) -> &'static str;

    /// Called once on activation.
    fn register_converters(&self, registrar: &BindingRegistrar<'_>);

    /// Builds the device for a newly seen address. `device_type` is known when the protocol announced it.
    fn create_device(&self, address: &str, device_type: Option<&str>) -> Result<Device, DeviceFactoryError>;

    fn decode(&self, frame: &[u8]) -> Result<ProtocolEvent, ParseError>;

    fn encode(&self, address: &str, value_name: &str, raw: &RawValue) -> Result<Vec<u8>, EncodeError>;

    /// Sends `frame` and waits for the transport's acknowledgement.
    async fn transmit(&self, frame: Vec<u8>) -> Result<(), TransmitError>;

    /// Receives acknowledgements decoded from inbound frames, `Err` carrying the rejection reason.
    fn acknowledge(&self, _outcome: Result<(), String>) {}
}
