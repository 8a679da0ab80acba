use crate::binding::{BindingAdapter, EncodeError, ParseError, ProtocolEvent, TransmitError};
use crate::converter::BindingRegistrar;
use crate::device_cache::DeviceFactoryError;
use crate::domain::RawValue;
use crate::domain::device::Device;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Clone, Debug)]
pub enum StubReply {
    Ack,
    Nak(String),
    Never,
}

/// Records transmitted frames and answers with a fixed reply. Frames are `<address> <key> <raw>`.
#[derive(Debug)]
pub struct StubBinding {
    reply: StubReply,
    transmitted: Mutex<Vec<String>>,
}

impl StubBinding {
    pub fn new(reply: StubReply) -> Self {
        StubBinding {
            reply,
            transmitted: Mutex::new(vec![]),
        }
    }

    pub fn transmitted(&self) -> Vec<String> {
        self.transmitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl BindingAdapter for StubBinding {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn register_converters(&self, _registrar: &BindingRegistrar<'_>) {}

    fn create_device(&self, address: &str, device_type: Option<&str>) -> Result<Device, DeviceFactoryError> {
        Ok(Device::builder(address, device_type.unwrap_or("stub"), "stub").build())
    }

    fn decode(&self, frame: &[u8]) -> Result<ProtocolEvent, ParseError> {
        let text = std::str::from_utf8(frame).map_err(|_| ParseError::NotUtf8)?;
        let mut parts = text.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(address), Some(value_name), Some(raw)) => Ok(ProtocolEvent::Value {
                address: address.to_string(),
                channel: None,
                value_name: value_name.to_string(),
                raw: RawValue::parse(raw),
            }),
            _ => Err(ParseError::Empty),
        }
    }

    fn encode(&self, address: &str, value_name: &str, raw: &RawValue) -> Result<Vec<u8>, EncodeError> {
        Ok(format!("{} {} {}", address, value_name, raw).into_bytes())
    }

    async fn transmit(&self, frame: Vec<u8>) -> Result<(), TransmitError> {
        self.transmitted.lock().unwrap().push(String::from_utf8_lossy(&frame).to_string());
        match &self.reply {
            StubReply::Ack => Ok(()),
            StubReply::Nak(reason) => Err(TransmitError::Rejected(reason.clone())),
            StubReply::Never => std::future::pending().await,
        }
    }
}
