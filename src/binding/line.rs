//! A plain text line protocol, one frame per line:
//!
//! ```text
//! +01 bulb              device 01 of type bulb discovered
//! -01                   device 01 removed
//! 01 BRIGHTNESS 128     value of device 01
//! 02:1 ON true          value of channel 1 of device 02
//! ACK / NAK reason      acknowledgement of the last command
//! ```

use crate::binding::{BindingAdapter, EncodeError, ParseError, ProtocolEvent, TransmitError};
use crate::converter::BindingRegistrar;
use crate::converter::standard::{scaled_level_to_state, state_to_scaled_level, step_percent};
use crate::device_cache::DeviceFactoryError;
use crate::domain::RawValue;
use crate::domain::commands::CommandKind;
use crate::domain::device::Device;
use crate::domain::state::StateKind;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::Sender;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, instrument, warn};

pub const BINDING_ID: &str = "line";

const BRIGHTNESS_MAX: u32 = 255;
const BRIGHTNESS_STEP: u32 = 10;
const READ_ONLY: [&str; 4] = ["TEMPERATURE", "HUMIDITY", "CONTACT", "LAST_SEEN"];

type Acknowledgement = oneshot::Sender<Result<(), String>>;

#[derive(Debug)]
pub struct LineBinding {
    outbound: Sender<Vec<u8>>,
    in_flight: AsyncMutex<()>,
    pending: Mutex<Option<Acknowledgement>>,
}

impl LineBinding {
    /// Encoded commands are written to `outbound`, without a line terminator.
    pub fn new(outbound: Sender<Vec<u8>>) -> Self {
        LineBinding {
            outbound,
            in_flight: AsyncMutex::new(()),
            pending: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BindingAdapter for LineBinding {
    fn id(&self) -> &'static str {
        BINDING_ID
    }

    fn register_converters(&self, registrar: &BindingRegistrar<'_>) {
        let max = Decimal::from(BRIGHTNESS_MAX);
        for kind in [StateKind::Percent, StateKind::OnOff] {
            registrar.register(
                "BRIGHTNESS",
                kind,
                move |raw| scaled_level_to_state(raw, max),
                move |state| state_to_scaled_level(state, max),
            );
        }
        registrar.register_command("BRIGHTNESS", CommandKind::IncreaseDecrease, |command, current| {
            step_percent(command, current, Decimal::from(BRIGHTNESS_STEP))
        });

        registrar.register_standard("ON", &[StateKind::OnOff]);
        registrar.register_standard("TEMPERATURE", &[StateKind::Decimal, StateKind::String]);
        registrar.register_standard("HUMIDITY", &[StateKind::Decimal, StateKind::String]);
        registrar.register_standard("CONTACT", &[StateKind::OpenClosed]);
        registrar.register_standard("LAST_SEEN", &[StateKind::DateTime]);
    }

    fn create_device(&self, address: &str, device_type: Option<&str>) -> Result<Device, DeviceFactoryError> {
        let builder = Device::builder(address, device_type.unwrap_or_default(), BINDING_ID);
        let device = match device_type {
            Some("bulb") => builder
                .channel(1, [("ON", StateKind::OnOff), ("BRIGHTNESS", StateKind::Percent), ("BRIGHTNESS", StateKind::OnOff)])
                .build(),
            Some("sensor") => builder
                .channel(
                    1,
                    [
                        ("TEMPERATURE", StateKind::Decimal),
                        ("HUMIDITY", StateKind::Decimal),
                        ("LAST_SEEN", StateKind::DateTime),
                    ],
                )
                .build(),
            Some("contact") => builder
                .channel(1, [("CONTACT", StateKind::OpenClosed), ("LAST_SEEN", StateKind::DateTime)])
                .build(),
            Some(other) => return Err(DeviceFactoryError::UnsupportedType(other.to_string())),
            None => return Err(DeviceFactoryError::MissingType(address.to_string())),
        };
        Ok(device)
    }

    fn decode(&self, frame: &[u8]) -> Result<ProtocolEvent, ParseError> {
        let line = std::str::from_utf8(frame).map_err(|_| ParseError::NotUtf8)?.trim();
        let malformed = |reason: &str| ParseError::Malformed {
            frame: line.to_string(),
            reason: reason.to_string(),
        };

        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        if line == "ACK" {
            return Ok(ProtocolEvent::Acknowledged);
        }
        if line == "NAK" {
            return Ok(ProtocolEvent::Rejected("no reason given".to_string()));
        }
        if let Some(reason) = line.strip_prefix("NAK ") {
            return Ok(ProtocolEvent::Rejected(reason.trim().to_string()));
        }

        if let Some(announcement) = line.strip_prefix('+') {
            let mut parts = announcement.split_whitespace();
            return match (parts.next(), parts.next()) {
                (Some(address), Some(device_type)) => Ok(ProtocolEvent::DeviceDiscovered {
                    address: address.to_string(),
                    device_type: device_type.to_string(),
                }),
                _ => Err(malformed("expected '+<address> <type>'")),
            };
        }
        if let Some(address) = line.strip_prefix('-') {
            let address = address.trim();
            if address.is_empty() {
                return Err(malformed("expected '-<address>'"));
            }
            return Ok(ProtocolEvent::DeviceRemoved {
                address: address.to_string(),
            });
        }

        let mut parts = line.splitn(3, char::is_whitespace);
        let (Some(target), Some(value_name), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed("expected '<address>[:<channel>] <KEY> <value>'"));
        };

        let (address, channel) = match target.split_once(':') {
            Some((address, channel)) => (address, Some(channel.parse::<u32>().map_err(|_| malformed("channel is not a number"))?)),
            None => (target, None),
        };

        Ok(ProtocolEvent::Value {
            address: address.to_string(),
            channel,
            value_name: value_name.to_string(),
            raw: RawValue::parse(raw.trim()),
        })
    }

    fn encode(&self, address: &str, value_name: &str, raw: &RawValue) -> Result<Vec<u8>, EncodeError> {
        if READ_ONLY.contains(&value_name) {
            return Err(EncodeError::ReadOnly {
                value_name: value_name.to_string(),
            });
        }
        if *raw == RawValue::Null {
            return Err(EncodeError::Unsupported {
                value_name: value_name.to_string(),
                raw: raw.clone(),
            });
        }

        Ok(format!("{} {} {}", address, value_name, raw).into_bytes())
    }

    /// Waits for the acknowledgement of this frame before the next command may be sent.
    #[instrument(skip_all)]
    async fn transmit(&self, frame: Vec<u8>) -> Result<(), TransmitError> {
        let _in_flight = self.in_flight.lock().await;

        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        debug!("📤 Writing '{}'", String::from_utf8_lossy(&frame));
        self.outbound.send(frame).await.map_err(|_| TransmitError::Closed)?;

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(TransmitError::Rejected(reason)),
            Err(_) => Err(TransmitError::Closed),
        }
    }

    fn acknowledge(&self, outcome: Result<(), String>) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        match pending {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    debug!("Acknowledgement arrived after the command was abandoned");
                }
            }
            None => warn!("⚠️ Received an acknowledgement while no command was in flight"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConverterRegistry;
    use crate::domain::Number;
    use crate::domain::state::{OnOff, State};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn binding() -> LineBinding {
        let (tx, _rx) = mpsc::channel(1);
        LineBinding::new(tx)
    }

    fn value(address: &str, channel: Option<u32>, value_name: &str, raw: RawValue) -> ProtocolEvent {
        ProtocolEvent::Value {
            address: address.to_string(),
            channel,
            value_name: value_name.to_string(),
            raw,
        }
    }

    #[rstest]
    #[case("ACK", ProtocolEvent::Acknowledged)]
    #[case("NAK busy", ProtocolEvent::Rejected("busy".to_string()))]
    #[case("NAK", ProtocolEvent::Rejected("no reason given".to_string()))]
    #[case("+01 bulb\n", ProtocolEvent::DeviceDiscovered { address: "01".to_string(), device_type: "bulb".to_string() })]
    #[case("-01", ProtocolEvent::DeviceRemoved { address: "01".to_string() })]
    #[case("01 BRIGHTNESS 128", value("01", None, "BRIGHTNESS", RawValue::Number(Number::PositiveInt(128))))]
    #[case("02:1 ON true", value("02", Some(1), "ON", RawValue::Bool(true)))]
    #[case("03 TEMPERATURE -2.5", value("03", None, "TEMPERATURE", RawValue::Number(Number::Float(-2.5))))]
    #[case("03 HUMIDITY null", value("03", None, "HUMIDITY", RawValue::Null))]
    #[case("04 LAST_SEEN 2026-01-02T10:00:00+01:00", value("04", None, "LAST_SEEN", RawValue::Text("2026-01-02T10:00:00+01:00".to_string())))]
    #[case("05 NAME living room", value("05", None, "NAME", RawValue::Text("living room".to_string())))]
    fn decodes_frames(#[case] frame: &str, #[case] expected: ProtocolEvent) {
        assert_eq!(binding().decode(frame.as_bytes()).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("+01")]
    #[case("-")]
    #[case("01 BRIGHTNESS")]
    #[case("01:x ON true")]
    fn rejects_malformed_frames(#[case] frame: &str) {
        assert!(binding().decode(frame.as_bytes()).is_err());
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(binding().decode(&[0xff, 0xfe]), Err(ParseError::NotUtf8));
    }

    #[test]
    fn encodes_writable_values() {
        let binding = binding();

        let frame = binding.encode("01:1", "BRIGHTNESS", &RawValue::Number(Number::PositiveInt(128))).unwrap();

        assert_eq!(String::from_utf8(frame).unwrap(), "01:1 BRIGHTNESS 128");
        assert_eq!(
            binding.encode("03", "TEMPERATURE", &RawValue::Number(Number::PositiveInt(20))),
            Err(EncodeError::ReadOnly {
                value_name: "TEMPERATURE".to_string()
            })
        );
        assert!(binding.encode("01", "ON", &RawValue::Null).is_err());
    }

    #[rstest]
    #[case("bulb", "BRIGHTNESS", vec![StateKind::Percent, StateKind::OnOff])]
    #[case("sensor", "HUMIDITY", vec![StateKind::Decimal])]
    #[case("contact", "CONTACT", vec![StateKind::OpenClosed])]
    fn creates_known_device_types(#[case] device_type: &str, #[case] value_name: &str, #[case] kinds: Vec<StateKind>) {
        let device = binding().create_device("01", Some(device_type)).unwrap();

        assert_eq!(device.device_type(), device_type);
        assert_eq!(device.binding_id(), BINDING_ID);
        assert_eq!(device.accepted_kinds(None, value_name), kinds);
    }

    #[test]
    fn refuses_unknown_device_types() {
        assert_eq!(
            binding().create_device("01", Some("toaster")).unwrap_err(),
            DeviceFactoryError::UnsupportedType("toaster".to_string())
        );
        assert_eq!(binding().create_device("01", None).unwrap_err(), DeviceFactoryError::MissingType("01".to_string()));
    }

    #[test]
    fn brightness_converts_like_a_dimmable_bulb() {
        let registry = ConverterRegistry::default();
        binding().register_converters(&registry.for_binding(BINDING_ID));

        let converter = registry.resolve_to_typed("BRIGHTNESS", &[StateKind::Percent, StateKind::OnOff]).unwrap();
        let writer = registry.resolve_from_typed("BRIGHTNESS", StateKind::OnOff).unwrap();

        assert_eq!(converter.kind(), StateKind::Percent);
        assert_eq!(converter.to_state(&RawValue::Number(Number::PositiveInt(0))).unwrap(), State::OnOff(OnOff::Off));
        assert_eq!(converter.to_state(&RawValue::Number(Number::PositiveInt(128))).unwrap(), State::percent(50));
        assert_eq!(writer.from_state(&State::OnOff(OnOff::On)).unwrap(), RawValue::Number(Number::PositiveInt(255)));
    }

    #[test_log::test(tokio::test)]
    async fn transmit_waits_for_the_acknowledgement() {
        let (tx, mut rx) = mpsc::channel(1);
        let binding = Arc::new(LineBinding::new(tx));

        let acknowledger = binding.clone();
        let remote = tokio::spawn(async move {
            let frame = rx.recv().await.unwrap();
            acknowledger.acknowledge(Ok(()));
            frame
        });

        binding.transmit(b"01 ON true".to_vec()).await.unwrap();

        assert_eq!(remote.await.unwrap(), b"01 ON true".to_vec());
    }

    #[test_log::test(tokio::test)]
    async fn a_negative_acknowledgement_rejects_the_frame() {
        let (tx, mut rx) = mpsc::channel(1);
        let binding = Arc::new(LineBinding::new(tx));

        let acknowledger = binding.clone();
        tokio::spawn(async move {
            rx.recv().await.unwrap();
            acknowledger.acknowledge(Err("out of range".to_string()));
        });

        let result = binding.transmit(b"01 BRIGHTNESS 999".to_vec()).await;

        assert!(matches!(result, Err(TransmitError::Rejected(reason)) if reason == "out of range"));
    }

    #[test_log::test(tokio::test)]
    async fn transmit_fails_when_the_transport_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let binding = LineBinding::new(tx);

        let result = binding.transmit(b"01 ON true".to_vec()).await;

        assert!(matches!(result, Err(TransmitError::Closed)));
    }
}
