use crate::domain::state::format::{format_number, format_text};
use crate::domain::state::Percent;
use crate::domain::{Number, RawValue};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// The value of an item or device property as it flows over the bus.
///
/// `Undefined` never compares equal to anything, not even another `Undefined`, so that a
/// previously undefined value is always considered changed.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum State {
    OnOff(OnOff),
    OpenClosed(OpenClosed),
    Decimal(Decimal),
    Percent(Percent),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Undefined,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum StateKind {
    OnOff,
    OpenClosed,
    Decimal,
    Percent,
    String,
    DateTime,
    Undefined,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum OnOff {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum OpenClosed {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConversionError {
    #[error("'{value}' is not a valid {kind} value")]
    InvalidValue { kind: StateKind, value: String },
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: String, to: String },
}

impl StateKind {
    /// Every kind a defined value can have.
    pub const DEFINED: [StateKind; 6] = [
        StateKind::OnOff,
        StateKind::OpenClosed,
        StateKind::Decimal,
        StateKind::Percent,
        StateKind::String,
        StateKind::DateTime,
    ];
}

impl Display for StateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StateKind::OnOff => "on/off",
            StateKind::OpenClosed => "open/closed",
            StateKind::Decimal => "decimal",
            StateKind::Percent => "percent",
            StateKind::String => "string",
            StateKind::DateTime => "date-time",
            StateKind::Undefined => "undefined",
        };
        write!(f, "{}", name)
    }
}

impl State {
    pub fn kind(&self) -> StateKind {
        match self {
            State::OnOff(_) => StateKind::OnOff,
            State::OpenClosed(_) => StateKind::OpenClosed,
            State::Decimal(_) => StateKind::Decimal,
            State::Percent(_) => StateKind::Percent,
            State::String(_) => StateKind::String,
            State::DateTime(_) => StateKind::DateTime,
            State::Undefined => StateKind::Undefined,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, State::Undefined)
    }

    pub fn percent(value: impl Into<Decimal>) -> State {
        State::Percent(Percent::new(value.into()))
    }

    /// Parses the canonical textual form of a state of the given kind.
    pub fn parse(kind: StateKind, text: &str) -> Result<State, ConversionError> {
        let trimmed = text.trim();
        let invalid = || ConversionError::InvalidValue {
            kind,
            value: text.to_string(),
        };

        match kind {
            StateKind::OnOff => trimmed.parse::<OnOff>().map(State::OnOff).map_err(|_| invalid()),
            StateKind::OpenClosed => trimmed.parse::<OpenClosed>().map(State::OpenClosed).map_err(|_| invalid()),
            StateKind::Decimal => parse_decimal(trimmed).map(State::Decimal).ok_or_else(invalid),
            StateKind::Percent => parse_decimal(trimmed.trim_end_matches('%').trim_end())
                .map(|value| State::Percent(Percent::new(value)))
                .ok_or_else(invalid),
            StateKind::String => Ok(State::String(text.to_string())),
            StateKind::DateTime => DateTime::parse_from_rfc3339(trimmed).map(State::DateTime).map_err(|_| invalid()),
            StateKind::Undefined if trimmed.eq_ignore_ascii_case("UNDEF") || trimmed.eq_ignore_ascii_case("NULL") => Ok(State::Undefined),
            StateKind::Undefined => Err(invalid()),
        }
    }

    /// Coerces a protocol value into a state of the requested kind. `Null` always becomes `Undefined`.
    pub fn from_raw(raw: &RawValue, kind: StateKind) -> Result<State, ConversionError> {
        let unsupported = || ConversionError::Unsupported {
            from: format!("'{}'", raw),
            to: kind.to_string(),
        };

        match (raw, kind) {
            (RawValue::Null, _) => Ok(State::Undefined),
            (RawValue::Text(text), kind) => State::parse(kind, text),
            (_, StateKind::String) => Ok(State::String(raw.to_string())),

            (RawValue::Bool(value), StateKind::OnOff) => Ok(State::OnOff(OnOff::from(*value))),
            (RawValue::Number(number), StateKind::OnOff) => Ok(State::OnOff(OnOff::from(number.as_f64() != 0.0))),

            (RawValue::Bool(value), StateKind::OpenClosed) => Ok(State::OpenClosed(OpenClosed::from(*value))),
            (RawValue::Number(number), StateKind::OpenClosed) => Ok(State::OpenClosed(OpenClosed::from(number.as_f64() != 0.0))),

            (RawValue::Bool(value), StateKind::Decimal) => Ok(State::Decimal(Decimal::from(*value as u8))),
            (RawValue::Number(number), StateKind::Decimal) => number.to_decimal().map(State::Decimal).ok_or_else(unsupported),

            (RawValue::Bool(true), StateKind::Percent) => Ok(State::Percent(Percent::HUNDRED)),
            (RawValue::Bool(false), StateKind::Percent) => Ok(State::Percent(Percent::ZERO)),
            (RawValue::Number(number), StateKind::Percent) => number.to_decimal().map(State::percent).ok_or_else(unsupported),

            (RawValue::Number(number), StateKind::DateTime) => number
                .as_u64()
                .and_then(|seconds| i64::try_from(seconds).ok())
                .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
                .map(|datetime| State::DateTime(datetime.fixed_offset()))
                .ok_or_else(unsupported),

            _ => Err(unsupported()),
        }
    }

    /// The natural protocol value of this state.
    pub fn to_raw(&self) -> RawValue {
        match self {
            State::OnOff(value) => RawValue::Bool(*value == OnOff::On),
            State::OpenClosed(value) => RawValue::Bool(*value == OpenClosed::Open),
            State::Decimal(value) => RawValue::Number(Number::from_decimal(*value)),
            State::Percent(value) => RawValue::Number(Number::from_decimal(value.value())),
            State::String(value) => RawValue::Text(value.clone()),
            State::DateTime(value) => RawValue::Text(value.to_rfc3339()),
            State::Undefined => RawValue::Null,
        }
    }

    /// Renders the state with a display pattern, e.g. `%.1f °C` for numbers or `%H:%M` for date-times.
    pub fn format(&self, pattern: &str) -> String {
        match self {
            State::Decimal(value) => format_number(pattern, *value),
            State::Percent(value) => format_number(pattern, value.value()),
            State::DateTime(value) => {
                if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                    value.to_rfc3339()
                } else {
                    value.format(pattern).to_string()
                }
            }
            other => format_text(pattern, &other.to_string()),
        }
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text)).ok()
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (State::OnOff(a), State::OnOff(b)) => a == b,
            (State::OpenClosed(a), State::OpenClosed(b)) => a == b,
            (State::Decimal(a), State::Decimal(b)) => a == b,
            (State::Percent(a), State::Percent(b)) => a == b,
            (State::String(a), State::String(b)) => a == b,
            (State::DateTime(a), State::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            State::OnOff(value) => write!(f, "{}", value),
            State::OpenClosed(value) => write!(f, "{}", value),
            State::Decimal(value) => write!(f, "{}", value),
            State::Percent(value) => write!(f, "{}", value),
            State::String(value) => write!(f, "{}", value),
            State::DateTime(value) => write!(f, "{}", value.to_rfc3339()),
            State::Undefined => write!(f, "UNDEF"),
        }
    }
}

impl From<bool> for OnOff {
    fn from(value: bool) -> Self {
        if value { OnOff::On } else { OnOff::Off }
    }
}

impl FromStr for OnOff {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ON" => Ok(OnOff::On),
            "OFF" => Ok(OnOff::Off),
            _ => Err(()),
        }
    }
}

impl Display for OnOff {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OnOff::On => write!(f, "ON"),
            OnOff::Off => write!(f, "OFF"),
        }
    }
}

impl From<bool> for OpenClosed {
    fn from(value: bool) -> Self {
        if value { OpenClosed::Open } else { OpenClosed::Closed }
    }
}

impl FromStr for OpenClosed {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(OpenClosed::Open),
            "CLOSED" => Ok(OpenClosed::Closed),
            _ => Err(()),
        }
    }
}

impl Display for OpenClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenClosed::Open => write!(f, "OPEN"),
            OpenClosed::Closed => write!(f, "CLOSED"),
        }
    }
}
