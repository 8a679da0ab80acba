use crate::domain::state::{ConversionError, OnOff, OpenClosed, State, StateKind};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// An instruction sent to an item. Any defined state can be used as a command, e.g. `ON` or `50%`.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub enum Command {
    State(State),
    IncreaseDecrease(IncreaseDecrease),
    UpDown(UpDown),
    StopMove(StopMove),
    Refresh,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CommandKind {
    State(StateKind),
    IncreaseDecrease,
    UpDown,
    StopMove,
    Refresh,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum IncreaseDecrease {
    Increase,
    Decrease,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum UpDown {
    Up,
    Down,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum StopMove {
    Stop,
    Move,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::State(state) => CommandKind::State(state.kind()),
            Command::IncreaseDecrease(_) => CommandKind::IncreaseDecrease,
            Command::UpDown(_) => CommandKind::UpDown,
            Command::StopMove(_) => CommandKind::StopMove,
            Command::Refresh => CommandKind::Refresh,
        }
    }

    pub fn as_state(&self) -> Option<&State> {
        match self {
            Command::State(state) => Some(state),
            _ => None,
        }
    }
}

impl From<State> for Command {
    fn from(state: State) -> Self {
        Command::State(state)
    }
}

impl FromStr for Command {
    type Err = ConversionError;

    /// Reads a command from its textual form: keywords such as `ON`, `INCREASE` or `REFRESH`,
    /// `42%` for a percentage, a number for a decimal, and any other text as a string state.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let command = match text.to_ascii_uppercase().as_str() {
            "" | "UNDEF" | "NULL" => {
                return Err(ConversionError::Unsupported {
                    from: format!("'{}'", s),
                    to: "command".to_string(),
                });
            }
            "ON" => Command::State(State::OnOff(OnOff::On)),
            "OFF" => Command::State(State::OnOff(OnOff::Off)),
            "OPEN" => Command::State(State::OpenClosed(OpenClosed::Open)),
            "CLOSED" => Command::State(State::OpenClosed(OpenClosed::Closed)),
            "INCREASE" => Command::IncreaseDecrease(IncreaseDecrease::Increase),
            "DECREASE" => Command::IncreaseDecrease(IncreaseDecrease::Decrease),
            "UP" => Command::UpDown(UpDown::Up),
            "DOWN" => Command::UpDown(UpDown::Down),
            "STOP" => Command::StopMove(StopMove::Stop),
            "MOVE" => Command::StopMove(StopMove::Move),
            "REFRESH" => Command::Refresh,
            _ if text.ends_with('%') => Command::State(State::parse(StateKind::Percent, text)?),
            _ => match Decimal::from_str(text) {
                Ok(value) => Command::State(State::Decimal(value)),
                Err(_) => Command::State(State::String(text.to_string())),
            },
        };
        Ok(command)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::State(State::Percent(value)) => write!(f, "{}%", value),
            Command::State(state) => write!(f, "{}", state),
            Command::IncreaseDecrease(IncreaseDecrease::Increase) => write!(f, "INCREASE"),
            Command::IncreaseDecrease(IncreaseDecrease::Decrease) => write!(f, "DECREASE"),
            Command::UpDown(UpDown::Up) => write!(f, "UP"),
            Command::UpDown(UpDown::Down) => write!(f, "DOWN"),
            Command::StopMove(StopMove::Stop) => write!(f, "STOP"),
            Command::StopMove(StopMove::Move) => write!(f, "MOVE"),
            Command::Refresh => write!(f, "REFRESH"),
        }
    }
}

impl Display for CommandKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::State(kind) => write!(f, "{} commands", kind),
            CommandKind::IncreaseDecrease => write!(f, "increase/decrease commands"),
            CommandKind::UpDown => write!(f, "up/down commands"),
            CommandKind::StopMove => write!(f, "stop/move commands"),
            CommandKind::Refresh => write!(f, "refresh commands"),
        }
    }
}
