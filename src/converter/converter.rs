use crate::domain::RawValue;
use crate::domain::commands::{Command, CommandKind};
use crate::domain::state::{ConversionError, State, StateKind};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub type ToStateFn = Arc<dyn Fn(&RawValue) -> Result<State, ConversionError> + Send + Sync>;
pub type FromStateFn = Arc<dyn Fn(&State) -> Result<RawValue, ConversionError> + Send + Sync>;
pub type CommandFn = Arc<dyn Fn(&Command, Option<&State>) -> Result<State, ConversionError> + Send + Sync>;

/// Converts values of one protocol key from and to states of one kind.
pub struct StateConverter {
    protocol_key: String,
    kind: StateKind,
    owner: Option<&'static str>,
    to_state: ToStateFn,
    from_state: FromStateFn,
}

impl StateConverter {
    pub(super) fn new(protocol_key: String, kind: StateKind, owner: Option<&'static str>, to_state: ToStateFn, from_state: FromStateFn) -> Self {
        StateConverter {
            protocol_key,
            kind,
            owner,
            to_state,
            from_state,
        }
    }

    pub fn protocol_key(&self) -> &str {
        &self.protocol_key
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub(super) fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    pub fn to_state(&self, raw: &RawValue) -> Result<State, ConversionError> {
        (self.to_state)(raw)
    }

    pub fn from_state(&self, state: &State) -> Result<RawValue, ConversionError> {
        (self.from_state)(state)
    }
}

impl Debug for StateConverter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateConverter")
            .field("protocol_key", &self.protocol_key)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Turns a command, given the current state of the target, into the state to send.
pub struct CommandConverter {
    protocol_key: String,
    command_kind: CommandKind,
    owner: Option<&'static str>,
    convert: CommandFn,
}

impl CommandConverter {
    pub(super) fn new(protocol_key: String, command_kind: CommandKind, owner: Option<&'static str>, convert: CommandFn) -> Self {
        CommandConverter {
            protocol_key,
            command_kind,
            owner,
            convert,
        }
    }

    /// Passes a command that is itself a state through unchanged.
    pub(super) fn identity(protocol_key: &str, command_kind: CommandKind) -> Self {
        let convert: CommandFn = Arc::new(|command, _| {
            command.as_state().cloned().ok_or_else(|| ConversionError::Unsupported {
                from: command.to_string(),
                to: "state".to_string(),
            })
        });
        CommandConverter::new(protocol_key.to_string(), command_kind, None, convert)
    }

    pub fn protocol_key(&self) -> &str {
        &self.protocol_key
    }

    pub fn command_kind(&self) -> CommandKind {
        self.command_kind
    }

    pub(super) fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    pub fn convert(&self, command: &Command, current: Option<&State>) -> Result<State, ConversionError> {
        (self.convert)(command, current)
    }
}

impl Debug for CommandConverter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandConverter")
            .field("protocol_key", &self.protocol_key)
            .field("command_kind", &self.command_kind)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
