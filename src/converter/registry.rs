use crate::converter::converter::{CommandConverter, CommandFn, FromStateFn, StateConverter, ToStateFn};
use crate::converter::precedence::KindPrecedence;
use crate::domain::RawValue;
use crate::domain::commands::{Command, CommandKind};
use crate::domain::state::{ConversionError, State, StateKind};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, instrument, trace};

/// Holds the converters every binding registers for its protocol keys.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
    precedence: RwLock<KindPrecedence>,
    state_converters: RwLock<Vec<Arc<StateConverter>>>,
    command_converters: RwLock<Vec<Arc<CommandConverter>>>,
}

/// Registers converters on behalf of one binding, so they can be dropped when it is deactivated.
#[derive(Debug)]
pub struct BindingRegistrar<'a> {
    registry: &'a ConverterRegistry,
    owner: &'static str,
}

impl ConverterRegistry {
    pub fn new(precedence: KindPrecedence) -> Self {
        ConverterRegistry {
            precedence: RwLock::new(precedence),
            ..ConverterRegistry::default()
        }
    }

    pub fn set_precedence(&self, precedence: KindPrecedence) {
        *self.precedence.write().unwrap_or_else(PoisonError::into_inner) = precedence;
    }

    pub fn for_binding(&self, owner: &'static str) -> BindingRegistrar<'_> {
        BindingRegistrar { registry: self, owner }
    }

    pub fn register<T, F>(&self, protocol_key: &str, kind: StateKind, to_state: T, from_state: F)
    where
        T: Fn(&RawValue) -> Result<State, ConversionError> + Send + Sync + 'static,
        F: Fn(&State) -> Result<RawValue, ConversionError> + Send + Sync + 'static,
    {
        self.insert_state_converter(StateConverter::new(protocol_key.to_string(), kind, None, Arc::new(to_state), Arc::new(from_state)));
    }

    pub fn register_command<C>(&self, protocol_key: &str, command_kind: CommandKind, convert: C)
    where
        C: Fn(&Command, Option<&State>) -> Result<State, ConversionError> + Send + Sync + 'static,
    {
        self.insert_command_converter(CommandConverter::new(protocol_key.to_string(), command_kind, None, Arc::new(convert)));
    }

    /// Picks the converter for `protocol_key` whose kind is acceptable and ranks highest.
    /// Equal ranks are resolved in favour of the converter registered first.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve_to_typed(&self, protocol_key: &str, acceptable_kinds: &[StateKind]) -> Option<Arc<StateConverter>> {
        let precedence = self.precedence.read().unwrap_or_else(PoisonError::into_inner);
        let converters = self.state_converters.read().unwrap_or_else(PoisonError::into_inner);

        let mut best: Option<&Arc<StateConverter>> = None;
        for converter in converters.iter() {
            if converter.protocol_key() != protocol_key || !acceptable_kinds.contains(&converter.kind()) {
                continue;
            }

            match best {
                Some(current) if precedence.rank(converter.kind()) <= precedence.rank(current.kind()) => {}
                _ => best = Some(converter),
            }
        }

        trace!(kind = ?best.map(|converter| converter.kind()), "Resolved converter for '{}'", protocol_key);
        best.cloned()
    }

    /// The converter for exactly `kind`, the outgoing direction allows no ambiguity.
    pub fn resolve_from_typed(&self, protocol_key: &str, kind: StateKind) -> Option<Arc<StateConverter>> {
        self.state_converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|converter| converter.protocol_key() == protocol_key && converter.kind() == kind)
            .cloned()
    }

    /// The converter for `command_kind`. A command that is a defined state passes through
    /// unchanged when no dedicated converter exists.
    pub fn resolve_command_converter(&self, protocol_key: &str, command_kind: CommandKind) -> Option<Arc<CommandConverter>> {
        let registered = self
            .command_converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|converter| converter.protocol_key() == protocol_key && converter.command_kind() == command_kind)
            .cloned();

        registered.or_else(|| match command_kind {
            CommandKind::State(kind) if kind != StateKind::Undefined => Some(Arc::new(CommandConverter::identity(protocol_key, command_kind))),
            _ => None,
        })
    }

    /// Removes every converter registered through [`ConverterRegistry::for_binding`] by `owner`.
    pub fn remove_binding(&self, owner: &'static str) -> usize {
        let mut state_converters = self.state_converters.write().unwrap_or_else(PoisonError::into_inner);
        let mut command_converters = self.command_converters.write().unwrap_or_else(PoisonError::into_inner);
        let before = state_converters.len() + command_converters.len();

        state_converters.retain(|converter| converter.owner() != Some(owner));
        command_converters.retain(|converter| converter.owner() != Some(owner));

        let removed = before - state_converters.len() - command_converters.len();
        debug!(binding = owner, "🔌 Removed {} converter(s)", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.state_converters.read().unwrap_or_else(PoisonError::into_inner).len()
            + self.command_converters.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert_state_converter(&self, converter: StateConverter) {
        let mut converters = self.state_converters.write().unwrap_or_else(PoisonError::into_inner);
        let existing = converters
            .iter_mut()
            .find(|existing| existing.protocol_key() == converter.protocol_key() && existing.kind() == converter.kind());

        debug!(binding = ?converter.owner(), "🔌 Registered converter for '{}' as {}", converter.protocol_key(), converter.kind());
        match existing {
            Some(existing) => *existing = Arc::new(converter),
            None => converters.push(Arc::new(converter)),
        }
    }

    fn insert_command_converter(&self, converter: CommandConverter) {
        let mut converters = self.command_converters.write().unwrap_or_else(PoisonError::into_inner);
        let existing = converters
            .iter_mut()
            .find(|existing| existing.protocol_key() == converter.protocol_key() && existing.command_kind() == converter.command_kind());

        debug!(binding = ?converter.owner(), "🔌 Registered command converter for '{}' from {:?}", converter.protocol_key(), converter.command_kind());
        match existing {
            Some(existing) => *existing = Arc::new(converter),
            None => converters.push(Arc::new(converter)),
        }
    }
}

impl BindingRegistrar<'_> {
    pub fn register<T, F>(&self, protocol_key: &str, kind: StateKind, to_state: T, from_state: F)
    where
        T: Fn(&RawValue) -> Result<State, ConversionError> + Send + Sync + 'static,
        F: Fn(&State) -> Result<RawValue, ConversionError> + Send + Sync + 'static,
    {
        let to_state: ToStateFn = Arc::new(to_state);
        let from_state: FromStateFn = Arc::new(from_state);
        self.registry
            .insert_state_converter(StateConverter::new(protocol_key.to_string(), kind, Some(self.owner), to_state, from_state));
    }

    /// Registers the plain coercion in both directions for each of the given kinds.
    pub fn register_standard(&self, protocol_key: &str, kinds: &[StateKind]) {
        for kind in kinds {
            let kind = *kind;
            self.register(protocol_key, kind, move |raw| State::from_raw(raw, kind), |state| Ok(state.to_raw()));
        }
    }

    pub fn register_command<C>(&self, protocol_key: &str, command_kind: CommandKind, convert: C)
    where
        C: Fn(&Command, Option<&State>) -> Result<State, ConversionError> + Send + Sync + 'static,
    {
        let convert: CommandFn = Arc::new(convert);
        self.registry
            .insert_command_converter(CommandConverter::new(protocol_key.to_string(), command_kind, Some(self.owner), convert));
    }
}
