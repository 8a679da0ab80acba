mod converter;
mod precedence;
mod registry;
pub mod standard;

pub use converter::{CommandConverter, StateConverter};
pub use precedence::KindPrecedence;
pub use registry::{BindingRegistrar, ConverterRegistry};
