mod adapter;
pub mod line;
mod runner;
#[cfg(test)]
pub(crate) mod stub;
pub mod tcp;

pub use adapter::{BindingAdapter, EncodeError, ParseError, ProtocolEvent, TransmitError};
pub use runner::{BindingError, BindingRunner};
