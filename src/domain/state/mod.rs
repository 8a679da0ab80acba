mod format;
mod percent;
mod state;

pub use percent::Percent;
pub use state::{ConversionError, OnOff, OpenClosed, State, StateKind};
