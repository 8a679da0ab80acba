pub mod commands;
pub mod device;
pub mod events;
pub mod item;
mod number;
mod raw_value;
pub mod state;
mod state_map;

pub use number::Number;
pub use raw_value::RawValue;
pub use state_map::StateMap;
