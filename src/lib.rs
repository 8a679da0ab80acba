pub mod app_config;
pub mod binding;
pub mod bus;
pub mod console;
pub mod context;
pub mod converter;
pub mod device_cache;
pub mod dispatcher;
pub mod domain;
pub mod scheduled_commands;
pub mod scheduler;
