use crate::binding::tcp;
use crate::converter::KindPrecedence;
use crate::dispatcher::DEFAULT_COMMAND_TIMEOUT;
use crate::domain::item::ItemBinding;
use crate::domain::state::StateKind;
use crate::scheduler::{Schedule, ScheduleError};
use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    core: Core,
    line: Line,
    #[serde(default)]
    items: HashMap<String, ItemBinding>,
    #[serde(default)]
    schedules: Vec<ScheduledCommand>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(config::File::with_name("config_local").required(false))
            .add_source(config::Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn line(&self) -> &Line {
        &self.line
    }

    pub fn items(&self) -> &HashMap<String, ItemBinding> {
        &self.items
    }

    pub fn schedules(&self) -> &[ScheduledCommand] {
        &self.schedules
    }
}

#[derive(Debug, Deserialize)]
pub struct Core {
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    command_timeout: Duration,
    event_buffer_size: usize,
    frame_buffer_size: usize,
    #[serde(default)]
    precedence: Option<Vec<StateKind>>,
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

impl Core {
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn event_buffer_size(&self) -> usize {
        self.event_buffer_size
    }

    pub fn frame_buffer_size(&self) -> usize {
        self.frame_buffer_size
    }

    /// The configured kind precedence, or the default order when none is configured.
    pub fn precedence(&self) -> KindPrecedence {
        match &self.precedence {
            Some(order) => KindPrecedence::new(order.clone()),
            None => KindPrecedence::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Line {
    address: String,
    retry_ms: u64,
    retry_max_delay_ms: u64,
    stale_connection_timeout_ms: u64,
}

impl Line {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn transport(&self) -> tcp::Config {
        tcp::Config {
            address: self.address.clone(),
            retry_ms: self.retry_ms,
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
            stale_connection_timeout: Duration::from_millis(self.stale_connection_timeout_ms),
        }
    }
}

/// A command sent to an item on a cron expression or a fixed interval.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct ScheduledCommand {
    pub item: String,
    pub command: String,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
}

impl ScheduledCommand {
    pub fn schedule(&self) -> Result<Schedule, ScheduleError> {
        match (&self.cron, self.interval) {
            (Some(expression), None) => Schedule::cron(expression),
            (None, Some(period)) => Schedule::interval(period),
            _ => Err(ScheduleError::Unspecified),
        }
    }
}

#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn new() -> Self {
        AppConfigBuilder {
            config: AppConfig {
                core: Core {
                    command_timeout: DEFAULT_COMMAND_TIMEOUT,
                    event_buffer_size: 16,
                    frame_buffer_size: 16,
                    precedence: None,
                },
                line: Line {
                    address: "127.0.0.1:7878".to_string(),
                    retry_ms: 100,
                    retry_max_delay_ms: 200,
                    stale_connection_timeout_ms: 30_000,
                },
                items: HashMap::new(),
                schedules: vec![],
            },
        }
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.core.command_timeout = timeout;
        self
    }

    pub fn precedence(mut self, order: Vec<StateKind>) -> Self {
        self.config.core.precedence = Some(order);
        self
    }

    pub fn item(mut self, name: &str, item: ItemBinding) -> Self {
        self.config.items.insert(name.to_string(), item);
        self
    }

    pub fn schedule(mut self, schedule: ScheduledCommand) -> Self {
        self.config.schedules.push(schedule);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
