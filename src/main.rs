use hearth_bus::app_config::AppConfig;
use hearth_bus::binding::line::LineBinding;
use hearth_bus::binding::tcp;
use hearth_bus::bus::{ChannelSubscriber, Matcher};
use hearth_bus::console::{print_events, read_commands};
use hearth_bus::context::Core;
use hearth_bus::scheduled_commands::schedule_commands;
use hearth_bus::scheduler::SchedulerHandle;
use std::sync::Arc;
use tokio::io::{BufReader, stdin, stdout};
use tokio::sync::mpsc;
use tokio::task;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).with_writer(std::io::stderr).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!("✅  Loaded configuration");

    let (scheduler, _scheduler_task) = SchedulerHandle::spawn(config.core().event_buffer_size());
    let core = Core::new(config.core().precedence(), config.core().command_timeout(), scheduler);
    for (name, item) in config.items() {
        core.dispatcher().bind_item(name.clone(), item.clone());
    }
    info!("✅  Bound {} item(s)", config.items().len());

    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(config.core().frame_buffer_size());
    let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>(config.core().frame_buffer_size());
    let runner = core.activate(Arc::new(LineBinding::new(outbound_tx)));
    task::spawn(runner.run(inbound_rx));
    info!("✅  Activated line binding for {}", config.line().address());

    let (events_tx, events_rx) = mpsc::channel(config.core().event_buffer_size());
    core.dispatcher().subscribe(Matcher::All, Arc::new(ChannelSubscriber::new("stdout", events_tx)));
    task::spawn(print_events(events_rx, stdout()));
    info!("✅  Initialized event printer");

    schedule_commands(&core, config.schedules()).await;

    let dispatcher = core.dispatcher().clone();
    task::spawn(async move {
        read_commands(BufReader::new(stdin()), &dispatcher).await;
    });

    info!("🔥 {} is up and running", env!("CARGO_PKG_NAME"));

    tcp::listen(inbound_tx, outbound_rx, &config.line().transport()).await?;

    Ok(())
}
