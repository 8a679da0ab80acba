use crate::app_config::ScheduledCommand;
use crate::context::Core;
use crate::domain::commands::Command;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Schedules every configured command that is valid and returns how many were scheduled.
#[instrument(skip_all)]
pub async fn schedule_commands(core: &Core, scheduled_commands: &[ScheduledCommand]) -> usize {
    let mut scheduled = 0;

    for (index, scheduled_command) in scheduled_commands.iter().enumerate() {
        let item = scheduled_command.item.clone();
        let schedule = match scheduled_command.schedule() {
            Ok(schedule) => schedule,
            Err(e) => {
                warn!(item, "⚠️ Skipping scheduled command for '{}': {}", item, e);
                continue;
            }
        };
        let command = match Command::from_str(&scheduled_command.command) {
            Ok(command) => command,
            Err(e) => {
                warn!(item, "⚠️ Skipping scheduled command for '{}': {}", item, e);
                continue;
            }
        };

        let job_id = format!("{}#{}", item, index);
        let dispatcher = core.dispatcher().clone();
        let job_item = item.clone();
        let result = core
            .scheduler()
            .schedule(job_id, schedule, move || {
                let dispatcher = dispatcher.clone();
                let item = job_item.clone();
                let command = command.clone();
                async move {
                    debug!(item, "🕗 Sending scheduled {} to '{}'", command, item);
                    if let Err(e) = dispatcher.send_command(&item, command).await {
                        warn!(item, "⚠️ Scheduled command for '{}' failed: {}", item, e);
                    }
                }
            })
            .await;

        match result {
            Ok(()) => scheduled += 1,
            Err(e) => warn!(item, "⚠️ Could not schedule command for '{}': {}", item, e),
        }
    }

    info!("🕗 Scheduled {} of {} command(s)", scheduled, scheduled_commands.len());
    scheduled
}
