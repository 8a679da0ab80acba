use crate::scheduler::schedule::{Schedule, ScheduleError};
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, instrument, warn};

pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub enum SchedulerCommand {
    Schedule { job_id: String, schedule: Schedule, job: Job },
    Cancel { job_id: String },
}

impl Debug for SchedulerCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerCommand::Schedule { job_id, schedule, .. } => f
                .debug_struct("Schedule")
                .field("job_id", job_id)
                .field("schedule", schedule)
                .finish_non_exhaustive(),
            SchedulerCommand::Cancel { job_id } => f.debug_struct("Cancel").field("job_id", job_id).finish(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SchedulerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("scheduler is not running")]
    Stopped,
}

/// Sends commands to a running scheduler. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    tx: Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Starts a scheduler task and returns a handle to it.
    pub fn spawn(buffer: usize) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        (SchedulerHandle { tx }, tokio::spawn(scheduler(rx)))
    }

    /// Runs `job` on every occurrence of `schedule`, replacing any job with the same id.
    pub async fn schedule<F, Fut>(&self, job_id: impl Into<String>, schedule: Schedule, job: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Schedule::Cron(expression) = &schedule {
            Schedule::cron(expression)?;
        }

        let job: Job = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(job()) });
        self.send(SchedulerCommand::Schedule {
            job_id: job_id.into(),
            schedule,
            job,
        })
        .await
    }

    pub async fn cancel(&self, job_id: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(SchedulerCommand::Cancel { job_id: job_id.into() }).await
    }

    async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerError> {
        self.tx.send(command).await.map_err(|_| SchedulerError::Stopped)
    }
}

#[instrument(skip_all)]
pub async fn scheduler(mut rx: Receiver<SchedulerCommand>) {
    let mut jobs: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SchedulerCommand::Schedule { job_id, schedule, job } => {
                debug!(job_id, "🕗 Scheduling job '{}'...", job_id);
                let next = match schedule.upcoming(Utc).map(|mut upcoming| upcoming.next()) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(job_id, "🕗 Scheduling job '{}'... failed, {}", job_id, e);
                        continue;
                    }
                };

                if let Some(previous) = jobs.insert(job_id.clone(), tokio::spawn(run_job(job_id.clone(), schedule, job))) {
                    previous.abort();
                    debug!(job_id, "🕗 Replaced previous job '{}'", job_id);
                }
                info!(job_id, "🕗 Scheduling job '{}'... OK, next run at {:?}", job_id, next);
            }
            SchedulerCommand::Cancel { job_id } => match jobs.remove(&job_id) {
                Some(handle) => {
                    handle.abort();
                    info!(job_id, "🕗 Cancelled job '{}'", job_id);
                }
                None => warn!(job_id, "🕗 Cannot cancel unknown job '{}'", job_id),
            },
        }

        jobs.retain(|_, handle| !handle.is_finished());
    }

    for (_, handle) in jobs {
        handle.abort();
    }
    debug!("🕗 Scheduler stopped");
}

// Job loop
async fn run_job(job_id: String, schedule: Schedule, job: Job) {
    match schedule {
        Schedule::Interval(period) => {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                debug!(job_id, "🕗 Running scheduled job '{}'...", job_id);
                job().await;
            }
        }
        Schedule::Cron(ref cron) => {
            let Ok(upcoming) = schedule.upcoming(Utc) else {
                return;
            };
            for datetime in upcoming {
                let duration = datetime.signed_duration_since(Utc::now());
                if duration.num_milliseconds() < 0 {
                    continue; // Already passed
                }

                let scheduled_instant = Instant::now() + Duration::from_millis(duration.num_milliseconds() as u64);
                sleep_until(scheduled_instant).await;

                debug!(job_id, cron, "🕗 Running scheduled job '{}'...", job_id);
                job().await;
            }
        }
    }
}
