mod schedule;
mod scheduler;

pub use schedule::{Schedule, ScheduleError, ScheduleIterator};
pub use scheduler::{Job, SchedulerCommand, SchedulerError, SchedulerHandle, scheduler};
