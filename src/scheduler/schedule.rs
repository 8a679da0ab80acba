use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, PartialEq, Debug)]
pub enum Schedule {
    Interval(Duration),
    /// A cron expression with a seconds field, e.g. `0 0 20 * * *`.
    Cron(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("interval must be longer than zero and fit a calendar duration")]
    InvalidInterval,
    #[error("a schedule needs either a cron expression or an interval")]
    Unspecified,
}

impl Schedule {
    pub fn cron(expression: &str) -> Result<Self, ScheduleError> {
        parse_cron(expression)?;
        Ok(Schedule::Cron(expression.to_string()))
    }

    pub fn interval(period: Duration) -> Result<Self, ScheduleError> {
        to_delta(period)?;
        Ok(Schedule::Interval(period))
    }

    /// Returns an iterator over each `DateTime` matching the schedule after `from`.
    pub fn after<Z>(&self, from: DateTime<Z>) -> Result<ScheduleIterator<Z>, ScheduleError>
    where
        Z: TimeZone,
    {
        match self {
            Schedule::Cron(expression) => Ok(ScheduleIterator::Cron(parse_cron(expression)?.after_owned(from))),
            Schedule::Interval(period) => Ok(ScheduleIterator::Interval {
                previous: from,
                every: to_delta(*period)?,
            }),
        }
    }

    /// Returns an iterator over each `DateTime` matching the schedule starting at the current time.
    pub fn upcoming<Z>(&self, timezone: Z) -> Result<ScheduleIterator<Z>, ScheduleError>
    where
        Z: TimeZone,
    {
        let now = Utc::now().with_timezone(&timezone);
        self.after(now)
    }
}

fn parse_cron(expression: &str) -> Result<cron::Schedule, ScheduleError> {
    cron::Schedule::from_str(expression).map_err(|e| ScheduleError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

fn to_delta(period: Duration) -> Result<TimeDelta, ScheduleError> {
    match TimeDelta::from_std(period) {
        Ok(delta) if delta > TimeDelta::zero() => Ok(delta),
        _ => Err(ScheduleError::InvalidInterval),
    }
}

pub enum ScheduleIterator<Z>
where
    Z: TimeZone,
{
    Cron(cron::OwnedScheduleIterator<Z>),
    Interval { previous: DateTime<Z>, every: TimeDelta },
}

impl<Z> Iterator for ScheduleIterator<Z>
where
    Z: TimeZone,
{
    type Item = DateTime<Z>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ScheduleIterator::Cron(iterator) => iterator.next(),
            ScheduleIterator::Interval { previous, every } => {
                let next = previous.clone().checked_add_signed(*every)?;
                *previous = next.clone();
                Some(next)
            }
        }
    }
}
