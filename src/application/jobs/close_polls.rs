//! Cron job that closes polls whose deadline has passed.

use std::str::FromStr;

use apalis::prelude::*;
use apalis_cron::Schedule;
use time::OffsetDateTime;

use super::context::{ClosePollsContext, job_failed};

/// Marker struct for the cron-triggered closing job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct ClosePollsJob;

impl From<chrono::DateTime<chrono::Utc>> for ClosePollsJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Close every due poll. A failed run is picked up again on the next tick.
pub async fn process_close_polls_job(
    _job: ClosePollsJob,
    ctx: Data<ClosePollsContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.polls.close_due(OffsetDateTime::now_utc()).await {
        Ok(closed) => {
            if !closed.is_empty() {
                tracing::info!(closed_count = closed.len(), "Closed due polls");
            }
            Ok(())
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to close due polls");
            Err(job_failed(err))
        }
    }
}

/// Every five minutes, on the minute.
pub fn close_polls_schedule() -> Schedule {
    Schedule::from_str("0 */5 * * * *").expect("Invalid cron expression for close_polls")
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn schedule_fires_on_five_minute_marks() {
        let upcoming: Vec<_> = close_polls_schedule()
            .upcoming(chrono::Utc)
            .take(3)
            .collect();
        assert_eq!(upcoming.len(), 3);
        for tick in upcoming {
            assert_eq!(tick.minute() % 5, 0);
            assert_eq!(tick.second(), 0);
        }
    }
}
