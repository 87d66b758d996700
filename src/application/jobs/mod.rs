mod close_polls;
mod context;

pub use close_polls::{ClosePollsJob, close_polls_schedule, process_close_polls_job};
pub use context::{ClosePollsContext, job_failed};
