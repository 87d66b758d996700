use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use crate::application::polls::PollService;

/// Shared context handed to the poll-closing worker.
#[derive(Clone)]
pub struct ClosePollsContext {
    pub polls: Arc<PollService>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
