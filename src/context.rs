use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ResolveError, ResolveResult};

/// Per-request state threaded through every lookup: cancellation and deadline.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a backend call, aborting it as soon as the request is cancelled or
    /// its deadline passes. The pending future is dropped, not awaited.
    pub async fn guard<T, F>(&self, work: F) -> ResolveResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(request_id = %self.request_id, "Request cancelled");
                Err(ResolveError::Cancelled)
            }
            _ = deadline => {
                debug!(request_id = %self.request_id, "Request deadline exceeded");
                Err(ResolveError::DeadlineExceeded)
            }
            res = work => res.map_err(ResolveError::from),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("anonymous")
    }
}
