use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{PollStep, Shared, TransientPollError, POLLER_STOPPED};
use crate::gateway::JobStatusApi;

/// How the status loop paces itself and how forgiving it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first check and between checks
    pub interval: Duration,

    /// Consecutive failed checks tolerated before the run fails.
    /// Zero means the first failure aborts the run.
    pub max_transient_errors: u32,
}

/// Shortest interval the poller will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl PollPolicy {
    /// A policy whose interval is at least [`MIN_POLL_INTERVAL`]
    pub fn new(interval: Duration, max_transient_errors: u32) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            max_transient_errors,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            max_transient_errors: 0,
        }
    }
}

impl From<&crate::config::WorkflowConfig> for PollPolicy {
    fn from(config: &crate::config::WorkflowConfig) -> Self {
        Self::new(config.poll_interval(), config.max_transient_poll_errors)
    }
}

/// Handle to the repeating status-check task of one job.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    job_id: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub(super) fn spawn(
        shared: Arc<Shared>,
        status: Arc<dyn JobStatusApi>,
        job_id: String,
        epoch: u64,
        policy: PollPolicy,
    ) -> Self {
        let token = CancellationToken::new();
        let worker = tokio::spawn(poll_loop(
            shared.clone(),
            status,
            job_id.clone(),
            epoch,
            policy,
            token.clone(),
        ));
        let task = tokio::spawn(supervise(worker, shared, job_id.clone(), epoch, token.clone()));

        Self {
            job_id,
            token,
            task,
        }
    }

    /// Stop the loop. A check already in flight is abandoned and its result
    /// never applied.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Fail the run if the loop dies without settling it
async fn supervise(
    worker: JoinHandle<()>,
    shared: Arc<Shared>,
    job_id: String,
    epoch: u64,
    token: CancellationToken,
) {
    if let Err(err) = worker.await {
        if err.is_panic() {
            tracing::error!(job_id = %job_id, "Status poller panicked");
            shared.apply_poller_exit(epoch, &token, POLLER_STOPPED);
        }
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    status: Arc<dyn JobStatusApi>,
    job_id: String,
    epoch: u64,
    policy: PollPolicy,
    token: CancellationToken,
) {
    let mut ticker = interval(policy.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first check waits a full interval
    ticker.tick().await;

    let mut consecutive_errors = 0u32;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = status.job_status(&job_id) => outcome,
        };

        let step = match outcome {
            Ok(report) => {
                consecutive_errors = 0;
                shared.apply_report(epoch, &token, report)
            }
            Err(source) => {
                consecutive_errors += 1;
                let failure = TransientPollError {
                    job_id: job_id.clone(),
                    attempt: consecutive_errors,
                    source,
                };
                shared.apply_poll_error(epoch, &token, failure, &policy)
            }
        };

        if step == PollStep::Stop {
            break;
        }
    }

    tracing::debug!(job_id = %job_id, "Status polling stopped");
}
