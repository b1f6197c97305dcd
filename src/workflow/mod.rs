//! The generation workflow: summarize, review, submit, poll.
//!
//! [`WorkflowController`] owns the state machine
//!
//! ```text
//! Idle -> SummarizingScript -> ScriptReady -> SubmittingVideo
//!      -> GeneratingVideo(job) -> VideoReady | VideoFailed
//! ```
//!
//! and the single status poller of the active job. All mutation happens under
//! one lock that is never held across an `.await`; results that arrive after
//! a [`WorkflowController::reset`] are dropped by comparing run epochs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub mod poller;

pub use poller::{PollHandle, PollPolicy, MIN_POLL_INTERVAL};

use crate::gateway::{GatewayError, Gateways, JobStatusReport, SummarizeRequest};

pub const EMPTY_SUMMARY: &str = "Summarization returned an empty script.";
pub const NO_JOB_ID: &str = "No video ID received from server.";
pub const GENERATION_FAILED: &str = "Video generation failed.";
pub const MISSING_VIDEO_URL: &str = "Video completed without a video URL.";
pub const POLLER_STOPPED: &str = "Status polling stopped unexpectedly.";

/// Narration script under review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub text: String,
    pub notes: String,
}

impl Script {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            notes: String::new(),
        }
    }
}

/// Provider-side state of a video job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Map a vendor status string. Anything unrecognised is still pending.
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            "processing" => JobState::Processing,
            _ => JobState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One in-flight video generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub checks: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Pending,
            result_url: None,
            error_message: None,
            checks: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.checks += 1;
        self.updated_at = Utc::now();
    }
}

/// Client-visible state of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// Waiting for blog text; carries the last summarization failure, if any
    Idle { error: Option<String> },
    SummarizingScript,
    ScriptReady,
    /// The video job request is in flight
    SubmittingVideo,
    GeneratingVideo { job_id: String },
    VideoReady { video_url: String },
    VideoFailed { error: String },
}

impl Default for WorkflowState {
    fn default() -> Self {
        WorkflowState::Idle { error: None }
    }
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle { .. } => "idle",
            WorkflowState::SummarizingScript => "summarizing script",
            WorkflowState::ScriptReady => "script ready",
            WorkflowState::SubmittingVideo => "submitting video",
            WorkflowState::GeneratingVideo { .. } => "generating video",
            WorkflowState::VideoReady { .. } => "video ready",
            WorkflowState::VideoFailed { .. } => "video failed",
        }
    }

    /// `VideoReady` or `VideoFailed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::VideoReady { .. } | WorkflowState::VideoFailed { .. }
        )
    }

    /// Waiting on a gateway
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            WorkflowState::SummarizingScript
                | WorkflowState::SubmittingVideo
                | WorkflowState::GeneratingVideo { .. }
        )
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WorkflowState::Idle { error } => error.as_deref(),
            WorkflowState::VideoFailed { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::GeneratingVideo { job_id } => write!(f, "generating video ({})", job_id),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The workflow was reset while the call was in flight
    #[error("workflow was reset before the {0} response arrived")]
    Superseded(&'static str),
}

/// A failed status check during polling
#[derive(thiserror::Error, Debug, Clone)]
#[error("status check {attempt} for job {job_id} failed: {source}")]
pub struct TransientPollError {
    pub job_id: String,
    pub attempt: u32,
    pub source: GatewayError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollStep {
    Continue,
    Stop,
}

#[derive(Debug, Default)]
struct Inner {
    state: WorkflowState,
    script: Option<Script>,
    job: Option<Job>,
    poller: Option<PollHandle>,
    /// Bumped on every reset; work started under an older epoch is stale
    epoch: u64,
}

impl Inner {
    fn stop_poller(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel();
        }
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WorkflowState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, inner: &mut Inner, state: WorkflowState) {
        tracing::info!(from = inner.state.name(), to = state.name(), "Workflow transition");
        inner.state = state.clone();
        self.state_tx.send_replace(state);
    }

    fn is_stale(inner: &Inner, epoch: u64, token: &CancellationToken) -> bool {
        token.is_cancelled() || inner.epoch != epoch
    }

    pub(crate) fn apply_report(
        &self,
        epoch: u64,
        token: &CancellationToken,
        report: JobStatusReport,
    ) -> PollStep {
        let mut inner = self.lock();
        if Self::is_stale(&inner, epoch, token) {
            return PollStep::Stop;
        }

        let job_state = JobState::from_status(&report.status);
        let next = {
            let Some(job) = inner.job.as_mut() else {
                return PollStep::Stop;
            };
            job.touch();
            job.state = job_state;
            tracing::debug!(job_id = %job.id, status = %report.status, check = job.checks, "Polled video status");

            match job_state {
                JobState::Completed => match report.video_url {
                    Some(url) => {
                        job.result_url = Some(url.clone());
                        WorkflowState::VideoReady { video_url: url }
                    }
                    None => {
                        job.error_message = Some(MISSING_VIDEO_URL.to_string());
                        WorkflowState::VideoFailed {
                            error: MISSING_VIDEO_URL.to_string(),
                        }
                    }
                },
                JobState::Failed => {
                    let error = report
                        .error
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| GENERATION_FAILED.to_string());
                    job.error_message = Some(error.clone());
                    WorkflowState::VideoFailed { error }
                }
                JobState::Pending | JobState::Processing => return PollStep::Continue,
            }
        };

        inner.stop_poller();
        self.set_state(&mut inner, next);
        PollStep::Stop
    }

    pub(crate) fn apply_poll_error(
        &self,
        epoch: u64,
        token: &CancellationToken,
        failure: TransientPollError,
        policy: &PollPolicy,
    ) -> PollStep {
        let mut inner = self.lock();
        if Self::is_stale(&inner, epoch, token) {
            return PollStep::Stop;
        }

        if let Some(job) = inner.job.as_mut() {
            job.touch();
        }

        if failure.attempt <= policy.max_transient_errors {
            tracing::warn!(
                error = %failure,
                tolerated = policy.max_transient_errors,
                "Status check failed, will retry"
            );
            return PollStep::Continue;
        }

        tracing::error!(error = %failure, "Status polling aborted");
        self.fail_job(&mut inner, failure.source.to_string());
        PollStep::Stop
    }

    /// The poll task ended without settling the run
    pub(crate) fn apply_poller_exit(&self, epoch: u64, token: &CancellationToken, error: &str) {
        let mut inner = self.lock();
        if Self::is_stale(&inner, epoch, token) {
            return;
        }
        self.fail_job(&mut inner, error.to_string());
    }

    fn fail_job(&self, inner: &mut Inner, error: String) {
        if let Some(job) = inner.job.as_mut() {
            job.error_message = Some(error.clone());
        }
        inner.stop_poller();
        self.set_state(inner, WorkflowState::VideoFailed { error });
    }
}

/// Sequences the three gateways and owns the status poller
pub struct WorkflowController {
    shared: Arc<Shared>,
    gateways: Gateways,
    policy: PollPolicy,
}

impl WorkflowController {
    /// `policy.interval` is raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn new(gateways: Gateways, policy: PollPolicy) -> Self {
        let policy = PollPolicy::new(policy.interval, policy.max_transient_errors);
        let (state_tx, _) = watch::channel(WorkflowState::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state_tx,
            }),
            gateways,
            policy,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.lock().state.clone()
    }

    pub fn script(&self) -> Option<Script> {
        self.shared.lock().script.clone()
    }

    pub fn job(&self) -> Option<Job> {
        self.shared.lock().job.clone()
    }

    /// Job id the live poller is checking, if one is running
    pub fn poller_target(&self) -> Option<String> {
        self.shared
            .lock()
            .poller
            .as_ref()
            .filter(|handle| handle.is_live())
            .map(|handle| handle.job_id().to_string())
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until no gateway call or poller is outstanding
    pub async fn wait_until_settled(&self) -> WorkflowState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|state| !state.is_busy()).await.map(|s| s.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Ask the summarization gateway for a script. Valid only from `Idle`.
    pub async fn submit_for_summarization(
        &self,
        text: &str,
        notes: &str,
    ) -> Result<Script, WorkflowError> {
        let epoch = {
            let mut inner = self.shared.lock();
            if !matches!(inner.state, WorkflowState::Idle { .. }) {
                return Err(WorkflowError::InvalidState {
                    operation: "submit for summarization",
                    state: inner.state.name(),
                });
            }
            if text.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "Blog content is required".to_string(),
                ));
            }
            inner.script = None;
            inner.job = None;
            self.shared.set_state(&mut inner, WorkflowState::SummarizingScript);
            inner.epoch
        };

        let request = SummarizeRequest::new(text, notes);
        let result = self.gateways.summarizer.summarize(&request).await;

        let mut inner = self.shared.lock();
        if inner.epoch != epoch {
            tracing::debug!("Discarding summary for a reset workflow");
            return Err(WorkflowError::Superseded("summarization"));
        }

        let result = result.and_then(|summary| {
            if summary.trim().is_empty() {
                Err(GatewayError::upstream(500, EMPTY_SUMMARY))
            } else {
                Ok(summary)
            }
        });

        match result {
            Ok(summary) => {
                let script = Script::new(summary);
                inner.script = Some(script.clone());
                self.shared.set_state(&mut inner, WorkflowState::ScriptReady);
                Ok(script)
            }
            Err(err) => {
                tracing::error!(error = %err, "Summarization failed");
                self.shared.set_state(
                    &mut inner,
                    WorkflowState::Idle {
                        error: Some(err.to_string()),
                    },
                );
                Err(err.into())
            }
        }
    }

    /// Submit the reviewed script and start polling the new job. Valid only
    /// from `ScriptReady`.
    pub async fn confirm_script(&self, edited: Script) -> Result<String, WorkflowError> {
        let epoch = {
            let mut inner = self.shared.lock();
            if inner.state != WorkflowState::ScriptReady {
                return Err(WorkflowError::InvalidState {
                    operation: "confirm the script",
                    state: inner.state.name(),
                });
            }
            if edited.text.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "Script must not be empty".to_string(),
                ));
            }
            inner.script = Some(edited.clone());
            self.shared.set_state(&mut inner, WorkflowState::SubmittingVideo);
            inner.epoch
        };

        let result = self.gateways.generator.generate_video(&edited.text).await;

        let mut inner = self.shared.lock();
        if inner.epoch != epoch {
            tracing::debug!("Discarding video job for a reset workflow");
            return Err(WorkflowError::Superseded("video generation"));
        }

        // The script is handed over; it is not kept past this point
        inner.script = None;

        let result = result.and_then(|job_id| {
            if job_id.is_empty() {
                Err(GatewayError::upstream(500, NO_JOB_ID))
            } else {
                Ok(job_id)
            }
        });

        match result {
            Ok(job_id) => {
                inner.job = Some(Job::new(job_id.clone()));
                self.start_polling(&mut inner, job_id.clone(), epoch);
                self.shared.set_state(
                    &mut inner,
                    WorkflowState::GeneratingVideo {
                        job_id: job_id.clone(),
                    },
                );
                Ok(job_id)
            }
            Err(err) => {
                tracing::error!(error = %err, "Could not start video generation");
                self.shared.set_state(
                    &mut inner,
                    WorkflowState::VideoFailed {
                        error: err.to_string(),
                    },
                );
                Err(err.into())
            }
        }
    }

    /// Cancel the poller, drop script and job, and return to `Idle`.
    ///
    /// Accepted from every state; from a busy state it abandons the run and
    /// any late gateway result is discarded.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.epoch += 1;
        inner.stop_poller();
        inner.script = None;
        inner.job = None;
        self.shared.set_state(&mut inner, WorkflowState::Idle { error: None });
    }

    fn start_polling(&self, inner: &mut Inner, job_id: String, epoch: u64) {
        if let Some(stale) = inner.poller.take() {
            tracing::warn!(job_id = stale.job_id(), "Cancelling stale poller");
            stale.cancel();
        }

        tracing::info!(
            job_id = %job_id,
            interval_ms = self.policy.interval.as_millis() as u64,
            "Polling video status"
        );
        inner.poller = Some(PollHandle::spawn(
            self.shared.clone(),
            self.gateways.status.clone(),
            job_id,
            epoch,
            self.policy,
        ));
    }
}

impl Drop for WorkflowController {
    fn drop(&mut self) {
        self.shared.lock().stop_poller();
    }
}
