use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::job::{Job, JobId};
use crate::services::booking::{BookingError, BookingService};
use crate::services::completion::{
    CompletionSession, Effect, Event, FailureReason, Rejection, Step,
};
use crate::services::worklist::JobBoard;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Illegal transition: {0}")]
    IllegalTransition(Rejection),

    #[error("Code must not be empty")]
    EmptyCode,

    #[error("No completion view is open for job {0}")]
    NoSession(JobId),

    #[error("Job {0} not found")]
    JobNotFound(JobId),

    #[error("request failed")]
    NetworkFailure,

    #[error("invalid code")]
    InvalidCode,

    #[error("code expired, request a new code")]
    CodeExpired,

    #[error("{0}")]
    Rejected(String),

    #[error("Completion view was closed before the response arrived")]
    Superseded,
}

impl From<Rejection> for CompletionError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::EmptyCode => CompletionError::EmptyCode,
            other => CompletionError::IllegalTransition(other),
        }
    }
}

impl From<FailureReason> for CompletionError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::RequestFailed => CompletionError::NetworkFailure,
            FailureReason::InvalidCode => CompletionError::InvalidCode,
            FailureReason::CodeExpired => CompletionError::CodeExpired,
            FailureReason::Rejected(reason) => CompletionError::Rejected(reason),
        }
    }
}

/// What the technician's completion view renders.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub job: Job,
    pub session: CompletionSession,
}

#[derive(Default)]
struct View {
    /// Bumped whenever the open view changes; responses from an older epoch are dropped.
    epoch: u64,
    current: Option<SessionView>,
}

/// Jobs with a booking call outstanding. Survives the view being reopened.
type PendingCalls = std::sync::Mutex<HashSet<JobId>>;

/// Marks a job's booking call as outstanding until dropped.
struct PendingCall<'a> {
    pending: &'a PendingCalls,
    job_id: JobId,
}

impl PendingCall<'_> {
    fn claim(pending: &PendingCalls, job_id: JobId) -> Option<PendingCall<'_>> {
        let mut jobs = pending.lock().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job_id).then(|| PendingCall { pending, job_id })
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        let mut jobs = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        jobs.remove(&self.job_id);
    }
}

fn booking_step(effects: &[Effect]) -> Option<Step> {
    effects.iter().find_map(|effect| match effect {
        Effect::IssueCode { .. } => Some(Step::RequestCode),
        Effect::VerifyCode { .. } => Some(Step::SubmitCode),
        Effect::MarkCompleted { .. } => None,
    })
}

/// Drives the completion handshake for the job the technician has open.
///
/// State changes happen under a short lock; booking calls run with the lock
/// released, so a second request for the same job sees the in-flight marker
/// and is refused instead of queued. The marker outlives a reopened view.
pub struct CompletionWorkflow<B> {
    booking: Arc<B>,
    board: Arc<JobBoard>,
    view: Mutex<View>,
    pending: PendingCalls,
}

impl<B: BookingService> CompletionWorkflow<B> {
    pub fn new(booking: Arc<B>, board: Arc<JobBoard>) -> Self {
        Self {
            booking,
            board,
            view: Mutex::new(View::default()),
            pending: PendingCalls::default(),
        }
    }

    /// Open (or reopen) the completion view for a job. Always starts fresh.
    pub async fn open(&self, job_id: JobId) -> Result<SessionView, CompletionError> {
        let epoch = {
            let mut view = self.view.lock().await;
            view.epoch += 1;
            view.current = None;
            view.epoch
        };

        let job = self.booking.job(job_id).await.map_err(|e| match e {
            BookingError::NotFound(_) => CompletionError::JobNotFound(job_id),
            other => FailureReason::from(&other).into(),
        })?;

        if job.status.is_completed() {
            self.board.mark_completed(job_id).await;
        }

        let mut view = self.view.lock().await;
        if view.epoch != epoch {
            return Err(CompletionError::Superseded);
        }

        let opened = SessionView {
            session: CompletionSession::open(&job),
            job,
        };
        tracing::info!(job_id, phase = ?opened.session.phase, "Completion view opened");
        view.current = Some(opened.clone());
        Ok(opened)
    }

    /// Navigate away from a job. Any response still in flight for it is dropped.
    pub async fn close(&self, job_id: JobId) -> bool {
        let mut view = self.view.lock().await;
        match &view.current {
            Some(open) if open.job.id == job_id => {
                view.epoch += 1;
                view.current = None;
                tracing::info!(job_id, "Completion view closed");
                true
            }
            _ => false,
        }
    }

    pub async fn current(&self, job_id: JobId) -> Result<SessionView, CompletionError> {
        let view = self.view.lock().await;
        match &view.current {
            Some(open) if open.job.id == job_id => Ok(open.clone()),
            _ => Err(CompletionError::NoSession(job_id)),
        }
    }

    /// Ask the booking service to send the customer a one-time code.
    pub async fn request_code(&self, job_id: JobId) -> Result<SessionView, CompletionError> {
        let (epoch, effects, call) = self.apply(job_id, None, Event::RequestCode).await?;
        self.drive(job_id, epoch, effects, call).await
    }

    /// Submit the code the customer read out. Blank codes never reach the booking service.
    pub async fn submit_code(&self, job_id: JobId, code: &str) -> Result<SessionView, CompletionError> {
        let (epoch, effects, call) = self
            .apply(job_id, None, Event::SubmitCode(code.to_string()))
            .await?;
        self.drive(job_id, epoch, effects, call).await
    }

    /// Apply one event to the open session. With `expected_epoch` set, a
    /// session that has since been closed or reopened yields `Superseded`.
    /// When the event dispatches a booking call the job is claimed first; a
    /// job that already has one outstanding is refused as `Busy`.
    async fn apply(
        &self,
        job_id: JobId,
        expected_epoch: Option<u64>,
        event: Event,
    ) -> Result<(u64, Vec<Effect>, Option<PendingCall<'_>>), CompletionError> {
        let mut view = self.view.lock().await;
        let epoch = view.epoch;

        if expected_epoch.is_some_and(|e| e != epoch) {
            tracing::debug!(job_id, "Discarding response for a closed completion view");
            return Err(CompletionError::Superseded);
        }

        let open = match view.current.as_mut() {
            Some(open) if open.job.id == job_id => open,
            _ if expected_epoch.is_some() => return Err(CompletionError::Superseded),
            _ => return Err(CompletionError::NoSession(job_id)),
        };

        let (next, effects) = open.session.apply(event).map_err(|rejection| {
            tracing::debug!(job_id, %rejection, "Completion event refused");
            CompletionError::from(rejection)
        })?;

        let call = match booking_step(&effects) {
            Some(step) => match PendingCall::claim(&self.pending, job_id) {
                Some(call) => Some(call),
                None => {
                    tracing::debug!(job_id, ?step, "Booking call still outstanding from an earlier view");
                    return Err(CompletionError::IllegalTransition(Rejection::Busy(step)));
                }
            },
            None => None,
        };

        if next.phase != open.session.phase {
            tracing::info!(job_id, from = ?open.session.phase, to = ?next.phase, "Completion phase changed");
        }
        open.job.status = next.job_status;
        open.session = next;
        Ok((epoch, effects, call))
    }

    /// Perform effects until none remain, feeding booking results back in.
    async fn drive(
        &self,
        job_id: JobId,
        epoch: u64,
        effects: Vec<Effect>,
        mut call: Option<PendingCall<'_>>,
    ) -> Result<SessionView, CompletionError> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut failure: Option<FailureReason> = None;

        while let Some(effect) = queue.pop_front() {
            let event = match effect {
                Effect::IssueCode { job_id, ticket } => {
                    let result = self.booking.send_otp(job_id).await;
                    drop(call.take());
                    match result {
                        Ok(()) => {
                            metrics::counter!("otp_requests_total", "outcome" => "issued").increment(1);
                            tracing::info!(job_id, "One-time code issued to customer");
                            Event::CodeIssued { ticket }
                        }
                        Err(e) => {
                            metrics::counter!("otp_requests_total", "outcome" => "failed").increment(1);
                            tracing::warn!(job_id, error = %e, "Code issuance failed");
                            let reason = FailureReason::from(&e);
                            failure = Some(reason.clone());
                            Event::IssueFailed { ticket, reason }
                        }
                    }
                }
                Effect::VerifyCode { job_id, code, ticket } => {
                    let result = self.booking.verify_otp(job_id, &code).await;
                    drop(call.take());
                    match result {
                        Ok(()) => {
                            metrics::counter!("otp_verifications_total", "outcome" => "verified")
                                .increment(1);
                            tracing::info!(job_id, "Code verified, job completed");
                            Event::CodeAccepted { ticket }
                        }
                        Err(e) => {
                            let reason = FailureReason::from(&e);
                            let outcome = match reason {
                                FailureReason::InvalidCode => "invalid",
                                FailureReason::CodeExpired => "expired",
                                _ => "failed",
                            };
                            metrics::counter!("otp_verifications_total", "outcome" => outcome)
                                .increment(1);
                            tracing::warn!(job_id, error = %e, "Code verification failed");
                            failure = Some(reason.clone());
                            Event::VerifyFailed { ticket, reason }
                        }
                    }
                }
                Effect::MarkCompleted { job_id } => {
                    self.board.mark_completed(job_id).await;
                    continue;
                }
            };

            let (_, more, _) = self.apply(job_id, Some(epoch), event).await?;
            queue.extend(more);
        }

        if let Some(reason) = failure {
            return Err(reason.into());
        }
        self.current(job_id).await
    }
}
