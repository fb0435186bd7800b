//! OTP-gated job completion as a pure state machine.
//!
//! `CompletionSession::apply` takes an event and returns the next session
//! plus the side effects the caller must perform. Responses from the
//! booking service come back in as events carrying the ticket of the
//! request that produced them.

use serde::Serialize;

use crate::models::job::{Job, JobId, JobStatus};
use crate::services::booking::BookingError;

/// Identifies one dispatched booking call within a session.
pub type Ticket = u64;

/// Which step a failed session can be retried from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resume {
    /// Retry with `request_code`.
    Idle,
    /// Retry with `submit_code`; the issued code is still live.
    OtpIssued,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// Transport error or timeout talking to the booking service.
    RequestFailed,
    InvalidCode,
    CodeExpired,
    /// The booking service refused with its own reason.
    Rejected(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::RequestFailed => write!(f, "request failed"),
            FailureReason::InvalidCode => write!(f, "invalid code"),
            FailureReason::CodeExpired => write!(f, "code expired"),
            FailureReason::Rejected(reason) => write!(f, "{reason}"),
        }
    }
}

impl From<&BookingError> for FailureReason {
    fn from(err: &BookingError) -> Self {
        match err {
            BookingError::Transport(_) | BookingError::Decode(_) => FailureReason::RequestFailed,
            BookingError::InvalidCode(_) => FailureReason::InvalidCode,
            BookingError::CodeExpired(_) => FailureReason::CodeExpired,
            BookingError::NotFound(_)
            | BookingError::Unauthorized(_)
            | BookingError::Rejected { .. } => FailureReason::Rejected(err.reason()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    OtpIssued,
    /// Code accepted; the job is now completed. Terminal.
    Verified,
    /// The job was already completed when the view was opened. Terminal.
    AlreadyCompleted,
    Failed { resume: Resume, reason: FailureReason },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::OtpIssued => "otp_issued",
            Phase::Verified => "verified",
            Phase::AlreadyCompleted => "already_completed",
            Phase::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    RequestCode,
    SubmitCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RequestCode,
    SubmitCode(String),
    CodeIssued { ticket: Ticket },
    IssueFailed { ticket: Ticket, reason: FailureReason },
    CodeAccepted { ticket: Ticket },
    VerifyFailed { ticket: Ticket, reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    IssueCode { job_id: JobId, ticket: Ticket },
    VerifyCode { job_id: JobId, code: String, ticket: Ticket },
    MarkCompleted { job_id: JobId },
}

/// Why an event was refused without changing the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("job is already completed")]
    AlreadyCompleted,

    #[error("{0:?} is still in flight")]
    Busy(Step),

    #[error("{step:?} is not allowed while {phase}")]
    NotAllowed { step: Step, phase: &'static str },

    #[error("code must not be empty")]
    EmptyCode,

    #[error("response does not match the pending request")]
    StaleResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InFlight {
    pub step: Step,
    #[serde(skip)]
    pub ticket: Ticket,
}

/// Per-job completion progress for the view the technician has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSession {
    pub job_id: JobId,
    pub job_status: JobStatus,
    #[serde(flatten)]
    pub phase: Phase,
    pub in_flight: Option<InFlight>,
    pub last_error: Option<String>,
    #[serde(skip)]
    next_ticket: Ticket,
}

impl CompletionSession {
    /// Start a session for `job`. Completed jobs open straight into the terminal view.
    pub fn open(job: &Job) -> Self {
        let phase = if job.status.is_completed() {
            Phase::AlreadyCompleted
        } else {
            Phase::Idle
        };

        Self {
            job_id: job.id,
            job_status: job.status,
            phase,
            in_flight: None,
            last_error: None,
            next_ticket: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Verified | Phase::AlreadyCompleted)
    }

    /// Advance the session by one event.
    pub fn apply(&self, event: Event) -> Result<(CompletionSession, Vec<Effect>), Rejection> {
        let mut next = self.clone();

        match event {
            Event::RequestCode => {
                self.check_ready()?;
                match self.phase {
                    Phase::Idle | Phase::Failed { resume: Resume::Idle, .. } => {}
                    _ => return Err(self.not_allowed(Step::RequestCode)),
                }
                let ticket = next.dispatch(Step::RequestCode);
                Ok((next, vec![Effect::IssueCode { job_id: self.job_id, ticket }]))
            }

            Event::SubmitCode(code) => {
                self.check_ready()?;
                match self.phase {
                    Phase::OtpIssued | Phase::Failed { resume: Resume::OtpIssued, .. } => {}
                    _ => return Err(self.not_allowed(Step::SubmitCode)),
                }
                let code = code.trim();
                if code.is_empty() {
                    return Err(Rejection::EmptyCode);
                }
                let ticket = next.dispatch(Step::SubmitCode);
                Ok((
                    next,
                    vec![Effect::VerifyCode {
                        job_id: self.job_id,
                        code: code.to_string(),
                        ticket,
                    }],
                ))
            }

            Event::CodeIssued { ticket } => {
                self.check_pending(Step::RequestCode, ticket)?;
                next.in_flight = None;
                next.last_error = None;
                next.phase = Phase::OtpIssued;
                Ok((next, Vec::new()))
            }

            Event::IssueFailed { ticket, reason } => {
                self.check_pending(Step::RequestCode, ticket)?;
                next.fail(Resume::Idle, reason);
                Ok((next, Vec::new()))
            }

            Event::CodeAccepted { ticket } => {
                self.check_pending(Step::SubmitCode, ticket)?;
                next.in_flight = None;
                next.last_error = None;
                next.phase = Phase::Verified;
                next.job_status = JobStatus::Completed;
                Ok((next, vec![Effect::MarkCompleted { job_id: self.job_id }]))
            }

            Event::VerifyFailed { ticket, reason } => {
                self.check_pending(Step::SubmitCode, ticket)?;
                // An expired code can only be replaced by issuing a new one.
                let resume = if reason == FailureReason::CodeExpired {
                    Resume::Idle
                } else {
                    Resume::OtpIssued
                };
                next.fail(resume, reason);
                Ok((next, Vec::new()))
            }
        }
    }

    fn check_ready(&self) -> Result<(), Rejection> {
        if let Some(in_flight) = self.in_flight {
            return Err(Rejection::Busy(in_flight.step));
        }
        if self.job_status.is_completed() || self.is_terminal() {
            return Err(Rejection::AlreadyCompleted);
        }
        Ok(())
    }

    fn check_pending(&self, step: Step, ticket: Ticket) -> Result<(), Rejection> {
        match self.in_flight {
            Some(in_flight) if in_flight.step == step && in_flight.ticket == ticket => Ok(()),
            _ => Err(Rejection::StaleResponse),
        }
    }

    fn not_allowed(&self, step: Step) -> Rejection {
        Rejection::NotAllowed {
            step,
            phase: self.phase.name(),
        }
    }

    fn dispatch(&mut self, step: Step) -> Ticket {
        self.next_ticket += 1;
        self.in_flight = Some(InFlight {
            step,
            ticket: self.next_ticket,
        });
        self.next_ticket
    }

    fn fail(&mut self, resume: Resume, reason: FailureReason) {
        self.in_flight = None;
        self.last_error = Some(reason.to_string());
        self.phase = Phase::Failed { resume, reason };
    }
}
