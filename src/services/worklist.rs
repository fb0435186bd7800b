use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::coordinate::Coordinate;
use crate::models::job::{Job, JobId, JobStatus, RankedJob};
use crate::services::booking::{BookingError, BookingService};
use crate::services::ranker;

#[derive(Default)]
struct BoardState {
    jobs: Vec<Job>,
    /// Every job seen completed, whether or not it is on the current list.
    completed: HashSet<JobId>,
    fetched_at: Option<DateTime<Utc>>,
    stale: bool,
    refresh_error: Option<String>,
}

/// Copy of the board at one instant.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub jobs: Vec<Job>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub refresh_error: Option<String>,
}

/// Last job list fetched from the booking service.
#[derive(Default)]
pub struct JobBoard {
    state: RwLock<BoardState>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly fetched list. Jobs ever seen completed stay completed.
    pub async fn replace(&self, jobs: Vec<Job>) {
        let mut state = self.state.write().await;
        let BoardState { completed, .. } = &mut *state;
        let jobs: Vec<Job> = jobs
            .into_iter()
            .map(|mut job| {
                if job.status.is_completed() {
                    completed.insert(job.id);
                } else if completed.contains(&job.id) {
                    job.status = JobStatus::Completed;
                }
                job
            })
            .collect();

        state.jobs = jobs;
        state.fetched_at = Some(Utc::now());
        state.stale = false;
        state.refresh_error = None;
    }

    /// Keep the current list but flag it as out of date.
    pub async fn mark_stale(&self, reason: String) {
        let mut state = self.state.write().await;
        state.stale = true;
        state.refresh_error = Some(reason);
    }

    /// Record a verified completion. Returns false if the job is not on the board,
    /// though it is still remembered for later refreshes.
    pub async fn mark_completed(&self, job_id: JobId) -> bool {
        let mut state = self.state.write().await;
        state.completed.insert(job_id);
        match state.jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) => {
                job.status = JobStatus::Completed;
                true
            }
            None => false,
        }
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        let state = self.state.read().await;
        BoardSnapshot {
            jobs: state.jobs.clone(),
            fetched_at: state.fetched_at,
            stale: state.stale,
            refresh_error: state.refresh_error.clone(),
        }
    }
}

/// A ranked view of the board.
#[derive(Debug, Clone)]
pub struct RankedWorklist {
    pub jobs: Vec<RankedJob>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub refresh_error: Option<String>,
}

/// Fetches the technician's assignments and ranks them by proximity.
pub struct Worklist<B> {
    booking: Arc<B>,
    board: Arc<JobBoard>,
}

impl<B: BookingService> Worklist<B> {
    pub fn new(booking: Arc<B>, board: Arc<JobBoard>) -> Self {
        Self { booking, board }
    }

    /// Re-fetch assignments. On failure the previous list is kept and marked stale.
    pub async fn refresh(&self) -> Result<usize, BookingError> {
        match self.booking.assigned_jobs().await {
            Ok(jobs) => {
                let count = jobs.len();
                self.board.replace(jobs).await;
                metrics::counter!("worklist_refresh_total", "outcome" => "ok").increment(1);
                metrics::gauge!("worklist_jobs").set(count as f64);
                tracing::debug!(jobs = count, "Worklist refreshed");
                Ok(count)
            }
            Err(e) => {
                metrics::counter!("worklist_refresh_total", "outcome" => "error").increment(1);
                tracing::warn!(error = %e, "Could not refresh worklist");
                self.board.mark_stale(e.reason()).await;
                Err(e)
            }
        }
    }

    /// Rank the current board from `technician`. Recomputed on every call.
    pub async fn ranked(&self, technician: Option<Coordinate>) -> RankedWorklist {
        let snapshot = self.board.snapshot().await;
        RankedWorklist {
            jobs: ranker::rank(technician, &snapshot.jobs),
            fetched_at: snapshot.fetched_at,
            stale: snapshot.stale,
            refresh_error: snapshot.refresh_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::Customer;

    fn job(id: JobId, status: JobStatus, lng: f64) -> Job {
        Job {
            id,
            service_name: None,
            technician_id: None,
            customer: Customer::default(),
            scheduled_at: None,
            status,
            location: Some(Coordinate::new(0.0, lng).unwrap()),
            requirements: None,
        }
    }

    #[tokio::test]
    async fn test_replace_never_reverts_completion() {
        let board = JobBoard::new();
        board.replace(vec![job(1, JobStatus::Confirmed, 1.0)]).await;
        assert!(board.mark_completed(1).await);

        board.replace(vec![job(1, JobStatus::Confirmed, 1.0)]).await;
        assert_eq!(board.snapshot().await.jobs[0].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_completion_survives_job_missing_from_one_refresh() {
        let board = JobBoard::new();
        board.replace(vec![job(1, JobStatus::Confirmed, 1.0), job(2, JobStatus::Pending, 2.0)]).await;
        assert!(board.mark_completed(1).await);

        board.replace(vec![job(2, JobStatus::Pending, 2.0)]).await;
        board.replace(vec![job(1, JobStatus::Confirmed, 1.0), job(2, JobStatus::Pending, 2.0)]).await;

        let snap = board.snapshot().await;
        assert_eq!(snap.jobs[0].status, JobStatus::Completed);
        assert_eq!(snap.jobs[1].status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_completion_recorded_before_job_is_listed() {
        let board = JobBoard::new();
        assert!(!board.mark_completed(3).await);

        board.replace(vec![job(3, JobStatus::Confirmed, 1.0)]).await;
        assert_eq!(board.snapshot().await.jobs[0].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_mark_stale_keeps_jobs() {
        let board = JobBoard::new();
        board.replace(vec![job(1, JobStatus::Pending, 1.0)]).await;
        board.mark_stale("request failed".into()).await;

        let snap = board.snapshot().await;
        assert!(snap.stale);
        assert_eq!(snap.jobs.len(), 1);
        assert_eq!(snap.refresh_error.as_deref(), Some("request failed"));

        board.replace(vec![]).await;
        assert!(!board.snapshot().await.stale);
    }

    #[tokio::test]
    async fn test_mark_completed_unknown_job() {
        let board = JobBoard::new();
        assert!(!board.mark_completed(99).await);
    }
}
