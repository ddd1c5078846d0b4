//! Timer-based job scheduler
//!
//! Each scheduled job is a tokio task that sleeps until `run_at` and then
//! pushes the job onto an mpsc queue drained by the job worker. Scheduling the
//! same `(settings, action)` again aborts the pending task.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::value_objects::RowId;
use crate::error::SurveyResult;
use crate::ports::outbound::{JobAction, JobScheduler, ScheduledJob};

pub const JOB_QUEUE_CAPACITY: usize = 256;

pub struct TokioScheduler {
    pending: DashMap<(RowId, JobAction), JoinHandle<()>>,
    queue: mpsc::Sender<ScheduledJob>,
}

impl TokioScheduler {
    /// Scheduler plus the receiving end of its job queue.
    pub fn new() -> (Self, mpsc::Receiver<ScheduledJob>) {
        let (queue, receiver) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let scheduler = Self {
            pending: DashMap::new(),
            queue,
        };
        (scheduler, receiver)
    }

    pub fn is_pending(&self, settings_id: RowId, action: JobAction) -> bool {
        self.pending
            .get(&(settings_id, action))
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[async_trait]
impl JobScheduler for TokioScheduler {
    async fn schedule_at(&self, job: ScheduledJob) -> SurveyResult<()> {
        let key = (job.settings_id, job.action);
        let delay = (job.run_at - Utc::now()).to_std().unwrap_or_default();
        let queue = self.queue.clone();

        debug!(settings_id = job.settings_id, action = ?job.action, run_at = %job.run_at, "Scheduling job");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let settings_id = job.settings_id;
            if queue.send(job).await.is_err() {
                warn!(settings_id, "Job queue closed, scheduled job dropped");
            }
        });

        if let Some(previous) = self.pending.insert(key, handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn cancel(&self, settings_id: RowId, action: JobAction) -> SurveyResult<()> {
        if let Some((_, handle)) = self.pending.remove(&(settings_id, action)) {
            handle.abort();
            debug!(settings_id, ?action, "Scheduled job cancelled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    fn job(settings_id: RowId, action: JobAction, in_ms: i64) -> ScheduledJob {
        ScheduledJob {
            settings_id,
            action,
            run_at: Utc::now() + Duration::milliseconds(in_ms),
        }
    }

    #[tokio::test]
    async fn past_jobs_fire_immediately() {
        let (scheduler, mut queue) = TokioScheduler::new();
        scheduler.schedule_at(job(1, JobAction::Activate, -1_000)).await.unwrap();

        let fired = timeout(StdDuration::from_secs(1), queue.recv()).await.unwrap().unwrap();
        assert_eq!(fired.settings_id, 1);
        assert_eq!(fired.action, JobAction::Activate);
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_pending_job() {
        let (scheduler, mut queue) = TokioScheduler::new();
        scheduler.schedule_at(job(1, JobAction::Deactivate, 10_000)).await.unwrap();
        let replacement = job(1, JobAction::Deactivate, 20);
        scheduler.schedule_at(replacement.clone()).await.unwrap();

        let fired = timeout(StdDuration::from_secs(1), queue.recv()).await.unwrap().unwrap();
        assert_eq!(fired, replacement);
        assert!(timeout(StdDuration::from_millis(100), queue.recv()).await.is_err());
    }

    #[tokio::test]
    async fn cancelled_jobs_never_fire() {
        let (scheduler, mut queue) = TokioScheduler::new();
        scheduler.schedule_at(job(7, JobAction::Activate, 50)).await.unwrap();
        assert!(scheduler.is_pending(7, JobAction::Activate));

        scheduler.cancel(7, JobAction::Activate).await.unwrap();

        assert!(!scheduler.is_pending(7, JobAction::Activate));
        assert!(timeout(StdDuration::from_millis(200), queue.recv()).await.is_err());
    }
}
