//! Cron tick runner

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::error::{AppError, Result};
use crate::models::{CronJob, JobResult, SlideSet};
use crate::pipeline::{create_set, SlideSpec};
use crate::scheduler::action::{GenerateSetAction, JobAction, SlideSource};
use crate::store::Store;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub ran: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    pub skipped: usize,
}

pub struct CronRunner {
    store: Arc<dyn Store>,
    orchestrator: Orchestrator,
    tick_task: RwLock<Option<JoinHandle<()>>>,
}

impl CronRunner {
    pub fn new(store: Arc<dyn Store>, orchestrator: Orchestrator) -> Self {
        Self {
            store,
            orchestrator,
            tick_task: RwLock::new(None),
        }
    }

    /// Run every enabled job that is due at `now`
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let jobs = self.store.list_enabled_cron_jobs().await?;
        let mut report = TickReport::default();

        for job in jobs {
            if !job.schedule.is_due(job.last_run_at, now) {
                debug!(job = %job.name, schedule = %job.schedule, "Job not due");
                report.skipped += 1;
                continue;
            }

            let job = self.run_job(job, now).await?;
            match job.last_result {
                Some(JobResult::Success) => report.ran.push(job.id),
                _ => report.failed.push(job.id),
            }
        }

        Ok(report)
    }

    /// Execute one job and record the outcome on it
    pub async fn run_job(&self, mut job: CronJob, now: DateTime<Utc>) -> Result<CronJob> {
        info!(job = %job.name, "Running cron job");

        let outcome = match job.action.validate() {
            Ok(()) => self.execute(&job.action, now).await,
            Err(e) => Err(e),
        };

        job.last_run_at = Some(now);
        match outcome {
            Ok(()) => {
                job.last_result = Some(JobResult::Success);
                job.last_error = None;
                info!(job = %job.name, "Cron job succeeded");
            }
            Err(e) => {
                job.last_result = Some(JobResult::Failed);
                job.last_error = Some(e.to_string());
                error!(job = %job.name, error = %e, "Cron job failed");
            }
        }

        self.store.update_cron_job(&job).await?;
        Ok(job)
    }

    async fn execute(&self, action: &JobAction, now: DateTime<Utc>) -> Result<()> {
        match action {
            JobAction::GenerateSet(action) => self.generate_set(action, now).await,
            JobAction::DailyRun(request) => {
                let run = self.orchestrator.run(request).await?;
                info!(run_id = %run.id, status = ?run.status, "Scheduled run finished");
                Ok(())
            }
        }
    }

    async fn generate_set(&self, action: &GenerateSetAction, now: DateTime<Utc>) -> Result<()> {
        let subject = self
            .store
            .get_subject(action.subject_id)
            .await?
            .ok_or_else(|| AppError::not_found("subject", action.subject_id))?;

        let specs = match &action.slides {
            SlideSource::PresetIds(ids) => {
                let mut specs = Vec::with_capacity(ids.len());
                for id in ids {
                    let preset = self
                        .store
                        .get_preset(*id)
                        .await?
                        .ok_or_else(|| AppError::not_found("preset", id))?;
                    specs.push(SlideSpec::from_preset(&preset));
                }
                specs
            }
            SlideSource::Custom(slides) => slides
                .iter()
                .map(|s| SlideSpec::custom(s.prompt.clone(), s.negative_prompt.clone()))
                .collect(),
        };

        let set = SlideSet::new(subject.id, action.template_id, action.set_name(now));
        let set_id = set.id;
        create_set(self.store.as_ref(), set, specs).await?;
        self.orchestrator.set_generator().generate_set(set_id).await?;
        Ok(())
    }

    /// Start ticking every `interval_secs` on a background task
    pub async fn start(self: &Arc<Self>, interval_secs: u64) {
        let runner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let interval = Duration::from_secs(interval_secs.max(1));
            loop {
                match runner.tick(Utc::now()).await {
                    Ok(report) if !report.ran.is_empty() || !report.failed.is_empty() => info!(
                        ran = report.ran.len(),
                        failed = report.failed.len(),
                        skipped = report.skipped,
                        "Cron tick completed"
                    ),
                    Ok(_) => debug!("Cron tick found nothing due"),
                    Err(e) => error!(error = %e, "Cron tick failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        *self.tick_task.write().await = Some(handle);
        info!(interval_secs, "Started cron tick task");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.tick_task.write().await.take() {
            handle.abort();
            info!("Stopped cron tick task");
        }
    }
}
