//! Run orchestrator - multi-set runs with pause, cancel and resume
//!
//! The persisted `Run` record is the only control channel: its status is
//! re-read before every set, and progress counters are added after every set
//! so a restarted process resumes at the first unattempted set. Every write
//! goes through `Store::modify_run`, so a cancel and a checkpoint never
//! overwrite each other.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::config::{resolve_config, RunRequest};
use crate::agent::model_variation::prepare_stand_in;
use crate::agent::selection::select_presets;
use crate::client::GenerationClient;
use crate::config::AgentConfig;
use crate::error::{AppError, Result};
use crate::models::{Run, RunConfig, RunStatus, SetStatus, SlideSet};
use crate::pipeline::{create_set, SetGenerator, SetReport, SlideSpec};
use crate::store::Store;

/// Display name of the `number`-th set (1-based) of a run
pub fn set_name(subject_name: &str, number: u32, now: DateTime<Utc>) -> String {
    format!("{} - Set {} - {}", subject_name, number, now.format("%b %-d"))
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// A run executing on a background task
#[derive(Debug)]
pub struct RunHandle {
    /// The run as it was persisted when the task started
    pub run: Run,
    pub task: JoinHandle<Result<Run>>,
}

impl RunHandle {
    /// Wait for the background task and return the final run record
    pub async fn wait(self) -> Result<Run> {
        self.task
            .await
            .map_err(|e| AppError::Internal(format!("Run task aborted: {}", e)))?
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    client: Arc<GenerationClient>,
    sets: Arc<SetGenerator>,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        client: Arc<GenerationClient>,
        sets: Arc<SetGenerator>,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            client,
            sets,
            config,
        }
    }

    pub fn set_generator(&self) -> &SetGenerator {
        &self.sets
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Run> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or_else(|| AppError::not_found("run", run_id))
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<Run> {
        self.load_run(run_id).await
    }

    pub async fn resolve_config(&self, request: &RunRequest) -> Result<RunConfig> {
        resolve_config(self.store.as_ref(), &self.config, request).await
    }

    /// Resolve the request and persist a new `running` run without
    /// executing any set.
    pub async fn prepare_run(&self, request: &RunRequest) -> Result<Run> {
        let config = self.resolve_config(request).await?;

        let presets = self.store.list_presets().await?.len();
        if presets < config.slides_per_set as usize {
            return Err(AppError::InvalidState(format!(
                "Need at least {} presets, have {}",
                config.slides_per_set, presets
            )));
        }

        let run = Run::new(config);
        self.store.insert_run(run.clone()).await?;
        info!(
            run_id = %run.id,
            subject_id = %run.config.subject_id,
            sets = run.sets_planned,
            slides = run.slides_total,
            "Run created"
        );
        Ok(run)
    }

    /// Persist a new run and execute it on a background task
    pub async fn start_run(&self, request: &RunRequest) -> Result<RunHandle> {
        let run = self.prepare_run(request).await?;
        Ok(self.spawn(run))
    }

    /// Persist a new run and execute it to the end on the current task
    pub async fn run(&self, request: &RunRequest) -> Result<Run> {
        let run = self.prepare_run(request).await?;
        self.drive(run.id).await
    }

    /// Flip a `paused` run back to `running` and continue it in the background
    pub async fn resume_run(&self, run_id: Uuid) -> Result<RunHandle> {
        let run = self
            .store
            .modify_run(
                run_id,
                Box::new(move |run: &mut Run| -> Result<()> {
                    if run.status != RunStatus::Paused {
                        return Err(AppError::InvalidState(format!(
                            "Can only resume a paused run, run {} is {:?}",
                            run_id, run.status
                        )));
                    }
                    run.status = RunStatus::Running;
                    Ok(())
                }),
            )
            .await?;
        info!(run_id = %run_id, next_set = run.next_set_index(), "Run resumed");

        Ok(self.spawn(run))
    }

    /// Mark a run cancelled; the running loop stops at its next set boundary.
    ///
    /// Only the status and completion time are written, never the counters.
    pub async fn cancel_run(&self, run_id: Uuid) -> Result<Run> {
        let run = self
            .store
            .modify_run(
                run_id,
                Box::new(move |run: &mut Run| -> Result<()> {
                    if run.status.is_finished() {
                        return Err(AppError::InvalidState(format!(
                            "Run {} is already {:?}",
                            run_id, run.status
                        )));
                    }
                    if run.status != RunStatus::Cancelled {
                        run.status = RunStatus::Cancelled;
                        run.completed_at = Some(Utc::now());
                    }
                    Ok(())
                }),
            )
            .await?;
        info!(run_id = %run_id, "Run cancelled");
        Ok(run)
    }

    fn spawn(&self, run: Run) -> RunHandle {
        let orchestrator = self.clone();
        let run_id = run.id;
        let task = tokio::spawn(async move {
            let result = orchestrator.drive(run_id).await;
            if let Err(e) = &result {
                error!(run_id = %run_id, error = %e, "Run aborted");
            }
            result
        });
        RunHandle { run, task }
    }

    /// Execute sets of a `running` run until it is finished, paused or cancelled.
    ///
    /// Starts at the first set not yet counted as completed or failed.
    pub async fn drive(&self, run_id: Uuid) -> Result<Run> {
        loop {
            let run = self.load_run(run_id).await?;
            if run.status == RunStatus::Cancelled {
                info!(run_id = %run_id, "Run cancelled, stopping before next set");
                return Ok(run);
            }

            let index = run.next_set_index();
            if index >= run.sets_planned {
                return self.finalize(run_id).await;
            }

            info!(run_id = %run_id, set_index = index, sets_planned = run.sets_planned, "Starting set");
            let outcome = self.process_set(&run, index).await;
            if let Err(e) = &outcome {
                error!(run_id = %run_id, set_index = index, error = %e, "Set failed");
            }

            let run = self.checkpoint(run_id, &outcome).await?;
            if run.status == RunStatus::Cancelled {
                info!(run_id = %run_id, "Run cancelled during set");
                return Ok(run);
            }

            let remaining = run.next_set_index() < run.sets_planned;
            if !remaining {
                continue;
            }

            if run.config.pause_between_sets {
                let run = self.pause(run_id).await?;
                info!(run_id = %run_id, status = ?run.status, next_set = run.next_set_index(), "Run stopped between sets");
                return Ok(run);
            }

            let cooldown = self.config.set_cooldown();
            if !cooldown.is_zero() {
                tokio::time::sleep(cooldown).await;
            }
        }
    }

    /// Add one set outcome to the persisted counters, leaving the status alone
    async fn checkpoint(&self, run_id: Uuid, outcome: &Result<SetReport>) -> Result<Run> {
        let (completed, failed, slides_succeeded, slides_failed) = match outcome {
            Ok(report) if report.status == SetStatus::Ready => (1, 0, report.succeeded, report.failed),
            Ok(report) => (0, 1, report.succeeded, report.failed),
            Err(_) => (0, 1, 0, 0),
        };

        self.store
            .modify_run(
                run_id,
                Box::new(move |run: &mut Run| -> Result<()> {
                    run.sets_completed += completed;
                    run.sets_failed += failed;
                    run.slides_succeeded += slides_succeeded;
                    run.slides_failed += slides_failed;
                    Ok(())
                }),
            )
            .await
    }

    /// `running` becomes `paused`; any other status is kept
    async fn pause(&self, run_id: Uuid) -> Result<Run> {
        self.store
            .modify_run(
                run_id,
                Box::new(|run: &mut Run| -> Result<()> {
                    if run.status == RunStatus::Running {
                        run.status = RunStatus::Paused;
                    }
                    Ok(())
                }),
            )
            .await
    }

    async fn finalize(&self, run_id: Uuid) -> Result<Run> {
        let run = self
            .store
            .modify_run(
                run_id,
                Box::new(|run: &mut Run| -> Result<()> {
                    if run.status == RunStatus::Cancelled {
                        return Ok(());
                    }
                    run.status = if run.sets_completed > 0 {
                        RunStatus::Completed
                    } else {
                        RunStatus::Failed
                    };
                    run.completed_at = Some(Utc::now());
                    Ok(())
                }),
            )
            .await?;

        info!(
            run_id = %run_id,
            status = ?run.status,
            sets_completed = run.sets_completed,
            sets_failed = run.sets_failed,
            slides_succeeded = run.slides_succeeded,
            slides_failed = run.slides_failed,
            "Run finished"
        );
        Ok(run)
    }

    async fn process_set(&self, run: &Run, index: u32) -> Result<SetReport> {
        let config = &run.config;
        let subject = self
            .store
            .get_subject(config.subject_id)
            .await?
            .ok_or_else(|| AppError::not_found("subject", config.subject_id))?;

        let now = Utc::now();
        let presets = self.store.list_presets().await?;
        let used_today = self.store.preset_ids_used_since(start_of_day(now)).await?;
        let recently_used = self
            .store
            .preset_ids_used_since(now - ChronoDuration::days(i64::from(self.config.freshness_days)))
            .await?;

        let selected = select_presets(
            &presets,
            config.slides_per_set as usize,
            &used_today,
            &recently_used,
            &mut rand::thread_rng(),
        );
        if selected.is_empty() {
            return Err(AppError::InvalidState("No presets available".to_string()));
        }
        if selected.len() < config.slides_per_set as usize {
            warn!(
                run_id = %run.id,
                selected = selected.len(),
                wanted = config.slides_per_set,
                "Preset pool smaller than set size"
            );
        }

        let mut set = SlideSet::new(subject.id, config.template_id, set_name(&subject.name, index + 1, now));
        if let Some(stand_in) = prepare_stand_in(self.store.as_ref(), &self.client, &subject, set.id).await {
            set.model_variation_id = Some(stand_in.variation_id);
            set.model_image_path = Some(stand_in.image_path);
        }

        let set_id = set.id;
        let specs = selected.iter().map(SlideSpec::from_preset).collect();
        create_set(self.store.as_ref(), set, specs).await?;

        self.sets.generate_set(set_id).await
    }
}
