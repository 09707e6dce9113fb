//! Run request and its resolution into a concrete run configuration

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::error::{AppError, Result};
use crate::models::RunConfig;
use crate::store::Store;

/// Caller-supplied run parameters; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub subject_id: Option<Uuid>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub sets_per_day: Option<u32>,
    #[serde(default)]
    pub slides_per_set: Option<u32>,
    #[serde(default)]
    pub pause_between_sets: Option<bool>,
}

impl RunRequest {
    pub fn for_subject(subject_id: Uuid) -> Self {
        Self {
            subject_id: Some(subject_id),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sets_per_day == Some(0) {
            return Err(AppError::InvalidRequest("setsPerDay must be at least 1".to_string()));
        }
        if self.slides_per_set == Some(0) {
            return Err(AppError::InvalidRequest("slidesPerSet must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Fields set on `self` win over the ones on `fallback`
    fn or(&self, fallback: &RunRequest) -> RunRequest {
        RunRequest {
            subject_id: self.subject_id.or(fallback.subject_id),
            template_id: self.template_id.or(fallback.template_id),
            sets_per_day: self.sets_per_day.or(fallback.sets_per_day),
            slides_per_set: self.slides_per_set.or(fallback.slides_per_set),
            pause_between_sets: self.pause_between_sets.or(fallback.pause_between_sets),
        }
    }
}

/// Resolve a request into a run configuration.
///
/// The subject comes from the request, else from the newest enabled daily-run
/// cron job, else the oldest subject. Counts default to `defaults`, the
/// template to the oldest one on record.
pub async fn resolve_config(
    store: &dyn Store,
    defaults: &AgentConfig,
    request: &RunRequest,
) -> Result<RunConfig> {
    request.validate()?;

    let mut request = request.clone();
    if request.subject_id.is_none() {
        let jobs = store.list_enabled_cron_jobs().await?;
        if let Some(job_request) = jobs
            .iter()
            .filter_map(|job| job.action.daily_run())
            .find(|r| r.subject_id.is_some())
        {
            debug!(subject_id = ?job_request.subject_id, "Run config taken from cron job");
            request = request.or(job_request);
        }
    }

    let subject_id = match request.subject_id {
        Some(id) => {
            store
                .get_subject(id)
                .await?
                .ok_or_else(|| AppError::not_found("subject", id))?
                .id
        }
        None => {
            store
                .first_subject()
                .await?
                .ok_or_else(|| AppError::InvalidState("No subjects found, add a subject first".to_string()))?
                .id
        }
    };

    let template_id = match request.template_id {
        Some(id) => Some(
            store
                .get_template(id)
                .await?
                .ok_or_else(|| AppError::not_found("template", id))?
                .id,
        ),
        None => store.first_template().await?.map(|t| t.id),
    };

    let config = RunConfig {
        subject_id,
        template_id,
        sets_per_day: request.sets_per_day.unwrap_or(defaults.sets_per_day).max(1),
        slides_per_set: request.slides_per_set.unwrap_or(defaults.slides_per_set).max(1),
        pause_between_sets: request.pause_between_sets.unwrap_or(false),
    };
    Ok(config)
}
