//! Typed cron job actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::RunRequest;
use crate::error::{AppError, Result};

pub const DEFAULT_NAMING_PATTERN: &str = "Auto set {date}";

/// Ad hoc hairstyle used instead of a stored preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSlide {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

/// Where the slides of a scheduled set come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideSource {
    PresetIds(Vec<Uuid>),
    Custom(Vec<CustomSlide>),
}

impl SlideSource {
    pub fn len(&self) -> usize {
        match self {
            SlideSource::PresetIds(ids) => ids.len(),
            SlideSource::Custom(slides) => slides.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSetAction {
    pub subject_id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    pub slides: SlideSource,
    /// Set name; `{date}` and `{time}` are substituted at run time
    #[serde(default)]
    pub naming_pattern: Option<String>,
}

impl GenerateSetAction {
    pub fn set_name(&self, now: DateTime<Utc>) -> String {
        let pattern = self
            .naming_pattern
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_NAMING_PATTERN);
        pattern
            .replace("{date}", &now.format("%Y-%m-%d").to_string())
            .replace("{time}", &now.format("%H:%M:%S").to_string())
    }
}

/// What a cron job does when it fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobAction {
    /// Create one set from explicit slides and generate it
    GenerateSet(GenerateSetAction),
    /// Run the orchestrator to completion
    DailyRun(RunRequest),
}

impl JobAction {
    /// Reject actions that can never succeed
    pub fn validate(&self) -> Result<()> {
        match self {
            JobAction::GenerateSet(action) => {
                if action.slides.is_empty() {
                    return Err(AppError::InvalidRequest(
                        "generate_set action needs at least one slide".to_string(),
                    ));
                }
                if let SlideSource::Custom(slides) = &action.slides {
                    if slides.iter().any(|s| s.prompt.trim().is_empty()) {
                        return Err(AppError::InvalidRequest(
                            "custom slides need a non-empty prompt".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            JobAction::DailyRun(request) => request.validate(),
        }
    }

    pub fn daily_run(&self) -> Option<&RunRequest> {
        match self {
            JobAction::DailyRun(request) => Some(request),
            JobAction::GenerateSet(_) => None,
        }
    }
}
