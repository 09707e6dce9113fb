//! HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::RunRequest;
use crate::error::Result;
use crate::models::Run;
use crate::pipeline::{repair_set, RepairReport, SetReport};
use crate::scheduler::TickReport;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create a run and execute it in the background
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<Run>)> {
    let handle = state.orchestrator.start_run(&request).await?;
    Ok((StatusCode::ACCEPTED, Json(handle.run)))
}

pub async fn get_run(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Run>> {
    Ok(Json(state.orchestrator.get_run(id).await?))
}

pub async fn resume_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Run>)> {
    let handle = state.orchestrator.resume_run(id).await?;
    Ok((StatusCode::ACCEPTED, Json(handle.run)))
}

pub async fn cancel_run(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Run>> {
    Ok(Json(state.orchestrator.cancel_run(id).await?))
}

/// Generate a set synchronously and report the outcome
pub async fn generate_set(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SetReport>> {
    Ok(Json(state.orchestrator.set_generator().generate_set(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RepairParams {
    #[serde(default)]
    pub requeue: bool,
}

pub async fn repair(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<RepairParams>,
) -> Result<Json<RepairReport>> {
    let report = repair_set(
        state.store.as_ref(),
        state.orchestrator.set_generator(),
        id,
        params.requeue,
    )
    .await?;
    Ok(Json(report))
}

pub async fn cron_tick(State(state): State<Arc<AppState>>) -> Result<Json<TickReport>> {
    Ok(Json(state.cron.tick(Utc::now()).await?))
}
