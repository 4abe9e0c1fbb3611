use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use repomind_core::service::DEFAULT_N_RESULTS;
use repomind_core::{AnswerResponse, IngestResponse};

use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ProcessParams {
    pub repo_url: String,
    pub repo_name: String,
    pub branch: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct QueryParams {
    pub query_text: String,
    pub repo_name: Option<String>,
    pub n_results: Option<usize>,
}

#[derive(serde::Serialize)]
struct RootResponse {
    message: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        message: "RepoMind is running. POST /repo/process to index a repository, \
                  POST /repo/query to ask about it.",
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn process_handler(
    State(state): State<AppState>,
    params: Result<Query<ProcessParams>, QueryRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::info!(repo = %params.repo_name, "ingest requested");
    let report = state
        .service
        .ingest(&params.repo_url, &params.repo_name, params.branch.as_deref())
        .await?;
    Ok(Json(report))
}

pub(crate) async fn query_handler(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let answer = state
        .service
        .answer(
            &params.query_text,
            params.repo_name.as_deref(),
            params.n_results.unwrap_or(DEFAULT_N_RESULTS),
        )
        .await?;
    Ok(Json(answer))
}
