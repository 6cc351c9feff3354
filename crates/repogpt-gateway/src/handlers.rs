use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use repogpt_index::source::RepoRef;

use super::error::ApiError;
use super::server::AppState;

/// Per-request source host credential, overriding the configured one.
pub(crate) const SOURCE_TOKEN_HEADER: &str = "x-source-token";

#[derive(serde::Deserialize)]
pub(crate) struct RepoPayload {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FilePayload {
    pub file_name: String,
    pub url: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct ChatPayload {
    pub user_prompt: String,
}

#[derive(serde::Serialize)]
pub(crate) struct IngestResponse {
    success: bool,
    processed: usize,
    total: usize,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileResponse {
    success: bool,
    summary_id: i64,
    code_id: i64,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

fn source_token<'a>(headers: &'a HeaderMap, state: &'a AppState) -> Option<&'a str> {
    headers
        .get(SOURCE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or(state.source_token.as_deref())
}

pub(crate) async fn ingest_repo_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RepoPayload>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(payload) = payload?;
    let repo = RepoRef::new(payload.owner, payload.repo, payload.branch)?;
    let report = state
        .assistant
        .indexer()
        .ingest_repository(&repo, source_token(&headers, &state))
        .await?;

    Ok(Json(IngestResponse {
        success: true,
        processed: report.processed,
        total: report.total,
    }))
}

pub(crate) async fn ingest_file_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<FilePayload>, JsonRejection>,
) -> Result<Json<FileResponse>, ApiError> {
    let Json(payload) = payload?;
    let ids = state
        .assistant
        .indexer()
        .ingest_file(
            &payload.file_name,
            &payload.url,
            source_token(&headers, &state),
        )
        .await?;

    Ok(Json(FileResponse {
        success: true,
        summary_id: ids.summary_id,
        code_id: ids.code_id,
    }))
}

/// Streams the answer as plain text.
///
/// Failures before the first chunk become a JSON error response; later
/// failures end the body early.
pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let mut answer = state.assistant.ask(&payload.user_prompt).await?;

    let first = match answer.next().await {
        Some(Err(e)) => return Err(e.into()),
        first => first,
    };

    let body = futures::stream::iter(first)
        .chain(answer)
        .inspect(|item| {
            if let Err(e) = item {
                tracing::warn!("answer stream aborted: {e}");
            }
        });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
