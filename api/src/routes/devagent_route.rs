//! `GET /api/v1/devagent` — the single entry point of the review engine.
//!
//! `task_kind=0` selects code review; `action` picks the operation:
//! `1` run (payload: `;`-separated PR URLs), `0` get (payload: job id),
//! `2` revoke (`task_id` query param).

use std::sync::Arc;

use axum::{
    Json,
    extract::{OriginalUri, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::authenticate;
use crate::core::app_state::AppState;
use crate::core::http::response_envelope::{bad_request, server_error, unauthorized};

const TASK_KIND_CODE_REVIEW: i64 = 0;

const ACTION_GET: i64 = 0;
const ACTION_RUN: i64 = 1;
const ACTION_REVOKE: i64 = 2;

#[derive(Debug, Deserialize)]
pub struct DevagentQuery {
    task_kind: Option<i64>,
    action: Option<i64>,
    payload: Option<String>,
    task_id: Option<String>,
}

pub async fn devagent_route(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<DevagentQuery>,
) -> Response {
    if state.config.auth_enabled && !authenticate(&state.config.secret_key, &headers, &uri) {
        return unauthorized();
    }

    match query.task_kind {
        Some(TASK_KIND_CODE_REVIEW) => {}
        Some(other) => return bad_request(format!("Invalid task_kind value: task_kind={other}")),
        None => return bad_request("Expected non-empty value for task_kind parameter"),
    }

    match query.action {
        Some(ACTION_RUN) => handle_run(&state, query.payload).await,
        Some(ACTION_GET) => handle_get(&state, query.payload),
        Some(ACTION_REVOKE) => handle_revoke(&state, query.task_id),
        Some(other) => bad_request(format!("Invalid action value: action={other}")),
        None => bad_request("Expected non-empty value for action parameter"),
    }
}

fn parse_urls(payload: &str) -> Vec<String> {
    payload
        .split(';')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn handle_run(state: &Arc<AppState>, payload: Option<String>) -> Response {
    let Some(payload) = payload else {
        return bad_request("Expected non-empty value for payload parameter");
    };

    let urls = parse_urls(&payload);
    if urls.is_empty() {
        return bad_request("Expected non-empty semicolon-separated list of urls for payload");
    }
    for url in &urls {
        if !state.runtime.providers.is_known_url(url) || !url.contains("/pull/") {
            return bad_request(format!("Expected a pull request url of a known remote, got url={url}"));
        }
    }

    let job_id = match state.runtime.launch_review(urls).await {
        Ok(job_id) => job_id,
        Err(review_pipeline::Error::Provider(e @ diff_provider::ProviderError::InvalidUrl(_))) => {
            return bad_request(e.to_string());
        }
        Err(e) => return server_error(format!("[code_review_run] {e}")),
    };

    info!("[{job_id}] started review for payload {payload}");

    // A re-run for the same payload supersedes the previous job.
    let binding_key = format!("{TASK_KIND_CODE_REVIEW}:{payload}");
    if let Some(previous) = state.active_jobs.get(&binding_key) {
        warn!("[{previous}] superseded by [{job_id}], revoking");
        state.runtime.revoke_job(&previous);
    }
    state.active_jobs.set(
        binding_key,
        job_id.clone(),
        std::time::Duration::from_secs(state.config.payload_expiry_secs),
    );

    Json(json!({"task_id": job_id})).into_response()
}

fn handle_get(state: &Arc<AppState>, payload: Option<String>) -> Response {
    let Some(task_id) = payload else {
        return bad_request("Expected non-empty value for payload parameter");
    };

    match state.runtime.job_status(&task_id, true) {
        Ok(report) => Json(json!({
            "task_id": report.task_id,
            "task_status": report.task_status.code(),
            "task_result": report.task_result,
        }))
        .into_response(),
        Err(e) => server_error(format!("[code_review_get] {e}")),
    }
}

fn handle_revoke(state: &Arc<AppState>, task_id: Option<String>) -> Response {
    let Some(task_id) = task_id else {
        return bad_request("Expected non-empty value for task_id parameter");
    };

    state.runtime.revoke_job(&task_id);
    Json(json!({})).into_response()
}
