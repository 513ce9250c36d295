//! Thin HTTP surface over the extraction pipeline.
//!
//! Handlers translate query parameters and errors; all real work happens in
//! `channel::get_channel_record`. Upstream failure details stay in the logs,
//! not in responses.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

use crate::app_state::AppState;
use crate::channel::{ChannelError, get_channel_record};
use crate::fetcher::FetchError;
use crate::query::ChannelQuery;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    cached_entries: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/channel", get(get_channel))
        .route("/posts/{id}", get(get_post))
        .route("/healthz", get(health_check))
        .with_state(state)
}

async fn get_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChannelQuery>,
) -> Response {
    match get_channel_record(&state, &headers, &query).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let query = ChannelQuery::single_post(id);
    match get_channel_record(&state, &headers, &query).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => error_response(err),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        cached_entries: state.cache.len(),
    })
}

fn error_response(err: ChannelError) -> Response {
    error!(error = %err, "request failed");
    let status = match &err {
        ChannelError::PostNotFound(_) => StatusCode::NOT_FOUND,
        ChannelError::Fetch(FetchError::Http { status, .. }) if status.as_u16() == 404 => {
            StatusCode::NOT_FOUND
        }
        ChannelError::Fetch(_) => StatusCode::BAD_GATEWAY,
    };
    let body = match status {
        StatusCode::NOT_FOUND => "not found",
        _ => "upstream fetch failed",
    };
    (
        status,
        Json(ErrorResponse {
            error: body.to_string(),
        }),
    )
        .into_response()
}
