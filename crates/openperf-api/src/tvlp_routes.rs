// SPDX-License-Identifier: Apache-2.0

//! TVLP REST endpoints (spec.md section 6.2): `GET/POST /tvlp`,
//! `GET/DELETE /tvlp/:id`, `POST /tvlp/:id/start?time=<rfc3339>`,
//! `POST /tvlp/:id/stop`, `GET/DELETE /tvlp-results[/:id]`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use openperf_model::id::Id;

use crate::error::ApiError;
use crate::state::AppState;
use crate::tvlp_registry::CreateTvlpBody;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tvlp", get(list).post(create))
        .route("/tvlp/:id", get(get_one).delete(erase))
        .route("/tvlp/:id/start", post(start))
        .route("/tvlp/:id/stop", post(stop))
        .route("/tvlp-results", get(result_list))
        .route("/tvlp-results/:id", get(result_get).delete(result_erase))
}

fn parse_id(raw: &str) -> Result<Id, ApiError> {
    Id::parse(raw).ok_or_else(|| ApiError::tvlp_invalid(format!("\"{raw}\" is not a valid id")))
}

async fn list(State(state): State<AppState>) -> Json<Vec<crate::tvlp_registry::TvlpView>> {
    Json(state.tvlp.list())
}

async fn create(State(state): State<AppState>, Json(body): Json<CreateTvlpBody>) -> Result<Response, ApiError> {
    let view = state.tvlp.create(body)?;
    let id = view.id.clone();
    Ok((StatusCode::CREATED, [(axum::http::header::LOCATION, format!("/tvlp/{id}"))], Json(view)).into_response())
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<crate::tvlp_registry::TvlpView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.tvlp.get(&id)?))
}

async fn erase(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.tvlp.erase(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct StartQuery {
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StartQuery>,
) -> Result<Json<crate::tvlp_registry::TvlpView>, ApiError> {
    let id = parse_id(&id)?;
    let t0 = query.time.unwrap_or_else(Utc::now);
    Ok(Json(state.tvlp.start(&id, t0)?))
}

async fn stop(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.tvlp.stop(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn result_list(State(state): State<AppState>) -> Json<Vec<crate::tvlp_registry::TvlpResultView>> {
    Json(state.tvlp.result_list())
}

async fn result_get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<crate::tvlp_registry::TvlpResultView>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.tvlp.result_get(&id)?))
}

async fn result_erase(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.tvlp.result_erase(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
