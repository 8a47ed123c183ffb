// SPDX-License-Identifier: Apache-2.0

//! Generic REST handlers for one generator module (spec.md section 6.2),
//! instantiated once per module kind in [`crate::app`]. Written once and
//! monomorphized over each module's config/stats pair, the same way
//! [`openperf_server::server::spawn`] is.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use openperf_channel::bus::BusSender;
use openperf_model::generator::Generator;
use openperf_model::id::Id;
use openperf_model::request::{Reply, Request};
use openperf_model::result::GeneratorResult;
use openperf_model::Error as ModelError;

use crate::error::ApiError;
use crate::state::AppState;

/// Extracts this module's bus sender from shared state. Each module's routes
/// are built with a distinct accessor closure (see [`crate::app`]).
pub type Accessor<C, S> = Arc<dyn Fn(&AppState) -> BusSender<Request<C>, Reply<C, S>> + Send + Sync>;

/// Builds the full REST surface for one module (spec.md section 6.2):
/// `/<mod>` CRUD, `/<mod>/:id/{start,stop}`, `/<mod>/x/*` bulk operations
/// and toggle, and `/<mod>-results[/:id]`.
pub fn routes<C, S>(
    module_path: &'static str,
    results_path: &'static str,
    supports_toggle: bool,
    accessor: Accessor<C, S>,
) -> Router<AppState>
where
    C: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    S: Clone + Default + Serialize + Send + Sync + 'static,
{
    let a = accessor;

    let mut router = Router::new()
        .route(
            &format!("/{module_path}"),
            get({
                let a = a.clone();
                move |State(state): State<AppState>| async move { list(state, a).await }
            })
            .post({
                let a = a.clone();
                move |State(state): State<AppState>, Json(body): Json<CreateBody<C>>| async move { create(state, a, body).await }
            }),
        )
        .route(
            &format!("/{module_path}/:id"),
            get({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>| async move { get_one(state, a, id).await }
            })
            .delete({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>| async move { erase(state, a, id).await }
            }),
        )
        .route(
            &format!("/{module_path}/:id/start"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>, body: Option<Json<StartBody>>| async move {
                    start(state, a, id, body).await
                }
            }),
        )
        .route(
            &format!("/{module_path}/:id/stop"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>| async move { stop(state, a, id).await }
            }),
        )
        .route(
            &format!("/{module_path}/x/bulk-create"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Json(body): Json<BulkCreateBody<C>>| async move {
                    bulk_create_handler(state, a, body).await
                }
            }),
        )
        .route(
            &format!("/{module_path}/x/bulk-delete"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Json(body): Json<BulkIdsBody>| async move { bulk_delete_handler(state, a, body).await }
            }),
        )
        .route(
            &format!("/{module_path}/x/bulk-start"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Json(body): Json<BulkIdsBody>| async move { bulk_start_handler(state, a, body).await }
            }),
        )
        .route(
            &format!("/{module_path}/x/bulk-stop"),
            post({
                let a = a.clone();
                move |State(state): State<AppState>, Json(body): Json<BulkIdsBody>| async move { bulk_stop_handler(state, a, body).await }
            }),
        )
        .route(
            &format!("/{results_path}"),
            get({
                let a = a.clone();
                move |State(state): State<AppState>| async move { result_list(state, a).await }
            }),
        )
        .route(
            &format!("/{results_path}/:id"),
            get({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>| async move { result_get(state, a, id).await }
            })
            .delete({
                let a = a.clone();
                move |State(state): State<AppState>, Path(id): Path<String>| async move { result_erase(state, a, id).await }
            }),
        );

    if supports_toggle {
        router = router.route(
            &format!("/{module_path}/x/toggle"),
            post(move |State(state): State<AppState>, Json(body): Json<ToggleBody>| async move { toggle_handler(state, a, body).await }),
        );
    }

    router
}

fn parse_id(raw: &str) -> Result<Id, ApiError> {
    Id::parse(raw).ok_or_else(|| ModelError::invalid_argument(format!("\"{raw}\" is not a valid id")).into())
}

async fn call<C, S>(state: &AppState, accessor: &Accessor<C, S>, request: Request<C>) -> Result<Reply<C, S>, ApiError>
where
    C: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let sender = accessor(state);
    Ok(sender.call(request).await?)
}

async fn list<C, S>(state: AppState, accessor: Accessor<C, S>) -> Result<Json<Vec<Generator<C>>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    match call(&state, &accessor, Request::List).await? {
        Reply::Generators(generators) => Ok(Json(generators)),
        other => Err(unexpected_reply(other)),
    }
}

#[derive(Deserialize)]
struct CreateBody<C> {
    #[serde(default)]
    id: Option<String>,
    config: C,
}

async fn create<C, S>(state: AppState, accessor: Accessor<C, S>, body: CreateBody<C>) -> Result<Response, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let id = body.id.as_deref().map(parse_id).transpose()?;
    match call(&state, &accessor, Request::Create { id, config: body.config }).await? {
        Reply::Generator(generator) => Ok(created_response(generator)),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

fn created_response<C: Serialize>(generator: Generator<C>) -> Response {
    let location = format!("/{}", generator.id());
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(generator)).into_response()
}

async fn get_one<C, S>(state: AppState, accessor: Accessor<C, S>, id: String) -> Result<Json<Generator<C>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match call(&state, &accessor, Request::Get(id)).await? {
        Reply::Generator(generator) => Ok(Json(generator)),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

async fn erase<C, S>(state: AppState, accessor: Accessor<C, S>, id: String) -> Result<StatusCode, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match call(&state, &accessor, Request::Erase(id)).await? {
        Reply::Ok => Ok(StatusCode::NO_CONTENT),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

#[derive(Deserialize, Default)]
struct StartBody {
    #[serde(default)]
    dynamic_results: Option<serde_json::Value>,
}

async fn start<C, S>(
    state: AppState,
    accessor: Accessor<C, S>,
    id: String,
    body: Option<Json<StartBody>>,
) -> Result<Json<GeneratorResult<S>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Serialize + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let dynamic_results = body.map(|Json(b)| b.dynamic_results).unwrap_or_default();
    match call(&state, &accessor, Request::Start { id, dynamic_results }).await? {
        Reply::Result(result) => Ok(Json(result)),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

async fn stop<C, S>(state: AppState, accessor: Accessor<C, S>, id: String) -> Result<StatusCode, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match call(&state, &accessor, Request::Stop(id)).await? {
        Reply::Ok => Ok(StatusCode::NO_CONTENT),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

#[derive(Deserialize)]
struct BulkCreateBody<C> {
    items: Vec<CreateBody<C>>,
}

async fn bulk_create_handler<C, S>(
    state: AppState,
    accessor: Accessor<C, S>,
    body: BulkCreateBody<C>,
) -> Result<(StatusCode, Json<Vec<Generator<C>>>), ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let items = body
        .items
        .into_iter()
        .map(|item| Ok((item.id.as_deref().map(parse_id).transpose()?, item.config)))
        .collect::<Result<Vec<_>, ApiError>>()?;
    match call(&state, &accessor, Request::BulkCreate(items)).await? {
        Reply::BulkGenerators(generators) => Ok((StatusCode::CREATED, Json(generators))),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

#[derive(Deserialize)]
struct BulkIdsBody {
    ids: Vec<String>,
}

async fn bulk_delete_handler<C, S>(state: AppState, accessor: Accessor<C, S>, body: BulkIdsBody) -> Result<Json<Vec<Id>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let ids = parse_ids_best_effort(body.ids);
    match call(&state, &accessor, Request::BulkErase(ids)).await? {
        Reply::BulkErased(erased) => Ok(Json(erased)),
        other => Err(unexpected_reply(other)),
    }
}

async fn bulk_start_handler<C, S>(state: AppState, accessor: Accessor<C, S>, body: BulkIdsBody) -> Result<Json<Vec<Id>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let mut started = Vec::new();
    for id in parse_ids_best_effort(body.ids) {
        let request = Request::Start { id: id.clone(), dynamic_results: None };
        if let Ok(Reply::Result(_)) = call(&state, &accessor, request).await {
            started.push(id);
        }
    }
    Ok(Json(started))
}

async fn bulk_stop_handler<C, S>(state: AppState, accessor: Accessor<C, S>, body: BulkIdsBody) -> Result<Json<Vec<Id>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let mut stopped = Vec::new();
    for id in parse_ids_best_effort(body.ids) {
        let request = Request::Stop(id.clone());
        if let Ok(Reply::Ok) = call(&state, &accessor, request).await {
            stopped.push(id);
        }
    }
    Ok(Json(stopped))
}

fn parse_ids_best_effort(ids: Vec<String>) -> Vec<Id> {
    ids.into_iter().filter_map(Id::parse).collect()
}

#[derive(Deserialize)]
struct ToggleBody {
    replace: String,
    with: String,
    #[serde(default)]
    dynamic_results: Option<serde_json::Value>,
}

async fn toggle_handler<C, S>(state: AppState, accessor: Accessor<C, S>, body: ToggleBody) -> Result<Json<GeneratorResult<S>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Serialize + Send + Sync + 'static,
{
    let out_id = parse_id(&body.replace)?;
    let in_id = parse_id(&body.with)?;
    let request = Request::Toggle { out_id, in_id, dynamic_results: body.dynamic_results };
    match call(&state, &accessor, request).await? {
        Reply::Result(result) => Ok(Json(result)),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

async fn result_list<C, S>(state: AppState, accessor: Accessor<C, S>) -> Result<Json<Vec<GeneratorResult<S>>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Serialize + Send + Sync + 'static,
{
    match call(&state, &accessor, Request::ResultList).await? {
        Reply::Results(results) => Ok(Json(results)),
        other => Err(unexpected_reply(other)),
    }
}

async fn result_get<C, S>(state: AppState, accessor: Accessor<C, S>, id: String) -> Result<Json<GeneratorResult<S>>, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Serialize + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match call(&state, &accessor, Request::ResultGet(id)).await? {
        Reply::Result(result) => Ok(Json(result)),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

async fn result_erase<C, S>(state: AppState, accessor: Accessor<C, S>, id: String) -> Result<StatusCode, ApiError>
where
    C: Clone + Serialize + Send + Sync + 'static,
    S: Clone + Default + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match call(&state, &accessor, Request::ResultErase(id)).await? {
        Reply::Ok => Ok(StatusCode::NO_CONTENT),
        Reply::Err(err) => Err(err.into()),
        other => Err(unexpected_reply(other)),
    }
}

fn unexpected_reply<C, S>(_reply: Reply<C, S>) -> ApiError {
    ModelError::Custom { message: "module server returned an unexpected reply variant".into() }.into()
}
