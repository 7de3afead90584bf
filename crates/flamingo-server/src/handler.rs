use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use flamingo_store::{KeyStore, ProjectRegistry};
use flamingo_types::{
    CandidateItem, Item, ItemId, NewProject, Project, ProjectId, ProjectPatch, Step,
};
use serde_json::{json, Value};

use crate::api::{HealthResponse, IngestParams, IngestedItem, Status};
use crate::error::{ServerError, ServerResult};
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::state::AppState;

/// Storage calls block, so they run off the async workers.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

pub async fn ping() -> Json<Value> {
    Json(json!({"ping": "pong"}))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn list_projects(State(state): State<AppState>) -> ServerResult<Json<Vec<Project>>> {
    let projects = blocking(move || Ok(state.storage().list_projects()?)).await?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewProject>,
) -> ServerResult<(StatusCode, Json<Project>)> {
    let project = blocking(move || Ok(state.storage().create_project(&new)?)).await?;
    tracing::info!(project = %project.id, name = %project.name, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
) -> ServerResult<Json<Project>> {
    let project = blocking(move || Ok(state.storage().require_project(id)?)).await?;
    Ok(Json(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
    JsonBody(patch): JsonBody<ProjectPatch>,
) -> ServerResult<Json<Project>> {
    let project = blocking(move || Ok(state.storage().update_project(id, &patch)?)).await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
) -> ServerResult<Json<Status>> {
    blocking(move || Ok(state.engine().delete_project(id)?)).await?;
    Ok(Json(Status::new(format!("Deleted project {id}"))))
}

pub async fn list_items(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
) -> ServerResult<Json<Vec<Item>>> {
    let items = blocking(move || Ok(state.queries().items(id)?)).await?;
    Ok(Json(items))
}

pub async fn ingest_items(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
    QueryParams(params): QueryParams<IngestParams>,
    JsonBody(candidates): JsonBody<Vec<CandidateItem>>,
) -> ServerResult<Json<Vec<IngestedItem>>> {
    let report = blocking(move || {
        let engine = state.engine();
        let report = if params.strict {
            engine.ingest_strict(id, candidates)?
        } else {
            engine.ingest(id, candidates)?
        };
        Ok(report)
    })
    .await?;
    Ok(Json(report.inserted.into_iter().map(IngestedItem::from).collect()))
}

pub async fn known_items(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
    JsonBody(keys): JsonBody<Vec<String>>,
) -> ServerResult<Json<Vec<Item>>> {
    let items = blocking(move || Ok(state.queries().known(id, &keys)?)).await?;
    Ok(Json(items))
}

pub async fn unknown_keys(
    State(state): State<AppState>,
    PathParams(id): PathParams<ProjectId>,
    JsonBody(keys): JsonBody<Vec<String>>,
) -> ServerResult<Json<Vec<String>>> {
    let unknown = blocking(move || Ok(state.queries().unknown(id, &keys)?)).await?;
    Ok(Json(unknown))
}

pub async fn batch_items(
    State(state): State<AppState>,
    PathParams((id, step)): PathParams<(ProjectId, Step)>,
) -> ServerResult<Json<Vec<Item>>> {
    let items = blocking(move || Ok(state.queries().batch(id, step)?)).await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    PathParams(id): PathParams<ItemId>,
) -> ServerResult<Json<Item>> {
    let item = blocking(move || Ok(state.storage().get_item(id)?)).await?;
    item.map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("item not found: {id}")))
}

pub async fn delete_item(
    State(state): State<AppState>,
    PathParams(id): PathParams<ItemId>,
) -> ServerResult<Json<Status>> {
    let removed = blocking(move || Ok(state.storage().delete_item(id)?)).await?;
    if !removed {
        return Err(ServerError::NotFound(format!("item not found: {id}")));
    }
    Ok(Json(Status::new(format!("Deleted item {id}"))))
}
