//! Scenario HTTP Routes
//!
//! Commands and queries on scenarios, plus bundle installation.
//!
//! Every request names its tenant in `x-tenant-id`; `x-actor-id` is
//! optional and recorded on appended events.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::authoring::TreeBundle;
use crate::core::{AnswerValue, NodeId, ScenarioId, TenantContext, TreeId};
use crate::events::{Appended, Event};
use crate::navigation::Availability;
use crate::projection::ProjectedState;
use crate::scenario::{AnswerFeed, AnswerInput, ImportInput, ScenarioError, ScenarioService};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

const ANONYMOUS: &str = "anonymous";

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<ScenarioError> for ErrorResponse {
    fn from(err: ScenarioError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: ScenarioError) -> ApiError {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err)))
}

fn bad_request(code: &str, message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            code: code.to_string(),
            message: message.into(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct CreateScenarioRequest {
    #[serde(default)]
    pub scenario_id: Option<ScenarioId>,
    #[serde(default)]
    pub tree_id: Option<TreeId>,
    /// Name of a tree; its latest published version is used
    #[serde(default)]
    pub tree: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_code: String,
    pub value: AnswerValue,
    pub idempotency_key: String,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub question_code: String,
    pub raw: Value,
    pub idempotency_key: String,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct KeyedRequest {
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct NodeRequest {
    pub node_id: NodeId,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub idempotency_key: String,
    #[serde(default = "default_cancel_reason")]
    pub reason: String,
}

fn default_cancel_reason() -> String {
    "cancelled by user".to_string()
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub up_to: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub event: Event,
    pub duplicate: bool,
}

impl From<Appended> for AppendResponse {
    fn from(appended: Appended) -> Self {
        Self {
            event: appended.event,
            duplicate: appended.duplicate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioListResponse {
    pub scenarios: Vec<ScenarioId>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct InstallResponse {
    pub tree_id: TreeId,
    pub version: u32,
    pub nodes: BTreeMap<String, NodeId>,
}

// ==================
// Scenario Routes
// ==================

/// Create scenario routes
pub fn scenario_routes(service: Arc<ScenarioService>) -> Router {
    Router::new()
        .route("/trees", post(install_bundle_handler))
        .route("/scenarios", post(create_handler).get(list_handler))
        .route("/scenarios/:id", get(state_handler))
        .route("/scenarios/:id/answers", post(answer_handler).get(feed_handler))
        .route("/scenarios/:id/imports", post(import_handler))
        .route("/scenarios/:id/answers/:code/clear", post(clear_handler))
        .route("/scenarios/:id/navigation/enter", post(enter_handler))
        .route("/scenarios/:id/navigation/exit", post(exit_handler))
        .route("/scenarios/:id/navigation/complete", post(complete_stage_handler))
        .route("/scenarios/:id/nodes", get(nodes_handler))
        .route("/scenarios/:id/events", get(events_handler))
        .route("/scenarios/:id/audit", get(audit_handler))
        .route("/scenarios/:id/submit", post(submit_handler))
        .route("/scenarios/:id/complete", post(complete_handler))
        .route("/scenarios/:id/cancel", post(cancel_handler))
        .with_state(service)
}

/// Tenant context from request headers
fn context(headers: &HeaderMap) -> Result<TenantContext, ApiError> {
    let tenant = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("SCN_MISSING_TENANT", format!("{} header is required", TENANT_HEADER)))?;
    let actor = headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS);
    Ok(TenantContext::new(tenant, actor))
}

// ==================
// Handlers
// ==================

async fn install_bundle_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Json(bundle): Json<TreeBundle>,
) -> Result<(StatusCode, Json<InstallResponse>), ApiError> {
    let ctx = context(&headers)?;
    let installed = service.install_bundle(&ctx, &bundle).map_err(api_error)?;
    let response = InstallResponse {
        tree_id: installed.tree.id(),
        version: installed.tree.tree.version,
        nodes: installed.nodes.into_iter().collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn create_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Json(request): Json<CreateScenarioRequest>,
) -> Result<(StatusCode, Json<ProjectedState>), ApiError> {
    let ctx = context(&headers)?;
    let tree_id = match (request.tree_id, request.tree.as_deref()) {
        (Some(id), _) => id,
        (None, Some(name)) => service
            .trees()
            .latest_published(&ctx, name)
            .map(|tree| tree.id())
            .ok_or_else(|| bad_request("SCN_TREE_NOT_FOUND", format!("no published tree named '{}'", name)))?,
        (None, None) => return Err(bad_request("SCN_BAD_REQUEST", "tree_id or tree is required")),
    };
    let scenario_id = request.scenario_id.unwrap_or_else(Uuid::new_v4);
    let state = service.create(&ctx, scenario_id, tree_id).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(state)))
}

async fn list_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
) -> Result<Json<ScenarioListResponse>, ApiError> {
    let ctx = context(&headers)?;
    let scenarios = service.scenarios(&ctx).map_err(api_error)?;
    let total = scenarios.len();
    Ok(Json(ScenarioListResponse { scenarios, total }))
}

async fn state_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<ProjectedState>, ApiError> {
    let ctx = context(&headers)?;
    let state = match query.up_to {
        Some(up_to) => service.state_at(&ctx, id, up_to),
        None => service.state(&ctx, id),
    }
    .map_err(api_error)?;
    Ok(Json(state))
}

async fn answer_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let mut input = AnswerInput::new(request.question_code, request.value, request.idempotency_key);
    if let Some(at) = request.effective_from {
        input = input.effective_from(at);
    }
    if let Some(version) = request.expected_version {
        input = input.expect_version(version);
    }
    let appended = service.provide_answer(&ctx, id, input).map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn import_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let mut input = ImportInput::new(request.question_code, request.raw, request.idempotency_key);
    input.effective_from = request.effective_from;
    let appended = service.import_answer(&ctx, id, input).map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn clear_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path((id, code)): Path<(ScenarioId, String)>,
    Json(request): Json<KeyedRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .clear_answer(&ctx, id, &code, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn enter_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<NodeRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .enter_node(&ctx, id, &request.node_id, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn exit_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<NodeRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .exit_node(&ctx, id, &request.node_id, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn complete_stage_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<NodeRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .complete_stage(&ctx, id, &request.node_id, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn nodes_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
) -> Result<Json<Availability>, ApiError> {
    let ctx = context(&headers)?;
    let availability = service.availability(&ctx, id).map_err(api_error)?;
    Ok(Json(availability.as_ref().clone()))
}

async fn feed_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
) -> Result<Json<AnswerFeed>, ApiError> {
    let ctx = context(&headers)?;
    let feed = service.answer_feed(&ctx, id).map_err(api_error)?;
    Ok(Json(feed))
}

async fn events_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Query(query): Query<VersionQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let ctx = context(&headers)?;
    let events = service.events(&ctx, id, query.up_to).map_err(api_error)?;
    Ok(Json(events))
}

async fn audit_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = context(&headers)?;
    let lines = service.audit_export(&ctx, id).map_err(api_error)?;
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], lines))
}

async fn submit_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<KeyedRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .submit(&ctx, id, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn complete_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<KeyedRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .complete(&ctx, id, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}

async fn cancel_handler(
    State(service): State<Arc<ScenarioService>>,
    headers: HeaderMap,
    Path(id): Path<ScenarioId>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<AppendResponse>, ApiError> {
    let ctx = context(&headers)?;
    let appended = service
        .cancel(&ctx, id, &request.reason, &request.idempotency_key)
        .map_err(api_error)?;
    Ok(Json(appended.into()))
}
