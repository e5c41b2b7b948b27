// Workflow HTTP routes
//
// Thin layer over the engine: trigger, start, resume and the reviewer-facing
// task endpoints. Engine errors map to status codes through `ApiError`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use creatorflow_engine::engine::TriggerReport;
use creatorflow_engine::model::{
    Execution, HumanInterventionTask, StepExecution, TaskStatus, TriggerEvent,
};
use creatorflow_engine::persistence::{ExecutionStore, InterventionQueue};
use creatorflow_engine::{EngineError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::Engine;

// ============================================
// Response types
// ============================================

/// Standard error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// List endpoints wrap their items in `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// ============================================
// Errors
// ============================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Engine(EngineError::Store(err))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(err) => match err {
                EngineError::TemplateNotFound(_)
                | EngineError::CreatorNotFound(_)
                | EngineError::ExecutionNotFound(_)
                | EngineError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
                EngineError::InvalidResume { .. }
                | EngineError::ResumeConflict(_)
                | EngineError::IllegalTransition { .. }
                | EngineError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
                EngineError::GateNotSatisfied { .. }
                | EngineError::InvalidTemplate { .. }
                | EngineError::TemplateInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Store(_) | EngineError::Context(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// ============================================
// Requests
// ============================================

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRequest {
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub event: TriggerEvent,
    /// Extra variables merged over the seeded context
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveTaskRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Resume the owning execution once the task is resolved
    #[serde(default)]
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveTaskResponse {
    pub task: HumanInterventionTask,
    /// Present when the execution was resumed
    pub execution: Option<Execution>,
}

// ============================================
// Routes
// ============================================

/// App state for workflow routes
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/triggers", post(trigger))
        .route("/v1/workflows/:template_id/start", post(start_workflow))
        .route("/v1/executions/:execution_id", get(get_execution))
        .route("/v1/executions/:execution_id/resume", post(resume_execution))
        .route("/v1/executions/:execution_id/steps", get(list_step_executions))
        .route("/v1/tasks", get(list_tasks))
        .route("/v1/tasks/:task_id/resolve", post(resolve_task))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /v1/triggers - Start every active template listening for an event
async fn trigger(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> Result<Json<TriggerReport>, ApiError> {
    let report = state
        .engine
        .trigger_workflow_for_creator(req.creator_id, req.brand_id, req.event, req.context)
        .await?;
    Ok(Json(report))
}

/// POST /v1/workflows/:template_id/start - Start one template
async fn start_workflow(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(req): Json<StartRequest>,
) -> Result<(StatusCode, Json<Execution>), ApiError> {
    let execution = state
        .engine
        .start(template_id, req.creator_id, req.brand_id, req.context)
        .await?;
    Ok((StatusCode::CREATED, Json(execution)))
}

/// GET /v1/executions/:execution_id
async fn get_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state
        .engine
        .store()
        .get_execution(execution_id)
        .await?
        .ok_or(EngineError::ExecutionNotFound(execution_id))?;
    Ok(Json(execution))
}

/// POST /v1/executions/:execution_id/resume
async fn resume_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<Execution>, ApiError> {
    let execution = state.engine.resume(execution_id).await?;
    Ok(Json(execution))
}

/// GET /v1/executions/:execution_id/steps - Attempt records in creation order
async fn list_step_executions(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<ListResponse<StepExecution>>, ApiError> {
    let store = state.engine.store();
    if store.get_execution(execution_id).await?.is_none() {
        return Err(EngineError::ExecutionNotFound(execution_id).into());
    }
    let records = store.list_step_executions(execution_id).await?;
    Ok(Json(records.into()))
}

/// GET /v1/tasks?status=pending
async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<ListResponse<HumanInterventionTask>>, ApiError> {
    let tasks = state.engine.store().list_tasks(query.status).await?;
    Ok(Json(tasks.into()))
}

/// POST /v1/tasks/:task_id/resolve - Record a reviewer decision
async fn resolve_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ResolveTaskRequest>,
) -> Result<Json<ResolveTaskResponse>, ApiError> {
    if req.status == TaskStatus::Pending {
        return Err(ApiError::Unprocessable(
            "a task cannot be resolved back to pending".to_string(),
        ));
    }

    let store = state.engine.store();
    if store.get_task(task_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("task not found: {task_id}")));
    }

    let task = store.resolve_task(task_id, req.status, req.notes).await?;
    tracing::info!(%task_id, status = %task.status, "task resolved");

    let execution = if req.resume && task.status.is_resolved() {
        Some(state.engine.resume(task.execution_id).await?)
    } else {
        None
    };

    Ok(Json(ResolveTaskResponse { task, execution }))
}
