//! Store trait definitions
//!
//! The engine reads definitions and writes executions through these
//! traits; it holds no other shared state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
    BrandProfile, CreatorProfile, Execution, ExecutionPatch, ExecutionStatus,
    HumanInterventionTask, MessageTemplate, NewExecution, NewInterventionTask, NewStepExecution,
    ScriptAssignment, StepExecution, StepExecutionPatch, TaskStatus, TriggerEvent,
    WorkflowStep, WorkflowTemplate,
};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Write rejected because the record changed underneath
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Read-only access to workflow definitions
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn load_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>, StoreError>;

    /// Steps of a template ordered by `step_order`
    async fn load_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, StoreError>;

    /// Active templates of a brand listening for an event
    async fn list_active_templates(
        &self,
        brand_id: Uuid,
        event: TriggerEvent,
    ) -> Result<Vec<WorkflowTemplate>, StoreError>;

    async fn load_message_template(&self, id: Uuid)
        -> Result<Option<MessageTemplate>, StoreError>;
}

/// Execution and step-attempt records
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new execution in `running` status
    async fn create_execution(&self, new: NewExecution) -> Result<Execution, StoreError>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError>;

    async fn update_execution(
        &self,
        id: Uuid,
        patch: ExecutionPatch,
    ) -> Result<Execution, StoreError>;

    /// Compare-and-set the status
    ///
    /// Returns `false` without writing when the stored status is not `from`;
    /// this is what keeps two resumes of one execution from both running.
    async fn transition_status(
        &self,
        id: Uuid,
        from: ExecutionStatus,
        to: ExecutionStatus,
    ) -> Result<bool, StoreError>;

    /// Insert a new attempt record in `pending` status
    async fn create_step_execution(
        &self,
        new: NewStepExecution,
    ) -> Result<StepExecution, StoreError>;

    async fn update_step_execution(
        &self,
        id: Uuid,
        patch: StepExecutionPatch,
    ) -> Result<StepExecution, StoreError>;

    /// Attempt records of an execution in creation order
    async fn list_step_executions(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<StepExecution>, StoreError>;

    /// Paused executions whose `resume_at` is at or before `now`, oldest first
    async fn list_due_waits(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError>;
}

/// Review tasks created by human intervention steps
#[async_trait]
pub trait InterventionQueue: Send + Sync {
    /// Create the task for an attempt
    ///
    /// Idempotent on `step_execution_id`: a second call for the same
    /// attempt returns the existing task.
    async fn create_task(
        &self,
        new: NewInterventionTask,
    ) -> Result<HumanInterventionTask, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<HumanInterventionTask>, StoreError>;

    /// Most recent task for a step of an execution
    async fn task_for_step(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<HumanInterventionTask>, StoreError>;

    /// Record a reviewer decision
    async fn resolve_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        notes: Option<String>,
    ) -> Result<HumanInterventionTask, StoreError>;

    /// Tasks, optionally filtered by status, oldest first
    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<HumanInterventionTask>, StoreError>;
}

/// Creator and brand records
#[async_trait]
pub trait CreatorDirectory: Send + Sync {
    async fn get_creator(&self, id: Uuid) -> Result<Option<CreatorProfile>, StoreError>;

    async fn get_brand(&self, id: Uuid) -> Result<Option<BrandProfile>, StoreError>;

    /// Set a creator's pipeline status, returning the previous one
    async fn update_creator_status(
        &self,
        creator_id: Uuid,
        status: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Record a script assignment, returning its id
    async fn assign_script(&self, assignment: ScriptAssignment) -> Result<Uuid, StoreError>;
}

/// Everything the engine needs from persistence
pub trait WorkflowStore:
    DefinitionStore + ExecutionStore + InterventionQueue + CreatorDirectory
{
}

impl<T> WorkflowStore for T where
    T: DefinitionStore + ExecutionStore + InterventionQueue + CreatorDirectory + ?Sized
{
}
