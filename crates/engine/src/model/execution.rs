//! Execution and step-attempt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ExecutionContext;

/// Lifecycle status of an execution
///
/// Transitions are enforced by [`ExecutionStateMachine`](crate::engine::ExecutionStateMachine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    WaitingHuman,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::WaitingHuman => "waiting_human",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Suspended executions are the only ones `resume` accepts
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Paused | Self::WaitingHuman)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "waiting_human" => Ok(Self::WaitingHuman),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One run of a template against one creator
///
/// Never deleted; the row plus its step executions form the audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub current_step_id: Option<Uuid>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// When a paused wait step becomes resumable
    pub resume_at: Option<DateTime<Utc>>,
    pub context: ExecutionContext,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an execution
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub workflow_id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub context: ExecutionContext,
}

/// Partial update of an execution
///
/// `None` leaves a field untouched. Nullable columns use a nested option so
/// they can be cleared explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPatch {
    pub status: Option<ExecutionStatus>,
    pub current_step_id: Option<Option<Uuid>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub resume_at: Option<Option<DateTime<Utc>>>,
    pub context: Option<ExecutionContext>,
}

impl ExecutionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to an in-memory record
    pub fn apply_to(self, execution: &mut Execution) {
        if let Some(status) = self.status {
            execution.status = status;
        }
        if let Some(current_step_id) = self.current_step_id {
            execution.current_step_id = current_step_id;
        }
        if let Some(completed_at) = self.completed_at {
            execution.completed_at = Some(completed_at);
        }
        if let Some(error_message) = self.error_message {
            execution.error_message = Some(error_message);
        }
        if let Some(resume_at) = self.resume_at {
            execution.resume_at = resume_at;
        }
        if let Some(context) = self.context {
            execution.context = context;
        }
        execution.updated_at = Utc::now();
    }
}

/// Status of a single step attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Waiting,
}

impl StepExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Waiting => "waiting",
        }
    }
}

impl std::fmt::Display for StepExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "waiting" => Ok(Self::Waiting),
            other => Err(format!("unknown step execution status: {other}")),
        }
    }
}

/// One attempt of one step within an execution
///
/// A step retried three times produces four records; records are never
/// reused across attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: Uuid,
    /// 1-based attempt number
    pub attempt: u32,
    pub status: StepExecutionStatus,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewStepExecution {
    pub execution_id: Uuid,
    pub step_id: Uuid,
    pub attempt: u32,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepExecutionPatch {
    pub status: Option<StepExecutionStatus>,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepExecutionPatch {
    pub fn running() -> Self {
        Self {
            status: Some(StepExecutionStatus::Running),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn completed(output: serde_json::Value) -> Self {
        Self {
            status: Some(StepExecutionStatus::Completed),
            output: Some(output),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(StepExecutionStatus::Failed),
            error_message: Some(error.into()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn waiting(output: serde_json::Value) -> Self {
        Self {
            status: Some(StepExecutionStatus::Waiting),
            output: Some(output),
            ..Default::default()
        }
    }

    pub fn apply_to(self, record: &mut StepExecution) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(output) = self.output {
            record.output = Some(output);
        }
        if let Some(error_message) = self.error_message {
            record.error_message = Some(error_message);
        }
        if let Some(started_at) = self.started_at {
            record.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            record.completed_at = Some(completed_at);
        }
    }
}
