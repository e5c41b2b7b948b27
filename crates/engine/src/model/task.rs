//! Human intervention tasks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown task priority: {other}")),
        }
    }
}

/// Task status, owned by reviewers rather than the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the gate of the owning execution is open
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A review task created when a `human_intervention` step is dispatched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanInterventionTask {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: Uuid,
    /// The attempt that created this task; unique per task
    pub step_execution_id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInterventionTask {
    pub execution_id: Uuid,
    pub step_id: Uuid,
    pub step_execution_id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: TaskPriority,
}

impl NewInterventionTask {
    pub fn into_task(self) -> HumanInterventionTask {
        HumanInterventionTask {
            id: Uuid::now_v7(),
            execution_id: self.execution_id,
            step_id: self.step_id,
            step_execution_id: self.step_execution_id,
            creator_id: self.creator_id,
            brand_id: self.brand_id,
            title: self.title,
            description: self.description,
            assignee: self.assignee,
            priority: self.priority,
            status: TaskStatus::Pending,
            notes: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
