//! Execution lifecycle
//!
//! ```text
//!            ┌──────────┐
//!            │ running  │◄──────────────┐
//!            └────┬─────┘               │ resume (gate open)
//!      ┌──────────┼─────────┬───────────┤
//!      ▼          ▼         ▼           │
//! completed    failed    paused ────────┤
//!                        waiting_human ─┘
//! ```
//!
//! Every status write goes through [`ExecutionStateMachine`], which rejects
//! any edge not in the graph above before touching the store.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::EngineError;
use crate::model::{Execution, ExecutionPatch, ExecutionStatus};
use crate::persistence::ExecutionStore;

/// Whether `from -> to` is an edge of the lifecycle graph
pub fn can_transition(from: ExecutionStatus, to: ExecutionStatus) -> bool {
    use ExecutionStatus::*;
    matches!(
        (from, to),
        (Running, Running | WaitingHuman | Paused | Completed | Failed)
            | (Paused, Running)
            | (WaitingHuman, Running)
    )
}

fn check(from: ExecutionStatus, to: ExecutionStatus) -> Result<(), EngineError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

/// Sole writer of execution status and the current-step pointer
///
/// Each method validates the edge, persists the patch and refreshes the
/// caller's copy of the execution from the stored row.
pub struct ExecutionStateMachine<'a, S: ExecutionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ExecutionStore + ?Sized> ExecutionStateMachine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    async fn apply(
        &self,
        execution: &mut Execution,
        to: ExecutionStatus,
        mut patch: ExecutionPatch,
    ) -> Result<(), EngineError> {
        check(execution.status, to)?;
        patch.status = Some(to);
        patch.context = Some(execution.context.clone());
        *execution = self.store.update_execution(execution.id, patch).await?;
        Ok(())
    }

    /// Point the running execution at the step about to be dispatched
    pub async fn advance(&self, execution: &mut Execution, step_id: Uuid) -> Result<(), EngineError> {
        debug!(execution_id = %execution.id, %step_id, "advancing to step");
        self.apply(
            execution,
            ExecutionStatus::Running,
            ExecutionPatch {
                current_step_id: Some(Some(step_id)),
                ..Default::default()
            },
        )
        .await
    }

    /// Persist the context without moving the step pointer
    pub async fn checkpoint(&self, execution: &mut Execution) -> Result<(), EngineError> {
        self.apply(execution, ExecutionStatus::Running, ExecutionPatch::default())
            .await
    }

    /// Suspend on a wait step until `resume_at`
    pub async fn pause(
        &self,
        execution: &mut Execution,
        step_id: Uuid,
        resume_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        info!(execution_id = %execution.id, %step_id, %resume_at, "execution paused");
        self.apply(
            execution,
            ExecutionStatus::Paused,
            ExecutionPatch {
                current_step_id: Some(Some(step_id)),
                resume_at: Some(Some(resume_at)),
                ..Default::default()
            },
        )
        .await
    }

    /// Suspend on a human intervention step
    pub async fn await_human(&self, execution: &mut Execution, step_id: Uuid) -> Result<(), EngineError> {
        info!(execution_id = %execution.id, %step_id, "execution waiting for human review");
        self.apply(
            execution,
            ExecutionStatus::WaitingHuman,
            ExecutionPatch {
                current_step_id: Some(Some(step_id)),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn complete(&self, execution: &mut Execution) -> Result<(), EngineError> {
        info!(execution_id = %execution.id, "execution completed");
        self.apply(
            execution,
            ExecutionStatus::Completed,
            ExecutionPatch {
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn fail(&self, execution: &mut Execution, error: &str) -> Result<(), EngineError> {
        warn!(execution_id = %execution.id, %error, "execution failed");
        self.apply(
            execution,
            ExecutionStatus::Failed,
            ExecutionPatch {
                completed_at: Some(Utc::now()),
                error_message: Some(error.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Take ownership of a suspended execution for a resume
    ///
    /// The status moves to `running` by compare-and-set, so of two
    /// concurrent resumes exactly one wins; the other gets
    /// [`EngineError::ResumeConflict`].
    pub async fn claim_resume(&self, execution: &mut Execution) -> Result<(), EngineError> {
        let from = execution.status;
        if !from.is_suspended() {
            return Err(EngineError::InvalidResume {
                execution_id: execution.id,
                status: from,
            });
        }
        check(from, ExecutionStatus::Running)?;

        let claimed = self
            .store
            .transition_status(execution.id, from, ExecutionStatus::Running)
            .await?;
        if !claimed {
            return Err(EngineError::ResumeConflict(execution.id));
        }

        *execution = self
            .store
            .update_execution(
                execution.id,
                ExecutionPatch {
                    resume_at: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        debug!(execution_id = %execution.id, %from, "resume claimed");
        Ok(())
    }
}
