//! Engine error type

use uuid::Uuid;

use crate::context::ContextError;
use crate::model::ExecutionStatus;
use crate::persistence::StoreError;

/// Errors returned to callers of the engine
///
/// Step failures are not errors here: they fail the execution and are
/// reported through its `status` and `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("template not found: {0}")]
    TemplateNotFound(Uuid),

    #[error("template {0} is not active")]
    TemplateInactive(Uuid),

    /// The template's step list cannot be executed
    #[error("invalid template {template_id}: {reason}")]
    InvalidTemplate { template_id: Uuid, reason: String },

    #[error("creator not found: {0}")]
    CreatorNotFound(Uuid),

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// Resume of an execution that is not paused or waiting on a human
    #[error("execution {execution_id} cannot be resumed from status {status}")]
    InvalidResume {
        execution_id: Uuid,
        status: ExecutionStatus,
    },

    /// Another caller resumed the execution first
    #[error("execution {0} is already being resumed")]
    ResumeConflict(Uuid),

    /// The wait has not elapsed or the review task is unresolved
    #[error("execution {execution_id} is not ready to resume: {reason}")]
    GateNotSatisfied { execution_id: Uuid, reason: String },

    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("context error: {0}")]
    Context(#[from] ContextError),
}

impl EngineError {
    pub fn invalid_template(template_id: Uuid, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template_id,
            reason: reason.into(),
        }
    }

    pub fn gate_not_satisfied(execution_id: Uuid, reason: impl Into<String>) -> Self {
        Self::GateNotSatisfied {
            execution_id,
            reason: reason.into(),
        }
    }
}
