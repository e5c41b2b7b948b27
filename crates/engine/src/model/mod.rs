//! Domain records
//!
//! - [`WorkflowTemplate`] and [`WorkflowStep`]: read-only definitions
//! - [`Execution`] and [`StepExecution`]: the audited run state
//! - [`HumanInterventionTask`]: review gates created by the engine
//! - Directory records the context is seeded from

mod directory;
mod execution;
mod step;
mod task;
mod template;

pub use directory::{BrandProfile, CreatorProfile, MessageTemplate, ScriptAssignment};
pub use execution::{
    Execution, ExecutionPatch, ExecutionStatus, NewExecution, NewStepExecution, StepExecution,
    StepExecutionPatch, StepExecutionStatus,
};
pub use step::{
    ActionStepConfig, Condition, ConditionOperator, ConditionStepConfig, InterventionStepConfig,
    RetrySettings, StepConfig, StepType, WaitDuration, WaitStepConfig, WaitUnit, WorkflowStep,
};
pub use task::{HumanInterventionTask, NewInterventionTask, TaskPriority, TaskStatus};
pub use template::{TriggerEvent, WorkflowCategory, WorkflowTemplate};
