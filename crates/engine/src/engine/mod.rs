//! Workflow execution engine
//!
//! The engine module provides the `WorkflowEngine`, which drives executions
//! step by step through the `StepDispatcher` and writes every status change
//! through the `ExecutionStateMachine`.

pub mod condition;
mod dispatcher;
mod error;
mod executor;
mod state_machine;

pub use dispatcher::{
    step_input, DispatchRequest, NextAction, StepDispatcher, StepError, StepOutcome,
};
pub use error::EngineError;
pub use executor::{
    EngineConfig, TriggerFailure, TriggerReport, TriggeredExecution, WorkflowEngine,
};
pub use state_machine::{can_transition, ExecutionStateMachine};
