//! # Creator Workflow Engine
//!
//! Executes brand-defined workflow templates against individual creators:
//! onboarding sequences, rate negotiations, script pipelines and content
//! delivery, each as an audited, resumable execution.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                          │
//! │  (start / resume / trigger, step loop, retries, alerts)      │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │        StepDispatcher         │ │   ExecutionStateMachine     │
//! │ (action, condition, wait,     │ │ (sole writer of execution   │
//! │  human intervention)          │ │  status)                    │
//! └──────────────────────────────┘ └────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkflowStore                          │
//! │  (definitions, executions, review tasks, creator directory)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use creatorflow_engine::prelude::*;
//!
//! let store = Arc::new(PostgresStore::connect(&database_url).await?);
//! let actions = builtin_actions(store.clone(), &Collaborators::recording());
//! let engine = WorkflowEngine::new(store, actions);
//!
//! let report = engine
//!     .trigger_workflow_for_creator(creator_id, brand_id, TriggerEvent::CreatorCreated, Map::new())
//!     .await?;
//! ```

pub mod action;
pub mod context;
pub mod engine;
pub mod model;
pub mod persistence;
pub mod reliability;

/// Prelude for common imports
pub mod prelude {
    pub use std::sync::Arc;

    pub use async_trait::async_trait;
    pub use serde_json::{json, Map, Value};

    pub use crate::action::{
        builtin_actions, Action, ActionContext, ActionError, ActionRegistry, Collaborators,
    };
    pub use crate::context::{ExecutionContext, UnknownToken};
    pub use crate::engine::{EngineConfig, EngineError, TriggerReport, WorkflowEngine};
    pub use crate::model::{
        Execution, ExecutionStatus, StepConfig, TaskStatus, TriggerEvent, WorkflowStep,
        WorkflowTemplate,
    };
    pub use crate::persistence::{InMemoryStore, PostgresStore, StoreError, WorkflowStore};
    pub use crate::reliability::RetryPolicy;
}

// Re-export key types at crate root
pub use action::{Action, ActionContext, ActionError, ActionRegistry};
pub use context::ExecutionContext;
pub use engine::{EngineConfig, EngineError, WorkflowEngine};
pub use persistence::{InMemoryStore, PostgresStore, StoreError, WorkflowStore};
pub use reliability::RetryPolicy;
