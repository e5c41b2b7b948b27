//! Action registry for type-erased handler lookup
//!
//! The dispatcher resolves an action id to a handler and calls it with a
//! JSON payload; it never matches on action ids itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Action, ActionContext, ActionError};

/// Result of a successful action call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutput {
    /// Stored as the step output
    pub output: Value,
    /// Written into the execution context variables
    pub variables: Map<String, Value>,
}

/// Type-erased action interface
#[async_trait]
pub trait AnyAction: Send + Sync {
    /// Get the action id
    fn action_type(&self) -> &'static str;

    /// Deserialize the payload, run the action and serialize its output
    async fn invoke(
        &self,
        ctx: &ActionContext<'_>,
        input: Value,
    ) -> Result<ActionOutput, ActionError>;
}

/// Wrapper to implement AnyAction for any Action
struct ActionWrapper<A: Action> {
    inner: A,
}

#[async_trait]
impl<A: Action> AnyAction for ActionWrapper<A> {
    fn action_type(&self) -> &'static str {
        A::TYPE
    }

    async fn invoke(
        &self,
        ctx: &ActionContext<'_>,
        input: Value,
    ) -> Result<ActionOutput, ActionError> {
        let typed: A::Input =
            serde_json::from_value(input).map_err(|e| ActionError::invalid_input(A::TYPE, e))?;

        let output = self.inner.execute(ctx, typed).await?;
        let variables = self.inner.exported_variables(&output);
        let output = serde_json::to_value(&output).map_err(|e| {
            ActionError::non_retryable(format!("failed to serialize {} output: {e}", A::TYPE))
                .with_type("serialization")
        })?;

        Ok(ActionOutput { output, variables })
    }
}

/// Registry of action handlers keyed by action id
///
/// Populated before the engine is built and read-only afterwards.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn AnyAction>>,
}

impl ActionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action, replacing any handler with the same id
    pub fn register<A: Action>(&mut self, action: A) {
        self.actions
            .insert(A::TYPE.to_string(), Arc::new(ActionWrapper { inner: action }));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<A: Action>(mut self, action: A) -> Self {
        self.register(action);
        self
    }

    /// Check if an action id is registered
    pub fn contains(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn AnyAction>> {
        self.actions.get(action_type).cloned()
    }

    /// Look up and invoke a handler
    pub async fn invoke(
        &self,
        action_type: &str,
        ctx: &ActionContext<'_>,
        input: Value,
    ) -> Result<ActionOutput, ActionError> {
        let action = self
            .get(action_type)
            .ok_or_else(|| ActionError::unknown_action(action_type))?;
        action.invoke(ctx, input).await
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered action ids, sorted
    pub fn action_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}
