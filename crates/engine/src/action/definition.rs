//! Action trait definition

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::{ExecutionContext, UnknownToken};

/// Error type for action failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Whether the retry policy may run the step again
    ///
    /// Configuration errors are never retryable; they fail the execution
    /// on the first attempt.
    pub retryable: bool,

    /// Additional error details (for debugging)
    pub details: Option<Value>,
}

impl ActionError {
    /// Create a new retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
            details: None,
        }
    }

    /// Create a non-retryable error
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
            details: None,
        }
    }

    /// No handler is registered for the action id
    pub fn unknown_action(action_type: &str) -> Self {
        Self::non_retryable(format!("unknown action: {action_type}")).with_type("unknown_action")
    }

    /// Required input absent or not of the expected shape
    pub fn invalid_input(action_type: &str, reason: impl std::fmt::Display) -> Self {
        Self::non_retryable(format!("missing required input for {action_type}: {reason}"))
            .with_type("invalid_input")
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActionError {}

/// What an action sees of the execution it runs in
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub execution_id: Uuid,
    pub step_id: Uuid,
    /// Record of this attempt
    pub step_execution_id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    /// Current attempt number (1-based)
    pub attempt: u32,
    pub context: &'a ExecutionContext,
}

impl ActionContext<'_> {
    /// Non-empty string variable from the execution context
    pub fn variable_str(&self, name: &str) -> Option<&str> {
        self.context.variable_str(name)
    }

    /// Render `{VAR}` tokens, leaving unknown tokens in place
    pub fn render(&self, template: &str) -> String {
        self.context.render(template, UnknownToken::Keep)
    }
}

/// A named side effect a workflow step can invoke
///
/// Inputs arrive as the step's static inputs merged over the execution
/// variables and are deserialized into `Input`; a payload that does not
/// fit is reported as a non-retryable configuration error before
/// `execute` runs.
///
/// # Example
///
/// ```ignore
/// use creatorflow_engine::prelude::*;
///
/// struct PingAction;
///
/// #[async_trait]
/// impl Action for PingAction {
///     const TYPE: &'static str = "ping";
///     type Input = PingInput;
///     type Output = PingOutput;
///
///     async fn execute(
///         &self,
///         ctx: &ActionContext<'_>,
///         input: Self::Input,
///     ) -> Result<Self::Output, ActionError> {
///         Ok(PingOutput { echoed: ctx.render(&input.message) })
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// Action id referenced by step configurations
    const TYPE: &'static str;

    /// Input type for the action
    type Input: DeserializeOwned + Send;

    /// Output type for the action, stored as the step output
    type Output: Serialize + Send + Sync;

    /// Perform the side effect
    ///
    /// Return `ActionError::retryable()` for transient failures and
    /// `ActionError::non_retryable()` for permanent ones.
    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError>;

    /// Variables written into the execution context after success
    ///
    /// Exported names overwrite existing variables.
    fn exported_variables(&self, _output: &Self::Output) -> Map<String, Value> {
        Map::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_builders() {
        let error = ActionError::retryable("smtp timeout").with_type("delivery");
        assert!(error.retryable);
        assert_eq!(error.error_type.as_deref(), Some("delivery"));
        assert_eq!(error.to_string(), "smtp timeout");

        let error = ActionError::unknown_action("send_fax");
        assert!(!error.retryable);
        assert_eq!(error.message, "unknown action: send_fax");
    }

    #[test]
    fn test_invalid_input_is_fatal() {
        let error = ActionError::invalid_input("update_status", "missing field `status`");
        assert!(!error.retryable);
        assert_eq!(error.error_type.as_deref(), Some("invalid_input"));
        assert!(error.message.contains("update_status"));
    }

    #[test]
    fn test_action_error_serialization() {
        let error = ActionError::retryable("test error")
            .with_details(serde_json::json!({"status": 503}));

        let json = serde_json::to_string(&error).unwrap();
        let parsed: ActionError = serde_json::from_str(&json).unwrap();

        assert_eq!(error, parsed);
    }
}
