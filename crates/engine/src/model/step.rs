//! Workflow step definitions
//!
//! A step belongs to exactly one template and carries a type-specific
//! configuration. Steps are ordered by `step_order`; the engine never
//! mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::TaskPriority;

/// Step type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Action,
    Condition,
    Wait,
    HumanIntervention,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Condition => "condition",
            Self::Wait => "wait",
            Self::HumanIntervention => "human_intervention",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ordered unit of work within a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub step_order: i32,
    #[serde(flatten)]
    pub config: StepConfig,
}

impl WorkflowStep {
    pub fn new(workflow_id: Uuid, step_order: i32, name: impl Into<String>, config: StepConfig) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            name: name.into(),
            step_order,
            config,
        }
    }

    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }
}

/// Type-specific step configuration
///
/// Serialized adjacently tagged so a stored row splits into a `step_type`
/// column and a `config` JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_type", content = "config", rename_all = "snake_case")]
pub enum StepConfig {
    Action(ActionStepConfig),
    Condition(ConditionStepConfig),
    Wait(WaitStepConfig),
    HumanIntervention(InterventionStepConfig),
}

impl StepConfig {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::Action(_) => StepType::Action,
            Self::Condition(_) => StepType::Condition,
            Self::Wait(_) => StepType::Wait,
            Self::HumanIntervention(_) => StepType::HumanIntervention,
        }
    }

    /// Split into the `(step_type, config)` pair used by relational storage
    pub fn to_parts(&self) -> Result<(StepType, Value), serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        let config = tagged
            .get_mut("config")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok((self.step_type(), config))
    }

    /// Rebuild from a `(step_type, config)` pair
    pub fn from_parts(step_type: &str, config: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "step_type": step_type,
            "config": config,
        }))
    }

    pub fn action(action_type: impl Into<String>, inputs: Value) -> Self {
        let inputs = match inputs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::Action(ActionStepConfig {
            action_type: action_type.into(),
            inputs,
            retry: RetrySettings::default(),
        })
    }

    pub fn human_intervention(title: impl Into<String>) -> Self {
        Self::HumanIntervention(InterventionStepConfig {
            title: title.into(),
            description: None,
            assignee: None,
            priority: TaskPriority::default(),
        })
    }
}

/// Per-step retry opt-in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries happen only when a step explicitly opts in
    #[serde(default)]
    pub retry_on_failure: bool,

    /// Maximum number of retries after the initial attempt (engine default when unset)
    #[serde(default)]
    pub retry_count: Option<u32>,
}

/// Configuration for an `action` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStepConfig {
    /// Registered handler id (e.g. `send_email`)
    pub action_type: String,

    /// Static inputs; these win over context variables on key collision
    #[serde(default)]
    pub inputs: Map<String, Value>,

    #[serde(flatten)]
    pub retry: RetrySettings,
}

impl ActionStepConfig {
    pub fn with_retry(mut self, retry_count: u32) -> Self {
        self.retry = RetrySettings {
            retry_on_failure: true,
            retry_count: Some(retry_count),
        };
        self
    }
}

/// Configuration for a `condition` step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionStepConfig {
    /// Evaluated in order; the first match picks the branch
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// One `(field, operator, expected_value)` test with its branch target
///
/// The operator is kept as text so a malformed operator surfaces as a
/// configuration failure of the execution rather than a load error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub next_step_id: Option<Uuid>,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: Option<Value>,
        next_step_id: Uuid,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value,
            next_step_id: Some(next_step_id),
        }
    }
}

/// Supported condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
        }
    }

    /// Whether the operator compares against an expected value
    pub fn needs_value(&self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

impl std::str::FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "not_contains" => Ok(Self::NotContains),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            "exists" => Ok(Self::Exists),
            "not_exists" => Ok(Self::NotExists),
            other => Err(format!("unknown condition operator: {other}")),
        }
    }
}

/// Configuration for a `wait` step
///
/// Exactly one of `duration` or `until` should be set; `until` wins when
/// both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitStepConfig {
    #[serde(default)]
    pub duration: Option<WaitDuration>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl WaitStepConfig {
    pub fn for_duration(amount: u32, unit: WaitUnit) -> Self {
        Self {
            duration: Some(WaitDuration { amount, unit }),
            until: None,
        }
    }

    pub fn until(at: DateTime<Utc>) -> Self {
        Self {
            duration: None,
            until: Some(at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitDuration {
    pub amount: u32,
    pub unit: WaitUnit,
}

impl WaitDuration {
    pub fn to_chrono(&self) -> chrono::Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            WaitUnit::Seconds => chrono::Duration::seconds(amount),
            WaitUnit::Minutes => chrono::Duration::minutes(amount),
            WaitUnit::Hours => chrono::Duration::hours(amount),
            WaitUnit::Days => chrono::Duration::days(amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

/// Configuration for a `human_intervention` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionStepConfig {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_config_parts_round_trip() {
        let mut inputs = Map::new();
        inputs.insert("status".to_string(), json!("Cold Outreach"));
        let config = StepConfig::Action(
            ActionStepConfig {
                action_type: "update_status".to_string(),
                inputs,
                retry: RetrySettings::default(),
            }
            .with_retry(2),
        );

        let (step_type, stored) = config.to_parts().unwrap();
        assert_eq!(step_type, StepType::Action);
        assert_eq!(stored["action_type"], "update_status");
        assert_eq!(stored["retry_on_failure"], true);
        assert_eq!(stored["retry_count"], 2);

        let rebuilt = StepConfig::from_parts(step_type.as_str(), stored).unwrap();
        assert_eq!(rebuilt, config);
    }

    #[test]
    fn test_step_serializes_flat() {
        let step = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Portfolio Review",
            StepConfig::human_intervention("Portfolio Review"),
        );

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["step_type"], "human_intervention");
        assert_eq!(value["config"]["title"], "Portfolio Review");
        assert_eq!(value["config"]["priority"], "medium");
    }

    #[test]
    fn test_action_retry_defaults_off() {
        let config: ActionStepConfig =
            serde_json::from_value(json!({"action_type": "send_email"})).unwrap();
        assert!(!config.retry.retry_on_failure);
        assert_eq!(config.retry.retry_count, None);
        assert!(config.inputs.is_empty());
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("not_contains".parse(), Ok(ConditionOperator::NotContains));
        assert!("between".parse::<ConditionOperator>().is_err());
        assert!(!ConditionOperator::Exists.needs_value());
        assert!(ConditionOperator::GreaterThan.needs_value());
    }

    #[test]
    fn test_wait_duration_units() {
        let wait = WaitDuration {
            amount: 2,
            unit: WaitUnit::Days,
        };
        assert_eq!(wait.to_chrono(), chrono::Duration::hours(48));
    }
}
