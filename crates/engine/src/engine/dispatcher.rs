//! Step dispatcher
//!
//! Runs one attempt of one step and reports what the engine should do
//! next. The dispatcher never writes execution status; that is left to the
//! [`ExecutionStateMachine`](super::ExecutionStateMachine).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::condition::{self, ConditionError};
use crate::action::{ActionContext, ActionError, ActionRegistry};
use crate::context::{substitute_value, ExecutionContext, UnknownToken};
use crate::model::{
    ActionStepConfig, ConditionStepConfig, Execution, InterventionStepConfig, NewInterventionTask,
    StepConfig, WaitStepConfig, WorkflowStep,
};
use crate::persistence::{InterventionQueue, StoreError};

/// What the engine does after a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Run the next step in `step_order`
    Continue,
    /// Jump forward to the given step
    Branch(Uuid),
    /// Suspend until `resume_at`
    Pause { resume_at: DateTime<Utc> },
    /// Suspend until the review task is resolved
    AwaitHuman { task_id: Uuid },
}

impl NextAction {
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::Pause { .. } | Self::AwaitHuman { .. })
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub output: Value,
    /// Variables to merge into the context once the step completes
    pub variables: Map<String, Value>,
    pub next: NextAction,
}

impl StepOutcome {
    fn new(output: Value, next: NextAction) -> Self {
        Self {
            output,
            variables: Map::new(),
            next,
        }
    }
}

/// A failed step attempt
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{0}")]
    Action(ActionError),

    /// The step definition cannot be executed
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl StepError {
    /// Whether a retry policy may run the step again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Action(error) => error.retryable,
            Self::Config(_) => false,
            Self::Store(_) => true,
        }
    }
}

impl From<ConditionError> for StepError {
    fn from(err: ConditionError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Everything one attempt needs to see
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub execution: &'a Execution,
    pub step: &'a WorkflowStep,
    /// All steps of the template in order, used to validate branch targets
    pub steps: &'a [WorkflowStep],
    pub step_execution_id: Uuid,
    pub attempt: u32,
    /// Input recorded on the attempt, as built by [`step_input`]
    pub input: &'a Value,
    pub now: DateTime<Utc>,
}

/// Input recorded for a step attempt
///
/// For action steps this is the handler payload: the context variables
/// with the step's static inputs laid over them. Only the static inputs
/// are substituted, so variable values that happen to contain `{...}` are
/// passed through untouched. Other step types record their configuration.
pub fn step_input(step: &WorkflowStep, context: &ExecutionContext) -> Value {
    match &step.config {
        StepConfig::Action(config) => {
            let mut merged = context.variables.clone();
            for (key, value) in &config.inputs {
                merged.insert(
                    key.clone(),
                    substitute_value(value, &context.variables, UnknownToken::Keep),
                );
            }
            Value::Object(merged)
        }
        other => other.to_parts().map(|(_, config)| config).unwrap_or(Value::Null),
    }
}

/// Dispatches steps by type
pub struct StepDispatcher<S: InterventionQueue + ?Sized> {
    queue: Arc<S>,
    actions: ActionRegistry,
}

impl<S: InterventionQueue + ?Sized> StepDispatcher<S> {
    pub fn new(queue: Arc<S>, actions: ActionRegistry) -> Self {
        Self { queue, actions }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Run one attempt of `request.step`
    #[instrument(
        skip(self, request),
        fields(
            execution_id = %request.execution.id,
            step_id = %request.step.id,
            step_type = %request.step.step_type(),
            attempt = request.attempt
        )
    )]
    pub async fn dispatch(&self, request: DispatchRequest<'_>) -> Result<StepOutcome, StepError> {
        match &request.step.config {
            StepConfig::Action(config) => self.run_action(&request, config).await,
            StepConfig::Condition(config) => evaluate_conditions(&request, config),
            StepConfig::Wait(config) => schedule_wait(&request, config),
            StepConfig::HumanIntervention(config) => self.open_task(&request, config).await,
        }
    }

    async fn run_action(
        &self,
        request: &DispatchRequest<'_>,
        config: &ActionStepConfig,
    ) -> Result<StepOutcome, StepError> {
        let execution = request.execution;
        let ctx = ActionContext {
            execution_id: execution.id,
            step_id: request.step.id,
            step_execution_id: request.step_execution_id,
            creator_id: execution.creator_id,
            brand_id: execution.brand_id,
            attempt: request.attempt,
            context: &execution.context,
        };

        let result = self
            .actions
            .invoke(&config.action_type, &ctx, request.input.clone())
            .await
            .map_err(StepError::Action)?;

        debug!(action_type = %config.action_type, "action completed");
        Ok(StepOutcome {
            output: result.output,
            variables: result.variables,
            next: NextAction::Continue,
        })
    }

    async fn open_task(
        &self,
        request: &DispatchRequest<'_>,
        config: &InterventionStepConfig,
    ) -> Result<StepOutcome, StepError> {
        let execution = request.execution;
        let render = |text: &str| execution.context.render(text, UnknownToken::Keep);

        let task = self
            .queue
            .create_task(NewInterventionTask {
                execution_id: execution.id,
                step_id: request.step.id,
                step_execution_id: request.step_execution_id,
                creator_id: execution.creator_id,
                brand_id: execution.brand_id,
                title: render(&config.title),
                description: config.description.as_deref().map(render),
                assignee: config.assignee.clone(),
                priority: config.priority,
            })
            .await?;

        Ok(StepOutcome::new(
            json!({ "task_id": task.id, "status": task.status }),
            NextAction::AwaitHuman { task_id: task.id },
        ))
    }
}

fn evaluate_conditions(
    request: &DispatchRequest<'_>,
    config: &ConditionStepConfig,
) -> Result<StepOutcome, StepError> {
    let target = condition::evaluate(&config.conditions, &request.execution.context)?;

    let Some(target) = target else {
        return Ok(StepOutcome::new(
            json!({ "matched": false }),
            NextAction::Continue,
        ));
    };

    let current = request.step.step_order;
    let is_later = request
        .steps
        .iter()
        .any(|step| step.id == target && step.step_order > current);
    if !is_later {
        return Err(StepError::Config(format!(
            "branch target {target} is not a later step of the template"
        )));
    }

    Ok(StepOutcome::new(
        json!({ "matched": true, "next_step_id": target }),
        NextAction::Branch(target),
    ))
}

fn schedule_wait(
    request: &DispatchRequest<'_>,
    config: &WaitStepConfig,
) -> Result<StepOutcome, StepError> {
    let resume_at = match (config.until, config.duration) {
        (Some(until), _) => until,
        (None, Some(duration)) => request
            .now
            .checked_add_signed(duration.to_chrono())
            .ok_or_else(|| StepError::Config("wait duration out of range".to_string()))?,
        (None, None) => {
            return Err(StepError::Config(
                "wait step needs either a duration or an until timestamp".to_string(),
            ))
        }
    };

    if resume_at <= request.now {
        return Ok(StepOutcome::new(
            json!({ "resume_at": resume_at, "elapsed": true }),
            NextAction::Continue,
        ));
    }

    Ok(StepOutcome::new(
        json!({ "resume_at": resume_at }),
        NextAction::Pause { resume_at },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{builtin_actions, Collaborators};
    use crate::model::{
        Condition, ConditionOperator, ExecutionStatus, WaitUnit, WorkflowStep,
    };
    use crate::persistence::InMemoryStore;

    fn execution(context: ExecutionContext) -> Execution {
        let now = Utc::now();
        Execution {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            creator_id: Uuid::now_v7(),
            brand_id: Uuid::now_v7(),
            current_step_id: None,
            status: ExecutionStatus::Running,
            started_at: now,
            completed_at: None,
            error_message: None,
            resume_at: None,
            context,
            updated_at: now,
        }
    }

    fn dispatcher() -> (Arc<InMemoryStore>, StepDispatcher<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let actions = builtin_actions(store.clone(), &Collaborators::recording());
        (store.clone(), StepDispatcher::new(store, actions))
    }

    async fn run(
        dispatcher: &StepDispatcher<InMemoryStore>,
        execution: &Execution,
        step: &WorkflowStep,
        steps: &[WorkflowStep],
    ) -> Result<StepOutcome, StepError> {
        let input = step_input(step, &execution.context);
        dispatcher
            .dispatch(DispatchRequest {
                execution,
                step,
                steps,
                step_execution_id: Uuid::now_v7(),
                attempt: 1,
                input: &input,
                now: Utc::now(),
            })
            .await
    }

    #[test]
    fn test_step_input_prefers_static_inputs() {
        let mut context = ExecutionContext::default();
        context.set_variable("status", "Signed");
        context.set_variable("CREATOR_NAME", "Ada");
        context.set_variable("BIO", "uses {braces}");

        let step = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Set status",
            StepConfig::action(
                "update_status",
                json!({"status": "Cold Outreach", "note": "for {CREATOR_NAME}"}),
            ),
        );

        let input = step_input(&step, &context);
        assert_eq!(input["status"], "Cold Outreach");
        assert_eq!(input["note"], "for Ada");
        assert_eq!(input["BIO"], "uses {braces}");
    }

    #[tokio::test]
    async fn test_unknown_action_is_fatal() {
        let (_, dispatcher) = dispatcher();
        let step = WorkflowStep::new(Uuid::now_v7(), 1, "Fax", StepConfig::action("send_fax", json!({})));
        let execution = execution(ExecutionContext::default());

        let err = run(&dispatcher, &execution, &step, std::slice::from_ref(&step))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        assert!(err.to_string().contains("unknown action"));
    }

    #[tokio::test]
    async fn test_condition_branches_forward_only() {
        let (_, dispatcher) = dispatcher();
        let workflow_id = Uuid::now_v7();
        let first = WorkflowStep::new(workflow_id, 1, "First", StepConfig::human_intervention("Review"));
        let later = WorkflowStep::new(workflow_id, 3, "Later", StepConfig::human_intervention("Review"));

        let mut context = ExecutionContext::default();
        context.set_variable("CREATOR_STATUS", "Signed");
        let execution = execution(context);

        let branch = |target: Uuid| {
            WorkflowStep::new(
                workflow_id,
                2,
                "Branch",
                StepConfig::Condition(ConditionStepConfig {
                    conditions: vec![Condition::new(
                        "CREATOR_STATUS",
                        ConditionOperator::Equals,
                        Some(json!("Signed")),
                        target,
                    )],
                }),
            )
        };

        let forward = branch(later.id);
        let steps = vec![first.clone(), forward.clone(), later.clone()];
        let outcome = run(&dispatcher, &execution, &forward, &steps).await.unwrap();
        assert_eq!(outcome.next, NextAction::Branch(later.id));

        let backward = branch(first.id);
        let steps = vec![first.clone(), backward.clone(), later];
        let err = run(&dispatcher, &execution, &backward, &steps).await.unwrap_err();
        assert!(matches!(err, StepError::Config(_)));
    }

    #[tokio::test]
    async fn test_wait_pauses_until_resume_time() {
        let (_, dispatcher) = dispatcher();
        let execution = execution(ExecutionContext::default());

        let wait = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Cool off",
            StepConfig::Wait(WaitStepConfig::for_duration(2, WaitUnit::Days)),
        );
        let outcome = run(&dispatcher, &execution, &wait, std::slice::from_ref(&wait))
            .await
            .unwrap();
        assert!(matches!(outcome.next, NextAction::Pause { resume_at } if resume_at > Utc::now()));

        let past = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Already due",
            StepConfig::Wait(WaitStepConfig::until(Utc::now() - chrono::Duration::hours(1))),
        );
        let outcome = run(&dispatcher, &execution, &past, std::slice::from_ref(&past))
            .await
            .unwrap();
        assert_eq!(outcome.next, NextAction::Continue);

        let empty = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Broken",
            StepConfig::Wait(WaitStepConfig::default()),
        );
        let err = run(&dispatcher, &execution, &empty, std::slice::from_ref(&empty))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_wait_duration_out_of_range_is_fatal() {
        let (_, dispatcher) = dispatcher();
        let execution = execution(ExecutionContext::default());

        let wait = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Forever",
            StepConfig::Wait(WaitStepConfig::for_duration(u32::MAX, WaitUnit::Days)),
        );
        let err = run(&dispatcher, &execution, &wait, std::slice::from_ref(&wait))
            .await
            .unwrap_err();

        assert!(matches!(&err, StepError::Config(message) if message.contains("out of range")));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_human_intervention_task_is_idempotent_per_attempt() {
        let (store, dispatcher) = dispatcher();
        let mut context = ExecutionContext::default();
        context.set_variable("CREATOR_NAME", "Ada Lovelace");
        let execution = execution(context);
        let step = WorkflowStep::new(
            Uuid::now_v7(),
            1,
            "Review",
            StepConfig::human_intervention("Portfolio review for {CREATOR_NAME}"),
        );
        let input = step_input(&step, &execution.context);
        let request = DispatchRequest {
            execution: &execution,
            step: &step,
            steps: std::slice::from_ref(&step),
            step_execution_id: Uuid::now_v7(),
            attempt: 1,
            input: &input,
            now: Utc::now(),
        };

        let first = dispatcher.dispatch(request).await.unwrap();
        let second = dispatcher.dispatch(request).await.unwrap();

        assert_eq!(first.next, second.next);
        assert_eq!(store.task_count(), 1);
        let NextAction::AwaitHuman { task_id } = first.next else {
            panic!("expected a human gate, got {:?}", first.next);
        };
        let task = store.get_task(task_id).await.unwrap().unwrap();
        assert_eq!(task.title, "Portfolio review for Ada Lovelace");
    }
}
