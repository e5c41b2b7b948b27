//! Workflow engine
//!
//! The `WorkflowEngine` is responsible for:
//! - Starting executions of a template for a creator
//! - Running steps in order until the execution completes, fails or suspends
//! - Resuming suspended executions once their gate is open
//! - Fanning a trigger event out to every matching template

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dispatcher::{step_input, DispatchRequest, NextAction, StepDispatcher, StepError};
use super::{EngineError, ExecutionStateMachine};
use crate::action::{ActionRegistry, Notification, Notifier};
use crate::context::{vars, ExecutionContext};
use crate::model::{
    Execution, ExecutionStatus, NewExecution, NewStepExecution, StepConfig, StepExecutionPatch,
    StepExecutionStatus, TriggerEvent, WorkflowStep,
};
use crate::persistence::WorkflowStore;
use crate::reliability::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES};

/// Configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backoff unit multiplied by `2^attempt` between retries
    pub retry_base_unit: Duration,

    /// Retries for steps that opt in without a count
    pub default_max_retries: u32,

    /// Maximum step dispatches in one run (for safety)
    pub max_dispatches_per_run: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_base_unit: Duration::from_secs(1),
            default_max_retries: DEFAULT_MAX_RETRIES,
            max_dispatches_per_run: 1000,
        }
    }
}

/// Result of fanning out one trigger event
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerReport {
    pub started: Vec<TriggeredExecution>,
    pub failed: Vec<TriggerFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggeredExecution {
    pub template_id: Uuid,
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerFailure {
    pub template_id: Uuid,
    pub error: String,
}

/// How a step ended for the run loop
enum StepResult {
    Next(NextAction),
    Failed(String),
}

/// Workflow engine
///
/// Each execution is driven sequentially by the caller's task; the engine
/// keeps no state between calls beyond what it writes to the store, so
/// any number of executions may run concurrently.
///
/// # Example
///
/// ```ignore
/// use creatorflow_engine::prelude::*;
///
/// let store = Arc::new(InMemoryStore::new());
/// let actions = builtin_actions(store.clone(), &Collaborators::recording());
/// let engine = WorkflowEngine::new(store, actions);
///
/// let execution = engine.start(template_id, creator_id, brand_id, Map::new()).await?;
/// if execution.status == ExecutionStatus::WaitingHuman {
///     // a reviewer resolves the task, then:
///     engine.resume(execution.id).await?;
/// }
/// ```
pub struct WorkflowEngine<S: WorkflowStore + ?Sized> {
    store: Arc<S>,
    dispatcher: StepDispatcher<S>,
    config: EngineConfig,
    alerts: Option<Arc<dyn Notifier>>,
}

impl<S: WorkflowStore + ?Sized> WorkflowEngine<S> {
    /// Create an engine with the default configuration
    pub fn new(store: Arc<S>, actions: ActionRegistry) -> Self {
        Self::with_config(store, actions, EngineConfig::default())
    }

    pub fn with_config(store: Arc<S>, actions: ActionRegistry, config: EngineConfig) -> Self {
        Self {
            dispatcher: StepDispatcher::new(store.clone(), actions),
            store,
            config,
            alerts: None,
        }
    }

    /// Send failure and review alerts through `notifier`
    pub fn with_alerts(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.alerts = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn actions(&self) -> &ActionRegistry {
        self.dispatcher.actions()
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Start an execution of `template_id` for a creator and run it
    ///
    /// Returns the execution as it stands when the run stops: completed,
    /// failed, paused on a wait or waiting on a human.
    #[instrument(skip(self, extra))]
    pub async fn start(
        &self,
        template_id: Uuid,
        creator_id: Uuid,
        brand_id: Uuid,
        extra: Map<String, Value>,
    ) -> Result<Execution, EngineError> {
        let template = self
            .store
            .load_template(template_id)
            .await?
            .ok_or(EngineError::TemplateNotFound(template_id))?;
        if !template.is_active {
            return Err(EngineError::TemplateInactive(template_id));
        }
        if template.brand_id != brand_id {
            return Err(EngineError::invalid_template(
                template_id,
                format!("template belongs to brand {}", template.brand_id),
            ));
        }

        let steps = self.store.load_steps(template_id).await?;
        validate_order(template_id, &steps)?;

        let creator = self
            .store
            .get_creator(creator_id)
            .await?
            .ok_or(EngineError::CreatorNotFound(creator_id))?;
        let brand = self.store.get_brand(brand_id).await?;

        let mut context = ExecutionContext::seeded(&creator, brand.as_ref(), &template, Utc::now());
        context.merge_variables(extra);

        let execution = self
            .store
            .create_execution(NewExecution {
                workflow_id: template_id,
                creator_id,
                brand_id,
                context,
            })
            .await?;

        info!(
            execution_id = %execution.id,
            template = %template.name,
            steps = steps.len(),
            "execution started"
        );

        self.run(execution, &steps, 0).await
    }

    /// Continue a paused or waiting execution from the step after its gate
    ///
    /// The gate must be open: a wait must have reached `resume_at` and a
    /// review task must be completed or skipped. Otherwise the execution is
    /// left untouched and [`EngineError::GateNotSatisfied`] is returned.
    #[instrument(skip(self))]
    pub async fn resume(&self, execution_id: Uuid) -> Result<Execution, EngineError> {
        let mut execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        if !execution.status.is_suspended() {
            return Err(EngineError::InvalidResume {
                execution_id,
                status: execution.status,
            });
        }

        let steps = self.store.load_steps(execution.workflow_id).await?;
        let (index, step) = execution
            .current_step_id
            .and_then(|id| steps.iter().enumerate().find(|(_, step)| step.id == id))
            .ok_or_else(|| {
                EngineError::invalid_template(
                    execution.workflow_id,
                    format!("execution {execution_id} is not suspended on a known step"),
                )
            })?;

        let gate_output = self.check_gate(&execution, step).await?;

        let sm = ExecutionStateMachine::new(self.store.as_ref());
        sm.claim_resume(&mut execution).await?;

        if let Err(e) = self.close_gate(&mut execution, step, gate_output).await {
            self.abandon(&mut execution, &e).await;
            return Err(e);
        }

        info!(%execution_id, step_id = %step.id, "execution resumed");
        self.run(execution, &steps, index + 1).await
    }

    /// Start every active template of the brand listening for `event`
    ///
    /// Starts run concurrently and independently: a template that fails
    /// to start is reported and logged, and the others still run.
    #[instrument(skip(self, extra))]
    pub async fn trigger_workflow_for_creator(
        &self,
        creator_id: Uuid,
        brand_id: Uuid,
        event: TriggerEvent,
        extra: Map<String, Value>,
    ) -> Result<TriggerReport, EngineError> {
        let templates = self.store.list_active_templates(brand_id, event).await?;
        debug!(matched = templates.len(), %event, "templates matched trigger");

        let starts = templates.iter().map(|template| {
            let extra = extra.clone();
            async move {
                let result = self.start(template.id, creator_id, brand_id, extra).await;
                (template.id, result)
            }
        });

        let mut report = TriggerReport::default();
        for (template_id, result) in join_all(starts).await {
            match result {
                Ok(execution) => report.started.push(TriggeredExecution {
                    template_id,
                    execution_id: execution.id,
                    status: execution.status,
                }),
                Err(e) => {
                    error!(%template_id, %creator_id, error = %e, "failed to start workflow");
                    report.failed.push(TriggerFailure {
                        template_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    // =========================================================================
    // Run loop
    // =========================================================================

    async fn run(
        &self,
        mut execution: Execution,
        steps: &[WorkflowStep],
        index: usize,
    ) -> Result<Execution, EngineError> {
        match self.run_from(&mut execution, steps, index).await {
            Ok(()) => Ok(execution),
            Err(e) => {
                self.abandon(&mut execution, &e).await;
                Err(e)
            }
        }
    }

    async fn run_from(
        &self,
        execution: &mut Execution,
        steps: &[WorkflowStep],
        mut index: usize,
    ) -> Result<(), EngineError> {
        let sm = ExecutionStateMachine::new(self.store.as_ref());
        let mut dispatches = 0usize;

        while let Some(step) = steps.get(index) {
            dispatches += 1;
            if dispatches > self.config.max_dispatches_per_run {
                let message = format!(
                    "exceeded {} step dispatches in one run",
                    self.config.max_dispatches_per_run
                );
                sm.fail(execution, &message).await?;
                self.alert_failure(execution, &message).await;
                return Ok(());
            }

            sm.advance(execution, step.id).await?;

            match self.run_step(&sm, execution, steps, step).await? {
                StepResult::Next(NextAction::Continue) => index += 1,
                StepResult::Next(NextAction::Branch(target)) => {
                    match steps.iter().position(|s| s.id == target) {
                        Some(position) => {
                            debug!(execution_id = %execution.id, %target, "branching");
                            index = position;
                        }
                        None => {
                            let message = format!("branch target {target} not found");
                            sm.fail(execution, &message).await?;
                            self.alert_failure(execution, &message).await;
                            return Ok(());
                        }
                    }
                }
                StepResult::Next(NextAction::Pause { resume_at }) => {
                    sm.pause(execution, step.id, resume_at).await?;
                    return Ok(());
                }
                StepResult::Next(NextAction::AwaitHuman { task_id }) => {
                    sm.await_human(execution, step.id).await?;
                    self.alert_review(execution, step, task_id).await;
                    return Ok(());
                }
                StepResult::Failed(message) => {
                    sm.fail(execution, &message).await?;
                    self.alert_failure(execution, &message).await;
                    return Ok(());
                }
            }
        }

        sm.complete(execution).await
    }

    /// Mark a `running` execution failed after an engine error
    ///
    /// Best-effort: a second failure is logged and the caller still gets
    /// the original error.
    async fn abandon(&self, execution: &mut Execution, error: &EngineError) {
        if execution.status != ExecutionStatus::Running {
            return;
        }
        let message = error.to_string();
        let sm = ExecutionStateMachine::new(self.store.as_ref());
        match sm.fail(execution, &message).await {
            Ok(()) => self.alert_failure(execution, &message).await,
            Err(e) => {
                error!(execution_id = %execution.id, error = %e, original = %message, "failed to record execution failure");
            }
        }
    }

    /// Run every attempt of one step
    ///
    /// Each attempt gets its own step execution record. Store failures that
    /// hit the attempt records themselves propagate as errors.
    async fn run_step(
        &self,
        sm: &ExecutionStateMachine<'_, S>,
        execution: &mut Execution,
        steps: &[WorkflowStep],
        step: &WorkflowStep,
    ) -> Result<StepResult, EngineError> {
        let policy = match &step.config {
            StepConfig::Action(config) => RetryPolicy::for_step(
                &config.retry,
                self.config.default_max_retries,
                self.config.retry_base_unit,
            ),
            _ => RetryPolicy::no_retry(),
        };

        let mut attempt = 1;
        loop {
            let input = step_input(step, &execution.context);
            let record = self
                .store
                .create_step_execution(NewStepExecution {
                    execution_id: execution.id,
                    step_id: step.id,
                    attempt,
                    input: input.clone(),
                })
                .await?;
            self.store
                .update_step_execution(record.id, StepExecutionPatch::running())
                .await?;

            let result = self
                .dispatcher
                .dispatch(DispatchRequest {
                    execution,
                    step,
                    steps,
                    step_execution_id: record.id,
                    attempt,
                    input: &input,
                    now: Utc::now(),
                })
                .await;

            let error = match result {
                Ok(outcome) if outcome.next.is_suspension() => {
                    // Output is recorded in the context on resume
                    self.store
                        .update_step_execution(record.id, StepExecutionPatch::waiting(outcome.output))
                        .await?;
                    return Ok(StepResult::Next(outcome.next));
                }
                Ok(outcome) => {
                    execution
                        .context
                        .record_output(step.id, outcome.output.clone())?;
                    execution.context.merge_variables(outcome.variables);
                    execution.context.reset_retries();
                    self.store
                        .update_step_execution(record.id, StepExecutionPatch::completed(outcome.output))
                        .await?;
                    return Ok(StepResult::Next(outcome.next));
                }
                Err(error) => error,
            };

            self.store
                .update_step_execution(record.id, StepExecutionPatch::failed(error.to_string()))
                .await?;

            match retry_decision(&policy, &error, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    let retry_count = execution.context.increment_retry();
                    sm.checkpoint(execution).await?;
                    warn!(
                        execution_id = %execution.id,
                        step_id = %step.id,
                        attempt,
                        retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    let message = format!("step '{}' failed: {}", step.name, error);
                    return Ok(StepResult::Failed(message));
                }
            }
        }
    }

    // =========================================================================
    // Gates and alerts
    // =========================================================================

    /// Complete the suspended step's waiting record and record its output
    async fn close_gate(
        &self,
        execution: &mut Execution,
        step: &WorkflowStep,
        gate_output: Value,
    ) -> Result<(), EngineError> {
        let waiting = self
            .store
            .list_step_executions(execution.id)
            .await?
            .into_iter()
            .rev()
            .find(|record| record.step_id == step.id && record.status == StepExecutionStatus::Waiting);
        if let Some(record) = waiting {
            self.store
                .update_step_execution(record.id, StepExecutionPatch::completed(gate_output.clone()))
                .await?;
        }

        execution.context.record_output(step.id, gate_output)?;
        execution.context.reset_retries();
        Ok(())
    }

    /// Output recorded for the suspended step once its gate is open
    async fn check_gate(&self, execution: &Execution, step: &WorkflowStep) -> Result<Value, EngineError> {
        let now = Utc::now();
        match execution.status {
            ExecutionStatus::Paused => {
                if let Some(resume_at) = execution.resume_at.filter(|at| now < *at) {
                    return Err(EngineError::gate_not_satisfied(
                        execution.id,
                        format!("wait elapses at {resume_at}"),
                    ));
                }
                Ok(json!({ "resume_at": execution.resume_at, "resumed_at": now }))
            }
            ExecutionStatus::WaitingHuman => {
                let task = self
                    .store
                    .task_for_step(execution.id, step.id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::gate_not_satisfied(execution.id, "no review task exists")
                    })?;
                if !task.status.is_resolved() {
                    return Err(EngineError::gate_not_satisfied(
                        execution.id,
                        format!("review task {} is {}", task.id, task.status),
                    ));
                }
                Ok(json!({
                    "task_id": task.id,
                    "task_status": task.status,
                    "notes": task.notes,
                }))
            }
            status => Err(EngineError::InvalidResume {
                execution_id: execution.id,
                status,
            }),
        }
    }

    async fn alert_failure(&self, execution: &Execution, message: &str) {
        let workflow = execution
            .context
            .variable_str(vars::WORKFLOW_NAME)
            .unwrap_or("workflow");
        self.alert(
            execution,
            format!("{workflow} failed"),
            message.to_string(),
        )
        .await;
    }

    async fn alert_review(&self, execution: &Execution, step: &WorkflowStep, task_id: Uuid) {
        let creator = execution
            .context
            .variable_str(vars::CREATOR_NAME)
            .unwrap_or("a creator");
        self.alert(
            execution,
            format!("Review needed: {}", step.name),
            format!("Task {task_id} for {creator} is waiting for review"),
        )
        .await;
    }

    /// Best-effort; a failed alert never affects the execution
    async fn alert(&self, execution: &Execution, title: String, message: String) {
        let Some(notifier) = &self.alerts else {
            return;
        };
        let notification = Notification {
            channel: "in_app".to_string(),
            recipient: None,
            title,
            message,
            brand_id: execution.brand_id,
            execution_id: Some(execution.id),
        };
        if let Err(e) = notifier.notify(notification).await {
            warn!(execution_id = %execution.id, error = %e, "failed to send alert");
        }
    }
}

fn retry_decision(policy: &RetryPolicy, error: &StepError, attempt: u32) -> RetryDecision {
    if error.is_retryable() {
        policy.decide(attempt)
    } else {
        RetryDecision::GiveUp
    }
}

/// Steps must be in strictly increasing `step_order`
fn validate_order(template_id: Uuid, steps: &[WorkflowStep]) -> Result<(), EngineError> {
    for pair in steps.windows(2) {
        if pair[1].step_order <= pair[0].step_order {
            return Err(EngineError::invalid_template(
                template_id,
                format!(
                    "steps '{}' and '{}' share or reverse step_order {}",
                    pair[0].name, pair[1].name, pair[1].step_order
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::recording::RecordingNotifier;
    use crate::action::{builtin_actions, Collaborators};
    use crate::model::{
        BrandProfile, CreatorProfile, WaitStepConfig, WaitUnit, WorkflowCategory, WorkflowTemplate,
    };
    use crate::persistence::{ExecutionStore, InMemoryStore, InterventionQueue};

    struct Fixture {
        store: Arc<InMemoryStore>,
        brand_id: Uuid,
        creator_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let brand = BrandProfile::new("Glow Labs");
        let creator = CreatorProfile::new(brand.id, "Ada Lovelace", "ada@example.test");
        let (brand_id, creator_id) = (brand.id, creator.id);
        store.insert_brand(brand);
        store.insert_creator(creator);
        Fixture {
            store,
            brand_id,
            creator_id,
        }
    }

    fn template(fx: &Fixture, steps: Vec<(&str, StepConfig)>) -> Uuid {
        let template = WorkflowTemplate::new(
            fx.brand_id,
            "Onboarding",
            WorkflowCategory::Onboarding,
            TriggerEvent::CreatorCreated,
        );
        let id = template.id;
        fx.store.insert_template(template);
        fx.store.insert_steps(
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (name, config))| WorkflowStep::new(id, i as i32 + 1, name, config)),
        );
        id
    }

    fn engine(fx: &Fixture) -> WorkflowEngine<InMemoryStore> {
        let actions = builtin_actions(fx.store.clone(), &Collaborators::recording());
        WorkflowEngine::new(fx.store.clone(), actions)
    }

    #[test]
    fn test_validate_order_rejects_ties() {
        let workflow_id = Uuid::now_v7();
        let steps = vec![
            WorkflowStep::new(workflow_id, 1, "a", StepConfig::human_intervention("a")),
            WorkflowStep::new(workflow_id, 1, "b", StepConfig::human_intervention("b")),
        ];
        assert!(matches!(
            validate_order(workflow_id, &steps),
            Err(EngineError::InvalidTemplate { .. })
        ));
        assert!(validate_order(workflow_id, &steps[..1]).is_ok());
    }

    #[tokio::test]
    async fn test_empty_template_completes() {
        let fx = fixture();
        let template_id = template(&fx, vec![]);

        let execution = engine(&fx)
            .start(template_id, fx.creator_id, fx.brand_id, Map::new())
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_extra_context_overrides_seeded_variables() {
        let fx = fixture();
        let template_id = template(
            &fx,
            vec![("Review", StepConfig::human_intervention("Review {CREATOR_NAME}"))],
        );
        let mut extra = Map::new();
        extra.insert(vars::CREATOR_NAME.to_string(), json!("Ada L."));

        let execution = engine(&fx)
            .start(template_id, fx.creator_id, fx.brand_id, extra)
            .await
            .unwrap();

        let task = fx
            .store
            .task_for_step(execution.id, execution.current_step_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.title, "Review Ada L.");
    }

    #[tokio::test]
    async fn test_wait_gate_blocks_early_resume() {
        let fx = fixture();
        let template_id = template(
            &fx,
            vec![(
                "Cool off",
                StepConfig::Wait(WaitStepConfig::for_duration(3, WaitUnit::Days)),
            )],
        );
        let engine = engine(&fx);

        let execution = engine
            .start(template_id, fx.creator_id, fx.brand_id, Map::new())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Paused);

        let err = engine.resume(execution.id).await.unwrap_err();
        assert!(matches!(err, EngineError::GateNotSatisfied { .. }));

        let stored = fx.store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Paused);
    }

    #[tokio::test]
    async fn test_review_alert_is_best_effort() {
        let fx = fixture();
        let template_id = template(
            &fx,
            vec![("Review", StepConfig::human_intervention("Portfolio Review"))],
        );
        let alerts = Arc::new(RecordingNotifier::new());
        alerts.fail_next(1);
        let engine = engine(&fx).with_alerts(alerts.clone());

        let execution = engine
            .start(template_id, fx.creator_id, fx.brand_id, Map::new())
            .await
            .unwrap();

        assert_eq!(execution.status, ExecutionStatus::WaitingHuman);
        assert!(alerts.sent().is_empty());
    }

    #[tokio::test]
    async fn test_review_alert_is_sent() {
        let fx = fixture();
        let template_id = template(
            &fx,
            vec![("Portfolio Review", StepConfig::human_intervention("Portfolio Review"))],
        );
        let alerts = Arc::new(RecordingNotifier::new());
        let engine = engine(&fx).with_alerts(alerts.clone());

        let execution = engine
            .start(template_id, fx.creator_id, fx.brand_id, Map::new())
            .await
            .unwrap();

        let sent = alerts.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Review needed: Portfolio Review");
        assert_eq!(sent[0].execution_id, Some(execution.id));
    }

    #[tokio::test]
    async fn test_template_of_other_brand_is_rejected() {
        let fx = fixture();
        let template_id = template(&fx, vec![]);

        let err = engine(&fx)
            .start(template_id, fx.creator_id, Uuid::now_v7(), Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidTemplate { .. }));
        assert_eq!(fx.store.execution_count(), 0);
    }
}
