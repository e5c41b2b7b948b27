//! In-memory implementation of the stores for tests and local runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;
use crate::model::{
    BrandProfile, CreatorProfile, Execution, ExecutionPatch, ExecutionStatus,
    HumanInterventionTask, MessageTemplate, NewExecution, NewInterventionTask, NewStepExecution,
    ScriptAssignment, StepExecution, StepExecutionPatch, StepExecutionStatus, TaskStatus,
    TriggerEvent, WorkflowStep, WorkflowTemplate,
};

/// In-memory implementation of [`WorkflowStore`]
///
/// Provides the same semantics as the PostgreSQL implementation,
/// including the compare-and-set status transition and idempotent task
/// creation.
///
/// # Example
///
/// ```
/// use creatorflow_engine::persistence::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.execution_count(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    templates: RwLock<HashMap<Uuid, WorkflowTemplate>>,
    steps: RwLock<HashMap<Uuid, Vec<WorkflowStep>>>,
    message_templates: RwLock<HashMap<Uuid, MessageTemplate>>,
    creators: RwLock<HashMap<Uuid, CreatorProfile>>,
    brands: RwLock<HashMap<Uuid, BrandProfile>>,
    executions: RwLock<HashMap<Uuid, Execution>>,
    /// Insertion order is creation order
    step_executions: RwLock<Vec<StepExecution>>,
    tasks: RwLock<Vec<HumanInterventionTask>>,
    scripts: RwLock<Vec<ScriptAssignment>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    pub fn insert_template(&self, template: WorkflowTemplate) {
        self.templates.write().insert(template.id, template);
    }

    /// Add a step to its template's step list
    pub fn insert_step(&self, step: WorkflowStep) {
        self.steps.write().entry(step.workflow_id).or_default().push(step);
    }

    pub fn insert_steps(&self, steps: impl IntoIterator<Item = WorkflowStep>) {
        for step in steps {
            self.insert_step(step);
        }
    }

    /// Toggle a template's active flag
    pub fn set_template_active(&self, id: Uuid, is_active: bool) {
        if let Some(template) = self.templates.write().get_mut(&id) {
            template.is_active = is_active;
            template.updated_at = Utc::now();
        }
    }

    pub fn insert_message_template(&self, template: MessageTemplate) {
        self.message_templates.write().insert(template.id, template);
    }

    pub fn insert_creator(&self, creator: CreatorProfile) {
        self.creators.write().insert(creator.id, creator);
    }

    pub fn insert_brand(&self, brand: BrandProfile) {
        self.brands.write().insert(brand.id, brand);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn execution_count(&self) -> usize {
        self.executions.read().len()
    }

    pub fn step_execution_count(&self) -> usize {
        self.step_executions.read().len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn script_assignments(&self) -> Vec<ScriptAssignment> {
        self.scripts.read().clone()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryStore {
    async fn load_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>, StoreError> {
        Ok(self.templates.read().get(&id).cloned())
    }

    async fn load_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, StoreError> {
        let mut steps = self
            .steps
            .read()
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn list_active_templates(
        &self,
        brand_id: Uuid,
        event: TriggerEvent,
    ) -> Result<Vec<WorkflowTemplate>, StoreError> {
        let mut templates: Vec<WorkflowTemplate> = self
            .templates
            .read()
            .values()
            .filter(|t| t.brand_id == brand_id && t.trigger_event == event && t.is_active)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.created_at);
        Ok(templates)
    }

    async fn load_message_template(
        &self,
        id: Uuid,
    ) -> Result<Option<MessageTemplate>, StoreError> {
        Ok(self.message_templates.read().get(&id).cloned())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn create_execution(&self, new: NewExecution) -> Result<Execution, StoreError> {
        let now = Utc::now();
        let execution = Execution {
            id: Uuid::now_v7(),
            workflow_id: new.workflow_id,
            creator_id: new.creator_id,
            brand_id: new.brand_id,
            current_step_id: None,
            status: ExecutionStatus::Running,
            started_at: now,
            completed_at: None,
            error_message: None,
            resume_at: None,
            context: new.context,
            updated_at: now,
        };
        self.executions
            .write()
            .insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().get(&id).cloned())
    }

    async fn update_execution(
        &self,
        id: Uuid,
        patch: ExecutionPatch,
    ) -> Result<Execution, StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::not_found("execution", id))?;
        patch.apply_to(execution);
        Ok(execution.clone())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: ExecutionStatus,
        to: ExecutionStatus,
    ) -> Result<bool, StoreError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&id)
            .ok_or(StoreError::not_found("execution", id))?;
        if execution.status != from {
            return Ok(false);
        }
        execution.status = to;
        execution.updated_at = Utc::now();
        Ok(true)
    }

    async fn create_step_execution(
        &self,
        new: NewStepExecution,
    ) -> Result<StepExecution, StoreError> {
        let record = StepExecution {
            id: Uuid::now_v7(),
            execution_id: new.execution_id,
            step_id: new.step_id,
            attempt: new.attempt,
            status: StepExecutionStatus::Pending,
            input: new.input,
            output: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.step_executions.write().push(record.clone());
        Ok(record)
    }

    async fn update_step_execution(
        &self,
        id: Uuid,
        patch: StepExecutionPatch,
    ) -> Result<StepExecution, StoreError> {
        let mut records = self.step_executions.write();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::not_found("step execution", id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn list_step_executions(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<StepExecution>, StoreError> {
        Ok(self
            .step_executions
            .read()
            .iter()
            .filter(|r| r.execution_id == execution_id)
            .cloned()
            .collect())
    }

    async fn list_due_waits(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut due: Vec<Execution> = self
            .executions
            .read()
            .values()
            .filter(|e| {
                e.status == ExecutionStatus::Paused && e.resume_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|e| e.resume_at);
        due.truncate(limit);
        Ok(due)
    }
}

#[async_trait]
impl InterventionQueue for InMemoryStore {
    async fn create_task(
        &self,
        new: NewInterventionTask,
    ) -> Result<HumanInterventionTask, StoreError> {
        let mut tasks = self.tasks.write();
        if let Some(existing) = tasks
            .iter()
            .find(|t| t.step_execution_id == new.step_execution_id)
        {
            return Ok(existing.clone());
        }
        let task = new.into_task();
        tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<HumanInterventionTask>, StoreError> {
        Ok(self.tasks.read().iter().find(|t| t.id == id).cloned())
    }

    async fn task_for_step(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<HumanInterventionTask>, StoreError> {
        Ok(self
            .tasks
            .read()
            .iter()
            .rev()
            .find(|t| t.execution_id == execution_id && t.step_id == step_id)
            .cloned())
    }

    async fn resolve_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        notes: Option<String>,
    ) -> Result<HumanInterventionTask, StoreError> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::not_found("task", id))?;
        task.status = status;
        if notes.is_some() {
            task.notes = notes;
        }
        task.resolved_at = status.is_resolved().then(Utc::now);
        Ok(task.clone())
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<HumanInterventionTask>, StoreError> {
        Ok(self
            .tasks
            .read()
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CreatorDirectory for InMemoryStore {
    async fn get_creator(&self, id: Uuid) -> Result<Option<CreatorProfile>, StoreError> {
        Ok(self.creators.read().get(&id).cloned())
    }

    async fn get_brand(&self, id: Uuid) -> Result<Option<BrandProfile>, StoreError> {
        Ok(self.brands.read().get(&id).cloned())
    }

    async fn update_creator_status(
        &self,
        creator_id: Uuid,
        status: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut creators = self.creators.write();
        let creator = creators
            .get_mut(&creator_id)
            .ok_or(StoreError::not_found("creator", creator_id))?;
        Ok(creator.status.replace(status.to_string()))
    }

    async fn assign_script(&self, assignment: ScriptAssignment) -> Result<Uuid, StoreError> {
        self.scripts.write().push(assignment);
        Ok(Uuid::now_v7())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::model::{StepConfig, TaskPriority, WorkflowCategory};
    use serde_json::json;

    fn new_execution() -> NewExecution {
        NewExecution {
            workflow_id: Uuid::now_v7(),
            creator_id: Uuid::now_v7(),
            brand_id: Uuid::now_v7(),
            context: ExecutionContext::default(),
        }
    }

    fn new_task(execution_id: Uuid, step_id: Uuid, step_execution_id: Uuid) -> NewInterventionTask {
        NewInterventionTask {
            execution_id,
            step_id,
            step_execution_id,
            creator_id: Uuid::now_v7(),
            brand_id: Uuid::now_v7(),
            title: "Portfolio Review".into(),
            description: None,
            assignee: None,
            priority: TaskPriority::High,
        }
    }

    #[tokio::test]
    async fn test_steps_are_ordered() {
        let store = InMemoryStore::new();
        let workflow_id = Uuid::now_v7();
        store.insert_steps([
            WorkflowStep::new(workflow_id, 3, "c", StepConfig::human_intervention("c")),
            WorkflowStep::new(workflow_id, 1, "a", StepConfig::action("create_task", json!({}))),
            WorkflowStep::new(workflow_id, 2, "b", StepConfig::human_intervention("b")),
        ]);

        let steps = store.load_steps(workflow_id).await.unwrap();
        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_active_templates_filter() {
        let store = InMemoryStore::new();
        let brand_id = Uuid::now_v7();
        let active = WorkflowTemplate::new(
            brand_id,
            "Onboarding",
            WorkflowCategory::Onboarding,
            TriggerEvent::CreatorCreated,
        );
        let inactive = WorkflowTemplate::new(
            brand_id,
            "Old onboarding",
            WorkflowCategory::Onboarding,
            TriggerEvent::CreatorCreated,
        )
        .inactive();
        let other_event = WorkflowTemplate::new(
            brand_id,
            "Negotiation",
            WorkflowCategory::RateNegotiation,
            TriggerEvent::StatusChanged,
        );
        store.insert_template(active.clone());
        store.insert_template(inactive);
        store.insert_template(other_event);

        let found = store
            .list_active_templates(brand_id, TriggerEvent::CreatorCreated)
            .await
            .unwrap();
        assert_eq!(found, vec![active]);
    }

    #[tokio::test]
    async fn test_transition_status_is_compare_and_set() {
        let store = InMemoryStore::new();
        let execution = store.create_execution(new_execution()).await.unwrap();
        store
            .update_execution(
                execution.id,
                ExecutionPatch {
                    status: Some(ExecutionStatus::Paused),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let first = store
            .transition_status(execution.id, ExecutionStatus::Paused, ExecutionStatus::Running)
            .await
            .unwrap();
        let second = store
            .transition_status(execution.id, ExecutionStatus::Paused, ExecutionStatus::Running)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_update_missing_execution() {
        let store = InMemoryStore::new();
        let result = store
            .update_execution(Uuid::now_v7(), ExecutionPatch::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { kind: "execution", .. })));
    }

    #[tokio::test]
    async fn test_create_task_idempotent_per_attempt() {
        let store = InMemoryStore::new();
        let (execution_id, step_id) = (Uuid::now_v7(), Uuid::now_v7());
        let attempt = Uuid::now_v7();

        let first = store.create_task(new_task(execution_id, step_id, attempt)).await.unwrap();
        let again = store.create_task(new_task(execution_id, step_id, attempt)).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(store.task_count(), 1);

        let next_attempt = store
            .create_task(new_task(execution_id, step_id, Uuid::now_v7()))
            .await
            .unwrap();
        assert_ne!(next_attempt.id, first.id);

        let latest = store.task_for_step(execution_id, step_id).await.unwrap().unwrap();
        assert_eq!(latest.id, next_attempt.id);
    }

    #[tokio::test]
    async fn test_resolve_task() {
        let store = InMemoryStore::new();
        let task = store
            .create_task(new_task(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7()))
            .await
            .unwrap();

        let in_progress = store.resolve_task(task.id, TaskStatus::InProgress, None).await.unwrap();
        assert!(in_progress.resolved_at.is_none());

        let done = store
            .resolve_task(task.id, TaskStatus::Completed, Some("looks great".into()))
            .await
            .unwrap();
        assert!(done.resolved_at.is_some());
        assert_eq!(done.notes.as_deref(), Some("looks great"));

        let pending = store.list_tasks(Some(TaskStatus::Pending)).await.unwrap();
        assert!(pending.is_empty());
        assert_eq!(store.list_tasks(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_due_waits() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let due = store.create_execution(new_execution()).await.unwrap();
        let later = store.create_execution(new_execution()).await.unwrap();
        store.create_execution(new_execution()).await.unwrap();

        for (id, at) in [(due.id, now - chrono::Duration::minutes(1)), (later.id, now + chrono::Duration::hours(1))] {
            store
                .update_execution(
                    id,
                    ExecutionPatch {
                        status: Some(ExecutionStatus::Paused),
                        resume_at: Some(Some(at)),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let found = store.list_due_waits(now, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[tokio::test]
    async fn test_update_creator_status_returns_previous() {
        let store = InMemoryStore::new();
        let creator = CreatorProfile::new(Uuid::now_v7(), "Jamie", "jamie@example.com");
        store.insert_creator(creator.clone());

        let previous = store.update_creator_status(creator.id, "Active").await.unwrap();
        assert_eq!(previous, None);
        let previous = store.update_creator_status(creator.id, "Paid").await.unwrap();
        assert_eq!(previous.as_deref(), Some("Active"));
    }
}
