//! PostgreSQL implementation of the stores
//!
//! - JSONB columns for step configs, execution contexts and step snapshots
//! - Compare-and-set status updates guard against concurrent resumes
//! - Task creation is idempotent through a unique `step_execution_id`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::store::*;
use crate::context::ExecutionContext;
use crate::model::{
    BrandProfile, CreatorProfile, Execution, ExecutionPatch, ExecutionStatus,
    HumanInterventionTask, MessageTemplate, NewExecution, NewInterventionTask, NewStepExecution,
    ScriptAssignment, StepConfig, StepExecution, StepExecutionPatch, TaskStatus, TriggerEvent,
    WorkflowStep, WorkflowTemplate,
};

const TEMPLATE_COLUMNS: &str =
    "id, brand_id, name, description, category, trigger_event, is_active, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, workflow_id, creator_id, brand_id, current_step_id, status, \
     started_at, completed_at, error_message, resume_at, context, updated_at";

const STEP_EXECUTION_COLUMNS: &str = "id, execution_id, step_id, attempt, status, input, output, \
     error_message, created_at, started_at, completed_at";

const TASK_COLUMNS: &str = "id, execution_id, step_id, step_execution_id, creator_id, brand_id, \
     title, description, assignee, priority, status, notes, created_at, resolved_at";

/// PostgreSQL implementation of [`WorkflowStore`]
///
/// # Example
///
/// ```ignore
/// use creatorflow_engine::persistence::PostgresStore;
/// use sqlx::PgPool;
///
/// let pool = PgPool::connect("postgres://localhost/creatorflow").await?;
/// let store = PostgresStore::new(pool);
/// store.migrate().await?;
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and build a store
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(db_error("connect"))?;
        Ok(Self::new(pool))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
    }

    // =========================================================================
    // Definition writes (seeding and admin tooling)
    // =========================================================================

    pub async fn insert_brand(&self, brand: &BrandProfile) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO brands (id, name, contact_email) VALUES ($1, $2, $3)")
            .bind(brand.id)
            .bind(&brand.name)
            .bind(&brand.contact_email)
            .execute(&self.pool)
            .await
            .map_err(db_error("insert brand"))?;
        Ok(())
    }

    pub async fn insert_creator(&self, creator: &CreatorProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO creators
                (id, brand_id, name, email, instagram_handle, tiktok_handle, youtube_handle, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(creator.id)
        .bind(creator.brand_id)
        .bind(&creator.name)
        .bind(&creator.email)
        .bind(&creator.instagram_handle)
        .bind(&creator.tiktok_handle)
        .bind(&creator.youtube_handle)
        .bind(&creator.status)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert creator"))?;
        Ok(())
    }

    pub async fn insert_template(&self, template: &WorkflowTemplate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_templates
                (id, brand_id, name, description, category, trigger_event, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(template.id)
        .bind(template.brand_id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.category.as_str())
        .bind(template.trigger_event.as_str())
        .bind(template.is_active)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert template"))?;
        Ok(())
    }

    pub async fn insert_step(&self, step: &WorkflowStep) -> Result<(), StoreError> {
        let (step_type, config) = step.config.to_parts()?;
        sqlx::query(
            r#"
            INSERT INTO workflow_steps (id, workflow_id, name, step_order, step_type, config)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(step.id)
        .bind(step.workflow_id)
        .bind(&step.name)
        .bind(step.step_order)
        .bind(step_type.as_str())
        .bind(&config)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert step"))?;
        Ok(())
    }

    pub async fn insert_message_template(
        &self,
        template: &MessageTemplate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO message_templates (id, brand_id, name, subject, body)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(template.id)
        .bind(template.brand_id)
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.body)
        .execute(&self.pool)
        .await
        .map_err(db_error("insert message template"))?;
        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for PostgresStore {
    #[instrument(skip(self))]
    async fn load_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>, StoreError> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("load template"))?
            .map(|row| template_from_row(&row))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn load_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, workflow_id, name, step_order, step_type, config
            FROM workflow_steps
            WHERE workflow_id = $1
            ORDER BY step_order ASC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("load steps"))?;

        rows.iter()
            .map(|row| {
                let step_type: String = get(row, "step_type")?;
                Ok(WorkflowStep {
                    id: get(row, "id")?,
                    workflow_id: get(row, "workflow_id")?,
                    name: get(row, "name")?,
                    step_order: get(row, "step_order")?,
                    config: StepConfig::from_parts(&step_type, get(row, "config")?)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_active_templates(
        &self,
        brand_id: Uuid,
        event: TriggerEvent,
    ) -> Result<Vec<WorkflowTemplate>, StoreError> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates \
             WHERE brand_id = $1 AND trigger_event = $2 AND is_active \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(brand_id)
            .bind(event.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list active templates"))?;

        rows.iter().map(template_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn load_message_template(
        &self,
        id: Uuid,
    ) -> Result<Option<MessageTemplate>, StoreError> {
        let row = sqlx::query(
            "SELECT id, brand_id, name, subject, body FROM message_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("load message template"))?;

        row.map(|row| {
            Ok(MessageTemplate {
                id: get(&row, "id")?,
                brand_id: get(&row, "brand_id")?,
                name: get(&row, "name")?,
                subject: get(&row, "subject")?,
                body: get(&row, "body")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl ExecutionStore for PostgresStore {
    #[instrument(skip(self, new), fields(workflow_id = %new.workflow_id, creator_id = %new.creator_id))]
    async fn create_execution(&self, new: NewExecution) -> Result<Execution, StoreError> {
        let context = serde_json::to_value(&new.context)?;
        let sql = format!(
            "INSERT INTO workflow_executions (id, workflow_id, creator_id, brand_id, status, context) \
             VALUES ($1, $2, $3, $4, 'running', $5) \
             RETURNING {EXECUTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::now_v7())
            .bind(new.workflow_id)
            .bind(new.creator_id)
            .bind(new.brand_id)
            .bind(&context)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create execution"))?;

        let execution = execution_from_row(&row)?;
        debug!(execution_id = %execution.id, "created execution");
        Ok(execution)
    }

    #[instrument(skip(self))]
    async fn get_execution(&self, id: Uuid) -> Result<Option<Execution>, StoreError> {
        let sql = format!("SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get execution"))?
            .map(|row| execution_from_row(&row))
            .transpose()
    }

    #[instrument(skip(self, patch))]
    async fn update_execution(
        &self,
        id: Uuid,
        patch: ExecutionPatch,
    ) -> Result<Execution, StoreError> {
        let context = patch.context.as_ref().map(serde_json::to_value).transpose()?;
        let sql = format!(
            "UPDATE workflow_executions SET \
                status = COALESCE($2, status), \
                current_step_id = CASE WHEN $3 THEN $4 ELSE current_step_id END, \
                completed_at = COALESCE($5, completed_at), \
                error_message = COALESCE($6, error_message), \
                resume_at = CASE WHEN $7 THEN $8 ELSE resume_at END, \
                context = COALESCE($9, context), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {EXECUTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.current_step_id.is_some())
            .bind(patch.current_step_id.flatten())
            .bind(patch.completed_at)
            .bind(&patch.error_message)
            .bind(patch.resume_at.is_some())
            .bind(patch.resume_at.flatten())
            .bind(&context)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update execution"))?
            .ok_or(StoreError::not_found("execution", id))?;

        execution_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn transition_status(
        &self,
        id: Uuid,
        from: ExecutionStatus,
        to: ExecutionStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("transition status"))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish a lost race from a missing row
        let exists = sqlx::query("SELECT 1 FROM workflow_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("transition status"))?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::not_found("execution", id)),
        }
    }

    #[instrument(skip(self, new), fields(execution_id = %new.execution_id, step_id = %new.step_id, attempt = new.attempt))]
    async fn create_step_execution(
        &self,
        new: NewStepExecution,
    ) -> Result<StepExecution, StoreError> {
        let sql = format!(
            "INSERT INTO workflow_step_executions (id, execution_id, step_id, attempt, status, input) \
             VALUES ($1, $2, $3, $4, 'pending', $5) \
             RETURNING {STEP_EXECUTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::now_v7())
            .bind(new.execution_id)
            .bind(new.step_id)
            .bind(attempt_to_db(new.attempt))
            .bind(&new.input)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create step execution"))?;

        step_execution_from_row(&row)
    }

    #[instrument(skip(self, patch))]
    async fn update_step_execution(
        &self,
        id: Uuid,
        patch: StepExecutionPatch,
    ) -> Result<StepExecution, StoreError> {
        let sql = format!(
            "UPDATE workflow_step_executions SET \
                status = COALESCE($2, status), \
                output = COALESCE($3, output), \
                error_message = COALESCE($4, error_message), \
                started_at = COALESCE($5, started_at), \
                completed_at = COALESCE($6, completed_at) \
             WHERE id = $1 \
             RETURNING {STEP_EXECUTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(&patch.output)
            .bind(&patch.error_message)
            .bind(patch.started_at)
            .bind(patch.completed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update step execution"))?
            .ok_or(StoreError::not_found("step execution", id))?;

        step_execution_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn list_step_executions(
        &self,
        execution_id: Uuid,
    ) -> Result<Vec<StepExecution>, StoreError> {
        let sql = format!(
            "SELECT {STEP_EXECUTION_COLUMNS} FROM workflow_step_executions \
             WHERE execution_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(execution_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list step executions"))?;

        rows.iter().map(step_execution_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_due_waits(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions \
             WHERE status = 'paused' AND resume_at <= $1 \
             ORDER BY resume_at ASC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list due waits"))?;

        rows.iter().map(execution_from_row).collect()
    }
}

#[async_trait]
impl InterventionQueue for PostgresStore {
    #[instrument(skip(self, new), fields(execution_id = %new.execution_id, step_execution_id = %new.step_execution_id))]
    async fn create_task(
        &self,
        new: NewInterventionTask,
    ) -> Result<HumanInterventionTask, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let sql = format!(
            "INSERT INTO human_intervention_tasks \
                (id, execution_id, step_id, step_execution_id, creator_id, brand_id, \
                 title, description, assignee, priority, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending') \
             ON CONFLICT (step_execution_id) \
             DO UPDATE SET step_execution_id = EXCLUDED.step_execution_id \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::now_v7())
            .bind(new.execution_id)
            .bind(new.step_id)
            .bind(new.step_execution_id)
            .bind(new.creator_id)
            .bind(new.brand_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.assignee)
            .bind(new.priority.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create task"))?;

        task_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn get_task(&self, id: Uuid) -> Result<Option<HumanInterventionTask>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM human_intervention_tasks WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get task"))?
            .map(|row| task_from_row(&row))
            .transpose()
    }

    #[instrument(skip(self))]
    async fn task_for_step(
        &self,
        execution_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<HumanInterventionTask>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM human_intervention_tasks \
             WHERE execution_id = $1 AND step_id = $2 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query(&sql)
            .bind(execution_id)
            .bind(step_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("task for step"))?
            .map(|row| task_from_row(&row))
            .transpose()
    }

    #[instrument(skip(self, notes))]
    async fn resolve_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        notes: Option<String>,
    ) -> Result<HumanInterventionTask, StoreError> {
        let sql = format!(
            "UPDATE human_intervention_tasks SET \
                status = $2, \
                notes = COALESCE($3, notes), \
                resolved_at = CASE WHEN $4 THEN NOW() ELSE NULL END \
             WHERE id = $1 \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(&notes)
            .bind(status.is_resolved())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("resolve task"))?
            .ok_or(StoreError::not_found("task", id))?;

        task_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<HumanInterventionTask>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM human_intervention_tasks \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list tasks"))?;

        rows.iter().map(task_from_row).collect()
    }
}

#[async_trait]
impl CreatorDirectory for PostgresStore {
    #[instrument(skip(self))]
    async fn get_creator(&self, id: Uuid) -> Result<Option<CreatorProfile>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, brand_id, name, email, instagram_handle, tiktok_handle, youtube_handle, status
            FROM creators
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get creator"))?;

        row.map(|row| {
            Ok(CreatorProfile {
                id: get(&row, "id")?,
                brand_id: get(&row, "brand_id")?,
                name: get(&row, "name")?,
                email: get(&row, "email")?,
                instagram_handle: get(&row, "instagram_handle")?,
                tiktok_handle: get(&row, "tiktok_handle")?,
                youtube_handle: get(&row, "youtube_handle")?,
                status: get(&row, "status")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn get_brand(&self, id: Uuid) -> Result<Option<BrandProfile>, StoreError> {
        let row = sqlx::query("SELECT id, name, contact_email FROM brands WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get brand"))?;

        row.map(|row| {
            Ok(BrandProfile {
                id: get(&row, "id")?,
                name: get(&row, "name")?,
                contact_email: get(&row, "contact_email")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn update_creator_status(
        &self,
        creator_id: Uuid,
        status: &str,
    ) -> Result<Option<String>, StoreError> {
        // The self-join reads the pre-update value in the same statement
        let row = sqlx::query(
            r#"
            UPDATE creators AS c
            SET status = $2, updated_at = NOW()
            FROM creators AS prev
            WHERE c.id = $1 AND prev.id = c.id
            RETURNING prev.status AS previous_status
            "#,
        )
        .bind(creator_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update creator status"))?
        .ok_or(StoreError::not_found("creator", creator_id))?;

        get(&row, "previous_status")
    }

    #[instrument(skip(self, assignment), fields(creator_id = %assignment.creator_id))]
    async fn assign_script(&self, assignment: ScriptAssignment) -> Result<Uuid, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO script_assignments
                (id, creator_id, brand_id, execution_id, script_id, title, brief, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(assignment.creator_id)
        .bind(assignment.brand_id)
        .bind(assignment.execution_id)
        .bind(assignment.script_id)
        .bind(&assignment.title)
        .bind(&assignment.brief)
        .bind(assignment.due_date)
        .execute(&self.pool)
        .await
        .map_err(db_error("assign script"))?;
        Ok(id)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        error!("Failed to {}: {}", operation, e);
        StoreError::Database(e.to_string())
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Database(format!("column {column}: {e}")))
}

fn parse<T: std::str::FromStr<Err = String>>(value: String) -> Result<T, StoreError> {
    value.parse().map_err(StoreError::Serialization)
}

fn attempt_to_db(attempt: u32) -> i32 {
    i32::try_from(attempt).unwrap_or(i32::MAX)
}

fn template_from_row(row: &PgRow) -> Result<WorkflowTemplate, StoreError> {
    Ok(WorkflowTemplate {
        id: get(row, "id")?,
        brand_id: get(row, "brand_id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        category: parse(get(row, "category")?)?,
        trigger_event: parse(get(row, "trigger_event")?)?,
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn execution_from_row(row: &PgRow) -> Result<Execution, StoreError> {
    let context: serde_json::Value = get(row, "context")?;
    let context: ExecutionContext = serde_json::from_value(context)?;
    Ok(Execution {
        id: get(row, "id")?,
        workflow_id: get(row, "workflow_id")?,
        creator_id: get(row, "creator_id")?,
        brand_id: get(row, "brand_id")?,
        current_step_id: get(row, "current_step_id")?,
        status: parse(get(row, "status")?)?,
        started_at: get(row, "started_at")?,
        completed_at: get(row, "completed_at")?,
        error_message: get(row, "error_message")?,
        resume_at: get(row, "resume_at")?,
        context,
        updated_at: get(row, "updated_at")?,
    })
}

fn step_execution_from_row(row: &PgRow) -> Result<StepExecution, StoreError> {
    let attempt: i32 = get(row, "attempt")?;
    Ok(StepExecution {
        id: get(row, "id")?,
        execution_id: get(row, "execution_id")?,
        step_id: get(row, "step_id")?,
        attempt: u32::try_from(attempt).unwrap_or(1),
        status: parse(get(row, "status")?)?,
        input: get(row, "input")?,
        output: get(row, "output")?,
        error_message: get(row, "error_message")?,
        created_at: get(row, "created_at")?,
        started_at: get(row, "started_at")?,
        completed_at: get(row, "completed_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<HumanInterventionTask, StoreError> {
    Ok(HumanInterventionTask {
        id: get(row, "id")?,
        execution_id: get(row, "execution_id")?,
        step_id: get(row, "step_id")?,
        step_execution_id: get(row, "step_execution_id")?,
        creator_id: get(row, "creator_id")?,
        brand_id: get(row, "brand_id")?,
        title: get(row, "title")?,
        description: get(row, "description")?,
        assignee: get(row, "assignee")?,
        priority: parse(get(row, "priority")?)?,
        status: parse(get(row, "status")?)?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        resolved_at: get(row, "resolved_at")?,
    })
}
