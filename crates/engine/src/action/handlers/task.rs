//! `create_task` action
//!
//! Creates a follow-up on the team's board. Unlike a human intervention
//! step it does not pause the execution.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::due_date;
use crate::action::collaborators::{TaskBoard, TeamTask};
use crate::action::{Action, ActionContext, ActionError};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_in_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskOutput {
    pub task_id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

pub struct CreateTaskAction {
    board: Arc<dyn TaskBoard>,
}

impl CreateTaskAction {
    pub fn new(board: Arc<dyn TaskBoard>) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Action for CreateTaskAction {
    const TYPE: &'static str = "create_task";
    type Input = CreateTaskInput;
    type Output = CreateTaskOutput;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        let due_date = due_date(input.due_date, input.due_in_days);

        let task_id = self
            .board
            .create_task(TeamTask {
                title: input.title.clone(),
                description: input.description,
                assignee: input.assignee,
                due_date,
                creator_id: ctx.creator_id,
                brand_id: ctx.brand_id,
                execution_id: ctx.execution_id,
            })
            .await?;

        Ok(CreateTaskOutput {
            task_id,
            title: input.title,
            due_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::handlers::test_support::{action_ctx, run};
    use crate::action::recording::RecordingTaskBoard;
    use crate::action::ActionRegistry;
    use crate::context::ExecutionContext;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_creates_task() {
        let board = Arc::new(RecordingTaskBoard::new());
        let registry = ActionRegistry::new().with(CreateTaskAction::new(board.clone()));
        let context = ExecutionContext::default();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let out = run(
            &registry,
            "create_task",
            &ctx,
            json!({"title": "Ship product sample", "assignee": "ops"}),
        )
        .await
        .expect("should create task");

        assert_eq!(out.output["title"], "Ship product sample");
        assert_eq!(board.created()[0].assignee.as_deref(), Some("ops"));
    }

    #[tokio::test]
    async fn test_title_required() {
        let board = Arc::new(RecordingTaskBoard::new());
        let registry = ActionRegistry::new().with(CreateTaskAction::new(board));
        let context = ExecutionContext::default();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let err = run(&registry, "create_task", &ctx, json!({})).await.unwrap_err();
        assert!(!err.retryable);
    }
}
