//! `assign_script` action

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{due_date, store_failure};
use crate::action::{Action, ActionContext, ActionError};
use crate::model::ScriptAssignment;
use crate::persistence::CreatorDirectory;

#[derive(Debug, Clone, Deserialize)]
pub struct AssignScriptInput {
    /// Existing script to hand over
    #[serde(default)]
    pub script_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_in_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignScriptOutput {
    pub assignment_id: Uuid,
    pub script_id: Option<Uuid>,
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

pub struct AssignScriptAction {
    directory: Arc<dyn CreatorDirectory>,
}

impl AssignScriptAction {
    pub fn new(directory: Arc<dyn CreatorDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Action for AssignScriptAction {
    const TYPE: &'static str = "assign_script";
    type Input = AssignScriptInput;
    type Output = AssignScriptOutput;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        let title = match (input.title, input.script_id) {
            (Some(title), _) if !title.trim().is_empty() => title,
            (_, Some(_)) => "Script assignment".to_string(),
            _ => {
                return Err(ActionError::invalid_input(
                    Self::TYPE,
                    "either script_id or title is required",
                ))
            }
        };
        let due_date = due_date(input.due_date, input.due_in_days);

        let assignment_id = self
            .directory
            .assign_script(ScriptAssignment {
                creator_id: ctx.creator_id,
                brand_id: ctx.brand_id,
                execution_id: ctx.execution_id,
                script_id: input.script_id,
                title: title.clone(),
                brief: input.brief,
                due_date,
            })
            .await
            .map_err(store_failure)?;

        Ok(AssignScriptOutput {
            assignment_id,
            script_id: input.script_id,
            title,
            due_date,
        })
    }
}
