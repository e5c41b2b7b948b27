//! `update_status` action

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::store_failure;
use crate::action::{Action, ActionContext, ActionError};
use crate::context::vars;
use crate::persistence::CreatorDirectory;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusInput {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusOutput {
    pub previous_status: Option<String>,
    pub status: String,
}

/// Moves the creator to a new pipeline status
pub struct UpdateStatusAction {
    directory: Arc<dyn CreatorDirectory>,
}

impl UpdateStatusAction {
    pub fn new(directory: Arc<dyn CreatorDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Action for UpdateStatusAction {
    const TYPE: &'static str = "update_status";
    type Input = UpdateStatusInput;
    type Output = UpdateStatusOutput;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        let status = input.status.trim().to_string();
        if status.is_empty() {
            return Err(ActionError::invalid_input(Self::TYPE, "status is empty"));
        }

        let previous_status = self
            .directory
            .update_creator_status(ctx.creator_id, &status)
            .await
            .map_err(store_failure)?;

        info!(
            creator_id = %ctx.creator_id,
            from = previous_status.as_deref().unwrap_or("none"),
            to = %status,
            "creator status updated"
        );
        Ok(UpdateStatusOutput {
            previous_status,
            status,
        })
    }

    fn exported_variables(&self, output: &Self::Output) -> Map<String, Value> {
        let mut exported = Map::new();
        exported.insert(vars::CREATOR_STATUS.to_string(), Value::String(output.status.clone()));
        exported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::handlers::test_support::{action_ctx, run};
    use crate::action::ActionRegistry;
    use crate::context::ExecutionContext;
    use crate::model::{BrandProfile, CreatorProfile};
    use crate::persistence::InMemoryStore;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_updates_directory_and_exports_variable() {
        let store = Arc::new(InMemoryStore::new());
        let brand = BrandProfile::new("Glow Labs");
        let mut creator = CreatorProfile::new(brand.id, "Jamie Rivera", "jamie@example.com");
        creator.status = Some("Prospect".into());
        store.insert_creator(creator.clone());

        let registry = ActionRegistry::new().with(UpdateStatusAction::new(store.clone()));
        let context = ExecutionContext::default();
        let ctx = action_ctx(&context, creator.id, brand.id);

        let out = run(&registry, "update_status", &ctx, json!({"status": "Cold Outreach"}))
            .await
            .expect("should update status");

        assert_eq!(out.output["previous_status"], "Prospect");
        assert_eq!(out.variables.get(vars::CREATOR_STATUS), Some(&json!("Cold Outreach")));

        let stored = store.get_creator(creator.id).await.unwrap().unwrap();
        assert_eq!(stored.status.as_deref(), Some("Cold Outreach"));
    }

    #[tokio::test]
    async fn test_unknown_creator_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        let registry = ActionRegistry::new().with(UpdateStatusAction::new(store));
        let context = ExecutionContext::default();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let err = run(&registry, "update_status", &ctx, json!({"status": "Active"}))
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }
}
