//! `send_notification` action

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::collaborators::{Notification, Notifier};
use crate::action::{Action, ActionContext, ActionError};

fn default_channel() -> String {
    "in_app".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendNotificationInput {
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationOutput {
    pub delivered: bool,
    pub channel: String,
}

pub struct SendNotificationAction {
    notifier: Arc<dyn Notifier>,
}

impl SendNotificationAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Action for SendNotificationAction {
    const TYPE: &'static str = "send_notification";
    type Input = SendNotificationInput;
    type Output = SendNotificationOutput;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        let title = input
            .title
            .unwrap_or_else(|| ctx.render("Update for {CREATOR_NAME}"));

        self.notifier
            .notify(Notification {
                channel: input.channel.clone(),
                recipient: input.recipient,
                title,
                message: input.message,
                brand_id: ctx.brand_id,
                execution_id: Some(ctx.execution_id),
            })
            .await?;

        Ok(SendNotificationOutput {
            delivered: true,
            channel: input.channel,
        })
    }
}
