//! `send_email` action

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::store_failure;
use crate::action::collaborators::{EmailMessage, Mailer};
use crate::action::{Action, ActionContext, ActionError};
use crate::context::vars;
use crate::persistence::DefinitionStore;

/// Either inline `subject` + `body` or a stored `template_id`
#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailInput {
    /// Defaults to the creator's email
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailOutput {
    pub message_id: String,
    pub to: String,
    pub subject: String,
}

pub struct SendEmailAction {
    definitions: Arc<dyn DefinitionStore>,
    mailer: Arc<dyn Mailer>,
}

impl SendEmailAction {
    pub fn new(definitions: Arc<dyn DefinitionStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            definitions,
            mailer,
        }
    }

    async fn content(
        &self,
        ctx: &ActionContext<'_>,
        input: &SendEmailInput,
    ) -> Result<(String, String), ActionError> {
        if let Some(template_id) = input.template_id {
            let template = self
                .definitions
                .load_message_template(template_id)
                .await
                .map_err(store_failure)?
                .ok_or_else(|| {
                    ActionError::non_retryable(format!("message template not found: {template_id}"))
                        .with_type("not_found")
                })?;
            return Ok((ctx.render(&template.subject), ctx.render(&template.body)));
        }

        match (&input.subject, &input.body) {
            (Some(subject), Some(body)) => Ok((subject.clone(), body.clone())),
            _ => Err(ActionError::invalid_input(
                Self::TYPE,
                "either template_id or both subject and body are required",
            )),
        }
    }
}

#[async_trait]
impl Action for SendEmailAction {
    const TYPE: &'static str = "send_email";
    type Input = SendEmailInput;
    type Output = SendEmailOutput;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        let to = input
            .to
            .clone()
            .filter(|to| !to.is_empty())
            .or_else(|| ctx.variable_str(vars::CREATOR_EMAIL).map(str::to_string))
            .ok_or_else(|| ActionError::invalid_input(Self::TYPE, "no recipient address"))?;

        let (subject, body) = self.content(ctx, &input).await?;

        let message_id = self
            .mailer
            .send(EmailMessage {
                to: to.clone(),
                subject: subject.clone(),
                body,
                reply_to: input.reply_to,
                creator_id: ctx.creator_id,
                brand_id: ctx.brand_id,
            })
            .await?;

        debug!(execution_id = %ctx.execution_id, %message_id, "email sent");
        Ok(SendEmailOutput {
            message_id,
            to,
            subject,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::handlers::test_support::{action_ctx, run};
    use crate::action::recording::RecordingMailer;
    use crate::action::ActionRegistry;
    use crate::context::ExecutionContext;
    use crate::model::MessageTemplate;
    use crate::persistence::InMemoryStore;
    use serde_json::json;

    fn setup() -> (Arc<InMemoryStore>, Arc<RecordingMailer>, ActionRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let registry =
            ActionRegistry::new().with(SendEmailAction::new(store.clone(), mailer.clone()));
        (store, mailer, registry)
    }

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::default();
        ctx.set_variable(vars::CREATOR_EMAIL, "jamie@example.com");
        ctx.set_variable(vars::CREATOR_FIRST_NAME, "Jamie");
        ctx
    }

    #[tokio::test]
    async fn test_inline_email_defaults_to_creator() {
        let (_, mailer, registry) = setup();
        let context = context();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let out = run(&registry, "send_email", &ctx, json!({"subject": "Hi", "body": "Welcome"}))
            .await
            .expect("should send");

        assert_eq!(out.output["to"], "jamie@example.com");
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Welcome");
    }

    #[tokio::test]
    async fn test_template_is_rendered() {
        let (store, mailer, registry) = setup();
        let brand_id = Uuid::now_v7();
        let template = MessageTemplate {
            id: Uuid::now_v7(),
            brand_id,
            name: "welcome".into(),
            subject: "Welcome {CREATOR_FIRST_NAME}".into(),
            body: "Hi {CREATOR_FIRST_NAME}, {UNKNOWN}".into(),
        };
        store.insert_message_template(template.clone());
        let context = context();
        let ctx = action_ctx(&context, Uuid::now_v7(), brand_id);

        run(&registry, "send_email", &ctx, json!({"template_id": template.id}))
            .await
            .expect("should send");

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Welcome Jamie");
        assert_eq!(sent[0].body, "Hi Jamie, {UNKNOWN}");
    }

    #[tokio::test]
    async fn test_missing_content_is_fatal() {
        let (_, _, registry) = setup();
        let context = context();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let err = run(&registry, "send_email", &ctx, json!({"subject": "Hi"}))
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_transient_mailer_failure_is_retryable() {
        let (_, mailer, registry) = setup();
        mailer.fail_next(1);
        let context = context();
        let ctx = action_ctx(&context, Uuid::now_v7(), Uuid::now_v7());

        let err = run(&registry, "send_email", &ctx, json!({"subject": "Hi", "body": "x"}))
            .await
            .unwrap_err();
        assert!(err.retryable);
    }
}
