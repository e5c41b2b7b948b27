//! `ai_generate` action

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::collaborators::{ContentGenerator, GenerationRequest};
use crate::action::{Action, ActionContext, ActionError};

#[derive(Debug, Clone, Deserialize)]
pub struct AiGenerateInput {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Variable to store the generated text in
    #[serde(default)]
    pub output_variable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiGenerateOutput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
}

pub struct AiGenerateAction {
    generator: Arc<dyn ContentGenerator>,
}

impl AiGenerateAction {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Action for AiGenerateAction {
    const TYPE: &'static str = "ai_generate";
    type Input = AiGenerateInput;
    type Output = AiGenerateOutput;

    async fn execute(
        &self,
        _ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        if input.prompt.trim().is_empty() {
            return Err(ActionError::invalid_input(Self::TYPE, "prompt is empty"));
        }

        let content = self
            .generator
            .generate(GenerationRequest {
                prompt: input.prompt,
                system: input.system,
                max_tokens: input.max_tokens,
            })
            .await?;

        Ok(AiGenerateOutput {
            content,
            output_variable: input.output_variable.filter(|name| !name.is_empty()),
        })
    }

    fn exported_variables(&self, output: &Self::Output) -> Map<String, Value> {
        let mut exported = Map::new();
        if let Some(name) = &output.output_variable {
            exported.insert(name.clone(), Value::String(output.content.clone()));
        }
        exported
    }
}
