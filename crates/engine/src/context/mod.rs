//! Execution context and variable substitution
//!
//! The context is the bag of variables, per-step outputs and the retry
//! counter threaded through one execution. It is owned by exactly one
//! [`Execution`](crate::model::Execution) and persisted with it.

mod substitution;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::{BrandProfile, CreatorProfile, WorkflowTemplate};

pub use substitution::{substitute, substitute_value, UnknownToken};

/// Variable names seeded at execution start
pub mod vars {
    pub const CREATOR_ID: &str = "CREATOR_ID";
    pub const CREATOR_NAME: &str = "CREATOR_NAME";
    pub const CREATOR_FIRST_NAME: &str = "CREATOR_FIRST_NAME";
    pub const CREATOR_EMAIL: &str = "CREATOR_EMAIL";
    pub const CREATOR_STATUS: &str = "CREATOR_STATUS";
    pub const INSTAGRAM_HANDLE: &str = "INSTAGRAM_HANDLE";
    pub const TIKTOK_HANDLE: &str = "TIKTOK_HANDLE";
    pub const YOUTUBE_HANDLE: &str = "YOUTUBE_HANDLE";
    pub const BRAND_ID: &str = "BRAND_ID";
    pub const BRAND_NAME: &str = "BRAND_NAME";
    pub const BRAND_EMAIL: &str = "BRAND_EMAIL";
    pub const WORKFLOW_ID: &str = "WORKFLOW_ID";
    pub const WORKFLOW_NAME: &str = "WORKFLOW_NAME";
    pub const CURRENT_DATE: &str = "CURRENT_DATE";
    pub const CURRENT_TIME: &str = "CURRENT_TIME";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Step outputs are write-once per step id
    #[error("output for step {0} already recorded")]
    OutputAlreadyRecorded(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Seeded from creator, brand and workflow facts plus caller-supplied context
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Output of each completed step, keyed by step id
    #[serde(default)]
    pub step_outputs: BTreeMap<Uuid, Value>,

    /// Retries of the current step; reset after any successful step
    #[serde(default)]
    pub retry_count: u32,
}

impl ExecutionContext {
    /// Seed a context for a new execution
    pub fn seeded(
        creator: &CreatorProfile,
        brand: Option<&BrandProfile>,
        template: &WorkflowTemplate,
        now: DateTime<Utc>,
    ) -> Self {
        let mut ctx = Self::default();

        ctx.set_variable(vars::CREATOR_ID, creator.id.to_string());
        ctx.set_variable(vars::CREATOR_NAME, creator.name.clone());
        ctx.set_variable(vars::CREATOR_FIRST_NAME, creator.first_name());
        ctx.set_variable(vars::CREATOR_EMAIL, optional(&creator.email));
        ctx.set_variable(vars::CREATOR_STATUS, optional(&creator.status));
        ctx.set_variable(vars::INSTAGRAM_HANDLE, optional(&creator.instagram_handle));
        ctx.set_variable(vars::TIKTOK_HANDLE, optional(&creator.tiktok_handle));
        ctx.set_variable(vars::YOUTUBE_HANDLE, optional(&creator.youtube_handle));

        ctx.set_variable(vars::BRAND_ID, template.brand_id.to_string());
        if let Some(brand) = brand {
            ctx.set_variable(vars::BRAND_NAME, brand.name.clone());
            ctx.set_variable(vars::BRAND_EMAIL, optional(&brand.contact_email));
        }

        ctx.set_variable(vars::WORKFLOW_ID, template.id.to_string());
        ctx.set_variable(vars::WORKFLOW_NAME, template.name.clone());
        ctx.set_variable(vars::CURRENT_DATE, now.format("%Y-%m-%d").to_string());
        ctx.set_variable(vars::CURRENT_TIME, now.format("%H:%M:%S").to_string());

        ctx
    }

    /// Set a variable, overwriting any previous value
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Merge caller-supplied variables; these overwrite seeded ones
    pub fn merge_variables(&mut self, extra: Map<String, Value>) {
        self.variables.extend(extra);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// String form of a variable, if it is a non-empty string
    pub fn variable_str(&self, name: &str) -> Option<&str> {
        self.variables
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Record a step's output; each step id may be written once
    pub fn record_output(&mut self, step_id: Uuid, output: Value) -> Result<(), ContextError> {
        if self.step_outputs.contains_key(&step_id) {
            return Err(ContextError::OutputAlreadyRecorded(step_id));
        }
        self.step_outputs.insert(step_id, output);
        Ok(())
    }

    pub fn step_output(&self, step_id: Uuid) -> Option<&Value> {
        self.step_outputs.get(&step_id)
    }

    /// Count one more retry of the current step, returning the new count
    pub fn increment_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
    }

    /// Resolve a dotted field path used by condition steps
    ///
    /// - `steps.<step_id>.a.b` reads a step output
    /// - `variables.NAME.a` (or `vars.NAME.a`) reads a variable
    /// - `NAME.a` is shorthand for `variables.NAME.a`
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let root = match head {
            "steps" => {
                let step_id: Uuid = segments.next()?.parse().ok()?;
                self.step_outputs.get(&step_id)?
            }
            "variables" | "vars" => self.variables.get(segments.next()?)?,
            name => self.variables.get(name)?,
        };

        segments.try_fold(root, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Render a template string against the current variables
    pub fn render(&self, template: &str, unknown: UnknownToken) -> String {
        substitute(template, &self.variables, unknown)
    }
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}
