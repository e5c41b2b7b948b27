//! Creator, brand and message-template records read by the engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub tiktok_handle: Option<String>,
    pub youtube_handle: Option<String>,
    /// Free-form pipeline status (brands define their own, e.g. "Cold Outreach")
    pub status: Option<String>,
}

impl CreatorProfile {
    pub fn new(brand_id: Uuid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            brand_id,
            name: name.into(),
            email: Some(email.into()),
            instagram_handle: None,
            tiktok_handle: None,
            youtube_handle: None,
            status: None,
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
}

impl BrandProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            contact_email: None,
        }
    }
}

/// Email subject/body pair with `{VAR}` tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    pub subject: String,
    pub body: String,
}

/// Script handed to a creator by `assign_script`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAssignment {
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub execution_id: Uuid,
    /// Existing script to assign, if any
    pub script_id: Option<Uuid>,
    pub title: String,
    pub brief: Option<String>,
    pub due_date: Option<NaiveDate>,
}
