//! Side-effect services the built-in actions call
//!
//! Each trait is the narrow contract one handler needs. Delivery
//! technology (SMTP provider, calendar vendor, LLM) stays outside the
//! engine.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ActionError;

/// Failure reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Transient failure (network, rate limit, 5xx); worth retrying
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The request itself was refused; retrying cannot help
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<DeliveryError> for ActionError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Unavailable(_) => {
                ActionError::retryable(err.to_string()).with_type("unavailable")
            }
            DeliveryError::Rejected(_) => {
                ActionError::non_retryable(err.to_string()).with_type("rejected")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub reply_to: Option<String>,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message, returning the provider's message id
    async fn send(&self, message: EmailMessage) -> Result<String, DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Delivery channel, e.g. `email`, `slack`, `in_app`
    pub channel: String,
    pub recipient: Option<String>,
    pub title: String,
    pub message: String,
    pub brand_id: Uuid,
    pub execution_id: Option<Uuid>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub title: String,
    pub attendee_email: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallBooking {
    pub booking_id: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub meeting_url: Option<String>,
}

#[async_trait]
pub trait Calendar: Send + Sync {
    async fn schedule(&self, request: CallRequest) -> Result<CallBooking, DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, DeliveryError>;
}

/// Non-blocking follow-up for the brand team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamTask {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub execution_id: Uuid,
}

#[async_trait]
pub trait TaskBoard: Send + Sync {
    /// Create a task, returning its id on the board
    async fn create_task(&self, task: TeamTask) -> Result<String, DeliveryError>;
}
