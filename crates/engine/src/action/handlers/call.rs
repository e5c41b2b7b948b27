//! `schedule_call` action

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::action::collaborators::{Calendar, CallBooking, CallRequest};
use crate::action::{Action, ActionContext, ActionError};
use crate::context::vars;

fn default_duration() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCallInput {
    #[serde(default)]
    pub title: Option<String>,
    /// Left to the calendar's booking flow when unset
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub attendee_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct ScheduleCallAction {
    calendar: Arc<dyn Calendar>,
}

impl ScheduleCallAction {
    pub fn new(calendar: Arc<dyn Calendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Action for ScheduleCallAction {
    const TYPE: &'static str = "schedule_call";
    type Input = ScheduleCallInput;
    type Output = CallBooking;

    async fn execute(
        &self,
        ctx: &ActionContext<'_>,
        input: Self::Input,
    ) -> Result<Self::Output, ActionError> {
        if input.duration_minutes == 0 {
            return Err(ActionError::invalid_input(Self::TYPE, "duration_minutes must be positive"));
        }

        let title = input
            .title
            .unwrap_or_else(|| ctx.render("Call with {CREATOR_NAME}"));
        let attendee_email = input
            .attendee_email
            .or_else(|| ctx.variable_str(vars::CREATOR_EMAIL).map(str::to_string));

        let booking = self
            .calendar
            .schedule(CallRequest {
                creator_id: ctx.creator_id,
                brand_id: ctx.brand_id,
                title,
                attendee_email,
                scheduled_at: input.scheduled_at,
                duration_minutes: input.duration_minutes,
                notes: input.notes,
            })
            .await?;

        Ok(booking)
    }
}
