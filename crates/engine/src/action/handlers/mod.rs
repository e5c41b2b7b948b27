//! Built-in actions
//!
//! | id                  | collaborator       |
//! |---------------------|--------------------|
//! | `send_email`        | [`Mailer`]         |
//! | `update_status`     | creator directory  |
//! | `assign_script`     | creator directory  |
//! | `schedule_call`     | [`Calendar`]       |
//! | `send_notification` | [`Notifier`]       |
//! | `create_task`       | [`TaskBoard`]      |
//! | `ai_generate`       | [`ContentGenerator`] |

mod ai;
mod call;
mod email;
mod notification;
mod script;
mod status;
mod task;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

pub use ai::{AiGenerateAction, AiGenerateInput, AiGenerateOutput};
pub use call::{ScheduleCallAction, ScheduleCallInput};
pub use email::{SendEmailAction, SendEmailInput, SendEmailOutput};
pub use notification::{SendNotificationAction, SendNotificationInput, SendNotificationOutput};
pub use script::{AssignScriptAction, AssignScriptInput, AssignScriptOutput};
pub use status::{UpdateStatusAction, UpdateStatusInput, UpdateStatusOutput};
pub use task::{CreateTaskAction, CreateTaskInput, CreateTaskOutput};

use super::collaborators::{Calendar, ContentGenerator, Mailer, Notifier, TaskBoard};
use super::recording::{
    CannedContentGenerator, RecordingCalendar, RecordingMailer, RecordingNotifier,
    RecordingTaskBoard,
};
use super::{ActionError, ActionRegistry};
use crate::persistence::{CreatorDirectory, DefinitionStore, StoreError};

/// External services behind the built-in actions
#[derive(Clone)]
pub struct Collaborators {
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<dyn Notifier>,
    pub calendar: Arc<dyn Calendar>,
    pub generator: Arc<dyn ContentGenerator>,
    pub task_board: Arc<dyn TaskBoard>,
}

impl Collaborators {
    /// Recording in-memory services for local runs
    pub fn recording() -> Self {
        Self {
            mailer: Arc::new(RecordingMailer::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            calendar: Arc::new(RecordingCalendar::new()),
            generator: Arc::new(CannedContentGenerator::default()),
            task_board: Arc::new(RecordingTaskBoard::new()),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = generator;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Registry holding all seven built-in actions
pub fn builtin_actions<D>(store: Arc<D>, services: &Collaborators) -> ActionRegistry
where
    D: DefinitionStore + CreatorDirectory + 'static,
{
    let definitions: Arc<dyn DefinitionStore> = store.clone();
    let directory: Arc<dyn CreatorDirectory> = store;

    ActionRegistry::new()
        .with(SendEmailAction::new(definitions, services.mailer.clone()))
        .with(UpdateStatusAction::new(directory.clone()))
        .with(AssignScriptAction::new(directory))
        .with(ScheduleCallAction::new(services.calendar.clone()))
        .with(SendNotificationAction::new(services.notifier.clone()))
        .with(CreateTaskAction::new(services.task_board.clone()))
        .with(AiGenerateAction::new(services.generator.clone()))
}

/// Missing records are permanent, everything else may clear up
fn store_failure(err: StoreError) -> ActionError {
    match err {
        StoreError::NotFound { .. } => {
            ActionError::non_retryable(err.to_string()).with_type("not_found")
        }
        other => ActionError::retryable(other.to_string()).with_type("store"),
    }
}

/// Absolute due date, or one relative to today
fn due_date(date: Option<NaiveDate>, in_days: Option<i64>) -> Option<NaiveDate> {
    date.or_else(|| in_days.map(|days| Utc::now().date_naive() + Duration::days(days)))
}
