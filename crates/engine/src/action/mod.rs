//! Action handlers
//!
//! An action step names a handler by id; the [`ActionRegistry`] maps ids to
//! implementations of [`Action`]. Built-in handlers live in [`handlers`] and
//! reach the outside world only through the traits in [`collaborators`].

pub mod collaborators;
mod definition;
pub mod handlers;
pub mod recording;
mod registry;

pub use collaborators::{
    Calendar, CallBooking, CallRequest, ContentGenerator, DeliveryError, EmailMessage,
    GenerationRequest, Mailer, Notification, Notifier, TaskBoard, TeamTask,
};
pub use definition::{Action, ActionContext, ActionError};
pub use handlers::{builtin_actions, Collaborators};
pub use registry::{ActionOutput, ActionRegistry, AnyAction};
