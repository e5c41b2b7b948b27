//! In-memory collaborators that record every call
//!
//! Used by the dev server when no provider is configured and by tests.
//! Each one can be told to fail its next `n` calls with a transient error.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::collaborators::*;

/// Shared failure injection counter
#[derive(Debug, Default)]
struct FailNext(AtomicU32);

impl FailNext {
    fn set(&self, n: u32) {
        self.0.store(n, Ordering::SeqCst);
    }

    fn check(&self, service: &str) -> Result<(), DeliveryError> {
        let tripped = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(DeliveryError::Unavailable(format!("{service} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail_next: FailNext,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends
    pub fn fail_next(&self, n: u32) {
        self.fail_next.set(n);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<String, DeliveryError> {
        self.fail_next.check("mailer")?;
        self.sent.lock().push(message);
        Ok(format!("msg_{}", Uuid::now_v7().simple()))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail_next: FailNext,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.set(n);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.fail_next.check("notifier")?;
        self.sent.lock().push(notification);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingCalendar {
    booked: Mutex<Vec<CallRequest>>,
    fail_next: FailNext,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.set(n);
    }

    pub fn booked(&self) -> Vec<CallRequest> {
        self.booked.lock().clone()
    }
}

#[async_trait]
impl Calendar for RecordingCalendar {
    async fn schedule(&self, request: CallRequest) -> Result<CallBooking, DeliveryError> {
        self.fail_next.check("calendar")?;
        let booking = CallBooking {
            booking_id: format!("call_{}", Uuid::now_v7().simple()),
            scheduled_at: request.scheduled_at,
            meeting_url: None,
        };
        self.booked.lock().push(request);
        Ok(booking)
    }
}

#[derive(Debug, Default)]
pub struct RecordingTaskBoard {
    created: Mutex<Vec<TeamTask>>,
    fail_next: FailNext,
}

impl RecordingTaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.set(n);
    }

    pub fn created(&self) -> Vec<TeamTask> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl TaskBoard for RecordingTaskBoard {
    async fn create_task(&self, task: TeamTask) -> Result<String, DeliveryError> {
        self.fail_next.check("task board")?;
        self.created.lock().push(task);
        Ok(format!("task_{}", Uuid::now_v7().simple()))
    }
}

/// Content generator returning a fixed reply
#[derive(Debug)]
pub struct CannedContentGenerator {
    reply: String,
    requests: Mutex<Vec<GenerationRequest>>,
    fail_next: FailNext,
}

impl CannedContentGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
            fail_next: FailNext::default(),
        }
    }

    pub fn fail_next(&self, n: u32) {
        self.fail_next.set(n);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

impl Default for CannedContentGenerator {
    fn default() -> Self {
        Self::new("generated content")
    }
}

#[async_trait]
impl ContentGenerator for CannedContentGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, DeliveryError> {
        self.fail_next.check("content generator")?;
        self.requests.lock().push(request);
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "jamie@example.com".into(),
            subject: "Hi".into(),
            body: "Hello".into(),
            reply_to: None,
            creator_id: Uuid::now_v7(),
            brand_id: Uuid::now_v7(),
        }
    }

    #[tokio::test]
    async fn test_fail_next_then_recover() {
        let mailer = RecordingMailer::new();
        mailer.fail_next(2);

        assert!(mailer.send(message()).await.is_err());
        assert!(mailer.send(message()).await.is_err());
        assert!(mailer.send(message()).await.is_ok());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_canned_generator_records_prompt() {
        let generator = CannedContentGenerator::new("a script");
        let reply = generator
            .generate(GenerationRequest {
                prompt: "write".into(),
                system: None,
                max_tokens: None,
            })
            .await
            .expect("should generate");

        assert_eq!(reply, "a script");
        assert_eq!(generator.requests()[0].prompt, "write");
    }
}
