// Wait scheduler
//
// Polls for paused executions whose wait has elapsed and resumes them.
// Each tick is independent: a failed resume is logged and picked up again
// on a later tick if it is still due.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use creatorflow_engine::persistence::ExecutionStore;
use creatorflow_engine::EngineError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::Engine;

pub struct WaitScheduler {
    engine: Arc<Engine>,
    interval: Duration,
    batch: usize,
}

impl WaitScheduler {
    pub fn new(engine: Arc<Engine>, interval: Duration, batch: usize) -> Self {
        Self {
            engine,
            interval,
            batch,
        }
    }

    /// Resume every execution whose wait is due, returning how many resumed
    pub async fn tick(&self) -> usize {
        let due = match self
            .engine
            .store()
            .list_due_waits(Utc::now(), self.batch)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "failed to list due waits");
                return 0;
            }
        };

        let mut resumed = 0;
        for execution in due {
            match self.engine.resume(execution.id).await {
                Ok(execution) => {
                    resumed += 1;
                    debug!(execution_id = %execution.id, status = %execution.status, "wait resumed");
                }
                // Another caller got there first
                Err(e @ (EngineError::ResumeConflict(_) | EngineError::InvalidResume { .. })) => {
                    debug!(execution_id = %execution.id, error = %e, "skipping wait");
                }
                Err(e) => {
                    warn!(execution_id = %execution.id, error = %e, "failed to resume wait");
                }
            }
        }
        resumed
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.interval, batch = self.batch, "wait scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let resumed = self.tick().await;
                    if resumed > 0 {
                        info!(resumed, "resumed elapsed waits");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("wait scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use creatorflow_engine::model::{ExecutionPatch, ExecutionStatus};
    use serde_json::Map;

    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_tick_leaves_pending_waits_alone() {
        let fixture = Fixture::new();
        let execution = fixture
            .engine
            .start(fixture.wait_template.id, fixture.creator.id, fixture.brand.id, Map::new())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Paused);

        let scheduler = WaitScheduler::new(fixture.engine.clone(), Duration::from_secs(1), 10);
        assert_eq!(scheduler.tick().await, 0);

        let stored = fixture.store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Paused);
    }

    #[tokio::test]
    async fn test_tick_resumes_elapsed_waits() {
        let fixture = Fixture::new();
        let execution = fixture
            .engine
            .start(fixture.wait_template.id, fixture.creator.id, fixture.brand.id, Map::new())
            .await
            .unwrap();

        fixture
            .store
            .update_execution(
                execution.id,
                ExecutionPatch {
                    resume_at: Some(Some(Utc::now() - ChronoDuration::minutes(5))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let scheduler = WaitScheduler::new(fixture.engine.clone(), Duration::from_secs(1), 10);
        assert_eq!(scheduler.tick().await, 1);

        let stored = fixture.store.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(
            stored.context.variable("CREATOR_STATUS"),
            Some(&serde_json::json!("Followed Up"))
        );

        // Nothing left to do on the next tick
        assert_eq!(scheduler.tick().await, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fixture = Fixture::new();
        let scheduler = WaitScheduler::new(fixture.engine.clone(), Duration::from_millis(10), 10);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(scheduler.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
