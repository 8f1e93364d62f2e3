//! Outbox relay.
//!
//! [`OutboxRelay`] runs as a background task, polling `outbox_events` for
//! undispatched rows and feeding each one through the registered consumers
//! in registration order. A row is marked dispatched only after every
//! consumer has accepted it, so a crash in between re-delivers the event on
//! the next cycle. A consumer failure stops the current batch, and while the
//! failed row sits in backoff the fetch holds back later rows for the same
//! aggregate, so events never overtake one another within an aggregate.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use cropwatch_db::models::OutboxEventRow;
use cropwatch_db::{DbPool, OutboxRepo};

/// How often the relay polls for undispatched events.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How many rows one drain cycle picks up.
const BATCH_SIZE: i64 = 50;

/// Backoff schedule between delivery attempts, indexed by the number of
/// failures so far. The last entry repeats.
const RETRY_DELAYS_SECS: [i64; 5] = [1, 5, 30, 120, 600];

fn retry_delay(attempts: i32) -> chrono::Duration {
    let idx = (attempts as usize).min(RETRY_DELAYS_SECS.len() - 1);
    chrono::Duration::seconds(RETRY_DELAYS_SECS[idx])
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConsumeError(pub String);

/// A downstream reaction to a committed domain event. Consumers must be
/// idempotent: the relay delivers at least once, never exactly once.
#[async_trait::async_trait]
pub trait RelayConsumer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn consume(&self, event: &OutboxEventRow) -> Result<(), ConsumeError>;
}

// ---------------------------------------------------------------------------
// OutboxRelay
// ---------------------------------------------------------------------------

pub struct OutboxRelay {
    pool: DbPool,
    consumers: Vec<Box<dyn RelayConsumer>>,
}

impl OutboxRelay {
    pub fn new(pool: DbPool, consumers: Vec<Box<dyn RelayConsumer>>) -> Self {
        Self { pool, consumers }
    }

    /// Run the relay loop. Exits gracefully when the provided
    /// [`CancellationToken`] is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Outbox relay cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!(error = %e, "Outbox drain cycle failed");
                    }
                }
            }
        }
    }

    /// Drain one batch of due events. Returns the number dispatched.
    pub async fn drain_once(&self) -> Result<usize, sqlx::Error> {
        let batch = OutboxRepo::fetch_undispatched(&self.pool, BATCH_SIZE).await?;
        let mut dispatched = 0;

        for event in &batch {
            match self.deliver(event).await {
                Ok(()) => {
                    OutboxRepo::mark_dispatched(&self.pool, event.id).await?;
                    dispatched += 1;
                }
                Err(e) => {
                    let delay = retry_delay(event.attempts);
                    tracing::warn!(
                        outbox_id = event.id,
                        event_type = %event.event_type,
                        attempts = event.attempts + 1,
                        retry_in_secs = delay.num_seconds(),
                        error = %e,
                        "Event delivery failed, scheduling retry"
                    );
                    OutboxRepo::record_failure(&self.pool, event.id, Utc::now() + delay).await?;
                    // Later rows must not overtake this one.
                    break;
                }
            }
        }

        if dispatched > 0 {
            tracing::debug!(dispatched, "Drained outbox batch");
        }
        Ok(dispatched)
    }

    async fn deliver(&self, event: &OutboxEventRow) -> Result<(), ConsumeError> {
        for consumer in &self.consumers {
            consumer
                .consume(event)
                .await
                .map_err(|e| ConsumeError(format!("{}: {e}", consumer.name())))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
