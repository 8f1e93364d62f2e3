//! Repository for the `outbox_events` table.
//!
//! Inserts happen only inside a unit-of-work transaction; the relay polls
//! the table afterwards and marks rows dispatched once every consumer has
//! accepted them.

use sqlx::PgConnection;
use uuid::Uuid;

use cropwatch_core::types::Timestamp;

use crate::models::OutboxEventRow;
use crate::DbPool;

/// Column list for `outbox_events` queries.
const OUTBOX_COLUMNS: &str = "id, aggregate_type, aggregate_id, event_type, payload, \
     occurred_at, dispatched_at, attempts, next_attempt_at";

pub struct OutboxRepo;

impl OutboxRepo {
    /// Insert an event record inside an open transaction. Same-transaction
    /// durability with the aggregate rows is the outbox guarantee; this must
    /// never be called on a bare pool.
    pub async fn insert_tx(
        conn: &mut PgConnection,
        aggregate_type: &str,
        aggregate_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
        occurred_at: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO outbox_events \
                (aggregate_type, aggregate_id, event_type, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(event_type)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(conn)
        .await
    }

    /// Fetch undispatched rows that are due for (re)delivery, oldest first.
    ///
    /// A row is held back while an earlier row for the same aggregate sits
    /// in backoff. Otherwise a later event (an acknowledgement, say) could
    /// deliver ahead of the creation it depends on and be marked dispatched
    /// against a read-model row that does not exist yet. Earlier rows that
    /// are already due need no guard: `ORDER BY id` puts them first in the
    /// same batch, and a delivery failure stops the batch.
    pub async fn fetch_undispatched(
        pool: &DbPool,
        batch: i64,
    ) -> Result<Vec<OutboxEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_events o \
             WHERE o.dispatched_at IS NULL AND o.next_attempt_at <= now() \
               AND NOT EXISTS (\
                   SELECT 1 FROM outbox_events p \
                   WHERE p.aggregate_id = o.aggregate_id \
                     AND p.id < o.id \
                     AND p.dispatched_at IS NULL \
                     AND p.next_attempt_at > now()) \
             ORDER BY o.id \
             LIMIT $1"
        );
        sqlx::query_as(&query).bind(batch).fetch_all(pool).await
    }

    /// Mark a row delivered. Called only after every consumer accepted it,
    /// so a crash in between re-delivers (at-least-once).
    pub async fn mark_dispatched(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE outbox_events SET dispatched_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a failed delivery attempt and schedule the next one.
    pub async fn record_failure(
        pool: &DbPool,
        id: i64,
        next_attempt_at: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox_events SET attempts = attempts + 1, next_attempt_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(next_attempt_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Number of rows still awaiting dispatch (for observability endpoints
    /// and tests).
    pub async fn undispatched_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_events WHERE dispatched_at IS NULL")
            .fetch_one(pool)
            .await
    }
}
