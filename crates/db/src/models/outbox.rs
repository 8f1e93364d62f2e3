//! Outbox row model.

use sqlx::FromRow;
use uuid::Uuid;

use cropwatch_core::types::Timestamp;

/// A row from the `outbox_events` table. The bigserial `id` gives a global
/// order that contains each aggregate's emission order.
#[derive(Debug, Clone, FromRow)]
pub struct OutboxEventRow {
    pub id: i64,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
    pub dispatched_at: Option<Timestamp>,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
}
