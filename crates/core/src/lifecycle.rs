//! Alert lifecycle service: acknowledge and resolve use cases.
//!
//! Load, apply the transition, persist through a unit of work. A lost
//! optimistic-concurrency race retries the whole read-modify-write cycle a
//! bounded number of times; a command that is illegal after reload surfaces
//! its domain conflict instead of silently overwriting.

use std::sync::Arc;

use uuid::Uuid;

use crate::alert::Alert;
use crate::error::DomainError;
use crate::ports::{AlertRepository, StorageError, UnitOfWorkFactory};

/// How many times a lost write race is retried before giving up.
const MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct AlertLifecycle {
    alerts: Arc<dyn AlertRepository>,
    uow: Arc<dyn UnitOfWorkFactory>,
}

impl AlertLifecycle {
    pub fn new(alerts: Arc<dyn AlertRepository>, uow: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { alerts, uow }
    }

    pub async fn acknowledge(
        &self,
        alert_id: Uuid,
        actor: &str,
    ) -> Result<Alert, LifecycleError> {
        self.transition(alert_id, |alert| alert.acknowledge(actor))
            .await
    }

    pub async fn resolve(
        &self,
        alert_id: Uuid,
        actor: &str,
        notes: Option<String>,
    ) -> Result<Alert, LifecycleError> {
        self.transition(alert_id, |alert| alert.resolve(actor, notes.clone()))
            .await
    }

    async fn transition<F>(&self, alert_id: Uuid, apply: F) -> Result<Alert, LifecycleError>
    where
        F: Fn(&mut Alert) -> Result<(), DomainError>,
    {
        let mut attempt = 0;
        loop {
            let mut alert = self
                .alerts
                .get_by_id(alert_id)
                .await?
                .ok_or(DomainError::NotFound {
                    entity: "Alert",
                    id: alert_id,
                })?;

            apply(&mut alert)?;

            let mut result = alert.clone();
            let mut uow = self.uow.begin().await?;
            uow.update_alert(alert);
            match uow.commit().await {
                Ok(_) => {
                    result.take_events();
                    return Ok(result);
                }
                Err(StorageError::Conflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        alert_id = %alert_id,
                        attempt,
                        "Lost optimistic-concurrency race, retrying transition"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
