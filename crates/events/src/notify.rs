//! In-process notification fan-out backed by a `tokio::sync::broadcast`
//! channel.
//!
//! [`NotificationBus`] is shared via `Arc` across the application; API-side
//! push surfaces (SSE, websockets) subscribe to it. [`NotificationDispatch`]
//! bridges the outbox relay to an [`AlertNotifier`], so notifications fire
//! only for committed events. Notification delivery is best-effort and never
//! holds up the relay.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use cropwatch_core::alert::AlertEvent;
use cropwatch_core::ports::{
    AlertAcknowledgedNotice, AlertCreatedNotice, AlertNotifier, AlertResolvedNotice, NotifyError,
};
use cropwatch_core::types::{Severity, Timestamp};
use cropwatch_db::models::OutboxEventRow;

use crate::relay::{ConsumeError, RelayConsumer};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// One alert lifecycle notification, as pushed to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct AlertNotification {
    /// Dot-separated kind, e.g. `"alert.created"`.
    pub kind: String,
    pub alert_id: Uuid,
    pub sensor_id: String,
    pub plot_id: Uuid,
    pub severity: Option<Severity>,
    pub message: Option<String>,
    pub occurred_at: Timestamp,
}

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// In-process fan-out bus for alert notifications.
pub struct NotificationBus {
    sender: broadcast::Sender<AlertNotification>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity. When the buffer is
    /// full, the oldest un-consumed messages are dropped and slow receivers
    /// observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers. With zero
    /// subscribers the notification is silently dropped; the durable record
    /// already lives in the read model.
    pub fn publish(&self, notification: AlertNotification) {
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertNotification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// [`AlertNotifier`] implementation that publishes onto a
/// [`NotificationBus`].
pub struct BusNotifier {
    bus: Arc<NotificationBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl AlertNotifier for BusNotifier {
    async fn alert_created(&self, notice: AlertCreatedNotice) -> Result<(), NotifyError> {
        self.bus.publish(AlertNotification {
            kind: "alert.created".into(),
            alert_id: notice.alert_id,
            sensor_id: notice.sensor_id,
            plot_id: notice.plot_id,
            severity: Some(notice.severity),
            message: Some(notice.message),
            occurred_at: notice.detected_at,
        });
        Ok(())
    }

    async fn alert_acknowledged(
        &self,
        notice: AlertAcknowledgedNotice,
    ) -> Result<(), NotifyError> {
        self.bus.publish(AlertNotification {
            kind: "alert.acknowledged".into(),
            alert_id: notice.alert_id,
            sensor_id: notice.sensor_id,
            plot_id: notice.plot_id,
            severity: None,
            message: None,
            occurred_at: notice.acknowledged_at,
        });
        Ok(())
    }

    async fn alert_resolved(&self, notice: AlertResolvedNotice) -> Result<(), NotifyError> {
        self.bus.publish(AlertNotification {
            kind: "alert.resolved".into(),
            alert_id: notice.alert_id,
            sensor_id: notice.sensor_id,
            plot_id: notice.plot_id,
            severity: None,
            message: None,
            occurred_at: notice.resolved_at,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NotificationDispatch
// ---------------------------------------------------------------------------

/// Relay consumer that turns committed `alert.*` events into notifier
/// calls. Notifier failures are logged and swallowed: the projector behind
/// the same relay row must not be starved by a flaky push channel.
pub struct NotificationDispatch {
    notifier: Arc<dyn AlertNotifier>,
}

impl NotificationDispatch {
    pub fn new(notifier: Arc<dyn AlertNotifier>) -> Self {
        Self { notifier }
    }

    async fn notify(&self, event: AlertEvent) -> Result<(), NotifyError> {
        match event {
            AlertEvent::Created {
                alert_id,
                sensor_id,
                plot_id,
                alert_type,
                severity,
                message,
                measured,
                threshold,
                occurred_at,
                ..
            } => {
                self.notifier
                    .alert_created(AlertCreatedNotice {
                        alert_id,
                        sensor_id,
                        plot_id,
                        alert_type,
                        severity,
                        message,
                        measured,
                        threshold,
                        detected_at: occurred_at,
                    })
                    .await
            }
            AlertEvent::Acknowledged {
                alert_id,
                sensor_id,
                plot_id,
                acknowledged_by,
                occurred_at,
            } => {
                self.notifier
                    .alert_acknowledged(AlertAcknowledgedNotice {
                        alert_id,
                        sensor_id,
                        plot_id,
                        acknowledged_by,
                        acknowledged_at: occurred_at,
                    })
                    .await
            }
            AlertEvent::Resolved {
                alert_id,
                sensor_id,
                plot_id,
                resolved_by,
                resolution_notes,
                occurred_at,
            } => {
                self.notifier
                    .alert_resolved(AlertResolvedNotice {
                        alert_id,
                        sensor_id,
                        plot_id,
                        resolved_by,
                        resolved_at: occurred_at,
                        resolution_notes,
                    })
                    .await
            }
        }
    }
}

#[async_trait::async_trait]
impl RelayConsumer for NotificationDispatch {
    fn name(&self) -> &'static str {
        "notification_dispatch"
    }

    async fn consume(&self, event: &OutboxEventRow) -> Result<(), ConsumeError> {
        if event.aggregate_type != "alert" {
            return Ok(());
        }
        let parsed: AlertEvent = match serde_json::from_value(event.payload.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    outbox_id = event.id,
                    error = %e,
                    "Unparseable alert event payload, skipping notification"
                );
                return Ok(());
            }
        };
        if let Err(e) = self.notify(parsed).await {
            tracing::warn!(
                outbox_id = event.id,
                event_type = %event.event_type,
                error = %e,
                "Notification delivery failed, continuing"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use cropwatch_core::types::AlertType;

    fn created_notice() -> AlertCreatedNotice {
        AlertCreatedNotice {
            alert_id: Uuid::new_v4(),
            sensor_id: "SENSOR-001".into(),
            plot_id: Uuid::new_v4(),
            alert_type: AlertType::HighTemperature,
            severity: Severity::Medium,
            message: "High temperature detected: 40.0°C".into(),
            measured: 40.0,
            threshold: 35.0,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bus_notifier_publishes_to_subscribers() {
        let bus = Arc::new(NotificationBus::default());
        let mut rx = bus.subscribe();
        let notifier = BusNotifier::new(bus.clone());

        notifier.alert_created(created_notice()).await.unwrap();

        let received = rx.recv().await.expect("should receive the notification");
        assert_eq!(received.kind, "alert.created");
        assert_eq!(received.sensor_id, "SENSOR-001");
        assert_eq!(received.severity, Some(Severity::Medium));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = Arc::new(NotificationBus::default());
        let notifier = BusNotifier::new(bus);
        notifier.alert_created(created_notice()).await.unwrap();
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_notification() {
        let bus = Arc::new(NotificationBus::default());
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let notifier = BusNotifier::new(bus.clone());

        notifier.alert_created(created_notice()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().kind, "alert.created");
        assert_eq!(rx2.recv().await.unwrap().kind, "alert.created");
    }
}
