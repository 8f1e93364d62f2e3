//! In-memory port implementations for unit-testing handler and lifecycle
//! semantics without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::alert::Alert;
use crate::ports::{
    AlertRepository, SensorReadingRepository, StorageError, UnitOfWork, UnitOfWorkFactory,
};
use crate::reading::{ReadingSnapshot, SensorReading};

/// A domain event captured at commit, as the outbox would record it.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Shared in-memory store backing all the ports at once.
#[derive(Default)]
pub struct InMemoryBackend {
    readings: Mutex<HashMap<Uuid, ReadingSnapshot>>,
    alerts: Mutex<HashMap<Uuid, Alert>>,
    outbox: Mutex<Vec<CapturedEvent>>,
    fail_next: AtomicBool,
    duplicate_next: AtomicBool,
    conflict_next: AtomicBool,
}

impl InMemoryBackend {
    pub fn uow_factory(backend: Arc<Self>) -> InMemoryUowFactory {
        InMemoryUowFactory { backend }
    }

    /// Make the next commit fail as a transient outage.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make the next commit fail as a uniqueness violation.
    pub fn duplicate_next_commit(&self) {
        self.duplicate_next.store(true, Ordering::SeqCst);
    }

    /// Make the next commit fail as an optimistic-concurrency loss.
    pub fn conflict_next_commit(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }

    /// Insert an alert directly, bypassing a unit of work.
    pub fn seed_alert(&self, mut alert: Alert) {
        alert.take_events();
        self.alerts.lock().unwrap().insert(alert.id(), alert);
    }

    pub fn reading_count(&self) -> usize {
        self.readings.lock().unwrap().len()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().values().cloned().collect()
    }

    pub fn outbox(&self) -> Vec<CapturedEvent> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl SensorReadingRepository for InMemoryBackend {
    async fn exists(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.readings.lock().unwrap().contains_key(&id))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<SensorReading>, StorageError> {
        Ok(self
            .readings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .map(SensorReading::rehydrate))
    }
}

#[async_trait]
impl AlertRepository for InMemoryBackend {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Alert>, StorageError> {
        Ok(self.alerts.lock().unwrap().get(&id).cloned())
    }
}

pub struct InMemoryUowFactory {
    backend: Arc<InMemoryBackend>,
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryUowFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StorageError> {
        Ok(Box::new(InMemoryUow {
            backend: self.backend.clone(),
            readings: Vec::new(),
            new_alerts: Vec::new(),
            dirty_alerts: Vec::new(),
        }))
    }
}

struct InMemoryUow {
    backend: Arc<InMemoryBackend>,
    readings: Vec<SensorReading>,
    new_alerts: Vec<Alert>,
    dirty_alerts: Vec<Alert>,
}

#[async_trait]
impl UnitOfWork for InMemoryUow {
    fn add_reading(&mut self, reading: SensorReading) {
        self.readings.push(reading);
    }

    fn add_alert(&mut self, alert: Alert) {
        self.new_alerts.push(alert);
    }

    fn update_alert(&mut self, alert: Alert) {
        self.dirty_alerts.push(alert);
    }

    async fn commit(mut self: Box<Self>) -> Result<u64, StorageError> {
        let backend = &self.backend;
        if backend.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected outage".into()));
        }
        if backend.duplicate_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Duplicate {
                entity: "sensor_reading",
            });
        }
        if backend.conflict_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Conflict { entity: "alert" });
        }

        let mut captured = Vec::new();
        let mut affected = 0u64;

        {
            let mut readings = backend.readings.lock().unwrap();
            for reading in &mut self.readings {
                if readings.contains_key(&reading.id()) {
                    return Err(StorageError::Duplicate {
                        entity: "sensor_reading",
                    });
                }
                for event in reading.take_events() {
                    captured.push(CapturedEvent {
                        aggregate_id: event.aggregate_id(),
                        event_type: event.event_type().to_string(),
                        payload: serde_json::to_value(&event)
                            .map_err(|e| StorageError::Unavailable(Box::new(e)))?,
                    });
                }
                readings.insert(reading.id(), reading.snapshot());
                affected += 1;
            }
        }

        {
            let mut alerts = backend.alerts.lock().unwrap();
            for alert in &mut self.new_alerts {
                for event in alert.take_events() {
                    captured.push(CapturedEvent {
                        aggregate_id: event.aggregate_id(),
                        event_type: event.event_type().to_string(),
                        payload: serde_json::to_value(&event)
                            .map_err(|e| StorageError::Unavailable(Box::new(e)))?,
                    });
                }
                alerts.insert(alert.id(), alert.clone());
                affected += 1;
            }
            for alert in &mut self.dirty_alerts {
                let stored_version = alerts
                    .get(&alert.id())
                    .map(|a| a.version())
                    .ok_or(StorageError::Conflict { entity: "alert" })?;
                if stored_version != alert.version() {
                    return Err(StorageError::Conflict { entity: "alert" });
                }
                for event in alert.take_events() {
                    captured.push(CapturedEvent {
                        aggregate_id: event.aggregate_id(),
                        event_type: event.event_type().to_string(),
                        payload: serde_json::to_value(&event)
                            .map_err(|e| StorageError::Unavailable(Box::new(e)))?,
                    });
                }
                let mut state = alert.snapshot();
                state.version += 1;
                alerts.insert(alert.id(), Alert::rehydrate(state));
                affected += 1;
            }
        }

        backend.outbox.lock().unwrap().extend(captured);
        Ok(affected)
    }
}
