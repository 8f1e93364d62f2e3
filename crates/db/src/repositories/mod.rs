pub mod alert_repo;
pub mod outbox_repo;
pub mod projection_repo;
pub mod reading_repo;

pub use alert_repo::PgAlertRepository;
pub use outbox_repo::OutboxRepo;
pub use projection_repo::AlertProjectionRepo;
pub use reading_repo::PgSensorReadingRepository;

use cropwatch_core::ports::StorageError;

/// Map a sqlx error onto the core's storage taxonomy. Unique-constraint
/// violations (Postgres 23505) become `Duplicate`; everything else is a
/// transient `Unavailable`.
pub(crate) fn classify(err: sqlx::Error, entity: &'static str) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Duplicate { entity };
        }
    }
    StorageError::Unavailable(Box::new(err))
}
