pub mod alert;
pub mod outbox;
pub mod reading;

pub use alert::{AlertAggregateRow, AlertRow, NewAlertRow};
pub use outbox::OutboxEventRow;
pub use reading::SensorReadingRow;
