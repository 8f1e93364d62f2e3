//! Event relay for the cropwatch alerting service.
//!
//! The relay polls the transactional outbox and feeds each committed domain
//! event through an ordered chain of consumers: first the read-model
//! projector, then the in-process notification bus. Delivery is
//! at-least-once, in commit order, with exponential backoff on failure.

pub mod notify;
pub mod projector;
pub mod relay;

pub use notify::{AlertNotification, BusNotifier, NotificationBus, NotificationDispatch};
pub use projector::AlertProjector;
pub use relay::{ConsumeError, OutboxRelay, RelayConsumer};
