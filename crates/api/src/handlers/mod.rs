pub mod alerts;
pub mod health;
pub mod plots;
pub mod sensors;
pub mod telemetry;
