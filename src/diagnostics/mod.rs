pub mod audit;
pub mod health;
pub mod lifecycle;

pub use audit::{AuditEntry, AuditOutcome, AuditQuery, AuditTrail};
pub use health::{DaemonHealth, IngestHealth, Liveness};
pub use lifecycle::{LifecycleEvent, LifecycleLog};
