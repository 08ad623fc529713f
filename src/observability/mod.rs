//! Observability module
//!
//! Logging, metrics, and structured run events.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, StopReason};
pub use logging::init_logging;
pub use metrics::init_metrics;
