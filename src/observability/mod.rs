//! Observability — access logging, tracing and panic recovery decorators

pub mod access_log;
pub mod recovery;
pub mod trace;

pub use access_log::{AccessLog, AccessLogEntry, FieldHandler, LogFields};
pub use recovery::Recovery;
pub use trace::{TraceContext, TracingForwarder};
