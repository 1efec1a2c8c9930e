//! Observability setup for interlock binaries.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing, LogFormat, TracingOptions};
