//! Logging setup shared by changefeed binaries and tests.

pub mod tracing;
