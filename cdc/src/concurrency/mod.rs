//! Concurrency utilities for coordinating changefeed workers.
//!
//! The [`shutdown`] module implements the broadcast shutdown signal observed by background
//! workers between units of work.

pub mod shutdown;
