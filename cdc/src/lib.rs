//! DDL coordination for change data capture changefeeds.
//!
//! A changefeed streams row changes and schema changes (DDL) from an upstream database to a
//! downstream target. Rows and DDL travel on separate paths, so a DDL must only be applied
//! once every row committed before it has reached the downstream, and rows committed after it
//! must not be checkpointed before it lands. The [`coordinator::DdlCoordinator`] enforces both
//! sides: it executes pending DDL at their exact commit boundary and computes the
//! [`types::Barrier`] the table scheduler uses to hold table checkpoints back.
//!
//! The coordinator depends on four collaborators, each behind a trait:
//!
//! - [`source::DdlJobSource`] yields finished DDL jobs and the resolved ts of the DDL stream.
//! - [`schema::SchemaStore`] keeps multi-version schema snapshots.
//! - [`redo::RedoDdlManager`] and [`redo::RedoMetaManager`] expose the optional redo log.
//! - [`sink::DdlSink`] applies DDL to the downstream.
//!
//! In-memory implementations of every collaborator are provided for tests and development.

mod macros;

pub mod concurrency;
pub mod coordinator;
pub mod error;
pub mod failpoints;
pub mod redo;
pub mod schema;
pub mod sink;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
