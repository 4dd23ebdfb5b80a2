//! Utilities for testing the DDL coordinator.
//!
//! - [`ddl`] builds DDL jobs against the descriptors of a test schema.
//! - [`harness`] wires a coordinator to in-memory collaborators and exposes handles to steer
//!   them.
//! - [`failpoints`] configures fail points for the duration of a test.

pub mod ddl;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod harness;
