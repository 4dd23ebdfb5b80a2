//! Downstream DDL sinks.
//!
//! A [`DdlSink`] applies schema changes to a commit-ordered downstream. DDL execution may
//! take longer than a coordinator tick, so [`DdlSink::emit_ddl_event`] follows a
//! retry-until-done contract: the coordinator calls it with the same event on every tick
//! until it reports completion.

mod background;
mod memory;

pub use background::{BackgroundDdlSink, DdlApplier};
pub use memory::MemoryDdlSink;

use std::future::Future;

use crate::error::CdcResult;
use crate::types::{DdlEvent, TableInfo, TableName, Ts};

/// Checkpoint most recently reported to a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkCheckpoint {
    pub checkpoint_ts: Ts,
    pub table_names: Vec<TableName>,
}

impl SinkCheckpoint {
    pub fn new(checkpoint_ts: Ts, tables: &[TableInfo]) -> Self {
        Self {
            checkpoint_ts,
            table_names: tables.iter().map(|table| table.name.clone()).collect(),
        }
    }
}

/// Trait for downstream targets that apply DDL in commit order.
pub trait DdlSink {
    /// Reports the changefeed checkpoint and the tables it currently covers.
    ///
    /// Called on every tick in which no DDL is executing. Must not block.
    fn emit_checkpoint_ts(&self, checkpoint_ts: Ts, tables: &[TableInfo]);

    /// Executes `event` downstream.
    ///
    /// Returns `Ok(false)` while the DDL is still being applied and `Ok(true)` once it is done.
    /// Calling again with an event that already completed must return `Ok(true)` without
    /// applying it twice.
    fn emit_ddl_event(&self, event: &DdlEvent) -> impl Future<Output = CdcResult<bool>> + Send;
}
