//! Multi-version schema storage.
//!
//! The coordinator is the only writer of its changefeed's schema store: it converts every
//! job into DDL events, applies the job, moves the validity horizon forward with the DDL
//! stream's resolved ts and garbage-collects versions once a DDL has been executed.

mod memory;

pub use memory::{MemorySchemaStore, SchemaSnapshot};

use std::future::Future;

use crate::error::CdcResult;
use crate::types::{DdlEvent, DdlJob, TableId, TableInfo, Ts};

/// Trait for versioned schema storage used by the DDL coordinator.
pub trait SchemaStore {
    /// Converts a job into the DDL events to replicate.
    ///
    /// Must be called before [`SchemaStore::handle_ddl`] applies the same job, since events
    /// of renames and truncates carry the descriptor the table had before the job. Jobs
    /// already part of the schema yield no events.
    fn build_ddl_events(&self, job: &DdlJob) -> CdcResult<Vec<DdlEvent>>;

    /// Applies a job, creating a new schema version at the job's commit ts.
    fn handle_ddl(&mut self, job: &DdlJob) -> CdcResult<()>;

    /// Returns the tables to replicate at the snapshot of `ts`.
    fn all_tables(&self, ts: Ts) -> impl Future<Output = CdcResult<Vec<TableInfo>>> + Send;

    /// Returns the physical table ids to replicate at the snapshot of `ts`.
    ///
    /// Partitioned tables contribute their own id followed by the id of every partition.
    fn all_physical_tables(&self, ts: Ts) -> impl Future<Output = CdcResult<Vec<TableId>>> + Send;

    /// Returns `true` if the table exists but cannot be captured.
    fn is_ineligible_table_id(&self, table_id: TableId) -> bool;

    /// Moves the validity horizon of the schema forward.
    fn advance_resolved_ts(&mut self, resolved_ts: Ts);

    /// Drops schema versions that are no longer needed to read snapshots at or after `ts`.
    fn do_gc(&mut self, ts: Ts);
}
