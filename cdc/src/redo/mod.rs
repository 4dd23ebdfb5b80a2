//! Durable redo log used for disaster recovery.
//!
//! When enabled, every admitted DDL event is written to the redo log before it can gate
//! checkpoint advancement, and the coordinator never exposes a resolved ts the redo log has
//! not acknowledged.

mod disabled;
mod memory;

pub use disabled::DisabledRedo;
pub use memory::MemoryRedoLog;

use std::future::Future;

use crate::error::CdcResult;
use crate::types::{DdlEvent, Ts};

/// Progress persisted by the redo log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushedMeta {
    pub checkpoint_ts: Ts,
    pub resolved_ts: Ts,
}

/// Trait for the DDL side of the redo log.
pub trait RedoDdlManager {
    /// Returns `true` when the redo log is enabled for the changefeed.
    fn enabled(&self) -> bool;

    /// Durably records a DDL event.
    fn emit_ddl_event(&self, event: &DdlEvent) -> impl Future<Output = CdcResult<()>> + Send;

    /// Forwards the resolved ts of the DDL stream to the redo log.
    fn update_resolved_ts(&self, resolved_ts: Ts) -> impl Future<Output = CdcResult<()>> + Send;

    /// Returns the highest resolved ts the redo log has acknowledged as durable.
    fn resolved_ts(&self) -> Ts;
}

/// Trait for the meta side of the redo log.
pub trait RedoMetaManager {
    /// Returns `true` when the redo log is enabled for the changefeed.
    fn enabled(&self) -> bool;

    /// Returns the progress that has been flushed to durable storage.
    fn flushed_meta(&self) -> FlushedMeta;
}
