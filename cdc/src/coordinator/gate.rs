//! Execution gate for the next pending DDL.
//!
//! A DDL executes only at its exact commit boundary: every row committed before it must have
//! reached the downstream, and the redo log (when enabled) must have flushed up to it. Each
//! condition is a separate predicate.

use crate::types::Ts;

/// Progress observed by the coordinator when deciding whether to execute a DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInput {
    pub checkpoint_ts: Ts,
    /// Flushed checkpoint of the redo log, [`None`] when redo is disabled.
    pub redo_checkpoint_ts: Option<Ts>,
    pub ddl_resolved_ts: Ts,
}

/// The changefeed checkpoint sits exactly at the DDL commit ts.
pub fn checkpoint_reached(input: &GateInput, commit_ts: Ts) -> bool {
    input.checkpoint_ts == commit_ts
}

/// The redo log checkpoint sits exactly at the DDL commit ts, or redo is disabled.
pub fn redo_checkpoint_reached(input: &GateInput, commit_ts: Ts) -> bool {
    input
        .redo_checkpoint_ts
        .is_none_or(|redo_checkpoint_ts| redo_checkpoint_ts == commit_ts)
}

/// The coordinator's resolved ts covers the DDL.
pub fn resolved_ts_exceeded(input: &GateInput, commit_ts: Ts) -> bool {
    input.ddl_resolved_ts >= commit_ts
}

pub fn should_execute(input: &GateInput, commit_ts: Ts) -> bool {
    checkpoint_reached(input, commit_ts)
        && redo_checkpoint_reached(input, commit_ts)
        && resolved_ts_exceeded(input, commit_ts)
}
