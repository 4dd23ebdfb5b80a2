use serde::{Deserialize, Serialize};

use crate::types::{TableId, Ts};

/// Upper bound for the checkpoint of a single physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBarrier {
    pub table_id: TableId,
    pub barrier_ts: Ts,
}

/// Progress bound handed to the table scheduler.
///
/// No table checkpoint may advance past `global_barrier_ts`, and the tables listed in
/// `table_barriers` may not advance past their own, stricter, barrier. Table barriers are
/// sorted by ascending barrier ts and every one of them is at most `global_barrier_ts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barrier {
    pub table_barriers: Vec<TableBarrier>,
    pub global_barrier_ts: Ts,
}

impl Barrier {
    /// Returns the barrier of the given physical table, if it has its own.
    pub fn table_barrier_ts(&self, table_id: TableId) -> Option<Ts> {
        self.table_barriers
            .iter()
            .find(|barrier| barrier.table_id == table_id)
            .map(|barrier| barrier.barrier_ts)
    }

    /// Returns the ts the checkpoint of `table_id` may advance to.
    pub fn effective_barrier_ts(&self, table_id: TableId) -> Ts {
        self.table_barrier_ts(table_id)
            .unwrap_or(self.global_barrier_ts)
            .min(self.global_barrier_ts)
    }
}

/// Result of one coordinator tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutput {
    /// Physical tables the changefeed watches at the snapshot ts of this tick.
    pub physical_table_ids: Vec<TableId>,
    /// Smallest commit ts among all pending DDL, bounded by the resolved ts view.
    pub min_table_barrier_ts: Ts,
    pub barrier: Barrier,
}
