use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{DdlEvent, TableName};

/// Per-table FIFO queues of DDL events waiting to be executed.
///
/// Queues are created on the first event of a table and removed once drained. Within a queue,
/// commit ts are strictly increasing. Queues are keyed by [`TableName`] in a sorted map, so
/// scans visit tables in a deterministic order.
#[derive(Debug, Default)]
pub(crate) struct PendingDdls {
    queues: BTreeMap<TableName, VecDeque<DdlEvent>>,
}

impl PendingDdls {
    /// Appends `event` to the queue of its table.
    pub(crate) fn push(&mut self, event: DdlEvent) -> CdcResult<()> {
        let queue = self.queues.entry(event.table_name().clone()).or_default();
        if let Some(tail) = queue.back()
            && tail.commit_ts >= event.commit_ts
        {
            bail!(
                ErrorKind::DdlOutOfOrder,
                "DDL event is not newer than the last pending DDL of its table",
                format!(
                    "event at {} on {} queued after event at {}",
                    event.commit_ts,
                    event.table_name(),
                    tail.commit_ts
                )
            );
        }

        queue.push_back(event);
        Ok(())
    }

    /// Returns the oldest pending event across all tables, pruning drained queues.
    ///
    /// When several tables have a head at the same commit ts, the first one in table name
    /// order wins.
    pub(crate) fn next(&mut self) -> Option<&DdlEvent> {
        self.queues.retain(|table_name, queue| {
            if queue.is_empty() {
                debug!(table = %table_name, "no more pending ddl, removing table queue");
                return false;
            }

            true
        });

        let mut next: Option<&DdlEvent> = None;
        for head in self.queues.values().filter_map(VecDeque::front) {
            if next.is_none_or(|next| head.commit_ts < next.commit_ts) {
                next = Some(head);
            }
        }

        next
    }

    /// Removes the head of the queue of `table_name`.
    pub(crate) fn pop_front(&mut self, table_name: &TableName) -> Option<DdlEvent> {
        self.queues.get_mut(table_name)?.pop_front()
    }

    /// Returns the head of every non-empty queue.
    pub(crate) fn heads(&self) -> impl Iterator<Item = &DdlEvent> {
        self.queues.values().filter_map(VecDeque::front)
    }

    /// Returns the total number of pending events.
    pub(crate) fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, TableInfo, Ts};

    fn event(table: &str, table_id: i64, commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            action: ActionType::AddColumn,
            table_info: TableInfo::new("test", table, table_id),
            pre_table_info: None,
            query: format!("ALTER TABLE {table} ADD COLUMN c{commit_ts} INT"),
        }
    }

    #[test]
    fn next_returns_the_minimum_head() {
        let mut pending = PendingDdls::default();
        pending.push(event("t1", 1, 120)).unwrap();
        pending.push(event("t1", 1, 130)).unwrap();
        pending.push(event("t2", 2, 110)).unwrap();

        assert_eq!(pending.next().map(|e| e.commit_ts), Some(110));
        assert_eq!(pending.len(), 3);
        assert_eq!(pending.heads().count(), 2);
    }

    #[test]
    fn ties_resolve_by_table_name() {
        let mut pending = PendingDdls::default();
        pending.push(event("b", 2, 100)).unwrap();
        pending.push(event("a", 1, 100)).unwrap();

        assert_eq!(pending.next().map(|e| e.table_name().table.as_str()), Some("a"));
    }

    #[test]
    fn drained_queues_are_pruned() {
        let mut pending = PendingDdls::default();
        pending.push(event("t1", 1, 100)).unwrap();

        let table_name = TableName::new("test", "t1", 1);
        assert!(pending.pop_front(&table_name).is_some());
        assert!(pending.next().is_none());
        assert!(pending.queues.is_empty());
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut pending = PendingDdls::default();
        pending.push(event("t1", 1, 100)).unwrap();

        let err = pending.push(event("t1", 1, 100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DdlOutOfOrder);

        let err = pending.push(event("t1", 1, 90)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DdlOutOfOrder);
        assert_eq!(pending.len(), 1);
    }
}
