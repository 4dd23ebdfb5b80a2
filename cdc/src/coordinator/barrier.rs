use std::collections::BTreeMap;

use crate::types::{Barrier, DdlEvent, TableBarrier, TableId, Ts};

/// Default upper bound on the number of table barriers handed to the scheduler.
pub const DEFAULT_TABLE_BARRIER_LIMIT: usize = 256;

/// Computes the barrier for the given pending DDL events.
///
/// `events` holds the head of every pending table queue plus the DDL that completed during
/// the current tick, if any. Returns the min table barrier ts together with the barrier.
///
/// Global DDL lower the global barrier. Non-global DDL put a barrier on each physical table
/// they block, and those barriers are dropped again when the global barrier is already
/// stricter. At most `table_barrier_limit` table barriers are kept, lowest first; when some
/// are cut, the global barrier is lowered to the first one cut.
pub fn compute_barrier<'a, I>(
    events: I,
    ddl_resolved_ts: Ts,
    table_barrier_limit: usize,
) -> (Ts, Barrier)
where
    I: IntoIterator<Item = &'a DdlEvent>,
{
    let mut global_barrier_ts = ddl_resolved_ts;
    let mut min_table_barrier_ts = ddl_resolved_ts;
    let mut table_barrier_ts: BTreeMap<TableId, Ts> = BTreeMap::new();

    for event in events {
        if event.is_global() {
            global_barrier_ts = global_barrier_ts.min(event.commit_ts);
        } else {
            for table_id in event.blocked_physical_table_ids() {
                table_barrier_ts
                    .entry(table_id)
                    .and_modify(|barrier_ts| *barrier_ts = (*barrier_ts).min(event.commit_ts))
                    .or_insert(event.commit_ts);
            }
        }

        min_table_barrier_ts = min_table_barrier_ts.min(event.commit_ts);
    }

    let mut table_barriers: Vec<TableBarrier> = table_barrier_ts
        .into_iter()
        .filter(|(_, barrier_ts)| *barrier_ts <= global_barrier_ts)
        .map(|(table_id, barrier_ts)| TableBarrier {
            table_id,
            barrier_ts,
        })
        .collect();
    table_barriers.sort_by_key(|barrier| (barrier.barrier_ts, barrier.table_id));

    if table_barriers.len() > table_barrier_limit {
        global_barrier_ts = table_barriers[table_barrier_limit].barrier_ts;
        table_barriers.truncate(table_barrier_limit);
    }

    (
        min_table_barrier_ts,
        Barrier {
            table_barriers,
            global_barrier_ts,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, TableInfo};

    fn event(action: ActionType, table_id: TableId, commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            action,
            table_info: TableInfo::new("test", format!("t{table_id}"), table_id),
            pre_table_info: None,
            query: format!("{action} on t{table_id}"),
        }
    }

    #[test]
    fn no_pending_ddl_bounds_everything_by_resolved_ts() {
        let events: [DdlEvent; 0] = [];
        let (min_table_barrier_ts, barrier) =
            compute_barrier(&events, 200, DEFAULT_TABLE_BARRIER_LIMIT);

        assert_eq!(min_table_barrier_ts, 200);
        assert_eq!(barrier, Barrier {
            table_barriers: Vec::new(),
            global_barrier_ts: 200,
        });
    }

    #[test]
    fn non_global_ddl_barrier_their_tables() {
        let events = [
            event(ActionType::AddColumn, 1, 100),
            event(ActionType::AddIndex, 2, 105),
        ];

        let (min_table_barrier_ts, barrier) =
            compute_barrier(&events, 200, DEFAULT_TABLE_BARRIER_LIMIT);

        assert_eq!(min_table_barrier_ts, 100);
        assert_eq!(barrier.global_barrier_ts, 200);
        assert_eq!(barrier.table_barrier_ts(1), Some(100));
        assert_eq!(barrier.table_barrier_ts(2), Some(105));
    }

    #[test]
    fn global_ddl_drops_later_table_barriers() {
        let events = [
            event(ActionType::CreateTable, 5, 50),
            event(ActionType::AddColumn, 1, 80),
            event(ActionType::AddColumn, 2, 40),
        ];

        let (min_table_barrier_ts, barrier) =
            compute_barrier(&events, 200, DEFAULT_TABLE_BARRIER_LIMIT);

        assert_eq!(min_table_barrier_ts, 40);
        assert_eq!(barrier.global_barrier_ts, 50);
        assert_eq!(barrier.table_barriers, vec![TableBarrier {
            table_id: 2,
            barrier_ts: 40,
        }]);
    }

    #[test]
    fn partitioned_tables_barrier_every_partition() {
        let mut truncate = event(ActionType::TruncateTablePartition, 10, 100);
        truncate.table_info = truncate.table_info.with_partitions(vec![11, 12]);

        let (_, barrier) = compute_barrier([&truncate], 200, DEFAULT_TABLE_BARRIER_LIMIT);

        let ids: Vec<TableId> = barrier.table_barriers.iter().map(|b| b.table_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn truncation_tightens_the_global_barrier() {
        let events: Vec<DdlEvent> = (0..5)
            .map(|i| event(ActionType::AddColumn, i, 100 + i as Ts))
            .collect();

        let (min_table_barrier_ts, barrier) = compute_barrier(&events, 500, 3);

        assert_eq!(min_table_barrier_ts, 100);
        assert_eq!(barrier.table_barriers.len(), 3);
        assert_eq!(barrier.global_barrier_ts, 103);
        assert!(
            barrier
                .table_barriers
                .iter()
                .all(|b| b.barrier_ts <= barrier.global_barrier_ts)
        );
    }

    #[test]
    fn equal_barrier_ts_sort_by_table_id() {
        let events = [
            event(ActionType::AddColumn, 7, 100),
            event(ActionType::AddColumn, 3, 100),
        ];

        let (_, barrier) = compute_barrier(&events, 200, DEFAULT_TABLE_BARRIER_LIMIT);

        let ids: Vec<TableId> = barrier.table_barriers.iter().map(|b| b.table_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }
}
