#![cfg(feature = "test-utils")]

use cdc::coordinator::compute_barrier;
use cdc::test_utils::ddl::{add_column_job, create_table_job, table_job, test_table};
use cdc::test_utils::harness::TestHarness;
use cdc::types::{ActionType, Barrier, DdlEvent, TableBarrier, TableInfo, Ts};
use cdc_telemetry::tracing::init_test_tracing;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[tokio::test(flavor = "multi_thread")]
async fn non_global_ddl_on_two_tables() {
    init_test_tracing();

    let t1 = test_table("t1", 1);
    let t2 = test_table("t2", 2);
    let mut harness = TestHarness::builder()
        .start_ts(80)
        .with_tables([t1.clone(), t2.clone()])
        .build();

    let (alter_t1, _) = add_column_job(&t1, "c1", 100);
    let alter_t2 = table_job(ActionType::AddIndex, &t2, 105);
    harness.send_jobs([alter_t1, alter_t2], 200);

    let output = harness.tick(90).await.unwrap();

    assert_eq!(output.min_table_barrier_ts, 100);
    assert_eq!(output.barrier, Barrier {
        table_barriers: vec![
            TableBarrier {
                table_id: 1,
                barrier_ts: 100,
            },
            TableBarrier {
                table_id: 2,
                barrier_ts: 105,
            },
        ],
        global_barrier_ts: 200,
    });
}

#[tokio::test(flavor = "multi_thread")]
async fn global_ddl_hides_later_table_barriers() {
    init_test_tracing();

    let t1 = test_table("t1", 1);
    let mut harness = TestHarness::builder()
        .start_ts(40)
        .with_tables([t1.clone()])
        .build();

    let created = test_table("t5", 5);
    let (alter_t1, _) = add_column_job(&t1, "c1", 80);
    harness.send_jobs([create_table_job(&created, 50), alter_t1], 200);

    let output = harness.tick(45).await.unwrap();

    assert!(output.barrier.global_barrier_ts <= 50);
    assert_eq!(output.barrier.table_barrier_ts(1), None);
    assert_eq!(output.min_table_barrier_ts, 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn table_barriers_are_capped() {
    init_test_tracing();

    let tables: Vec<TableInfo> = (1..=300)
        .map(|id| test_table(&format!("t{id:03}"), id))
        .collect();
    let mut harness = TestHarness::builder()
        .with_tables(tables.clone())
        .build();

    let jobs = tables
        .iter()
        .enumerate()
        .map(|(index, table)| add_column_job(table, "c1", 1_000 + index as Ts).0);
    harness.send_jobs(jobs, 5_000);

    let output = harness.tick(100).await.unwrap();

    assert_eq!(harness.coordinator.pending_ddl_count(), 300);
    assert_eq!(output.barrier.table_barriers.len(), 256);
    // The 257th smallest commit ts.
    assert_eq!(output.barrier.global_barrier_ts, 1_256);
    assert_eq!(output.barrier.table_barriers[255], TableBarrier {
        table_id: 256,
        barrier_ts: 1_255,
    });
    assert_eq!(output.min_table_barrier_ts, 1_000);
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_limit_caps_table_barriers() {
    init_test_tracing();

    let tables: Vec<TableInfo> = (1..=5).map(|id| test_table(&format!("t{id}"), id)).collect();
    let mut harness = TestHarness::builder()
        .with_tables(tables.clone())
        .table_barrier_limit(2)
        .build();

    let jobs = tables
        .iter()
        .enumerate()
        .map(|(index, table)| add_column_job(table, "c1", 150 + index as Ts).0);
    harness.send_jobs(jobs, 300);

    let output = harness.tick(100).await.unwrap();

    assert_eq!(output.barrier.table_barriers.len(), 2);
    assert_eq!(output.barrier.global_barrier_ts, 152);
}

fn random_event(rng: &mut StdRng) -> DdlEvent {
    let action = ActionType::ALL[rng.gen_range(0..ActionType::ALL.len())];
    let table_id = rng.gen_range(1..40);
    let mut table_info = test_table(&format!("t{table_id}"), table_id);
    if rng.gen_bool(0.2) {
        let first_partition = 1_000 + table_id * 10;
        table_info = table_info.with_partitions(vec![first_partition, first_partition + 1]);
    }

    DdlEvent {
        commit_ts: rng.gen_range(1..1_000),
        action,
        table_info,
        pre_table_info: None,
        query: format!("{action} on t{table_id}"),
    }
}

#[test]
fn random_barriers_stay_sound_and_bounded() {
    let mut rng = StdRng::seed_from_u64(0x0ddc_0de);

    for _ in 0..500 {
        let event_count = rng.gen_range(0..60);
        let events: Vec<DdlEvent> = (0..event_count).map(|_| random_event(&mut rng)).collect();
        let ddl_resolved_ts = rng.gen_range(1..1_200);
        let table_barrier_limit = rng.gen_range(1..16);

        let (min_table_barrier_ts, barrier) =
            compute_barrier(&events, ddl_resolved_ts, table_barrier_limit);

        assert!(barrier.global_barrier_ts <= ddl_resolved_ts);
        assert!(min_table_barrier_ts <= barrier.global_barrier_ts);
        assert!(barrier.table_barriers.len() <= table_barrier_limit);

        for table_barrier in &barrier.table_barriers {
            assert!(table_barrier.barrier_ts <= barrier.global_barrier_ts);
            assert!(min_table_barrier_ts <= table_barrier.barrier_ts);
        }
        assert!(barrier.table_barriers.windows(2).all(|pair| {
            (pair[0].barrier_ts, pair[0].table_id) < (pair[1].barrier_ts, pair[1].table_id)
        }));

        let lowest_commit_ts = events.iter().map(|event| event.commit_ts).min();
        assert_eq!(
            min_table_barrier_ts,
            lowest_commit_ts.map_or(ddl_resolved_ts, |ts| ts.min(ddl_resolved_ts))
        );
    }
}
