use cdc::error::ErrorKind;
use cdc::failpoints::{BEFORE_EMIT_DDL, EXECUTE_DDL_NOT_DONE};
use cdc::test_utils::ddl::{add_column_job, test_table};
use cdc::test_utils::failpoints::CustomFailScenario;
use cdc::test_utils::harness::TestHarness;
use cdc_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn held_back_ddl_stays_in_the_executing_slot() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[(EXECUTE_DDL_NOT_DONE, "return")]);

    let t1 = test_table("t1", 10);
    let mut harness = TestHarness::builder().with_tables([t1.clone()]).build();
    let (job, _) = add_column_job(&t1, "c1", 150);
    harness.send_jobs([job], 200);

    let first = harness.tick(150).await.unwrap();
    let second = harness.tick(150).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.barrier.table_barrier_ts(10), Some(150));
    assert!(harness.coordinator.executing_ddl().is_some());
    assert!(harness.sink.calls().await.is_empty());

    scenario.disable(EXECUTE_DDL_NOT_DONE);
    harness.tick(150).await.unwrap();

    assert!(harness.coordinator.executing_ddl().is_none());
    assert_eq!(harness.sink.executed().await.len(), 1);

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_failure_before_emit_fails_the_tick() {
    init_test_tracing();
    let scenario = CustomFailScenario::setup(&[(BEFORE_EMIT_DDL, "return(sink unavailable)")]);

    let t1 = test_table("t1", 10);
    let mut harness = TestHarness::builder().with_tables([t1.clone()]).build();
    let (job, _) = add_column_job(&t1, "c1", 150);
    harness.send_jobs([job], 200);

    let err = harness.tick(150).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InjectedFailure);
    assert!(harness.sink.calls().await.is_empty());
    assert_eq!(harness.coordinator.pending_ddl_count(), 1);

    scenario.disable(BEFORE_EMIT_DDL);
    harness.tick(150).await.unwrap();
    assert_eq!(harness.sink.executed().await.len(), 1);

    scenario.teardown();
}
