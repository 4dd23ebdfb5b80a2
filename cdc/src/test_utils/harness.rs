use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use cdc_config::shared::DownstreamType;

use crate::coordinator::{CoordinatorOptions, DEFAULT_TABLE_BARRIER_LIMIT, DdlCoordinator};
use crate::error::CdcResult;
use crate::redo::MemoryRedoLog;
use crate::schema::{MemorySchemaStore, SchemaSnapshot};
use crate::sink::MemoryDdlSink;
use crate::source::{ChannelDdlSource, DdlJobSender, create_ddl_channel};
use crate::test_utils::ddl::{TEST_SCHEMA, TEST_SCHEMA_ID};
use crate::types::{DdlJob, TableInfo, TableName, TickOutput, Ts};

/// Default timeout when waiting for a worker to publish an output.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator wired to in-memory collaborators.
pub type TestCoordinator =
    DdlCoordinator<ChannelDdlSource, MemorySchemaStore, MemoryRedoLog, MemoryRedoLog, MemoryDdlSink>;

/// Builder of a [`TestHarness`].
#[derive(Debug, Clone)]
pub struct TestHarnessBuilder {
    start_ts: Ts,
    checkpoint_ts: Option<Ts>,
    tables: Vec<TableInfo>,
    one_way_mode: bool,
    redo_enabled: bool,
    table_barrier_limit: usize,
}

impl TestHarnessBuilder {
    /// Sets the start ts of the changefeed. The initial schema snapshot is taken at it.
    pub fn start_ts(mut self, start_ts: Ts) -> Self {
        self.start_ts = start_ts;
        self
    }

    /// Sets the checkpoint the changefeed resumes from, `start_ts` by default.
    pub fn checkpoint_ts(mut self, checkpoint_ts: Ts) -> Self {
        self.checkpoint_ts = Some(checkpoint_ts);
        self
    }

    /// Adds tables that exist in the initial schema snapshot.
    pub fn with_tables(mut self, tables: impl IntoIterator<Item = TableInfo>) -> Self {
        self.tables.extend(tables);
        self
    }

    pub fn one_way_mode(mut self) -> Self {
        self.one_way_mode = true;
        self
    }

    pub fn with_redo(mut self) -> Self {
        self.redo_enabled = true;
        self
    }

    pub fn table_barrier_limit(mut self, table_barrier_limit: usize) -> Self {
        self.table_barrier_limit = table_barrier_limit;
        self
    }

    pub fn build(self) -> TestHarness {
        let snapshot = self
            .tables
            .into_iter()
            .fold(SchemaSnapshot::default().with_schema(TEST_SCHEMA_ID, TEST_SCHEMA), |snapshot, table| {
                snapshot.with_table(table)
            });
        let schema = MemorySchemaStore::new(self.start_ts, snapshot);

        let checkpoint_ts = self.checkpoint_ts.unwrap_or(self.start_ts);
        let (sender, source) = create_ddl_channel(checkpoint_ts);
        let redo = if self.redo_enabled {
            MemoryRedoLog::new()
        } else {
            MemoryRedoLog::disabled()
        };
        let sink = MemoryDdlSink::new();

        let options = CoordinatorOptions {
            changefeed_id: "default/test-changefeed".to_string(),
            start_ts: self.start_ts,
            checkpoint_ts,
            one_way_mode: self.one_way_mode,
            downstream: DownstreamType::Mysql,
            redo_enabled: self.redo_enabled,
            table_barrier_limit: self.table_barrier_limit,
        };
        let coordinator = DdlCoordinator::new(
            options,
            source,
            schema,
            redo.clone(),
            redo.clone(),
            sink.clone(),
        )
        .expect("failed to create the test coordinator");

        TestHarness {
            coordinator,
            sender,
            redo,
            sink,
        }
    }
}

/// A coordinator under test plus handles to its collaborators.
#[derive(Debug)]
pub struct TestHarness {
    pub coordinator: TestCoordinator,
    pub sender: DdlJobSender,
    pub redo: MemoryRedoLog,
    pub sink: MemoryDdlSink,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder {
            start_ts: 100,
            checkpoint_ts: None,
            tables: Vec::new(),
            one_way_mode: false,
            redo_enabled: false,
            table_barrier_limit: DEFAULT_TABLE_BARRIER_LIMIT,
        }
    }

    /// Pushes jobs into the DDL stream and resolves it up to `resolved_ts`.
    pub fn send_jobs(&mut self, jobs: impl IntoIterator<Item = DdlJob>, resolved_ts: Ts) {
        for job in jobs {
            self.sender
                .send_job(job)
                .expect("failed to send the ddl job");
        }
        self.sender.advance_resolved_ts(resolved_ts);
    }

    /// Ticks the coordinator without per-table checkpoints.
    pub async fn tick(&mut self, checkpoint_ts: Ts) -> CdcResult<TickOutput> {
        self.coordinator.tick(checkpoint_ts, &BTreeMap::new()).await
    }

    pub async fn tick_with_tables(
        &mut self,
        checkpoint_ts: Ts,
        table_checkpoints: &BTreeMap<TableName, Ts>,
    ) -> CdcResult<TickOutput> {
        self.coordinator.tick(checkpoint_ts, table_checkpoints).await
    }
}

/// Waits until the worker publishes an output matching `predicate` and returns it.
///
/// # Panics
///
/// Panics when no matching output is published within [`DEFAULT_WAIT_TIMEOUT`].
pub async fn wait_for_output<F>(output_rx: &mut watch::Receiver<TickOutput>, predicate: F) -> TickOutput
where
    F: FnMut(&TickOutput) -> bool,
{
    match timeout(DEFAULT_WAIT_TIMEOUT, output_rx.wait_for(predicate)).await {
        Ok(Ok(output)) => output.clone(),
        Ok(Err(_)) => panic!("the worker stopped before publishing the expected output"),
        Err(_) => panic!(
            "no expected output was published within {:?}",
            DEFAULT_WAIT_TIMEOUT
        ),
    }
}
