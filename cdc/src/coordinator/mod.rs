//! DDL coordination for a single changefeed.
//!
//! The [`DdlCoordinator`] pulls schema change jobs from the upstream DDL stream, applies them
//! to the schema store, queues the resulting DDL events per table and executes them one at a
//! time against the downstream once every row committed before a DDL has been delivered.
//! Each tick also yields the [`Barrier`] that bounds how far the table scheduler may advance
//! table checkpoints.
//!
//! The coordinator is driven by a single caller, usually a [`DdlCoordinatorWorker`], and is
//! the only writer of its own state.

mod barrier;
mod cache;
pub mod gate;
mod pending;
mod worker;

pub use barrier::{DEFAULT_TABLE_BARRIER_LIMIT, compute_barrier};
pub use worker::{ChangefeedProgress, DdlCoordinatorWorker, DdlCoordinatorWorkerHandle};

use cdc_config::shared::{ChangefeedConfig, DownstreamType};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, error, info, warn};

use crate::coordinator::cache::TableCache;
use crate::coordinator::gate::GateInput;
use crate::coordinator::pending::PendingDdls;
use crate::error::{CdcResult, ErrorKind};
use crate::failpoints::{
    BEFORE_EMIT_DDL, EXECUTE_DDL_NOT_DONE, cdc_fail_point, cdc_fail_point_active,
};
use crate::redo::{RedoDdlManager, RedoMetaManager};
use crate::schema::SchemaStore;
use crate::sink::DdlSink;
use crate::source::DdlJobSource;
use crate::types::{Barrier, DdlEvent, TableName, TickOutput, Ts};
use crate::{bail, cdc_error};

/// Settings of a [`DdlCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub changefeed_id: String,
    /// Initial start point of the changefeed.
    pub start_ts: Ts,
    /// Checkpoint the changefeed resumes from.
    pub checkpoint_ts: Ts,
    /// Tracks the schema without applying DDL downstream.
    pub one_way_mode: bool,
    pub downstream: DownstreamType,
    /// Whether the changefeed is configured with a redo log.
    pub redo_enabled: bool,
    pub table_barrier_limit: usize,
}

impl CoordinatorOptions {
    /// Builds the options of a changefeed resuming from `checkpoint_ts`.
    ///
    /// Fails when `config` does not pass validation.
    pub fn from_config(config: &ChangefeedConfig, checkpoint_ts: Ts) -> CdcResult<Self> {
        config.validate()?;

        Ok(Self {
            changefeed_id: config.qualified_id(),
            start_ts: config.start_ts,
            checkpoint_ts,
            one_way_mode: config.one_way_mode,
            downstream: config.sink.downstream,
            redo_enabled: config.redo.enabled,
            table_barrier_limit: config.barrier.table_barrier_limit,
        })
    }
}

/// Coordinates DDL execution and computes the table barrier of one changefeed.
#[derive(Debug)]
pub struct DdlCoordinator<Src, S, R, M, K> {
    changefeed_id: String,
    start_ts: Ts,
    checkpoint_ts: Ts,
    table_checkpoint: BTreeMap<TableName, Ts>,
    ddl_resolved_ts: Ts,
    one_way_mode: bool,
    table_barrier_limit: usize,

    source: Src,
    schema: S,
    redo_ddl: R,
    redo_meta: M,
    sink: K,

    pending: PendingDdls,
    /// Admitted DDL not yet written to the redo log, in commit order.
    unlogged_ddl: VecDeque<DdlEvent>,
    /// DDL currently being applied downstream.
    executing_ddl: Option<DdlEvent>,
    /// DDL that finished during the current tick.
    just_sent_ddl: Option<DdlEvent>,
    cache: TableCache,
}

impl<Src, S, R, M, K> DdlCoordinator<Src, S, R, M, K>
where
    Src: DdlJobSource,
    S: SchemaStore,
    R: RedoDdlManager,
    M: RedoMetaManager,
    K: DdlSink,
{
    /// Creates the coordinator of a changefeed.
    ///
    /// Fails when the downstream cannot apply changes in commit order or when the redo
    /// collaborators disagree with the configuration.
    pub fn new(
        options: CoordinatorOptions,
        source: Src,
        schema: S,
        redo_ddl: R,
        redo_meta: M,
        sink: K,
    ) -> CdcResult<Self> {
        if !options.downstream.is_commit_ordered() {
            bail!(
                ErrorKind::UnsupportedDownstream,
                "DDL coordination requires a commit ordered downstream",
                format!(
                    "changefeed {} replicates to {}",
                    options.changefeed_id, options.downstream
                )
            );
        }

        if options.redo_enabled != redo_ddl.enabled() || options.redo_enabled != redo_meta.enabled()
        {
            bail!(
                ErrorKind::ConfigError,
                "Redo log managers do not match the redo configuration",
                format!(
                    "redo enabled in config: {}, ddl manager: {}, meta manager: {}",
                    options.redo_enabled,
                    redo_ddl.enabled(),
                    redo_meta.enabled()
                )
            );
        }

        if options.table_barrier_limit == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Table barrier limit must be greater than zero"
            );
        }

        info!(
            changefeed_id = %options.changefeed_id,
            start_ts = options.start_ts,
            checkpoint_ts = options.checkpoint_ts,
            one_way_mode = options.one_way_mode,
            downstream = %options.downstream,
            redo_enabled = options.redo_enabled,
            "created ddl coordinator"
        );

        Ok(Self {
            changefeed_id: options.changefeed_id,
            start_ts: options.start_ts,
            checkpoint_ts: options.checkpoint_ts,
            table_checkpoint: BTreeMap::new(),
            ddl_resolved_ts: options.checkpoint_ts,
            one_way_mode: options.one_way_mode,
            table_barrier_limit: options.table_barrier_limit,
            source,
            schema,
            redo_ddl,
            redo_meta,
            sink,
            pending: PendingDdls::default(),
            unlogged_ddl: VecDeque::new(),
            executing_ddl: None,
            just_sent_ddl: None,
            cache: TableCache::default(),
        })
    }

    /// Runs one coordination round.
    ///
    /// Must not be called concurrently. The returned physical table ids are the tables the
    /// changefeed watches at the snapshot ts of this round, before any job pulled in this
    /// round is applied.
    ///
    /// # Panics
    ///
    /// Panics when `checkpoint_ts` is past the commit ts of the next DDL to execute. The
    /// checkpoint bookkeeping upstream is then corrupted and the changefeed must not go on.
    pub async fn tick(
        &mut self,
        checkpoint_ts: Ts,
        table_checkpoints: &BTreeMap<TableName, Ts>,
    ) -> CdcResult<TickOutput> {
        self.just_sent_ddl = None;
        self.update_checkpoint_ts(checkpoint_ts, table_checkpoints);

        let snapshot_ts = self.snapshot_ts();
        let tables = self.cache.tables(&self.schema, snapshot_ts).await?;
        if self.executing_ddl.is_none() {
            self.sink.emit_checkpoint_ts(self.checkpoint_ts, tables);
        }

        let physical_table_ids = self
            .cache
            .physical_table_ids(&self.schema, snapshot_ts)
            .await?
            .to_vec();

        self.handle_ddl_jobs().await?;
        self.advance_ddl_resolved_ts().await?;

        if let Some(next_ddl) = self.next_ddl() {
            if self.checkpoint_ts > next_ddl.commit_ts {
                error!(
                    changefeed_id = %self.changefeed_id,
                    checkpoint_ts = self.checkpoint_ts,
                    commit_ts = next_ddl.commit_ts,
                    query = %next_ddl.query,
                    "checkpoint ts is greater than the commit ts of the next ddl"
                );
                panic!(
                    "checkpoint ts {} is greater than the commit ts {} of the next ddl",
                    self.checkpoint_ts, next_ddl.commit_ts
                );
            }

            if gate::should_execute(&self.gate_input(), next_ddl.commit_ts) {
                info!(
                    changefeed_id = %self.changefeed_id,
                    commit_ts = next_ddl.commit_ts,
                    checkpoint_ts = self.checkpoint_ts,
                    query = %next_ddl.query,
                    "execute a ddl event"
                );

                if self.executing_ddl.is_none() {
                    self.executing_ddl = Some(next_ddl);
                    self.cache.invalidate();
                }

                self.execute_ddl().await?;
            }
        }

        let (min_table_barrier_ts, barrier) = self.barrier();

        Ok(TickOutput {
            physical_table_ids,
            min_table_barrier_ts,
            barrier,
        })
    }

    /// Returns the DDL currently being applied downstream.
    pub fn executing_ddl(&self) -> Option<&DdlEvent> {
        self.executing_ddl.as_ref()
    }

    /// Returns the number of DDL events waiting in all table queues.
    pub fn pending_ddl_count(&self) -> usize {
        self.pending.len()
    }

    pub fn ddl_resolved_ts(&self) -> Ts {
        self.ddl_resolved_ts
    }

    pub fn checkpoint_ts(&self) -> Ts {
        self.checkpoint_ts
    }

    pub fn table_checkpoint(&self, table_name: &TableName) -> Option<Ts> {
        self.table_checkpoint.get(table_name).copied()
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    fn update_checkpoint_ts(
        &mut self,
        checkpoint_ts: Ts,
        table_checkpoints: &BTreeMap<TableName, Ts>,
    ) {
        self.checkpoint_ts = checkpoint_ts;
        self.table_checkpoint
            .retain(|table_name, _| table_checkpoints.contains_key(table_name));
        self.table_checkpoint.extend(
            table_checkpoints
                .iter()
                .map(|(table_name, ts)| (table_name.clone(), *ts)),
        );
    }

    /// Returns the ts at which the watched tables are listed.
    fn snapshot_ts(&self) -> Ts {
        if self.checkpoint_ts == self.start_ts.saturating_add(1) && self.executing_ddl.is_none() {
            debug!(
                changefeed_id = %self.changefeed_id,
                start_ts = self.start_ts,
                checkpoint_ts = self.checkpoint_ts,
                "changefeed just started, listing tables at start ts"
            );
            return self.start_ts;
        }

        if self.one_way_mode {
            return self.ddl_resolved_ts;
        }

        self.checkpoint_ts
    }

    /// Drains the DDL stream, applying every job and queueing the admitted events.
    async fn handle_ddl_jobs(&mut self) -> CdcResult<()> {
        // Events left over by a failed redo write come before anything still in the stream.
        self.log_admitted_ddl().await?;

        while let Some(job) = self.source.pop_front_ddl() {
            info!(
                changefeed_id = %self.changefeed_id,
                job_id = job.id,
                commit_ts = job.commit_ts,
                action = %job.action,
                query = %job.query,
                "handle a ddl job"
            );

            let events = self.schema.build_ddl_events(&job)?;
            self.schema.handle_ddl(&job)?;
            self.cache.invalidate();

            for event in events {
                if self.one_way_mode {
                    info!(
                        changefeed_id = %self.changefeed_id,
                        commit_ts = event.commit_ts,
                        query = %event.query,
                        "changefeed is in one-way mode, skip a ddl event"
                    );
                    continue;
                }

                if self
                    .schema
                    .is_ineligible_table_id(event.table_name().table_id)
                {
                    warn!(
                        changefeed_id = %self.changefeed_id,
                        commit_ts = event.commit_ts,
                        table = %event.table_name(),
                        query = %event.query,
                        "ignore the ddl event of an ineligible table"
                    );
                    continue;
                }

                self.unlogged_ddl.push_back(event);
            }

            self.log_admitted_ddl().await?;
        }

        Ok(())
    }

    /// Writes admitted events to the redo log, queueing each one only once it is logged.
    ///
    /// An event whose write fails stays unlogged and is written again by the next tick.
    async fn log_admitted_ddl(&mut self) -> CdcResult<()> {
        while let Some(event) = self.unlogged_ddl.front() {
            if self.redo_ddl.enabled() {
                self.redo_ddl.emit_ddl_event(event).await?;
            }

            if let Some(event) = self.unlogged_ddl.pop_front() {
                self.pending.push(event)?;
            }
        }

        Ok(())
    }

    /// Advances the resolved ts view, never past what the redo log acknowledged.
    async fn advance_ddl_resolved_ts(&mut self) -> CdcResult<()> {
        let mut resolved_ts = self.source.resolved_ts();
        self.schema.advance_resolved_ts(resolved_ts);

        if self.redo_ddl.enabled() {
            self.redo_ddl.update_resolved_ts(resolved_ts).await?;
            resolved_ts = resolved_ts.min(self.redo_ddl.resolved_ts());
        }

        if resolved_ts > self.ddl_resolved_ts {
            self.ddl_resolved_ts = resolved_ts;
        }

        Ok(())
    }

    /// Returns the executing DDL, or else the oldest pending one.
    fn next_ddl(&mut self) -> Option<DdlEvent> {
        if let Some(executing_ddl) = &self.executing_ddl {
            return Some(executing_ddl.clone());
        }

        self.pending.next().cloned()
    }

    fn gate_input(&self) -> GateInput {
        let redo_checkpoint_ts = self
            .redo_meta
            .enabled()
            .then(|| self.redo_meta.flushed_meta().checkpoint_ts);

        GateInput {
            checkpoint_ts: self.checkpoint_ts,
            redo_checkpoint_ts,
            ddl_resolved_ts: self.ddl_resolved_ts,
        }
    }

    /// Hands the executing DDL to the sink and retires it once the sink reports it done.
    async fn execute_ddl(&mut self) -> CdcResult<()> {
        let Some(executing_ddl) = &self.executing_ddl else {
            return Ok(());
        };

        if cdc_fail_point_active(EXECUTE_DDL_NOT_DONE) {
            debug!(
                changefeed_id = %self.changefeed_id,
                commit_ts = executing_ddl.commit_ts,
                "ddl held back by fail point"
            );
            return Ok(());
        }
        cdc_fail_point(BEFORE_EMIT_DDL)?;

        if !self.sink.emit_ddl_event(executing_ddl).await? {
            return Ok(());
        }

        let Some(executed_ddl) = self.executing_ddl.take() else {
            return Ok(());
        };

        let table_name = executed_ddl.table_name();
        match self.pending.pop_front(table_name) {
            Some(head) if head.commit_ts == executed_ddl.commit_ts => {}
            head => {
                return Err(cdc_error!(
                    ErrorKind::InvalidState,
                    "Executed DDL is not the head of its table queue",
                    format!(
                        "executed ddl at {} on {}, queue head was {:?}",
                        executed_ddl.commit_ts,
                        table_name,
                        head.map(|head| head.commit_ts)
                    )
                ));
            }
        }

        info!(
            changefeed_id = %self.changefeed_id,
            commit_ts = executed_ddl.commit_ts,
            table = %table_name,
            query = %executed_ddl.query,
            "execute a ddl event successfully"
        );

        self.schema.do_gc(executed_ddl.commit_ts.saturating_sub(1));
        self.just_sent_ddl = Some(executed_ddl);

        Ok(())
    }

    /// Computes the barrier of this tick and forgets the DDL that finished in it.
    fn barrier(&mut self) -> (Ts, Barrier) {
        let events = self.pending.heads().chain(self.just_sent_ddl.as_ref());
        let barrier = compute_barrier(events, self.ddl_resolved_ts, self.table_barrier_limit);
        self.just_sent_ddl = None;

        barrier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redo::DisabledRedo;
    use crate::schema::{MemorySchemaStore, SchemaSnapshot};
    use crate::sink::MemoryDdlSink;
    use crate::source::{ChannelDdlSource, create_ddl_channel};

    type TestCoordinator =
        DdlCoordinator<ChannelDdlSource, MemorySchemaStore, DisabledRedo, DisabledRedo, MemoryDdlSink>;

    fn options(downstream: DownstreamType) -> CoordinatorOptions {
        CoordinatorOptions {
            changefeed_id: "default/test".to_string(),
            start_ts: 100,
            checkpoint_ts: 100,
            one_way_mode: false,
            downstream,
            redo_enabled: false,
            table_barrier_limit: DEFAULT_TABLE_BARRIER_LIMIT,
        }
    }

    fn coordinator(options: CoordinatorOptions) -> CdcResult<TestCoordinator> {
        let (_sender, source) = create_ddl_channel(100);
        let schema = MemorySchemaStore::new(100, SchemaSnapshot::default().with_schema(1, "test"));

        DdlCoordinator::new(
            options,
            source,
            schema,
            DisabledRedo,
            DisabledRedo,
            MemoryDdlSink::new(),
        )
    }

    #[test]
    fn non_commit_ordered_downstreams_are_rejected() {
        for downstream in [
            DownstreamType::Kafka,
            DownstreamType::Pulsar,
            DownstreamType::Storage,
        ] {
            let err = coordinator(options(downstream)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedDownstream);
        }

        assert!(coordinator(options(DownstreamType::Mysql)).is_ok());
        assert!(coordinator(options(DownstreamType::Tidb)).is_ok());
    }

    #[test]
    fn redo_mismatch_is_rejected() {
        let mut options = options(DownstreamType::Mysql);
        options.redo_enabled = true;

        let err = coordinator(options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn snapshot_ts_follows_start_ts_then_checkpoint() {
        let mut coordinator = coordinator(options(DownstreamType::Mysql)).unwrap();

        coordinator.checkpoint_ts = 101;
        assert_eq!(coordinator.snapshot_ts(), 100);

        coordinator.checkpoint_ts = 130;
        coordinator.ddl_resolved_ts = 150;
        assert_eq!(coordinator.snapshot_ts(), 130);

        coordinator.one_way_mode = true;
        assert_eq!(coordinator.snapshot_ts(), 150);
    }

    #[test]
    fn table_checkpoints_are_replaced() {
        let mut coordinator = coordinator(options(DownstreamType::Mysql)).unwrap();
        let t1 = TableName::new("test", "t1", 1);
        let t2 = TableName::new("test", "t2", 2);

        coordinator.update_checkpoint_ts(
            110,
            &BTreeMap::from([(t1.clone(), 110), (t2.clone(), 105)]),
        );
        assert_eq!(coordinator.table_checkpoint(&t2), Some(105));

        coordinator.update_checkpoint_ts(120, &BTreeMap::from([(t1.clone(), 120)]));
        assert_eq!(coordinator.checkpoint_ts(), 120);
        assert_eq!(coordinator.table_checkpoint(&t1), Some(120));
        assert_eq!(coordinator.table_checkpoint(&t2), None);
    }

    #[test]
    fn options_from_invalid_config_are_rejected() {
        let mut config: ChangefeedConfig = serde_json::from_str(
            r#"{ "id": "orders", "start_ts": 100, "sink": { "downstream": "kafka" } }"#,
        )
        .unwrap();

        let err = CoordinatorOptions::from_config(&config, 120).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        config.sink.downstream = DownstreamType::Tidb;
        let options = CoordinatorOptions::from_config(&config, 120).unwrap();
        assert_eq!(options.changefeed_id, "default/orders");
        assert_eq!(options.checkpoint_ts, 120);
        assert_eq!(options.table_barrier_limit, DEFAULT_TABLE_BARRIER_LIMIT);
    }
}
