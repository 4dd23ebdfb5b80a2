use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bail;
use crate::error::{CdcError, CdcResult, ErrorKind};
use crate::sink::{DdlSink, SinkCheckpoint};
use crate::types::{DdlEvent, TableInfo, TableName, Ts};

/// Trait for the component that actually runs a DDL statement against the downstream.
pub trait DdlApplier: Send + Sync + 'static {
    fn apply_ddl(&self, event: &DdlEvent) -> impl Future<Output = CdcResult<()>> + Send;
}

#[derive(Debug)]
struct InFlightDdl {
    commit_ts: Ts,
    table_name: TableName,
    handle: JoinHandle<CdcResult<()>>,
}

impl InFlightDdl {
    fn is_for(&self, event: &DdlEvent) -> bool {
        self.commit_ts == event.commit_ts && &self.table_name == event.table_name()
    }
}

#[derive(Debug, Default)]
struct State {
    in_flight: Option<InFlightDdl>,
    finished_ts: Option<Ts>,
    /// Tables whose DDL at `finished_ts` already completed.
    finished_tables: HashSet<TableName>,
}

impl State {
    fn is_finished(&self, event: &DdlEvent) -> bool {
        match self.finished_ts {
            Some(finished_ts) if event.commit_ts < finished_ts => true,
            Some(finished_ts) if event.commit_ts == finished_ts => {
                self.finished_tables.contains(event.table_name())
            }
            _ => false,
        }
    }

    fn mark_finished(&mut self, commit_ts: Ts, table_name: TableName) {
        if self.finished_ts != Some(commit_ts) {
            self.finished_ts = Some(commit_ts);
            self.finished_tables.clear();
        }
        self.finished_tables.insert(table_name);
    }
}

/// DDL sink that applies each DDL on a background task.
///
/// The first call for a DDL spawns the task and returns `false`. Later calls for the same DDL
/// return `false` while the task runs, then report its outcome once: `true` on success, the
/// task error on failure, or [`ErrorKind::DdlSinkPanic`] when the task panicked. A failed DDL
/// is spawned again on the next call.
#[derive(Debug)]
pub struct BackgroundDdlSink<A> {
    applier: Arc<A>,
    state: Mutex<State>,
    checkpoint: watch::Sender<SinkCheckpoint>,
}

impl<A> BackgroundDdlSink<A>
where
    A: DdlApplier,
{
    pub fn new(applier: A) -> Self {
        let (checkpoint, _) = watch::channel(SinkCheckpoint::default());

        Self {
            applier: Arc::new(applier),
            state: Mutex::new(State::default()),
            checkpoint,
        }
    }

    pub fn subscribe_checkpoint(&self) -> watch::Receiver<SinkCheckpoint> {
        self.checkpoint.subscribe()
    }

    /// Waits for the in-flight DDL, if any, and reports its outcome.
    async fn finish(&self, state: &mut State, in_flight: InFlightDdl) -> CdcResult<bool> {
        let InFlightDdl {
            commit_ts,
            table_name,
            handle,
        } = in_flight;

        match handle.await {
            Ok(Ok(())) => {
                info!(commit_ts, table = %table_name, "ddl applied downstream");
                state.mark_finished(commit_ts, table_name);

                Ok(true)
            }
            Ok(Err(err)) => {
                error!(commit_ts, table = %table_name, error = %err, "ddl failed downstream");

                Err(err)
            }
            Err(err) if err.is_panic() => {
                error!(commit_ts, table = %table_name, "ddl task panicked");

                Err(CdcError::from((
                    ErrorKind::DdlSinkPanic,
                    "DDL task panicked",
                    format!("ddl at {commit_ts} on {table_name}"),
                ))
                .with_source(err))
            }
            Err(err) => Err(CdcError::from((
                ErrorKind::DdlSinkError,
                "DDL task was cancelled",
                format!("ddl at {commit_ts} on {table_name}"),
            ))
            .with_source(err)),
        }
    }
}

impl<A> DdlSink for BackgroundDdlSink<A>
where
    A: DdlApplier,
{
    fn emit_checkpoint_ts(&self, checkpoint_ts: Ts, tables: &[TableInfo]) {
        self.checkpoint
            .send_replace(SinkCheckpoint::new(checkpoint_ts, tables));
    }

    async fn emit_ddl_event(&self, event: &DdlEvent) -> CdcResult<bool> {
        let mut state = self.state.lock().await;
        if state.is_finished(event) {
            return Ok(true);
        }

        if let Some(in_flight) = state.in_flight.take() {
            if !in_flight.is_for(event) {
                let detail = format!(
                    "ddl at {} on {} requested while ddl at {} on {} is running",
                    event.commit_ts,
                    event.table_name(),
                    in_flight.commit_ts,
                    in_flight.table_name
                );
                state.in_flight = Some(in_flight);
                bail!(
                    ErrorKind::InvalidState,
                    "Another DDL is already being applied",
                    detail
                );
            }

            if !in_flight.handle.is_finished() {
                state.in_flight = Some(in_flight);
                return Ok(false);
            }

            return self.finish(&mut state, in_flight).await;
        }

        info!(commit_ts = event.commit_ts, query = %event.query, "applying ddl downstream");

        let applier = self.applier.clone();
        let owned_event = event.clone();
        let handle = tokio::spawn(async move { applier.apply_ddl(&owned_event).await });
        state.in_flight = Some(InFlightDdl {
            commit_ts: event.commit_ts,
            table_name: event.table_name().clone(),
            handle,
        });

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct GatedApplier {
        release: Notify,
        applied: AtomicUsize,
        panic: bool,
        fail: bool,
    }

    impl DdlApplier for GatedApplier {
        async fn apply_ddl(&self, _event: &DdlEvent) -> CdcResult<()> {
            self.release.notified().await;
            if self.panic {
                panic!("applier panicked");
            }
            if self.fail {
                bail!(ErrorKind::DdlSinkError, "Downstream rejected the DDL");
            }
            self.applied.fetch_add(1, Ordering::SeqCst);

            Ok(())
        }
    }

    fn event(table: &str, commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            action: ActionType::AddColumn,
            table_info: TableInfo::new("test", table, 1),
            pre_table_info: None,
            query: format!("ALTER TABLE {table} ADD COLUMN c INT"),
        }
    }

    async fn wait_until_finished<A: DdlApplier>(sink: &BackgroundDdlSink<A>) {
        loop {
            let finished = {
                let state = sink.state.lock().await;
                state
                    .in_flight
                    .as_ref()
                    .is_none_or(|in_flight| in_flight.handle.is_finished())
            };
            if finished {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn ddl_is_applied_once_and_reported_done() {
        let applier = GatedApplier::default();
        let sink = BackgroundDdlSink::new(applier);
        let ddl = event("t1", 100);

        assert!(!sink.emit_ddl_event(&ddl).await.unwrap());
        assert!(!sink.emit_ddl_event(&ddl).await.unwrap());

        sink.applier.release.notify_one();
        wait_until_finished(&sink).await;

        assert!(sink.emit_ddl_event(&ddl).await.unwrap());
        assert!(sink.emit_ddl_event(&ddl).await.unwrap());
        assert!(sink.emit_ddl_event(&event("t1", 90)).await.unwrap());
        assert_eq!(sink.applier.applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ddl_on_another_table_at_the_same_ts_is_applied() {
        let sink = BackgroundDdlSink::new(GatedApplier::default());

        assert!(!sink.emit_ddl_event(&event("t1", 100)).await.unwrap());
        sink.applier.release.notify_one();
        wait_until_finished(&sink).await;
        assert!(sink.emit_ddl_event(&event("t1", 100)).await.unwrap());

        assert!(!sink.emit_ddl_event(&event("t2", 100)).await.unwrap());
    }

    #[tokio::test]
    async fn task_failure_is_propagated() {
        let applier = GatedApplier {
            fail: true,
            ..Default::default()
        };
        let sink = BackgroundDdlSink::new(applier);
        let ddl = event("t1", 100);

        assert!(!sink.emit_ddl_event(&ddl).await.unwrap());
        sink.applier.release.notify_one();
        wait_until_finished(&sink).await;

        let err = sink.emit_ddl_event(&ddl).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DdlSinkError);
    }

    #[tokio::test]
    async fn task_panic_is_reported() {
        let applier = GatedApplier {
            panic: true,
            ..Default::default()
        };
        let sink = BackgroundDdlSink::new(applier);
        let ddl = event("t1", 100);

        assert!(!sink.emit_ddl_event(&ddl).await.unwrap());
        sink.applier.release.notify_one();
        wait_until_finished(&sink).await;

        let err = sink.emit_ddl_event(&ddl).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DdlSinkPanic);
    }

    #[tokio::test]
    async fn concurrent_ddl_is_rejected() {
        let sink = BackgroundDdlSink::new(GatedApplier::default());

        assert!(!sink.emit_ddl_event(&event("t1", 100)).await.unwrap());
        let err = sink.emit_ddl_event(&event("t2", 110)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
