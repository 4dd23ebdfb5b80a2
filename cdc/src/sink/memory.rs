use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::info;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::sink::{DdlSink, SinkCheckpoint};
use crate::types::{DdlEvent, TableInfo, Ts};

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<DdlEvent>,
    executed: Vec<DdlEvent>,
    not_done_rounds: usize,
    remaining_rounds: Option<usize>,
    fail_emit: bool,
}

/// In-memory DDL sink for testing and development purposes.
///
/// Every DDL reports "not done" for a configurable number of calls before completing, which
/// lets tests observe a DDL sitting in the executing slot across ticks.
#[derive(Debug, Clone)]
pub struct MemoryDdlSink {
    inner: Arc<Mutex<Inner>>,
    checkpoint: Arc<watch::Sender<SinkCheckpoint>>,
}

impl MemoryDdlSink {
    /// Creates a sink that completes every DDL on the first call.
    pub fn new() -> Self {
        let (checkpoint, _) = watch::channel(SinkCheckpoint::default());

        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            checkpoint: Arc::new(checkpoint),
        }
    }

    /// Makes every DDL report "not done" for `rounds` calls before completing.
    pub async fn set_not_done_rounds(&self, rounds: usize) {
        let mut inner = self.inner.lock().await;
        inner.not_done_rounds = rounds;
    }

    /// Makes every following emit fail until reset.
    pub async fn fail_emit(&self, fail: bool) {
        let mut inner = self.inner.lock().await;
        inner.fail_emit = fail;
    }

    /// Returns every event passed to [`DdlSink::emit_ddl_event`], including repeated calls.
    pub async fn calls(&self) -> Vec<DdlEvent> {
        let inner = self.inner.lock().await;
        inner.calls.clone()
    }

    /// Returns the events that completed, in execution order.
    pub async fn executed(&self) -> Vec<DdlEvent> {
        let inner = self.inner.lock().await;
        inner.executed.clone()
    }

    /// Returns the last checkpoint reported to the sink.
    pub fn checkpoint(&self) -> SinkCheckpoint {
        self.checkpoint.borrow().clone()
    }

    pub fn subscribe_checkpoint(&self) -> watch::Receiver<SinkCheckpoint> {
        self.checkpoint.subscribe()
    }
}

impl Default for MemoryDdlSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DdlSink for MemoryDdlSink {
    fn emit_checkpoint_ts(&self, checkpoint_ts: Ts, tables: &[TableInfo]) {
        self.checkpoint
            .send_replace(SinkCheckpoint::new(checkpoint_ts, tables));
    }

    async fn emit_ddl_event(&self, event: &DdlEvent) -> CdcResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(event.clone());

        if inner.fail_emit {
            bail!(
                ErrorKind::DdlSinkError,
                "Failed to execute DDL downstream",
                format!("query `{}` at {}", event.query, event.commit_ts)
            );
        }

        if inner.executed.contains(event) {
            return Ok(true);
        }

        let not_done_rounds = inner.not_done_rounds;
        let remaining = inner.remaining_rounds.get_or_insert(not_done_rounds);
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(false);
        }

        inner.remaining_rounds = None;
        info!(commit_ts = event.commit_ts, query = %event.query, "executed ddl downstream");
        inner.executed.push(event.clone());

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionType;

    fn event(commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            action: ActionType::AddIndex,
            table_info: TableInfo::new("test", "t1", 1),
            pre_table_info: None,
            query: "CREATE INDEX i ON t1 (c)".to_string(),
        }
    }

    #[tokio::test]
    async fn ddl_completes_after_not_done_rounds() {
        let sink = MemoryDdlSink::new();
        sink.set_not_done_rounds(2).await;

        assert!(!sink.emit_ddl_event(&event(100)).await.unwrap());
        assert!(!sink.emit_ddl_event(&event(100)).await.unwrap());
        assert!(sink.emit_ddl_event(&event(100)).await.unwrap());
        assert!(sink.emit_ddl_event(&event(100)).await.unwrap());

        assert_eq!(sink.calls().await.len(), 4);
        assert_eq!(sink.executed().await, vec![event(100)]);
    }

    #[tokio::test]
    async fn checkpoint_is_published() {
        let sink = MemoryDdlSink::new();
        let mut checkpoint_rx = sink.subscribe_checkpoint();

        sink.emit_checkpoint_ts(90, &[TableInfo::new("test", "t1", 1)]);

        assert!(checkpoint_rx.has_changed().unwrap());
        let checkpoint = checkpoint_rx.borrow_and_update().clone();
        assert_eq!(checkpoint.checkpoint_ts, 90);
        assert_eq!(checkpoint.table_names[0].table, "t1");
    }
}
