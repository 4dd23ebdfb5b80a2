use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::redo::{FlushedMeta, RedoDdlManager, RedoMetaManager};
use crate::types::{DdlEvent, Ts};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<DdlEvent>,
    fail_emit: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    /// Latest resolved ts forwarded by the coordinator.
    upstream_resolved_ts: Ts,
    /// Upper bound on what the log acknowledges, simulating a lagging flush.
    hold_resolved_ts_at: Option<Ts>,
    flushed: FlushedMeta,
}

impl Progress {
    fn acknowledge(&mut self) {
        let acknowledged = match self.hold_resolved_ts_at {
            Some(hold) => self.upstream_resolved_ts.min(hold),
            None => self.upstream_resolved_ts,
        };
        self.flushed.resolved_ts = self.flushed.resolved_ts.max(acknowledged);
    }
}

/// In-memory redo log for testing and development purposes.
///
/// Implements both [`RedoDdlManager`] and [`RedoMetaManager`]. Clones share the same state,
/// so a test can keep one handle to steer the flushed progress while the coordinator owns
/// another.
#[derive(Debug, Clone)]
pub struct MemoryRedoLog {
    enabled: bool,
    inner: Arc<Mutex<Inner>>,
    progress: Arc<watch::Sender<Progress>>,
}

impl MemoryRedoLog {
    /// Creates an enabled redo log.
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Creates a redo log that reports itself as disabled.
    ///
    /// Lets tests swap redo on and off without changing the coordinator type.
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        let (progress, _) = watch::channel(Progress::default());

        Self {
            enabled,
            inner: Arc::new(Mutex::new(Inner::default())),
            progress: Arc::new(progress),
        }
    }

    /// Returns a copy of every DDL event written to the log.
    pub async fn events(&self) -> Vec<DdlEvent> {
        let inner = self.inner.lock().await;
        inner.events.clone()
    }

    /// Makes every following [`RedoDdlManager::emit_ddl_event`] call fail until reset.
    pub async fn fail_emit(&self, fail: bool) {
        let mut inner = self.inner.lock().await;
        inner.fail_emit = fail;
    }

    /// Caps the acknowledged resolved ts at `ts` until [`MemoryRedoLog::release_resolved_ts`].
    pub fn hold_resolved_ts_at(&self, ts: Ts) {
        self.progress.send_modify(|progress| {
            progress.hold_resolved_ts_at = Some(ts);
        });
    }

    /// Lets the acknowledged resolved ts catch up with the latest forwarded one.
    pub fn release_resolved_ts(&self) {
        self.progress.send_modify(|progress| {
            progress.hold_resolved_ts_at = None;
            progress.acknowledge();
        });
    }

    /// Sets the checkpoint that the redo meta reports as flushed.
    pub fn set_flushed_checkpoint_ts(&self, checkpoint_ts: Ts) {
        self.progress.send_modify(|progress| {
            progress.flushed.checkpoint_ts = checkpoint_ts;
        });
    }
}

impl Default for MemoryRedoLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RedoDdlManager for MemoryRedoLog {
    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn emit_ddl_event(&self, event: &DdlEvent) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_emit {
            bail!(
                ErrorKind::RedoLogError,
                "Failed to write DDL event to the redo log",
                format!("event at {} on {}", event.commit_ts, event.table_name())
            );
        }

        debug!(commit_ts = event.commit_ts, query = %event.query, "ddl event written to redo log");
        inner.events.push(event.clone());

        Ok(())
    }

    async fn update_resolved_ts(&self, resolved_ts: Ts) -> CdcResult<()> {
        self.progress.send_modify(|progress| {
            progress.upstream_resolved_ts = progress.upstream_resolved_ts.max(resolved_ts);
            progress.acknowledge();
        });

        Ok(())
    }

    fn resolved_ts(&self) -> Ts {
        self.progress.borrow().flushed.resolved_ts
    }
}

impl RedoMetaManager for MemoryRedoLog {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn flushed_meta(&self) -> FlushedMeta {
        self.progress.borrow().flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, TableInfo};

    fn event(commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            action: ActionType::AddColumn,
            table_info: TableInfo::new("test", "t1", 1),
            pre_table_info: None,
            query: "ALTER TABLE t1 ADD COLUMN c INT".to_string(),
        }
    }

    #[tokio::test]
    async fn held_resolved_ts_catches_up_on_release() {
        let redo = MemoryRedoLog::new();
        redo.hold_resolved_ts_at(120);

        redo.update_resolved_ts(200).await.unwrap();
        assert_eq!(redo.resolved_ts(), 120);

        redo.release_resolved_ts();
        assert_eq!(redo.resolved_ts(), 200);

        // Acknowledged progress never moves backwards.
        redo.hold_resolved_ts_at(50);
        redo.update_resolved_ts(210).await.unwrap();
        assert_eq!(redo.resolved_ts(), 200);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let redo = MemoryRedoLog::new();
        let handle = redo.clone();

        redo.emit_ddl_event(&event(100)).await.unwrap();
        handle.set_flushed_checkpoint_ts(90);

        assert_eq!(handle.events().await.len(), 1);
        assert_eq!(redo.flushed_meta().checkpoint_ts, 90);
    }

    #[tokio::test]
    async fn emit_failure_is_reported() {
        let redo = MemoryRedoLog::new();
        redo.fail_emit(true).await;

        let err = redo.emit_ddl_event(&event(100)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RedoLogError);
        assert!(redo.events().await.is_empty());
    }
}
