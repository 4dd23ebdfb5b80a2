use crate::error::CdcResult;
use crate::redo::{FlushedMeta, RedoDdlManager, RedoMetaManager};
use crate::types::{DdlEvent, Ts};

/// Redo log for changefeeds that run without one.
///
/// Every operation is a no-op. The coordinator checks [`RedoDdlManager::enabled`] before
/// calling into it, so the reported timestamps are never used for gating.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRedo;

impl RedoDdlManager for DisabledRedo {
    fn enabled(&self) -> bool {
        false
    }

    async fn emit_ddl_event(&self, _event: &DdlEvent) -> CdcResult<()> {
        Ok(())
    }

    async fn update_resolved_ts(&self, _resolved_ts: Ts) -> CdcResult<()> {
        Ok(())
    }

    fn resolved_ts(&self) -> Ts {
        Ts::MAX
    }
}

impl RedoMetaManager for DisabledRedo {
    fn enabled(&self) -> bool {
        false
    }

    fn flushed_meta(&self) -> FlushedMeta {
        FlushedMeta::default()
    }
}
