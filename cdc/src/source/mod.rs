//! Upstream DDL stream abstractions.
//!
//! A [`DdlJobSource`] yields finished schema change jobs in commit order together with the
//! resolved ts of the DDL stream. The coordinator drains it without blocking once per tick.

mod channel;

pub use channel::{ChannelDdlSource, DdlJobSender, create_ddl_channel};

use crate::types::{DdlJob, Ts};

/// Trait for the upstream stream of schema change jobs.
pub trait DdlJobSource {
    /// Pops the oldest job not yet handed out.
    ///
    /// Never blocks: returns [`None`] when no job is currently buffered.
    fn pop_front_ddl(&mut self) -> Option<DdlJob>;

    /// Returns the resolved ts of the DDL stream.
    ///
    /// No job with a commit ts at or below the returned value will be produced anymore.
    fn resolved_ts(&self) -> Ts;
}
