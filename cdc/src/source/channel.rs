use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::source::DdlJobSource;
use crate::types::{DdlJob, Ts};

/// Jobs not yet popped together with the resolved ts announced by the producer.
#[derive(Debug)]
struct DdlStream {
    jobs: VecDeque<DdlJob>,
    resolved_ts: Ts,
}

#[derive(Debug, Clone)]
struct SharedDdlStream(Arc<Mutex<DdlStream>>);

impl SharedDdlStream {
    fn lock(&self) -> MutexGuard<'_, DdlStream> {
        // The stream holds no invariant a panicking holder could break halfway.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side of a [`ChannelDdlSource`].
///
/// The sender enforces the ordering contract of the DDL stream: jobs arrive with strictly
/// increasing commit ts, never at or below the resolved ts, and the resolved ts never moves
/// backwards.
#[derive(Debug)]
pub struct DdlJobSender {
    stream: SharedDdlStream,
    last_commit_ts: Option<Ts>,
}

impl DdlJobSender {
    /// Pushes a finished job into the stream.
    pub fn send_job(&mut self, job: DdlJob) -> CdcResult<()> {
        let mut stream = self.stream.lock();
        if job.commit_ts <= stream.resolved_ts {
            bail!(
                ErrorKind::DdlSourceError,
                "DDL job is below the resolved ts of the stream",
                format!(
                    "job {} has commit ts {} but the stream is resolved at {}",
                    job.id, job.commit_ts, stream.resolved_ts
                )
            );
        }

        if let Some(last_commit_ts) = self.last_commit_ts
            && job.commit_ts <= last_commit_ts
        {
            bail!(
                ErrorKind::DdlSourceError,
                "DDL job is out of commit order",
                format!(
                    "job {} has commit ts {} but the previous job was committed at {}",
                    job.id, job.commit_ts, last_commit_ts
                )
            );
        }

        self.last_commit_ts = Some(job.commit_ts);
        stream.jobs.push_back(job);

        Ok(())
    }

    /// Advances the resolved ts of the stream.
    ///
    /// Values at or below the current resolved ts are ignored.
    pub fn advance_resolved_ts(&self, resolved_ts: Ts) {
        let mut stream = self.stream.lock();
        if resolved_ts > stream.resolved_ts {
            stream.resolved_ts = resolved_ts;
            debug!(resolved_ts, "ddl stream resolved ts advanced");
        }
    }
}

/// [`DdlJobSource`] reading the jobs and resolved ts published by a [`DdlJobSender`].
///
/// While jobs are buffered the reported resolved ts stays below the oldest of them, so a
/// consumer that drained the stream before reading the resolved ts never skips a job.
#[derive(Debug)]
pub struct ChannelDdlSource {
    stream: SharedDdlStream,
}

impl DdlJobSource for ChannelDdlSource {
    fn pop_front_ddl(&mut self) -> Option<DdlJob> {
        self.stream.lock().jobs.pop_front()
    }

    fn resolved_ts(&self) -> Ts {
        let stream = self.stream.lock();
        match stream.jobs.front() {
            Some(job) => stream.resolved_ts.min(job.commit_ts - 1),
            None => stream.resolved_ts,
        }
    }
}

/// Creates a DDL stream whose resolved ts starts at `initial_resolved_ts`.
pub fn create_ddl_channel(initial_resolved_ts: Ts) -> (DdlJobSender, ChannelDdlSource) {
    let stream = SharedDdlStream(Arc::new(Mutex::new(DdlStream {
        jobs: VecDeque::new(),
        resolved_ts: initial_resolved_ts,
    })));

    let sender = DdlJobSender {
        stream: stream.clone(),
        last_commit_ts: None,
    };
    let source = ChannelDdlSource { stream };

    (sender, source)
}
