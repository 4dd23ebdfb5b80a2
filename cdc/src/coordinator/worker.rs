use cdc_config::shared::ChangefeedConfig;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::coordinator::DdlCoordinator;
use crate::error::CdcResult;
use crate::redo::{RedoDdlManager, RedoMetaManager};
use crate::schema::SchemaStore;
use crate::sink::DdlSink;
use crate::source::DdlJobSource;
use crate::types::{TableName, TickOutput, Ts};

/// Checkpoint progress reported by the table scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangefeedProgress {
    pub checkpoint_ts: Ts,
    pub table_checkpoints: BTreeMap<TableName, Ts>,
}

/// Handle to a running [`DdlCoordinatorWorker`].
#[derive(Debug)]
pub struct DdlCoordinatorWorkerHandle {
    join_handle: JoinHandle<CdcResult<()>>,
    output_rx: watch::Receiver<TickOutput>,
}

impl DdlCoordinatorWorkerHandle {
    /// Returns a receiver of the output of every tick.
    pub fn subscribe(&self) -> watch::Receiver<TickOutput> {
        self.output_rx.clone()
    }

    /// Waits for the worker to complete.
    ///
    /// Returns `Ok(())` after a graceful shutdown, the tick error that stopped the worker,
    /// or a [`crate::error::ErrorKind::CoordinatorWorkerPanic`] error if the worker panicked.
    pub async fn wait(self) -> CdcResult<()> {
        match self.join_handle.await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "ddl coordinator worker task panicked");
                Err(err.into())
            }
        }
    }
}

/// Worker that ticks a [`DdlCoordinator`] at a fixed interval.
///
/// Each tick reads the latest [`ChangefeedProgress`] and publishes the resulting
/// [`TickOutput`]. Shutdown is only observed between ticks, so a tick always runs to
/// completion.
pub struct DdlCoordinatorWorker<Src, S, R, M, K> {
    coordinator: DdlCoordinator<Src, S, R, M, K>,
    progress_rx: watch::Receiver<ChangefeedProgress>,
    output_tx: watch::Sender<TickOutput>,
    shutdown_rx: ShutdownRx,
    tick_interval: Duration,
}

impl<Src, S, R, M, K> DdlCoordinatorWorker<Src, S, R, M, K>
where
    Src: DdlJobSource + Send + 'static,
    S: SchemaStore + Send + Sync + 'static,
    R: RedoDdlManager + Send + Sync + 'static,
    M: RedoMetaManager + Send + Sync + 'static,
    K: DdlSink + Send + Sync + 'static,
{
    pub fn new(
        coordinator: DdlCoordinator<Src, S, R, M, K>,
        progress_rx: watch::Receiver<ChangefeedProgress>,
        shutdown_rx: ShutdownRx,
        tick_interval: Duration,
    ) -> Self {
        let (output_tx, _) = watch::channel(TickOutput::default());

        Self {
            coordinator,
            progress_rx,
            output_tx,
            shutdown_rx,
            tick_interval,
        }
    }

    /// Creates a worker ticking at the interval configured for the changefeed.
    pub fn from_config(
        config: &ChangefeedConfig,
        coordinator: DdlCoordinator<Src, S, R, M, K>,
        progress_rx: watch::Receiver<ChangefeedProgress>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self::new(coordinator, progress_rx, shutdown_rx, config.tick_interval())
    }

    /// Returns the interval between two ticks.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Starts the worker in a background task.
    pub fn start(self) -> DdlCoordinatorWorkerHandle {
        let output_rx = self.output_tx.subscribe();
        let join_handle = tokio::spawn(self.run());

        DdlCoordinatorWorkerHandle {
            join_handle,
            output_rx,
        }
    }

    async fn run(mut self) -> CdcResult<()> {
        let changefeed_id = self.coordinator.changefeed_id.clone();
        info!(
            changefeed_id = %changefeed_id,
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "starting ddl coordinator worker"
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!(changefeed_id = %changefeed_id, "ddl coordinator worker shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let progress = self.progress_rx.borrow_and_update().clone();
            let output = match self
                .coordinator
                .tick(progress.checkpoint_ts, &progress.table_checkpoints)
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    error!(
                        changefeed_id = %changefeed_id,
                        checkpoint_ts = progress.checkpoint_ts,
                        error = %err,
                        "ddl coordinator tick failed"
                    );
                    return Err(err);
                }
            };

            self.output_tx.send_replace(output);
        }
    }
}
