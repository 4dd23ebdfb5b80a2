use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
///
/// A single [`ShutdownTx`] can stop any number of workers. Shutdown is sticky: once sent,
/// every current and future subscriber observes it.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Requests all subscribed workers to shut down.
    pub fn shutdown(&self) {
        // Use infallible send to support shutting down before any receivers subscribe.
        self.0.send_replace(true);
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns `true` if shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until shutdown is requested.
    ///
    /// Resolves immediately if shutdown was already requested. If the transmitter is dropped
    /// without requesting shutdown, the future never resolves.
    pub async fn wait_for_shutdown(&mut self) {
        if self.0.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), ShutdownRx(rx))
}
