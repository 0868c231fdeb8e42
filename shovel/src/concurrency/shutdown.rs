use tokio::sync::watch;

/// Transmitter side of the stop signal shared by the pumps of a worker.
///
/// The signal is level triggered: once raised it stays raised, and receivers subscribing later
/// observe it immediately.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Raises the stop signal. Returns `false` if it was already raised.
    pub fn shutdown(&self) -> bool {
        // `send_replace` succeeds even when no receiver is subscribed yet.
        !self.0.send_replace(true)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the stop signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the stop signal is raised.
    ///
    /// Never resolves if every [`ShutdownTx`] was dropped without raising the signal.
    pub async fn wait(&mut self) {
        if self.0.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a new, not yet raised, stop signal.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), ShutdownRx(rx))
}
