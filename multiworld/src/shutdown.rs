use tokio::sync::watch;

/// Sender side, held by the client for one start/stop cycle.
#[derive(Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

/// Receiver side, cloned into the event pump and upload task.
#[derive(Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

/// Create a shutdown channel pair.
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

impl ShutdownTx {
    /// Signal all receivers to shut down.
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

impl ShutdownRx {
    /// Async wait until shutdown is signaled. Also returns once the sender
    /// is gone.
    pub async fn wait(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return; // sender dropped
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}
