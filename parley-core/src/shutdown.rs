use tokio::sync::broadcast;

/// Coordinates orderly termination across tasks. Clones made from one
/// [`Shutdown`] are all connected: tripping any of them wakes every waiter.
#[derive(Debug, Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    /// Signals every connected waiter to shut down.
    pub fn shut_down(&self) {
        if self.notify.send(()).is_err() {
            tracing::debug!("no tasks were waiting on shutdown");
        }
    }

    /// A receiver for use inside `select!` loops. Subscribe before spawning
    /// the work that might trip the shutdown, or the signal can be missed.
    pub fn receiver(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Waits until some connected handle trips the shutdown.
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.notify.subscribe();
        // Lagging still means a shutdown was sent.
        let _ = receiver.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
