//! Cancellation signal shared by background tasks.

use tokio::sync::broadcast;

/// One-shot stop signal fanned out to any number of tasks.
///
/// Receivers treat any `recv()` result as the signal: a value, a lag from
/// repeated triggers, or a closed channel. Dropping the `Shutdown` also
/// wakes every receiver (the channel closes), so an abandoned owner never
/// leaves tasks running.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe before spawning the task that listens, so the signal
    /// cannot be missed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of receivers that have not been dropped yet.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
