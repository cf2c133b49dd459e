use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

/// Broadcast-based shutdown coordinator.
///
/// Loops `select!` on [`wait`](Self::wait) or a receiver from
/// [`subscribe`](Self::subscribe) alongside their timers. Clones share state.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    trigger: broadcast::Sender<()>,
    shutting_down: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (trigger, _) = broadcast::channel(1);
        Self {
            trigger,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.trigger.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Trigger shutdown for all subscribers. Later calls only log.
    pub fn trigger(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(subscribers = self.trigger.receiver_count(), "shutdown signal triggered");
            let _ = self.trigger.send(());
        } else {
            warn!("shutdown already triggered");
        }
    }

    /// Resolves once shutdown has been triggered, including when it was
    /// triggered before this call.
    pub async fn wait(&self) {
        // Subscribe before reading the flag so a concurrent trigger is not missed.
        let mut rx = self.trigger.subscribe();
        if self.is_shutting_down() {
            return;
        }
        let _ = rx.recv().await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.trigger.receiver_count()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trigger_is_idempotent_and_shared_by_clones() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_shutting_down());
        signal.trigger();
        signal.trigger();
        assert!(clone.is_shutting_down());
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let signal = ShutdownSignal::new();
        let rx = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 1);
        drop(rx);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_trigger() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();
        signal.trigger();
        let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(got, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn wait_returns_after_earlier_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("wait should resolve immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_triggered() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!task.is_finished());

        signal.trigger();
        task.await.unwrap();
    }
}
