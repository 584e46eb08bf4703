//! Topology-change handling: turn notifications into staleness.
//!
//! [`RefreshController`] owns the subscription side of the refresh watch
//! channel. Every delivery marks the locator's table stale; the rebuild
//! itself happens on the next lookup unless the eager policy is set, in
//! which case the controller rebuilds right here, off the notification
//! sender's task. Watch channels coalesce: however many signals pile up
//! between polls, the controller observes one change, which together with
//! the idempotent stale flag gives exactly one rebuild per burst.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::locator::RouteLocator;

/// Payload-free topology-changed marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSignal;

/// Create the refresh notification channel.
#[must_use]
pub fn channel() -> (watch::Sender<RefreshSignal>, watch::Receiver<RefreshSignal>) {
    watch::channel(RefreshSignal)
}

pub struct RefreshController {
    locator: Arc<RouteLocator>,
    eager: bool,
}

impl RefreshController {
    #[must_use]
    pub fn new(locator: Arc<RouteLocator>, eager: bool) -> Self {
        Self { locator, eager }
    }

    /// Consume notifications until every sender is dropped.
    pub fn spawn(self, mut rx: watch::Receiver<RefreshSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                self.locator.mark_stale();
                tracing::debug!(eager = self.eager, "routes outdated, table marked stale");

                if self.eager {
                    if let Err(e) = self.locator.try_rebuild().await {
                        tracing::warn!(error = %e, "eager route table rebuild failed");
                    }
                }
            }
            tracing::debug!("refresh controller shutting down");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::InMemoryRegistry;
    use crate::registry::ApplicationInstance;
    use url::Url;

    fn locator() -> Arc<RouteLocator> {
        let registry = Arc::new(InMemoryRegistry::new(vec![ApplicationInstance {
            id: "svc-a".into(),
            url: Url::parse("http://10.0.0.5:8080").unwrap(),
            version: None,
            endpoints: None,
            healthy: true,
        }]));
        Arc::new(RouteLocator::new(
            registry,
            "",
            "/api/applications/",
            vec![],
        ))
    }

    #[tokio::test]
    async fn signal_marks_table_stale() {
        let locator = locator();
        locator.try_rebuild().await.unwrap();
        assert!(!locator.is_stale());

        let (tx, rx) = channel();
        let handle = RefreshController::new(Arc::clone(&locator), false).spawn(rx);

        tx.send(RefreshSignal).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(locator.is_stale());
        // Lazy policy: the table itself has not been rebuilt yet.
        assert_eq!(locator.snapshot().await.version(), 1);
    }

    #[tokio::test]
    async fn eager_policy_rebuilds_on_signal() {
        let locator = locator();
        locator.try_rebuild().await.unwrap();

        let (tx, rx) = channel();
        let handle = RefreshController::new(Arc::clone(&locator), true).spawn(rx);

        tx.send(RefreshSignal).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(!locator.is_stale());
        assert_eq!(locator.snapshot().await.version(), 2);
    }

    #[tokio::test]
    async fn burst_of_signals_coalesces() {
        let locator = locator();
        locator.try_rebuild().await.unwrap();

        let (tx, rx) = channel();
        let handle = RefreshController::new(Arc::clone(&locator), true).spawn(rx);

        // Current-thread runtime: the controller task is not polled until
        // we await, so all three sends land before it looks at the channel.
        tx.send(RefreshSignal).unwrap();
        tx.send(RefreshSignal).unwrap();
        tx.send(RefreshSignal).unwrap();
        drop(tx);
        handle.await.unwrap();

        // The burst coalesced into exactly one rebuild.
        assert_eq!(locator.snapshot().await.version(), 2);
        assert!(!locator.is_stale());
    }
}
