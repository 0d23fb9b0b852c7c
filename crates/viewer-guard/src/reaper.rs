//! Background deletion of expired rules.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::guard::AccessGuard;

/// Periodically reaps expired rules from an [`AccessGuard`].
#[derive(Debug, Clone)]
pub struct Reaper {
    guard: Arc<AccessGuard>,
    interval: Duration,
}

impl Reaper {
    /// Create a reaper running every `interval`.
    #[must_use]
    pub const fn new(guard: Arc<AccessGuard>, interval: Duration) -> Self {
        Self { guard, interval }
    }

    /// Spawn the reaper on the current tokio runtime.
    ///
    /// Returns `None` when the reaper is disabled in `config`.
    #[must_use]
    pub fn spawn(
        guard: Arc<AccessGuard>,
        config: &ReaperConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if !config.enabled {
            info!("Expiry reaper disabled");
            return None;
        }
        let reaper = Self::new(guard, config.interval());
        Some(tokio::spawn(reaper.run(shutdown)))
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Starting expiry reaper");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.pass().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Expiry reaper shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One reap on the blocking pool, since a snapshot-backed store writes
    /// to disk.
    async fn pass(&self) {
        let guard = Arc::clone(&self.guard);
        match tokio::task::spawn_blocking(move || guard.reap()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => debug!(removed, "Reaped expired blocks"),
            Ok(Err(e)) => warn!(error = %e, "Expiry reap failed"),
            Err(e) => warn!(error = %e, "Expiry reap task failed"),
        }
    }
}
