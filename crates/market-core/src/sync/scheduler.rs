//! Fixed-interval trigger for sync cycles.

use super::Syncer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Triggers [`Syncer::run_once`] at startup and then every `interval`.
///
/// Each tick runs in its own task, so a slow cycle never delays the timer;
/// the syncer itself skips ticks that overlap a running cycle.
pub struct SyncScheduler {
    syncer: Arc<Syncer>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(syncer: Arc<Syncer>, interval: Duration) -> Self {
        Self { syncer, interval }
    }

    /// Start the timer loop. It exits once `shutdown` observes `true` or its
    /// sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Plugin sync scheduled every {} seconds",
                self.interval.as_secs()
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Sync tick");
                        let syncer = self.syncer.clone();
                        tokio::spawn(async move {
                            syncer.run_once().await;
                        });
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Sync scheduler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
