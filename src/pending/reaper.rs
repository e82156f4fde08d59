use super::PendingRegistry;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Run [`PendingRegistry::reap`] every `period` until `cancel` fires.
pub fn spawn_reaper(
    registry: Arc<PendingRegistry>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(10)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let report = registry.reap();
                    if report.removed > 0 {
                        tracing::debug!(removed = report.removed, "settled commands reaped");
                    }
                }
            }
        }
        tracing::debug!("pending command reaper stopped");
    })
}
