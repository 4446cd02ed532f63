use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::UploadTrigger;

/// Decides when the next upload attempt starts.
pub(crate) enum TriggerDriver {
    /// Attempts only start on request.
    OnRequest,
    /// Attempts start every period, and on request.
    Periodic(Interval),
}

impl TriggerDriver {
    /// Must be called from within a tokio runtime.
    pub fn new(upload_trigger: UploadTrigger) -> TriggerDriver {
        match upload_trigger {
            UploadTrigger::Immediate => TriggerDriver::OnRequest,
            UploadTrigger::Periodic(period) => TriggerDriver::Periodic(periodic_interval(period)),
        }
    }

    /// Waits for the next attempt. Returns false once the queue is shutting down.
    pub async fn wait_next(&mut self, notify: &Notify, shutdown: &CancellationToken) -> bool {
        match self {
            TriggerDriver::OnRequest => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => false,
                    _ = notify.notified() => true,
                }
            }
            TriggerDriver::Periodic(interval) => {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => false,
                    _ = interval.tick() => true,
                    _ = notify.notified() => true,
                }
            }
        }
    }
}

// The first tick happens one period after creation.
fn periodic_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_periodic_driver_ticks() {
        let notify = Notify::new();
        let shutdown = CancellationToken::new();
        let start = Instant::now();
        let mut driver = TriggerDriver::new(UploadTrigger::Periodic(Duration::from_secs(1)));
        assert!(driver.wait_next(&notify, &shutdown).await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(driver.wait_next(&notify, &shutdown).await);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_driver_skips_missed_ticks() {
        let notify = Notify::new();
        let shutdown = CancellationToken::new();
        let start = Instant::now();
        let mut driver = TriggerDriver::new(UploadTrigger::Periodic(Duration::from_secs(1)));
        // A long attempt.
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(driver.wait_next(&notify, &shutdown).await);
        assert_eq!(start.elapsed(), Duration::from_millis(3_500));
        assert!(driver.wait_next(&notify, &shutdown).await);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_driver_on_request() {
        let notify = Notify::new();
        let shutdown = CancellationToken::new();
        let start = Instant::now();
        let mut driver = TriggerDriver::new(UploadTrigger::Periodic(Duration::from_secs(1)));
        notify.notify_one();
        assert!(driver.wait_next(&notify, &shutdown).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_request_driver() {
        let notify = Notify::new();
        let shutdown = CancellationToken::new();
        let mut driver = TriggerDriver::new(UploadTrigger::Immediate);
        // Requests made while nobody waits are kept, and coalesced.
        notify.notify_one();
        notify.notify_one();
        assert!(driver.wait_next(&notify, &shutdown).await);
        shutdown.cancel();
        assert!(!driver.wait_next(&notify, &shutdown).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stops_on_shutdown() {
        let notify = Notify::new();
        let shutdown = CancellationToken::new();
        let mut driver = TriggerDriver::new(UploadTrigger::Periodic(Duration::from_secs(1)));
        shutdown.cancel();
        notify.notify_one();
        assert!(!driver.wait_next(&notify, &shutdown).await);
    }
}
