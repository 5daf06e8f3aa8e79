use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default spacing between Trakt writes
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(1100);

/// Minimum spacing between consecutive Trakt writes
///
/// The lock is held across the sleep so interleaved callers queue up
/// behind each other instead of all waking at the same instant.
#[derive(Debug)]
pub struct RateGovernor {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateGovernor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until `interval` has passed since the previous call, then record this one
    pub async fn wait_if_needed(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                trace!("Rate governor: sleeping {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    /// Record a call made outside `wait_if_needed`
    pub async fn update(&self) {
        *self.last_call.lock().await = Some(Instant::now());
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_unrestricted() {
        let governor = RateGovernor::default();
        let start = Instant::now();
        governor.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced_by_interval() {
        let governor = RateGovernor::default();
        let mut stamps = Vec::new();
        for _ in 0..4 {
            governor.wait_if_needed().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= DEFAULT_WRITE_INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle_period() {
        let governor = RateGovernor::new(Duration::from_secs(1));
        governor.wait_if_needed().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        governor.wait_if_needed().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let governor = Arc::new(RateGovernor::new(Duration::from_secs(1)));
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let governor = governor.clone();
            let stamps = stamps.clone();
            handles.push(tokio::spawn(async move {
                governor.wait_if_needed().await;
                stamps.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stamps = stamps.lock().unwrap().clone();
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }
}
