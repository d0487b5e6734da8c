//! Timer plumbing: each refresh cycle is a spawned ticker that owns its own
//! cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A periodic task. The first tick fires one `period` after spawning.
///
/// Cancelling stops future ticks only. A tick that is already running finishes,
/// so whatever it fetched must be checked for relevance before it is drawn.
#[derive(Debug)]
pub struct Cycle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Cycle {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first tick (happens immediately)
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if cancelled.is_cancelled() {
                            break;
                        }
                        tick().await;
                    }
                }
            }
            debug!(event = "scheduler.cycle_stopped", cycle = name);
        });

        debug!(
            event = "scheduler.cycle_started",
            cycle = name,
            period_ms = period.as_millis() as u64,
        );
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Cycle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Owns the baseline and follow cycles. Starting a cycle that is already
/// running replaces it, so at most one of each exists.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    baseline: Option<Cycle>,
    follow: Option<Cycle>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_baseline(&mut self, cycle: Cycle) {
        self.baseline = Some(cycle);
    }

    fn stop_baseline(&mut self) {
        self.baseline = None;
    }

    /// Replaces (and thereby cancels) any running follow cycle.
    pub fn restart_follow(&mut self, cycle: Cycle) {
        self.follow = Some(cycle);
    }

    pub fn stop_follow(&mut self) {
        self.follow = None;
    }

    pub fn baseline_running(&self) -> bool {
        self.baseline.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    pub fn follow_running(&self) -> bool {
        self.follow.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    pub fn shutdown(&mut self) {
        self.stop_follow();
        self.stop_baseline();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cycle(period: Duration) -> (Cycle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let cycle = Cycle::spawn("test", period, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        (cycle, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_ticks_at_period() {
        for ms in [50u64, 250, 3_000] {
            let period = Duration::from_millis(ms);
            let (cycle, count) = counting_cycle(period);

            tokio::time::sleep(period / 2).await;
            assert_eq!(count.load(Ordering::SeqCst), 0, "no immediate tick");

            tokio::time::sleep(period * 3).await;
            assert_eq!(count.load(Ordering::SeqCst), 3);
            drop(cycle);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_ticks() {
        let period = Duration::from_millis(100);
        let (cycle, count) = counting_cycle(period);

        tokio::time::sleep(Duration::from_millis(250)).await;
        cycle.cancel();
        let seen = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert!(cycle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_restart_replaces_follow() {
        let period = Duration::from_millis(100);
        let mut scheduler = RefreshScheduler::new();

        let (first, first_count) = counting_cycle(period);
        scheduler.restart_follow(first);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(first_count.load(Ordering::SeqCst), 1);

        let (second, second_count) = counting_cycle(period);
        scheduler.restart_follow(second);
        tokio::time::sleep(Duration::from_millis(420)).await;

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 4);
        assert!(scheduler.follow_running());

        scheduler.shutdown();
        assert!(!scheduler.follow_running());
        assert!(!scheduler.baseline_running());
    }
}
