use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A repeating background task that lives exactly as long as its owner.
///
/// The first run happens one `period` after `start`. Dropping the timer
/// aborts the task.
pub struct RefreshTimer {
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    pub fn start<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
        RefreshTimer { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_timer(period: Duration) -> (RefreshTimer, Arc<AtomicU32>) {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let timer = RefreshTimer::start(period, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (timer, ticks)
    }

    #[tokio::test]
    async fn ticks_repeatedly_after_the_first_period() {
        let (_timer, ticks) = counting_timer(Duration::from_millis(10));
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_halts_the_task() {
        let (timer, ticks) = counting_timer(Duration::from_millis(10));
        timer.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!timer.is_running());
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn drop_halts_the_task() {
        let (timer, ticks) = counting_timer(Duration::from_millis(10));
        drop(timer);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
