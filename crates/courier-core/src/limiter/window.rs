use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Sliding-window admission gate: at most `capacity` events in any trailing
/// `period`.
///
/// A capacity or period of zero disables the gate.
#[derive(Debug)]
pub struct RateWindow {
    capacity: usize,
    period: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            capacity,
            period,
            timestamps: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0 && !self.period.is_zero()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits until one more event fits in the window, then records it.
    ///
    /// After every sleep the window is re-evaluated from scratch: another
    /// caller may have taken the slot in the meantime.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }
        loop {
            let wait = match self.admit_or_wait().await {
                None => return,
                Some(wait) => wait,
            };
            if wait.is_zero() {
                tokio::task::yield_now().await;
            } else {
                sleep(wait).await;
            }
        }
    }

    /// Records an event if the window has room, without waiting.
    pub async fn try_acquire(&self) -> bool {
        !self.is_enabled() || self.admit_or_wait().await.is_none()
    }

    /// Number of events currently inside the window.
    pub async fn in_flight(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        evict_expired(&mut timestamps, Instant::now(), self.period);
        timestamps.len()
    }

    /// Admits the caller (returning `None`) or reports how long until the
    /// oldest event leaves the window.
    async fn admit_or_wait(&self) -> Option<Duration> {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        evict_expired(&mut timestamps, now, self.period);
        if timestamps.len() < self.capacity {
            timestamps.push_back(now);
            return None;
        }
        let oldest = timestamps.front().copied().unwrap_or(now);
        Some(self.period.saturating_sub(now.duration_since(oldest)))
    }
}

fn evict_expired(timestamps: &mut VecDeque<Instant>, now: Instant, period: Duration) {
    while timestamps
        .front()
        .is_some_and(|&ts| now.duration_since(ts) >= period)
    {
        timestamps.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_disabled_window_never_blocks() {
        for window in [
            RateWindow::new(0, Duration::from_secs(1)),
            RateWindow::new(5, Duration::ZERO),
        ] {
            assert!(!window.is_enabled());
            let start = Instant::now();
            for _ in 0..100 {
                window.acquire().await;
            }
            assert_eq!(start.elapsed(), Duration::ZERO);
            assert_eq!(window.in_flight().await, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_capacity_without_waiting() {
        let window = RateWindow::new(3, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..3 {
            window.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(window.in_flight().await, 3);
        assert!(!window.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_event_to_expire() {
        let window = RateWindow::new(2, Duration::from_secs(2));
        let start = Instant::now();
        window.acquire().await;
        sleep(Duration::from_millis(500)).await;
        window.acquire().await;

        window.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2010));
        // The second event is still in the window.
        assert_eq!(window.in_flight().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_succeeds_once_window_slides() {
        let window = RateWindow::new(1, Duration::from_millis(300));
        assert!(window.try_acquire().await);
        assert!(!window.try_acquire().await);
        sleep(Duration::from_millis(300)).await;
        assert!(window.try_acquire().await);
    }
}
