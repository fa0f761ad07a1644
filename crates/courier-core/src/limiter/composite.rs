use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::LimiterConfig;
use crate::limiter::RateWindow;
use crate::types::ChatTarget;

/// Extra wait added on top of every server retry-after, so the next call does
/// not land a moment before the server's own window closes.
pub const RETRY_AFTER_BUFFER: Duration = Duration::from_millis(100);

/// Shared admission state for every outbound call of a process.
///
/// Construct once and share it (by reference or `Arc`) with every concurrent
/// delivery. Each piece of mutable state sits behind its own guard.
#[derive(Debug)]
pub struct CompositeLimiter {
    overall: Option<RateWindow>,
    group_max_rate: usize,
    group_period: Duration,
    groups: DashMap<ChatTarget, Arc<RateWindow>>,
    cooldown_until: Mutex<Option<Instant>>,
    min_delay: Duration,
    pacing_until: Mutex<Option<Instant>>,
}

impl CompositeLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        let overall = RateWindow::new(config.overall_max_rate, config.overall_period());
        Self {
            overall: overall.is_enabled().then_some(overall),
            group_max_rate: config.group_max_rate,
            group_period: config.group_period(),
            groups: DashMap::new(),
            cooldown_until: Mutex::new(None),
            min_delay: config.min_delay(),
            pacing_until: Mutex::new(None),
        }
    }

    /// A limiter that admits everything immediately, apart from server cooldowns.
    pub fn unlimited() -> Self {
        Self::new(&LimiterConfig {
            overall_max_rate: 0,
            group_max_rate: 0,
            min_delay_sec: 0.0,
            ..LimiterConfig::default()
        })
    }

    fn group_limiting_enabled(&self) -> bool {
        self.group_max_rate > 0 && !self.group_period.is_zero()
    }

    /// Waits until a call to `key` (if any) may be issued.
    ///
    /// Gates are applied in order: server cooldown, the per-chat window for
    /// `key`, global window, pacing. Every chat gets its own window, private
    /// ones included.
    pub async fn acquire(&self, key: Option<&ChatTarget>) {
        self.wait_for_cooldown().await;

        if let Some(key) = key
            && self.group_limiting_enabled()
        {
            self.group_window(key).acquire().await;
        }

        if let Some(overall) = &self.overall {
            overall.acquire().await;
        }

        self.wait_for_pacing().await;
    }

    /// Blocks every caller until `retry_after` (plus a small buffer) has passed.
    ///
    /// Never shortens a cooldown that is already further out.
    pub async fn register_retry_after(&self, retry_after: Duration) {
        let mut until = self.cooldown_until.lock().await;
        let candidate = Instant::now() + retry_after + RETRY_AFTER_BUFFER;
        if until.is_none_or(|current| candidate > current) {
            debug!(
                retry_after_ms = retry_after.as_millis() as u64,
                "Extending server cooldown"
            );
            *until = Some(candidate);
        }
    }

    /// Time left on the server cooldown, zero if none is active.
    pub async fn cooldown_remaining(&self) -> Duration {
        self.cooldown_until
            .lock()
            .await
            .map_or(Duration::ZERO, |until| {
                until.saturating_duration_since(Instant::now())
            })
    }

    /// Number of group windows created so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn group_window(&self, key: &ChatTarget) -> Arc<RateWindow> {
        if let Some(window) = self.groups.get(key) {
            return Arc::clone(&window);
        }
        let window = self.groups.entry(key.clone()).or_insert_with(|| {
            Arc::new(RateWindow::new(self.group_max_rate, self.group_period))
        });
        Arc::clone(&window)
    }

    async fn wait_for_cooldown(&self) {
        loop {
            let remaining = self.cooldown_remaining().await;
            if remaining.is_zero() {
                return;
            }
            debug!(
                remaining_ms = remaining.as_millis() as u64,
                "Waiting for server cooldown"
            );
            // The deadline may move while we sleep; re-check afterwards.
            sleep(remaining).await;
        }
    }

    async fn wait_for_pacing(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        loop {
            let wait = {
                let mut until = self.pacing_until.lock().await;
                let now = Instant::now();
                match *until {
                    Some(deadline) if now < deadline => deadline - now,
                    _ => {
                        *until = Some(now + self.min_delay);
                        return;
                    }
                }
            };
            sleep(wait).await;
        }
    }
}

impl Default for CompositeLimiter {
    fn default() -> Self {
        Self::new(&LimiterConfig::default())
    }
}
