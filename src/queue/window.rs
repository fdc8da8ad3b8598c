// Rolling-window dispatch limiter

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Admits at most `max_per_window` dispatches in any rolling `window`.
///
/// Keeps the timestamps of recent dispatches; a caller that finds the log
/// full sleeps until the oldest entry ages out.
pub struct DispatchWindow {
    window: Duration,
    max_per_window: usize,
    log: Mutex<VecDeque<Instant>>,
}

impl DispatchWindow {
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        let max_per_window = max_per_window.max(1);
        Self {
            window,
            max_per_window,
            log: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    /// Waits for room in the window and records a dispatch at the moment of admission.
    pub async fn acquire(&self) -> Instant {
        loop {
            let reopens_at = {
                let mut log = self.log.lock().await;
                let now = Instant::now();
                self.evict_expired(&mut log, now);

                if log.len() < self.max_per_window {
                    log.push_back(now);
                    return now;
                }
                match log.front() {
                    Some(oldest) => *oldest + self.window,
                    None => now,
                }
            };

            debug!(
                wait_ms = reopens_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Dispatch window full, waiting"
            );
            sleep_until(reopens_at).await;
        }
    }

    /// Dispatches recorded in the current window.
    pub async fn recent(&self) -> usize {
        let mut log = self.log.lock().await;
        self.evict_expired(&mut log, Instant::now());
        log.len()
    }

    fn evict_expired(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_cap_immediately() {
        let window = DispatchWindow::new(Duration::from_secs(60), 3);
        let start = Instant::now();
        for _ in 0..3 {
            assert_eq!(window.acquire().await, start);
        }
        assert_eq!(window.recent().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_dispatch_waits_for_oldest_to_expire() {
        let window = DispatchWindow::new(Duration::from_secs(60), 3);
        let start = Instant::now();
        for _ in 0..3 {
            window.acquire().await;
        }
        let fourth = window.acquire().await;
        assert_eq!(fourth - start, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cap_is_clamped() {
        let window = DispatchWindow::new(Duration::from_secs(1), 0);
        window.acquire().await;
        let second = window.acquire().await;
        assert!(second.elapsed() <= Duration::from_secs(1));
        assert_eq!(window.recent().await, 1);
    }
}
