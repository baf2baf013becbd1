use crate::types::Timestamp;
use chrono::{Duration, Utc};
use std::collections::VecDeque;

/// Sliding one-minute budget for alert notifications
///
/// Keeps the send times of recent notifications and refuses a new one once
/// the budget for the trailing minute is spent.
#[derive(Debug)]
pub struct RateLimiter {
    /// Notifications allowed in any trailing minute
    max_per_minute: usize,
    /// Send times still inside the window, oldest first
    recent: VecDeque<Timestamp>,
}

impl RateLimiter {
    /// Create a rate limiter with the given per-minute budget
    ///
    /// # Arguments
    ///
    /// * `max_per_minute` - Notifications allowed in any trailing minute; 0 blocks every send
    pub fn new(max_per_minute: usize) -> Self {
        Self {
            max_per_minute,
            recent: VecDeque::new(),
        }
    }

    /// Whether one more notification fits in the window ending now
    ///
    /// # Returns
    ///
    /// `true` if the notification can be sent, `false` if rate limited
    pub fn can_send(&mut self) -> bool {
        self.can_send_at(Utc::now())
    }

    /// Like [`can_send`](Self::can_send), for a window ending at `now`
    ///
    /// # Arguments
    ///
    /// * `now` - End of the one-minute window to check
    pub fn can_send_at(&mut self, now: Timestamp) -> bool {
        self.evict_before(now);
        self.recent.len() < self.max_per_minute
    }

    /// Record that a notification was sent at the current time
    ///
    /// Call this only after a successful send.
    pub fn record_notification(&mut self) {
        self.record_notification_at(Utc::now());
    }

    /// Record a send at `timestamp`; entries already outside the window are dropped
    ///
    /// # Arguments
    ///
    /// * `timestamp` - When the notification was sent
    pub fn record_notification_at(&mut self, timestamp: Timestamp) {
        self.recent.push_back(timestamp);
        self.evict_before(Utc::now().max(timestamp));
    }

    /// Notifications counted against the current window
    ///
    /// # Returns
    ///
    /// Number of sends recorded in the last minute
    pub fn current_count(&mut self) -> usize {
        self.evict_before(Utc::now());
        self.recent.len()
    }

    fn evict_before(&mut self, now: Timestamp) {
        let cutoff = now - Duration::minutes(1);
        // sends may be recorded out of order
        self.recent.retain(|&sent| sent > cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_is_enforced() {
        let mut limiter = RateLimiter::new(3);

        for _ in 0..3 {
            assert!(limiter.can_send());
            limiter.record_notification();
        }
        assert!(!limiter.can_send());
        assert_eq!(limiter.current_count(), 3);
    }

    #[test]
    fn test_old_sends_leave_the_window() {
        let mut limiter = RateLimiter::new(2);
        let now = Utc::now();

        limiter.record_notification_at(now - Duration::minutes(2));
        limiter.record_notification_at(now - Duration::seconds(30));

        assert!(limiter.can_send());
        assert_eq!(limiter.current_count(), 1);
    }

    #[test]
    fn test_window_slides_forward() {
        let mut limiter = RateLimiter::new(2);
        let now = Utc::now();

        limiter.record_notification_at(now - Duration::seconds(30));
        limiter.record_notification_at(now - Duration::seconds(10));
        assert!(!limiter.can_send_at(now));

        // 35s later the first send has aged out
        assert!(limiter.can_send_at(now + Duration::seconds(35)));
    }

    #[test]
    fn test_zero_budget_never_sends() {
        let mut limiter = RateLimiter::new(0);
        assert!(!limiter.can_send());
    }
}
