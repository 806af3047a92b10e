use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Fixed one-minute window per user. Expired windows are dropped on each
/// check, so only users active within the last minute are tracked.
pub struct RateLimiter {
    max_per_minute: u32,
    windows: Mutex<HashMap<i64, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the user may send another message now.
    pub fn try_acquire(&self, user_id: i64) -> bool {
        self.try_acquire_at(user_id, Instant::now())
    }

    fn try_acquire_at(&self, user_id: i64, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.retain(|_, (_, started)| now.duration_since(*started) < WINDOW);

        let (count, _) = windows.entry(user_id).or_insert((0, now));
        if *count >= self.max_per_minute {
            return false;
        }
        *count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire(1));
        assert!(!limiter.try_acquire(1));
        assert!(limiter.try_acquire(2));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1);
        let start = Instant::now();
        assert!(limiter.try_acquire_at(1, start));
        assert!(!limiter.try_acquire_at(1, start + Duration::from_secs(59)));
        assert!(limiter.try_acquire_at(1, start + WINDOW));
    }

    #[test]
    fn test_expired_windows_are_dropped() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        for user in 1..=3 {
            assert!(limiter.try_acquire_at(user, start));
        }
        assert_eq!(limiter.windows.lock().unwrap().len(), 3);

        assert!(limiter.try_acquire_at(4, start + WINDOW));
        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows.contains_key(&4));
    }

    #[test]
    fn test_zero_max() {
        let limiter = RateLimiter::new(0);
        assert!(!limiter.try_acquire(1));
    }
}
