use std::thread;
use std::time::{Duration, SystemTime};

/// Blocks until the wall clock reaches `deadline` and returns the instant it
/// woke at. Returns immediately for a deadline in the past.
///
/// Sleeps in a loop since `thread::sleep` may wake early and the wall clock
/// may be adjusted while waiting.
pub fn sleep_until(deadline: SystemTime) -> SystemTime {
    loop {
        let now = SystemTime::now();
        match deadline.duration_since(now) {
            Ok(remaining) if remaining > Duration::ZERO => thread::sleep(remaining),
            _ => return now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_past_deadline_returns_immediately() {
        let start = SystemTime::now();
        let woke = sleep_until(start - Duration::from_secs(5));
        assert!(woke >= start);
        assert!(woke.duration_since(start).unwrap() < Duration::from_millis(100));
    }

    #[test]
    fn test_wakes_at_or_after_deadline() {
        let deadline = SystemTime::now() + Duration::from_millis(30);
        let woke = sleep_until(deadline);
        assert!(woke >= deadline);
    }
}
