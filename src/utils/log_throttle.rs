use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    suppressed: u64,
}

static WINDOWS: OnceLock<Mutex<HashMap<&'static str, Window>>> = OnceLock::new();

/// Rate limit for debug lines that fire on every read, such as query cache,
/// post cache and user id cache hits.
///
/// The first call for `event` in a window returns `Some(n)`, where `n` is how
/// many calls the previous window swallowed, so the emitted line can carry it
/// as `suppressed`. Later calls in the same window return `None`.
pub fn should_emit(event: &'static str, interval: Duration) -> Option<u64> {
    let windows = WINDOWS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = match windows.lock() {
        Ok(guard) => guard,
        // Poisoned only by a panic mid-update; the counts are still usable.
        Err(poisoned) => poisoned.into_inner(),
    };
    let now = Instant::now();

    match map.get_mut(event) {
        None => {
            map.insert(
                event,
                Window {
                    opened_at: now,
                    suppressed: 0,
                },
            );
            Some(0)
        }
        Some(window) if now.duration_since(window.opened_at) >= interval => {
            let suppressed = window.suppressed;
            window.opened_at = now;
            window.suppressed = 0;
            Some(suppressed)
        }
        Some(window) => {
            window.suppressed += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::should_emit;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn emits_then_suppresses_then_emits_with_count() {
        let key = "test.log_throttle.window";
        let interval = Duration::from_millis(20);

        assert_eq!(should_emit(key, interval), Some(0));
        assert_eq!(should_emit(key, interval), None);
        assert_eq!(should_emit(key, interval), None);

        sleep(Duration::from_millis(30));
        assert_eq!(should_emit(key, interval), Some(2));
    }

    #[test]
    fn keys_are_throttled_independently() {
        let interval = Duration::from_secs(60);
        assert_eq!(should_emit("test.log_throttle.a", interval), Some(0));
        assert_eq!(should_emit("test.log_throttle.b", interval), Some(0));
        assert_eq!(should_emit("test.log_throttle.a", interval), None);
    }
}
