//! Clock abstraction for deterministic dwell and cooldown timing.
//!
//! Production code uses `SystemClock` (real time).
//! Tests and trace replay use `ManualClock` with explicit advancement.

use parking_lot::Mutex;
use std::time::{Duration, Instant, SystemTime};

/// Trait abstracting time sources for testability.
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since the clock's origin.
    fn now_ms(&self) -> u64;

    /// Returns the current wall-clock time as milliseconds
    /// since UNIX epoch.
    fn unix_millis(&self) -> i64;
}

fn system_unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn unix_millis(&self) -> i64 {
        system_unix_millis()
    }
}

/// Clock with manually controlled time.
///
/// Monotonic time starts at zero; wall time starts at the real current
/// time unless overridden with [`ManualClock::set_unix_millis`].
pub struct ManualClock {
    /// (monotonic ms, unix ms), advanced together.
    now: Mutex<(u64, i64)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new((0, system_unix_millis())),
        }
    }

    /// Advance both time bases by the given duration.
    pub fn advance(&self, duration: Duration) {
        let step = duration.as_millis() as u64;
        let mut now = self.now.lock();
        now.0 += step;
        now.1 += step as i64;
    }

    /// Move monotonic time forward to `target_ms`. Earlier targets are
    /// ignored so the clock never runs backwards.
    pub fn advance_to(&self, target_ms: u64) {
        let mut now = self.now.lock();
        if target_ms > now.0 {
            now.1 += (target_ms - now.0) as i64;
            now.0 = target_ms;
        }
    }

    /// Set the UNIX millisecond timestamp explicitly.
    pub fn set_unix_millis(&self, ms: i64) {
        self.now.lock().1 = ms;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.lock().0
    }

    fn unix_millis(&self) -> i64 {
        self.now.lock().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_system_clock_returns_time() {
        let clock = SystemClock::new();
        let t0 = clock.now_ms();
        assert!(clock.unix_millis() > 0);
        assert!(clock.now_ms() >= t0);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let ms0 = clock.unix_millis();
        assert_eq!(clock.now_ms(), 0);

        clock.advance(Duration::from_secs(5));

        assert_eq!(clock.now_ms(), 5000);
        assert_eq!(clock.unix_millis() - ms0, 5000);
    }

    #[test]
    fn test_manual_clock_advance_to_never_rewinds() {
        let clock = ManualClock::new();
        clock.advance_to(1200);
        assert_eq!(clock.now_ms(), 1200);
        clock.advance_to(800);
        assert_eq!(clock.now_ms(), 1200);
    }

    #[test]
    fn test_manual_clock_shared_across_threads() {
        let clock = Arc::new(ManualClock::new());
        let unix0 = clock.unix_millis();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        clock.advance(Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(clock.now_ms(), 1000);
        assert_eq!(clock.unix_millis() - unix0, 1000);
    }

    #[test]
    fn test_manual_clock_advance_to_moves_wall_time() {
        let clock = ManualClock::new();
        clock.set_unix_millis(10_000);
        clock.advance_to(1500);
        assert_eq!(clock.unix_millis(), 11_500);
    }

    #[test]
    fn test_manual_clock_set_unix_millis() {
        let clock = ManualClock::new();
        clock.set_unix_millis(1_234_567_890_000);
        assert_eq!(clock.unix_millis(), 1_234_567_890_000);
    }

    #[test]
    fn test_clock_trait_object() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        assert!(clock.unix_millis() > 0);

        let manual: Arc<dyn Clock> = Arc::new(ManualClock::new());
        assert_eq!(manual.now_ms(), 0);
    }
}
