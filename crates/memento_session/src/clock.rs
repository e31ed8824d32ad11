use memento_core::TimeUs;
use tokio::time::{Duration, Instant};

/// Maps tokio's monotonic clock onto the `TimeUs` values the engines take.
///
/// Built on `tokio::time::Instant`, so paused test time drives it too.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> TimeUs {
        self.at(Instant::now())
    }

    pub fn at(&self, instant: Instant) -> TimeUs {
        TimeUs(instant.saturating_duration_since(self.origin).as_micros() as i64)
    }

    pub fn instant_at(&self, t: TimeUs) -> Instant {
        self.origin + Duration::from_micros(t.0.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_time() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now(), TimeUs::ZERO);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(clock.now(), TimeUs::from_millis(1500));
        assert_eq!(clock.at(clock.instant_at(TimeUs(42))), TimeUs(42));
    }
}
