// Randomized pauses between UI actions.
//
// Evenly timed taps are an easy automation fingerprint, so every action is
// followed by a short random sleep. The multiplier scales all pauses;
// zero turns them off (tests, replay runs).

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    multiplier: f64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

impl Pacing {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier: multiplier.max(0.0),
        }
    }

    pub fn disabled() -> Self {
        Self { multiplier: 0.0 }
    }

    pub fn is_disabled(&self) -> bool {
        self.multiplier == 0.0
    }

    /// Scaled random duration in `[min_ms, max_ms]`.
    pub fn pick(&self, min_ms: u64, max_ms: u64) -> Duration {
        if self.is_disabled() {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(min_ms..=max_ms.max(min_ms));
        Duration::from_secs_f64(ms as f64 * self.multiplier / 1000.0)
    }

    pub async fn sleep_range(&self, min_ms: u64, max_ms: u64) {
        let wait = self.pick(min_ms, max_ms);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Pause between two taps on the same screen.
    pub async fn short(&self) {
        self.sleep_range(800, 2_500).await;
    }

    /// Pause after leaving a profile, before the next account.
    pub async fn between_accounts(&self) {
        self.sleep_range(2_000, 6_000).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_zero() {
        assert_eq!(Pacing::disabled().pick(100, 200), Duration::ZERO);
    }

    #[test]
    fn test_multiplier_scales_range() {
        let pacing = Pacing::new(0.5);
        for _ in 0..50 {
            let d = pacing.pick(1_000, 2_000);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1_000));
        }
    }
}
