//! Jittered delays between requests to the same source.

use std::time::Duration;

use rand::Rng;

/// Jitter a base delay by a uniform offset in [-1, +2] seconds, then clamp.
pub fn jitter_delay(base: f64, min: f64, max: f64) -> f64 {
    let jittered = base + rand::rng().random_range(-1.0..=2.0);
    jittered.max(min).min(max).max(0.0)
}

/// Per-source pacing applied after each successful fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    base: f64,
    min: f64,
    max: f64,
}

impl Pacing {
    pub fn new(base: f64, min: f64, max: f64) -> Self {
        Self { base, min, max }
    }

    /// No delay at all.
    pub fn disabled() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Delay to apply after the next fetch. A zero base disables pacing.
    pub fn next_delay(&self) -> Option<Duration> {
        if self.base <= 0.0 {
            return None;
        }
        let secs = jitter_delay(self.base, self.min, self.max);
        (secs > 0.0).then(|| Duration::from_secs_f64(secs))
    }

    pub async fn pause(&self) {
        if let Some(delay) = self.next_delay() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_respects_bounds() {
        for _ in 0..200 {
            let d = jitter_delay(3.0, 2.0, 7.0);
            assert!((2.0..=5.0).contains(&d), "delay {} out of range", d);
        }
        // Clamped up to the minimum when the base is tiny.
        for _ in 0..50 {
            assert!(jitter_delay(0.1, 2.0, 7.0) >= 2.0);
        }
        // Clamped down to the maximum when the base is large.
        for _ in 0..50 {
            assert_eq!(jitter_delay(30.0, 2.0, 7.0), 7.0);
        }
    }

    #[test]
    fn test_zero_base_disables_pacing() {
        assert!(Pacing::new(0.0, 2.0, 7.0).next_delay().is_none());
        assert!(Pacing::disabled().next_delay().is_none());
        let delay = Pacing::new(3.0, 2.0, 7.0).next_delay().unwrap();
        assert!(delay >= Duration::from_secs(2));
    }
}
