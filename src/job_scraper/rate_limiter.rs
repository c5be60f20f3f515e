// src/job_scraper/rate_limiter.rs
//! Randomized pacing between navigations. Later positions in a batch get a
//! progressively wider gap, capped at `max_batch_delay_ms`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::config::ScraperConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min: Duration,
    pub max: Duration,
}

pub struct RateLimiter {
    min_ms: u64,
    max_ms: u64,
    step_ms: u64,
    cap_ms: u64,
    rng: Mutex<StdRng>,
}

impl RateLimiter {
    pub fn new(config: &ScraperConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Reproducible sampling for tests and dry runs
    pub fn seeded(config: &ScraperConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ScraperConfig, rng: StdRng) -> Self {
        let min_ms = config.min_delay_ms.min(config.max_delay_ms);
        let max_ms = config.max_delay_ms.max(min_ms);
        Self {
            min_ms,
            max_ms,
            step_ms: config.batch_step_ms,
            cap_ms: config.max_batch_delay_ms.max(max_ms),
            rng: Mutex::new(rng),
        }
    }

    /// Sampling window for a batch position. Both bounds are non-decreasing in
    /// `position`, never below `min_delay` and never above the cap.
    pub fn window(&self, position: usize) -> DelayWindow {
        let extra = self.step_ms.saturating_mul(position as u64);
        DelayWindow {
            min: Duration::from_millis(self.min_ms.saturating_add(extra).min(self.cap_ms)),
            max: Duration::from_millis(self.max_ms.saturating_add(extra).min(self.cap_ms)),
        }
    }

    pub fn next_delay(&self, position: usize) -> Duration {
        let window = self.window(position);
        let lo = window.min.as_millis() as u64;
        let hi = window.max.as_millis() as u64;
        if lo >= hi {
            return window.min;
        }

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Duration::from_millis(rng.gen_range(lo..=hi))
    }

    /// Suspends the caller for the sampled delay and returns it.
    pub async fn wait(&self, position: usize) -> Duration {
        let delay = self.next_delay(position);
        if !delay.is_zero() {
            info!(
                "Rate limiting: sleeping for {:.1} seconds (position {})",
                delay.as_secs_f64(),
                position
            );
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u64, max: u64, step: u64, cap: u64) -> ScraperConfig {
        ScraperConfig {
            min_delay_ms: min,
            max_delay_ms: max,
            batch_step_ms: step,
            max_batch_delay_ms: cap,
            ..ScraperConfig::default()
        }
    }

    #[test]
    fn test_single_request_window_is_configured_range() {
        let limiter = RateLimiter::seeded(&ScraperConfig::default(), 7);
        let window = limiter.window(0);
        assert_eq!(window.min, Duration::from_secs(2));
        assert_eq!(window.max, Duration::from_secs(6));

        for _ in 0..200 {
            let delay = limiter.next_delay(0);
            assert!(delay >= window.min && delay <= window.max, "{:?}", delay);
        }
    }

    #[test]
    fn test_window_is_non_decreasing_and_capped() {
        let limiter = RateLimiter::seeded(&config(2_000, 6_000, 500, 10_000), 1);
        let mut previous = limiter.window(0);
        for position in 1..50 {
            let window = limiter.window(position);
            assert!(window.min >= previous.min);
            assert!(window.max >= previous.max);
            assert!(window.min >= Duration::from_millis(2_000));
            assert!(window.max <= Duration::from_millis(10_000));
            previous = window;
        }
        assert_eq!(limiter.window(49).min, Duration::from_millis(10_000));
    }

    #[test]
    fn test_samples_stay_above_min_delay_for_every_position() {
        let limiter = RateLimiter::seeded(&config(1_500, 4_000, 750, 9_000), 42);
        for position in 0..30 {
            let window = limiter.window(position);
            let delay = limiter.next_delay(position);
            assert!(delay >= Duration::from_millis(1_500));
            assert!(delay >= window.min && delay <= window.max);
        }
    }

    #[test]
    fn test_fixed_window_is_strictly_monotonic_until_cap() {
        let limiter = RateLimiter::seeded(&config(3_000, 3_000, 1_000, 6_000), 3);
        let delays: Vec<u64> = (0..6)
            .map(|p| limiter.next_delay(p).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 4_000, 5_000, 6_000, 6_000, 6_000]);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = RateLimiter::seeded(&ScraperConfig::default(), 99);
        let b = RateLimiter::seeded(&ScraperConfig::default(), 99);
        for position in 0..10 {
            assert_eq!(a.next_delay(position), b.next_delay(position));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_actually_sleeps() {
        let limiter = RateLimiter::seeded(&config(2_000, 2_000, 0, 2_000), 0);
        let start = tokio::time::Instant::now();
        let delay = limiter.wait(0).await;
        assert_eq!(delay, Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_does_not_sleep() {
        let limiter = RateLimiter::seeded(&ScraperConfig::without_delays(), 0);
        let start = tokio::time::Instant::now();
        assert_eq!(limiter.wait(3).await, Duration::ZERO);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
