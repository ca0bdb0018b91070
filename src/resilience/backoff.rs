//! Fixed cooldown with jitter.

use std::time::Duration;

use rand::Rng;

/// The cooldown before a throttled job is retried: `base` plus a random
/// jitter of up to `jitter_ratio * base`.
///
/// The delay never shrinks below `base`, so K throttles always cost at least
/// K cooldowns. Jitter spreads retries that were throttled together.
pub fn cooldown_with_jitter(base: Duration, jitter_ratio: f64) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_range = (base_ms as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;

    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    base + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_stays_within_jitter_band() {
        for _ in 0..100 {
            let delay = cooldown_with_jitter(Duration::from_millis(1000), 0.1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay < Duration::from_millis(1100));
        }
    }

    #[test]
    fn zero_ratio_is_exact() {
        let delay = cooldown_with_jitter(Duration::from_millis(250), 0.0);
        assert_eq!(delay, Duration::from_millis(250));
    }

    #[test]
    fn zero_base_is_zero() {
        assert_eq!(cooldown_with_jitter(Duration::ZERO, 0.5), Duration::ZERO);
    }
}
