use crate::config::{DelayPolicy, DelayRange, MAX_DELAY_SECS};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Request bookkeeping for one query loop.
///
/// Reset at process start; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateState {
    /// Number of external calls issued so far
    pub request_count: u64,
    /// When the last external call was issued
    pub last_request_time: Option<DateTime<Utc>>,
}

/// Which part of the delay policy produced a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseTier {
    /// The per-request minimum pause
    Base,
    /// A periodic tier, identified by its interval
    Every(u64),
}

/// Pick the delay range for the given request count.
///
/// Among the tiers whose interval divides `request_count`, the one with the
/// largest interval wins; otherwise the base range applies.
pub fn select_pause(policy: &DelayPolicy, request_count: u64) -> (PauseTier, DelayRange) {
    policy
        .tiers
        .iter()
        .filter(|tier| tier.every > 0 && request_count > 0 && request_count % tier.every == 0)
        .max_by_key(|tier| tier.every)
        .map(|tier| (PauseTier::Every(tier.every), tier.pause))
        .unwrap_or((PauseTier::Base, policy.base))
}

/// Randomized sleeps, with a seedable generator so tests are reproducible.
pub struct Pacer {
    rng: StdRng,
}

impl Pacer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a duration from the range.
    ///
    /// Bounds are clamped to `0..=MAX_DELAY_SECS` first, so a range that
    /// skipped validation still yields a finite pause.
    pub fn sample(&mut self, range: &DelayRange) -> Duration {
        let min = bounded_secs(range.min_secs);
        let max = bounded_secs(range.max_secs);
        if max <= 0.0 {
            return Duration::ZERO;
        }
        let secs = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            max
        };
        Duration::from_secs_f64(secs)
    }
}

fn bounded_secs(secs: f64) -> f64 {
    if secs.is_nan() {
        0.0
    } else {
        secs.clamp(0.0, MAX_DELAY_SECS)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayTier;

    #[test]
    fn test_tier_selection() {
        let policy = DelayPolicy::video();
        assert_eq!(select_pause(&policy, 1).0, PauseTier::Base);
        assert_eq!(select_pause(&policy, 10).0, PauseTier::Every(10));
        assert_eq!(select_pause(&policy, 20).0, PauseTier::Every(10));
        // 50 is also a multiple of 10; the longer tier wins
        assert_eq!(select_pause(&policy, 50).0, PauseTier::Every(50));
        assert_eq!(select_pause(&policy, 100).0, PauseTier::Every(50));
    }

    #[test]
    fn test_tier_selection_ignores_declaration_order() {
        let policy = DelayPolicy {
            base: DelayRange::new(0.1, 0.3),
            tiers: vec![DelayTier::new(100, 5.0, 10.0), DelayTier::new(20, 1.0, 2.0)],
        };
        assert_eq!(select_pause(&policy, 40).0, PauseTier::Every(20));
        assert_eq!(select_pause(&policy, 200).0, PauseTier::Every(100));
        assert_eq!(select_pause(&policy, 0).0, PauseTier::Base);
    }

    #[test]
    fn test_sample_stays_in_range() {
        let mut pacer = Pacer::seeded(7);
        let range = DelayRange::new(0.5, 1.5);
        for _ in 0..100 {
            let delay = pacer.sample(&range).as_secs_f64();
            assert!((0.5..=1.5).contains(&delay), "delay {delay} out of range");
        }
        assert_eq!(pacer.sample(&DelayRange::zero()), Duration::ZERO);
        assert_eq!(pacer.sample(&DelayRange::new(2.0, 2.0)), Duration::from_secs(2));
    }

    #[test]
    fn test_sample_never_panics_on_unchecked_ranges() {
        let mut pacer = Pacer::seeded(3);
        let cap = Duration::from_secs_f64(MAX_DELAY_SECS);
        assert_eq!(pacer.sample(&DelayRange::new(1e300, 1e300)), cap);
        assert!(pacer.sample(&DelayRange::new(0.0, f64::INFINITY)) <= cap);
        assert_eq!(pacer.sample(&DelayRange::new(f64::NAN, f64::NAN)), Duration::ZERO);
        assert_eq!(pacer.sample(&DelayRange::new(-5.0, -1.0)), Duration::ZERO);
    }
}
