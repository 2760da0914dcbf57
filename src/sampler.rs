//! Frame index selection.
//!
//! The sample count is bounded so extraction cost stays constant no matter
//! how long the video is, while the picks still cover its whole length.

use rand::Rng;

/// How indices are chosen once a video has more frames than the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// `index[i] = min(total - 1, floor(i * total / target))`. Reproducible.
    Interval,
    /// Evenly spaced positions, each perturbed by up to `max_offset` frames.
    Jittered { max_offset: u64 },
}

impl SamplingPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SamplingPolicy::Interval => "interval",
            SamplingPolicy::Jittered { .. } => "jittered",
        }
    }

    pub fn is_deterministic(&self) -> bool {
        match self {
            SamplingPolicy::Interval => true,
            SamplingPolicy::Jittered { max_offset } => *max_offset == 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameSampler {
    policy: SamplingPolicy,
}

impl FrameSampler {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// Ordered, non-decreasing frame indices in `[0, total_frames)`.
    ///
    /// The RNG is only consulted under [`SamplingPolicy::Jittered`].
    pub fn sample<R: Rng + ?Sized>(&self, total_frames: u64, target_count: usize, rng: &mut R) -> Vec<u64> {
        if total_frames == 0 || target_count == 0 {
            return Vec::new();
        }
        if total_frames <= target_count as u64 {
            return (0..total_frames).collect();
        }

        match self.policy {
            SamplingPolicy::Interval => interval_indices(total_frames, target_count),
            SamplingPolicy::Jittered { max_offset } => {
                jittered_indices(total_frames, target_count, max_offset, rng)
            }
        }
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(SamplingPolicy::Interval)
    }
}

/// Integer form of `floor(i * total / target)`, exact for any frame count.
pub fn interval_indices(total_frames: u64, target_count: usize) -> Vec<u64> {
    if total_frames == 0 || target_count == 0 {
        return Vec::new();
    }
    let last = total_frames - 1;
    let target = target_count as u128;
    (0..target_count as u128)
        .map(|i| {
            let idx = (i * total_frames as u128 / target) as u64;
            idx.min(last)
        })
        .collect()
}

pub fn jittered_indices<R: Rng + ?Sized>(
    total_frames: u64,
    target_count: usize,
    max_offset: u64,
    rng: &mut R,
) -> Vec<u64> {
    if total_frames == 0 || target_count == 0 {
        return Vec::new();
    }
    let last = total_frames - 1;
    let span = target_count.saturating_sub(1).max(1) as f64;
    let offset = max_offset.min(i64::MAX as u64) as i64;

    let mut indices: Vec<u64> = (0..target_count)
        .map(|i| {
            let base = if target_count == 1 {
                0
            } else {
                (i as f64 * last as f64 / span).round() as i64
            };
            let jitter = if offset == 0 {
                0
            } else {
                rng.random_range(-offset..=offset)
            };
            base.saturating_add(jitter).clamp(0, last as i64) as u64
        })
        .collect();

    // jitter can cross neighbouring picks when the spacing is tight
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_empty_video_yields_no_indices() {
        let sampler = FrameSampler::default();
        assert!(sampler.sample(0, 20, &mut rng()).is_empty());

        let jittered = FrameSampler::new(SamplingPolicy::Jittered { max_offset: 2 });
        assert!(jittered.sample(0, 20, &mut rng()).is_empty());
    }

    #[test]
    fn test_zero_target_yields_no_indices() {
        assert!(FrameSampler::default().sample(100, 0, &mut rng()).is_empty());
    }

    #[test]
    fn test_short_video_is_sampled_densely() {
        let sampler = FrameSampler::default();
        for total in 1..=20u64 {
            let indices = sampler.sample(total, 20, &mut rng());
            assert_eq!(indices, (0..total).collect::<Vec<_>>());
        }

        let ten = sampler.sample(10, 20, &mut rng());
        assert_eq!(ten, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_dense_sampling_ignores_jitter() {
        let sampler = FrameSampler::new(SamplingPolicy::Jittered { max_offset: 2 });
        assert_eq!(sampler.sample(5, 20, &mut rng()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_interval_sampling_bounds_and_order() {
        let sampler = FrameSampler::default();
        for total in [21u64, 33, 100, 101, 299, 7919, 1_000_000] {
            let indices = sampler.sample(total, 20, &mut rng());
            assert_eq!(indices.len(), 20);
            assert!(indices.windows(2).all(|w| w[0] <= w[1]));
            assert!(indices.iter().all(|&i| i < total));
            assert_eq!(indices[0], 0);
        }
    }

    #[test]
    fn test_interval_sampling_matches_floor_formula() {
        assert_eq!(
            interval_indices(100, 20),
            (0..20).map(|i| i * 5).collect::<Vec<u64>>()
        );
        // 30 / 20 = 1.5 per step
        assert_eq!(
            interval_indices(30, 4),
            vec![0, 7, 15, 22]
        );
    }

    #[test]
    fn test_interval_sampling_is_reproducible() {
        let sampler = FrameSampler::default();
        let a = sampler.sample(4321, 20, &mut StdRng::seed_from_u64(1));
        let b = sampler.sample(4321, 20, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_jittered_sampling_stays_in_range() {
        let sampler = FrameSampler::new(SamplingPolicy::Jittered { max_offset: 2 });
        let mut rng = rng();
        for total in [21u64, 22, 40, 500] {
            for _ in 0..50 {
                let indices = sampler.sample(total, 20, &mut rng);
                assert_eq!(indices.len(), 20);
                assert!(indices.iter().all(|&i| i < total));
                assert!(indices.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn test_jittered_sampling_stays_near_linear_positions() {
        let indices = jittered_indices(191, 20, 2, &mut rng());
        // linspace(0, 190, 20) has step 10
        for (i, &idx) in indices.iter().enumerate() {
            let base = (i * 10) as i64;
            assert!((idx as i64 - base).abs() <= 2, "index {} drifted to {}", i, idx);
        }
    }

    #[test]
    fn test_seeded_jitter_is_repeatable() {
        let sampler = FrameSampler::new(SamplingPolicy::Jittered { max_offset: 2 });
        let a = sampler.sample(1000, 20, &mut StdRng::seed_from_u64(42));
        let b = sampler.sample(1000, 20, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_jitter_equals_rounded_linspace() {
        assert_eq!(jittered_indices(11, 3, 0, &mut rng()), vec![0, 5, 10]);
        assert_eq!(jittered_indices(50, 1, 0, &mut rng()), vec![0]);
        assert!(SamplingPolicy::Jittered { max_offset: 0 }.is_deterministic());
        assert!(!SamplingPolicy::Jittered { max_offset: 2 }.is_deterministic());
    }
}
