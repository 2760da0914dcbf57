//! Temporal aggregation of per-frame model output.
//!
//! Two shapes are produced: a fixed-length padded feature sequence with a
//! validity mask, for the temporal classifier, and dispersion statistics
//! over per-frame scores, for the graded decision ladder.

use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use serde::Serialize;

use crate::extractor::FeatureVector;

/// `max_frames` feature slots plus a mask marking which hold real frames.
///
/// Invariant: both vectors have length `max_frames` and the mask's sum is
/// the number of real frames, which occupy the leading slots in order.
#[derive(Debug, Clone)]
pub struct PaddedSequence {
    steps: Vec<FeatureVector>,
    mask: Vec<u8>,
    dim: usize,
}

impl PaddedSequence {
    /// Keep the first `max_frames` vectors, zero-fill the rest.
    pub fn pack(vectors: Vec<FeatureVector>, max_frames: usize, dim: usize) -> Result<Self> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(anyhow!("Feature vector has {} values, expected {}", bad.len(), dim));
        }

        let valid = vectors.len().min(max_frames);
        let mut steps: Vec<FeatureVector> = vectors.into_iter().take(max_frames).collect();
        steps.resize_with(max_frames, || FeatureVector::zeros(dim));

        let mut mask = vec![0u8; max_frames];
        mask[..valid].fill(1);

        Ok(Self { steps, mask, dim })
    }

    pub fn max_frames(&self) -> usize {
        self.steps.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn steps(&self) -> &[FeatureVector] {
        &self.steps
    }

    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    pub fn is_valid(&self, step: usize) -> bool {
        self.mask.get(step).is_some_and(|&m| m == 1)
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().map(|&m| m as usize).sum()
    }

    /// `(1, max_frames, dim)` features and `(1, max_frames)` mask, both f32.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let data: Vec<f32> = self
            .steps
            .iter()
            .flat_map(|v| v.as_slice().iter().copied())
            .collect();
        let features = Tensor::from_vec(data, (1, self.max_frames(), self.dim), device)?;

        let mask: Vec<f32> = self.mask.iter().map(|&m| m as f32).collect();
        let mask = Tensor::from_vec(mask, (1, self.max_frames()), device)?;
        Ok((features, mask))
    }
}

/// Agreement across frames, bucketed from the score standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsistencyTier {
    High,
    Medium,
    Low,
}

impl ConsistencyTier {
    pub const HIGH_BELOW: f64 = 0.15;
    pub const MEDIUM_BELOW: f64 = 0.25;

    pub fn from_std_dev(std_dev: f64) -> Self {
        if std_dev < Self::HIGH_BELOW {
            ConsistencyTier::High
        } else if std_dev < Self::MEDIUM_BELOW {
            ConsistencyTier::Medium
        } else {
            ConsistencyTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyTier::High => "HIGH",
            ConsistencyTier::Medium => "MEDIUM",
            ConsistencyTier::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStatistics {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub count: usize,
}

impl AggregateStatistics {
    /// `None` for an empty score set.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let n = scores.len() as f64;
        let values: Vec<f64> = scores.iter().map(|&s| s as f64).collect();
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = values;
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            mean,
            median,
            std_dev: variance.sqrt(),
            count: scores.len(),
        })
    }

    pub fn consistency(&self) -> ConsistencyTier {
        ConsistencyTier::from_std_dev(self.std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectors(n: usize, dim: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| FeatureVector::new(vec![(i + 1) as f32; dim]))
            .collect()
    }

    #[test]
    fn test_pack_pads_short_sequences() {
        let seq = PaddedSequence::pack(vectors(10, 4), 20, 4).expect("pack");
        assert_eq!(seq.max_frames(), 20);
        assert_eq!(seq.mask().len(), 20);
        assert_eq!(seq.valid_count(), 10);
        assert_eq!(seq.steps()[9].as_slice(), &[10.0; 4]);
        assert!(seq.steps()[10..].iter().all(|v| v.as_slice() == [0.0; 4]));
        assert!(seq.is_valid(9));
        assert!(!seq.is_valid(10));
    }

    #[test]
    fn test_pack_truncates_long_sequences() {
        let seq = PaddedSequence::pack(vectors(25, 3), 20, 3).expect("pack");
        assert_eq!(seq.max_frames(), 20);
        assert_eq!(seq.valid_count(), 20);
        assert_eq!(seq.steps()[19].as_slice(), &[20.0; 3]);
    }

    #[test]
    fn test_pack_lengths_hold_for_any_count() {
        for n in 0..=30 {
            let seq = PaddedSequence::pack(vectors(n, 2), 20, 2).expect("pack");
            assert_eq!(seq.steps().len(), 20);
            assert_eq!(seq.mask().len(), 20);
            assert_eq!(seq.valid_count(), n.min(20));
        }
    }

    #[test]
    fn test_pack_rejects_mismatched_dims() {
        let mut input = vectors(3, 4);
        input.push(FeatureVector::zeros(5));
        assert!(PaddedSequence::pack(input, 20, 4).is_err());
    }

    #[test]
    fn test_to_tensors_shapes() {
        let seq = PaddedSequence::pack(vectors(3, 2), 5, 2).expect("pack");
        let (features, mask) = seq.to_tensors(&Device::Cpu).expect("tensors");
        assert_eq!(features.dims(), &[1, 5, 2]);
        assert_eq!(mask.dims(), &[1, 5]);
        let mask: Vec<Vec<f32>> = mask.to_vec2().expect("mask");
        assert_eq!(mask[0], vec![1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_statistics_consistent_fake_scores() {
        let stats = AggregateStatistics::from_scores(&[0.9, 0.85, 0.92]).expect("stats");
        assert!((stats.mean - 0.89).abs() < 1e-6);
        assert!((stats.std_dev - 0.0294).abs() < 1e-3);
        assert!((stats.median - 0.9).abs() < 1e-6);
        assert_eq!(stats.consistency(), ConsistencyTier::High);
    }

    #[test]
    fn test_statistics_spread_scores() {
        let stats = AggregateStatistics::from_scores(&[0.3, 0.7, 0.5]).expect("stats");
        assert!((stats.mean - 0.5).abs() < 1e-6);
        assert!((stats.std_dev - 0.1633).abs() < 1e-3);
        assert_eq!(stats.consistency(), ConsistencyTier::Medium);
    }

    #[test]
    fn test_even_median_averages_middle_pair() {
        let stats = AggregateStatistics::from_scores(&[0.1, 0.4, 0.2, 0.3]).expect("stats");
        assert!((stats.median - 0.25).abs() < 1e-6);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn test_statistics_undefined_without_scores() {
        assert!(AggregateStatistics::from_scores(&[]).is_none());
    }

    #[test]
    fn test_consistency_tier_boundaries() {
        assert_eq!(ConsistencyTier::from_std_dev(0.0), ConsistencyTier::High);
        assert_eq!(ConsistencyTier::from_std_dev(0.149), ConsistencyTier::High);
        assert_eq!(ConsistencyTier::from_std_dev(0.15), ConsistencyTier::Medium);
        assert_eq!(ConsistencyTier::from_std_dev(0.249), ConsistencyTier::Medium);
        assert_eq!(ConsistencyTier::from_std_dev(0.25), ConsistencyTier::Low);
        assert_eq!(ConsistencyTier::from_std_dev(0.5), ConsistencyTier::Low);
    }
}
