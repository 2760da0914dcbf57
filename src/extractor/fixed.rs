use anyhow::{Result, anyhow};
use std::collections::HashSet;

use super::{FeatureExtractor, FeatureVector, FrameScorer};
use crate::decoder::DecodedFrame;

/// Extractor that needs no weights: every frame maps to `[index, 1, 1, ...]`.
/// Useful for exercising the pipeline without a model.
pub struct ConstantExtractor {
    dim: usize,
}

impl ConstantExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl FeatureExtractor for ConstantExtractor {
    fn dim(&self) -> usize {
        self.dim
    }

    fn extract(&self, frames: &[DecodedFrame]) -> Result<Vec<FeatureVector>> {
        Ok(frames
            .iter()
            .map(|frame| {
                let mut values = vec![1.0; self.dim];
                values[0] = frame.index as f32;
                FeatureVector::new(values)
            })
            .collect())
    }
}

/// Scorer driven by a function of the frame index
pub struct PatternScorer {
    pattern: Box<dyn Fn(u64) -> f32 + Send + Sync>,
    failing: HashSet<u64>,
}

impl PatternScorer {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(u64) -> f32 + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
            failing: HashSet::new(),
        }
    }

    /// Frame `n` gets `scores[n % scores.len()]`.
    pub fn with_scores(scores: Vec<f32>) -> Self {
        Self::with_pattern(move |index| {
            if scores.is_empty() {
                return 0.0;
            }
            scores[(index % scores.len() as u64) as usize]
        })
    }

    pub fn constant(score: f32) -> Self {
        Self::with_pattern(move |_| score)
    }

    /// Indices whose scoring returns an error.
    pub fn with_failing_frames(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(indices);
        self
    }
}

impl FrameScorer for PatternScorer {
    fn score(&self, frame: &DecodedFrame) -> Result<f32> {
        if self.failing.contains(&frame.index) {
            return Err(anyhow!("Scoring failed for frame {}", frame.index));
        }
        Ok((self.pattern)(frame.index))
    }
}
