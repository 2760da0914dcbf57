use anyhow::Result;

use crate::decoder::DecodedFrame;

/// Fixed-length descriptor of one frame. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Batched image network turning frames into feature vectors.
///
/// Loaded once per process and shared read-only across requests.
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector returned by `extract`
    fn dim(&self) -> usize;

    /// One vector per input frame, in input order.
    fn extract(&self, frames: &[DecodedFrame]) -> Result<Vec<FeatureVector>>;
}

/// Per-frame classifier returning a fakeness score in `[0, 1]`.
pub trait FrameScorer: Send + Sync {
    fn score(&self, frame: &DecodedFrame) -> Result<f32>;
}

mod fixed;
pub mod preprocess;
mod resnet;
mod vit;

pub use fixed::{ConstantExtractor, PatternScorer};
pub use preprocess::Normalization;
pub use resnet::ResNetExtractor;
pub use vit::VitScorer;
