use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Module};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use std::path::Path;

use super::preprocess::{self, IMAGE_SIZE, Normalization};
use super::{FeatureExtractor, FeatureVector};
use crate::decoder::DecodedFrame;

pub const RESNET50_FEATURES: usize = 2048;

/// ResNet50 trunk with the classification layer removed.
/// Each frame becomes the 2048-d global average pool of the last stage.
pub struct ResNetExtractor {
    model: Func<'static>,
    normalization: Normalization,
    device: Device,
}

impl ResNetExtractor {
    pub fn load(weights: &Path, normalization: Normalization, device: Device) -> Result<Self> {
        log::info!("Loading ResNet50 feature extractor from {} on {:?}", weights.display(), device);

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = resnet::resnet50_no_final_layer(vb)?;

        log::info!("ResNet50 feature extractor loaded");

        Ok(Self {
            model,
            normalization,
            device,
        })
    }
}

impl FeatureExtractor for ResNetExtractor {
    fn dim(&self) -> usize {
        RESNET50_FEATURES
    }

    fn extract(&self, frames: &[DecodedFrame]) -> Result<Vec<FeatureVector>> {
        if frames.is_empty() {
            return Ok(vec![]);
        }

        let input = preprocess::frames_to_tensor(frames, IMAGE_SIZE, self.normalization, &self.device)?;
        let pooled = self.model.forward(&input)?;
        let rows: Vec<Vec<f32>> = pooled.to_vec2()?;

        if rows.len() != frames.len() {
            return Err(anyhow!(
                "Feature batch has {} rows for {} frames",
                rows.len(),
                frames.len()
            ));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != RESNET50_FEATURES) {
            return Err(anyhow!(
                "Expected {} features per frame, got {}",
                RESNET50_FEATURES,
                row.len()
            ));
        }

        log::debug!("Extracted features for {} frames in one forward pass", frames.len());
        Ok(rows.into_iter().map(FeatureVector::new).collect())
    }
}
