use anyhow::{Result, anyhow};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use std::path::Path;
use std::sync::Mutex;

use super::preprocess::{self, IMAGE_SIZE, Normalization};
use super::FrameScorer;
use crate::decoder::DecodedFrame;

/// Per-frame real/fake ViT classifier (HF `ViTForImageClassification` layout).
/// The score is the softmax probability of the fake class.
pub struct VitScorer {
    model: Mutex<vit::Model>,
    fake_class: usize,
    num_labels: usize,
    device: Device,
}

impl VitScorer {
    /// `config` is the model's `config.json`; `fake_label` is matched
    /// case-insensitively against its `id2label` table.
    pub fn load(config: &Path, weights: &Path, fake_label: &str, device: Device) -> Result<Self> {
        log::info!("Loading ViT frame scorer from {} on {:?}", weights.display(), device);

        let raw = std::fs::read_to_string(config)?;
        let vit_config: vit::Config = serde_json::from_str(&raw)?;
        let labels = parse_id2label(&raw)?;
        let fake_class = resolve_fake_class(&labels, fake_label)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = vit::Model::new(&vit_config, labels.len(), vb)?;

        log::info!(
            "ViT frame scorer loaded ({} labels, fake class {} = {:?})",
            labels.len(),
            fake_class,
            labels[fake_class]
        );

        Ok(Self {
            model: Mutex::new(model),
            fake_class,
            num_labels: labels.len(),
            device,
        })
    }
}

impl FrameScorer for VitScorer {
    fn score(&self, frame: &DecodedFrame) -> Result<f32> {
        let input = preprocess::frames_to_tensor(
            std::slice::from_ref(frame),
            IMAGE_SIZE,
            Normalization::Symmetric,
            &self.device,
        )?;

        let model = self.model.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
        let logits = model.forward(&input)?;
        drop(model);

        let probs = candle_nn::ops::softmax(&logits, 1)?;
        let probs_vec: Vec<f32> = probs.flatten_all()?.to_vec1()?;
        if probs_vec.len() != self.num_labels {
            return Err(anyhow!(
                "Expected {} class probabilities, got {}",
                self.num_labels,
                probs_vec.len()
            ));
        }

        let fake = probs_vec[self.fake_class];
        log::debug!("Frame {} fake probability {:.3}", frame.index, fake);
        Ok(fake)
    }
}

/// Labels ordered by class id, from the `id2label` map of an HF config.
fn parse_id2label(raw_config: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(raw_config)?;
    let map = value
        .get("id2label")
        .and_then(|v| v.as_object())
        .ok_or_else(|| anyhow!("config.json has no id2label table"))?;

    let mut labels: Vec<(usize, String)> = map
        .iter()
        .map(|(id, label)| {
            let id = id
                .parse::<usize>()
                .map_err(|_| anyhow!("Non-numeric class id {:?}", id))?;
            let label = label
                .as_str()
                .ok_or_else(|| anyhow!("Class {} label is not a string", id))?;
            Ok((id, label.to_string()))
        })
        .collect::<Result<_>>()?;
    labels.sort_by_key(|(id, _)| *id);

    if labels.iter().enumerate().any(|(pos, (id, _))| pos != *id) {
        return Err(anyhow!("id2label ids are not contiguous from 0"));
    }
    if labels.len() < 2 {
        return Err(anyhow!("Classifier needs at least 2 labels, found {}", labels.len()));
    }
    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

fn resolve_fake_class(labels: &[String], fake_label: &str) -> Result<usize> {
    labels
        .iter()
        .position(|l| l.eq_ignore_ascii_case(fake_label.trim()))
        .ok_or_else(|| anyhow!("Label {:?} not found among {:?}", fake_label, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id2label_orders_by_id() {
        let raw = r#"{"hidden_size": 768, "id2label": {"1": "Real", "0": "Fake"}}"#;
        let labels = parse_id2label(raw).expect("labels");
        assert_eq!(labels, vec!["Fake".to_string(), "Real".to_string()]);
        assert_eq!(resolve_fake_class(&labels, "fake").expect("fake"), 0);
        assert_eq!(resolve_fake_class(&labels, "REAL").expect("real"), 1);
    }

    #[test]
    fn test_parse_id2label_rejects_gaps() {
        let raw = r#"{"id2label": {"0": "Fake", "2": "Real"}}"#;
        assert!(parse_id2label(raw).is_err());
    }

    #[test]
    fn test_missing_fake_label() {
        let labels = vec!["drawings".to_string(), "neutral".to_string()];
        assert!(resolve_fake_class(&labels, "fake").is_err());
    }

    #[test]
    fn test_missing_id2label() {
        assert!(parse_id2label(r#"{"hidden_size": 768}"#).is_err());
    }
}
