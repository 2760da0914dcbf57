//! Once-per-process weight loading for the configured strategy.

use anyhow::{Result, anyhow};
use candle_core::Device;
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::PathBuf;

use crate::config::{Config, StrategyKind, WeightsSource};
use crate::extractor::{FeatureExtractor, ResNetExtractor, VitScorer};
use crate::pipeline::Strategy;
use crate::sequence_model::{GruClassifier, GruConfig};

pub fn device() -> Device {
    #[cfg(feature = "metal")]
    let device = Device::new_metal(0).unwrap_or(Device::Cpu);
    #[cfg(not(feature = "metal"))]
    let device = Device::Cpu;
    device
}

pub fn load_strategy(config: &Config) -> Result<Strategy> {
    let device = device();
    log::info!("Loading {} strategy on {:?}", config.strategy.name(), device);

    match config.strategy {
        StrategyKind::Sequence => {
            // Fail before the feature download if the classifier is missing
            let sequence_weights = config.sequence_weights.clone().ok_or_else(|| {
                anyhow!("REALIES_SEQUENCE_WEIGHTS must point at the temporal classifier weights")
            })?;

            let feature_weights = resolve(&config.feature_weights, &config.feature_file)?;
            let extractor = ResNetExtractor::load(&feature_weights, config.normalization, device.clone())?;

            let gru_config = GruConfig {
                input_dim: extractor.dim(),
                gru_units: config.gru_units.clone(),
                dense_units: config.dense_units,
                num_classes: config.sequence_classes,
            };
            let classifier = GruClassifier::load(&sequence_weights, gru_config, device)?;

            Ok(Strategy::Sequence {
                extractor: Box::new(extractor),
                classifier: Box::new(classifier),
            })
        }
        StrategyKind::Statistical => {
            let config_path = resolve(&config.scorer_weights, "config.json")?;
            let model_path = resolve(&config.scorer_weights, "model.safetensors")?;
            let scorer = VitScorer::load(&config_path, &model_path, &config.fake_label, device)?;
            Ok(Strategy::Statistical {
                scorer: Box::new(scorer),
            })
        }
    }
}

/// Local sources name a file or a directory holding `file`; hub sources
/// download `file` from the repo into the hf-hub cache.
fn resolve(source: &WeightsSource, file: &str) -> Result<PathBuf> {
    match source {
        WeightsSource::Local(path) => {
            let path = if path.is_dir() { path.join(file) } else { path.clone() };
            if !path.is_file() {
                return Err(anyhow!("Weights file {} not found", path.display()));
            }
            Ok(path)
        }
        WeightsSource::Hub { repo } => {
            log::info!("Fetching {} from {}", file, repo);
            let api = Api::new()?;
            let repo = api.repo(Repo::new(repo.clone(), RepoType::Model));
            Ok(repo.get(file)?)
        }
    }
}
