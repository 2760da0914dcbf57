use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{GRU, GRUConfig, Linear, RNN, VarBuilder};
use std::path::Path;

use crate::aggregate::PaddedSequence;

/// Consumes a padded feature sequence and its mask, returns P(fake).
pub trait TemporalClassifier: Send + Sync {
    fn predict(&self, sequence: &PaddedSequence) -> Result<f64>;
}

/// Layer sizes of the CNN-RNN head.
#[derive(Debug, Clone, PartialEq)]
pub struct GruConfig {
    pub input_dim: usize,
    /// Hidden size of each stacked GRU, first to last
    pub gru_units: Vec<usize>,
    pub dense_units: usize,
    /// 1 = sigmoid head, 2+ = softmax head with class 1 = fake
    pub num_classes: usize,
}

impl Default for GruConfig {
    fn default() -> Self {
        Self {
            input_dim: 2048,
            gru_units: vec![16, 8],
            dense_units: 8,
            num_classes: 2,
        }
    }
}

/// Stacked GRUs over the valid steps, then dense ReLU and the class head.
///
/// Weights use candle/PyTorch names: `gru{N}.weight_ih_l0`,
/// `gru{N}.weight_hh_l0`, `gru{N}.bias_ih_l0`, `gru{N}.bias_hh_l0` for
/// N = 1.., then `dense.{weight,bias}` and `head.{weight,bias}`.
pub struct GruClassifier {
    grus: Vec<GRU>,
    dense: Linear,
    head: Linear,
    config: GruConfig,
    device: Device,
}

impl GruClassifier {
    pub fn load(weights: &Path, config: GruConfig, device: Device) -> Result<Self> {
        log::info!("Loading temporal classifier from {}", weights.display());
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = Self::new(config, vb, device)?;
        log::info!("Temporal classifier loaded ({:?})", model.config.gru_units);
        Ok(model)
    }

    pub fn new(config: GruConfig, vb: VarBuilder, device: Device) -> Result<Self> {
        if config.gru_units.is_empty() {
            return Err(anyhow!("Temporal classifier needs at least one GRU layer"));
        }
        if config.num_classes == 0 {
            return Err(anyhow!("Temporal classifier needs at least one output"));
        }

        let mut grus = Vec::with_capacity(config.gru_units.len());
        let mut in_dim = config.input_dim;
        for (i, &units) in config.gru_units.iter().enumerate() {
            let gru = candle_nn::gru(in_dim, units, GRUConfig::default(), vb.pp(format!("gru{}", i + 1)))?;
            grus.push(gru);
            in_dim = units;
        }
        let dense = candle_nn::linear(in_dim, config.dense_units, vb.pp("dense"))?;
        let head = candle_nn::linear(config.dense_units, config.num_classes, vb.pp("head"))?;

        Ok(Self {
            grus,
            dense,
            head,
            config,
            device,
        })
    }

    /// Final hidden state of the last GRU after the valid steps.
    /// Masked steps leave every layer's state untouched.
    fn encode(&self, sequence: &PaddedSequence) -> Result<Tensor> {
        let mut states = self
            .grus
            .iter()
            .map(|gru| gru.zero_state(1))
            .collect::<candle_core::Result<Vec<_>>>()?;

        for (step, features) in sequence.steps().iter().enumerate() {
            if !sequence.is_valid(step) {
                continue;
            }
            let mut input = Tensor::from_slice(features.as_slice(), (1, features.len()), &self.device)?;
            for (gru, state) in self.grus.iter().zip(states.iter_mut()) {
                *state = gru.step(&input, state)?;
                input = state.h().clone();
            }
        }

        let last = states
            .last()
            .ok_or_else(|| anyhow!("Temporal classifier has no layers"))?;
        Ok(last.h().clone())
    }
}

impl TemporalClassifier for GruClassifier {
    fn predict(&self, sequence: &PaddedSequence) -> Result<f64> {
        if sequence.dim() != self.config.input_dim {
            return Err(anyhow!(
                "Sequence has {} features per step, classifier expects {}",
                sequence.dim(),
                self.config.input_dim
            ));
        }
        if sequence.valid_count() == 0 {
            return Err(anyhow!("Sequence has no valid steps"));
        }

        let encoded = self.encode(sequence)?;
        let hidden = self.dense.forward(&encoded)?.relu()?;
        let logits = self.head.forward(&hidden)?;
        let logits: Vec<f32> = logits.flatten_all()?.to_vec1()?;
        fake_probability(&logits)
    }
}

/// Sigmoid for a single logit, else the softmax weight of class 1.
fn fake_probability(logits: &[f32]) -> Result<f64> {
    match logits {
        [] => Err(anyhow!("Classifier produced no output")),
        [single] => Ok(1.0 / (1.0 + (-(*single as f64)).exp())),
        many => {
            let max = many.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
            let exp: Vec<f64> = many.iter().map(|&l| (l as f64 - max).exp()).collect();
            let total: f64 = exp.iter().sum();
            Ok(exp[1] / total)
        }
    }
}

/// Classifier returning a fixed probability, for wiring tests and dry runs.
pub struct FixedProbability(pub f64);

impl TemporalClassifier for FixedProbability {
    fn predict(&self, sequence: &PaddedSequence) -> Result<f64> {
        if sequence.valid_count() == 0 {
            return Err(anyhow!("Sequence has no valid steps"));
        }
        Ok(self.0)
    }
}
