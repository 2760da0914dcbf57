//! Environment-driven settings.
//!
//! Every knob has a default; unparsable or out-of-range values fall back
//! to it with a warning rather than failing startup.

use std::path::PathBuf;
use std::str::FromStr;

use crate::decision::DEFAULT_THRESHOLD;
use crate::extractor::Normalization;
use crate::sampler::SamplingPolicy;

const DEFAULT_MAX_FRAMES: usize = 20;
const DEFAULT_JITTER: u64 = 2;
const DEFAULT_FEATURE_REPO: &str = "lmz/candle-resnet";
const DEFAULT_FEATURE_FILE: &str = "resnet50.safetensors";
const DEFAULT_SCORER_REPO: &str = "prithivMLmods/Deep-Fake-Detector-Model";
const DEFAULT_FAKE_LABEL: &str = "fake";
const DEFAULT_GRU_UNITS: [usize; 2] = [16, 8];
const DEFAULT_DENSE_UNITS: usize = 8;
const DEFAULT_SEQUENCE_CLASSES: usize = 2;
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_SAMPLE_VIDEO: &str = "1.mp4";

/// Which pipeline variant runs after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// ResNet50 features, padded sequence, GRU classifier, binary ladder
    Sequence,
    /// Per-frame ViT scores, statistics, graded ladder
    Statistical,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Sequence => "sequence",
            StrategyKind::Statistical => "statistical",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequence" | "gru" => Ok(StrategyKind::Sequence),
            "statistical" | "stats" | "ensemble" => Ok(StrategyKind::Statistical),
            other => Err(format!("unknown strategy {:?}", other)),
        }
    }
}

/// Where a weights file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    Hub { repo: String },
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: StrategyKind,
    pub max_frames: usize,
    pub threshold: f64,
    pub sampling: SamplingPolicy,
    pub seed: Option<u64>,

    pub feature_weights: WeightsSource,
    pub feature_file: String,
    pub normalization: Normalization,

    pub sequence_weights: Option<PathBuf>,
    pub gru_units: Vec<usize>,
    pub dense_units: usize,
    pub sequence_classes: usize,

    pub scorer_weights: WeightsSource,
    pub fake_label: String,

    pub ffmpeg: String,
    pub ffprobe: String,

    pub port: u16,
    pub sample_video: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let strategy = parsed(&get, "REALIES_STRATEGY", StrategyKind::Sequence, |v| v.parse().ok());

        let max_frames = parsed(&get, "REALIES_MAX_FRAMES", DEFAULT_MAX_FRAMES, |v| {
            v.parse().ok().filter(|n: &usize| *n > 0)
        });

        let threshold = parsed(&get, "REALIES_THRESHOLD", DEFAULT_THRESHOLD, |v| {
            v.parse().ok().filter(|t: &f64| (0.0..=1.0).contains(t))
        });

        let jitter = parsed(&get, "REALIES_JITTER", DEFAULT_JITTER, |v| v.parse().ok());
        let sampling = parsed(&get, "REALIES_SAMPLING", SamplingPolicy::Interval, |v| {
            match v.to_lowercase().as_str() {
                "interval" => Some(SamplingPolicy::Interval),
                "jittered" | "jitter" => Some(SamplingPolicy::Jittered { max_offset: jitter }),
                _ => None,
            }
        });
        let seed = get("REALIES_SEED").and_then(|v| match v.parse() {
            Ok(seed) => Some(seed),
            Err(_) => {
                log::warn!("Ignoring REALIES_SEED={:?}: not an unsigned integer", v);
                None
            }
        });

        let feature_weights = match get("REALIES_FEATURE_WEIGHTS") {
            Some(path) => WeightsSource::Local(PathBuf::from(path)),
            None => WeightsSource::Hub {
                repo: get("REALIES_FEATURE_REPO").unwrap_or_else(|| DEFAULT_FEATURE_REPO.to_string()),
            },
        };
        let feature_file = get("REALIES_FEATURE_FILE").unwrap_or_else(|| DEFAULT_FEATURE_FILE.to_string());
        let normalization = parsed(&get, "REALIES_NORMALIZATION", Normalization::ImageNet, Normalization::parse);

        let gru_units = parsed(&get, "REALIES_GRU_UNITS", DEFAULT_GRU_UNITS.to_vec(), parse_units);
        let dense_units = parsed(&get, "REALIES_DENSE_UNITS", DEFAULT_DENSE_UNITS, |v| {
            v.parse().ok().filter(|n: &usize| *n > 0)
        });
        let sequence_classes = parsed(&get, "REALIES_SEQUENCE_CLASSES", DEFAULT_SEQUENCE_CLASSES, |v| {
            v.parse().ok().filter(|n: &usize| *n > 0)
        });

        let scorer_weights = match get("REALIES_SCORER_WEIGHTS") {
            Some(dir) => WeightsSource::Local(PathBuf::from(dir)),
            None => WeightsSource::Hub {
                repo: get("REALIES_SCORER_REPO").unwrap_or_else(|| DEFAULT_SCORER_REPO.to_string()),
            },
        };

        Self {
            strategy,
            max_frames,
            threshold,
            sampling,
            seed,
            feature_weights,
            feature_file,
            normalization,
            sequence_weights: get("REALIES_SEQUENCE_WEIGHTS").map(PathBuf::from),
            gru_units,
            dense_units,
            sequence_classes,
            scorer_weights,
            fake_label: get("REALIES_FAKE_LABEL").unwrap_or_else(|| DEFAULT_FAKE_LABEL.to_string()),
            ffmpeg: get("REALIES_FFMPEG").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe: get("REALIES_FFPROBE").unwrap_or_else(|| "ffprobe".to_string()),
            port: parsed(&get, "PORT", DEFAULT_PORT, |v| v.parse().ok()),
            sample_video: PathBuf::from(
                get("REALIES_SAMPLE_VIDEO").unwrap_or_else(|| DEFAULT_SAMPLE_VIDEO.to_string()),
            ),
        }
    }
}

fn parsed<T, G, P>(get: &G, key: &str, default: T, parse: P) -> T
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match get(key) {
        None => default,
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            log::warn!("Ignoring {}={:?}: invalid value, using default", key, raw);
            default
        }),
    }
}

/// `"16,8"` -> `[16, 8]`; any empty or zero entry rejects the whole list.
fn parse_units(value: &str) -> Option<Vec<usize>> {
    let units = value
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok().filter(|n| *n > 0))
        .collect::<Option<Vec<_>>>()?;
    if units.is_empty() { None } else { Some(units) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.strategy, StrategyKind::Sequence);
        assert_eq!(config.max_frames, 20);
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.sampling, SamplingPolicy::Interval);
        assert_eq!(config.seed, None);
        assert_eq!(config.gru_units, vec![16, 8]);
        assert_eq!(config.normalization, Normalization::ImageNet);
        assert_eq!(
            config.feature_weights,
            WeightsSource::Hub {
                repo: "lmz/candle-resnet".to_string()
            }
        );
        assert_eq!(config.port, 5000);
        assert!(config.sequence_weights.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("REALIES_STRATEGY", "statistical"),
            ("REALIES_MAX_FRAMES", "32"),
            ("REALIES_THRESHOLD", "0.65"),
            ("REALIES_SAMPLING", "jittered"),
            ("REALIES_JITTER", "3"),
            ("REALIES_SEED", "1234"),
            ("REALIES_GRU_UNITS", "32, 16"),
            ("REALIES_SCORER_WEIGHTS", "/models/vit"),
            ("REALIES_SEQUENCE_WEIGHTS", "/models/cnn_rnn.safetensors"),
        ]);
        assert_eq!(config.strategy, StrategyKind::Statistical);
        assert_eq!(config.max_frames, 32);
        assert_eq!(config.threshold, 0.65);
        assert_eq!(config.sampling, SamplingPolicy::Jittered { max_offset: 3 });
        assert_eq!(config.seed, Some(1234));
        assert_eq!(config.gru_units, vec![32, 16]);
        assert_eq!(config.scorer_weights, WeightsSource::Local(PathBuf::from("/models/vit")));
        assert_eq!(
            config.sequence_weights,
            Some(PathBuf::from("/models/cnn_rnn.safetensors"))
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("REALIES_STRATEGY", "magic"),
            ("REALIES_MAX_FRAMES", "0"),
            ("REALIES_THRESHOLD", "1.5"),
            ("REALIES_SAMPLING", "random"),
            ("REALIES_SEED", "-4"),
            ("REALIES_GRU_UNITS", "16,,8"),
            ("PORT", "http"),
        ]);
        assert_eq!(config.strategy, StrategyKind::Sequence);
        assert_eq!(config.max_frames, 20);
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.sampling, SamplingPolicy::Interval);
        assert_eq!(config.seed, None);
        assert_eq!(config.gru_units, vec![16, 8]);
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[("REALIES_FEATURE_WEIGHTS", "  "), ("REALIES_FAKE_LABEL", "")]);
        assert!(matches!(config.feature_weights, WeightsSource::Hub { .. }));
        assert_eq!(config.fake_label, "fake");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("16,8"), Some(vec![16, 8]));
        assert_eq!(parse_units("64"), Some(vec![64]));
        assert_eq!(parse_units("16,0"), None);
        assert_eq!(parse_units("a"), None);
    }
}
