//! The end-to-end analysis: sample, decode, extract, aggregate, decide.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::path::Path;

use crate::aggregate::{AggregateStatistics, PaddedSequence};
use crate::config::Config;
use crate::decision::{Aggregate, ClassificationResult, DecisionEngine, FrameTally};
use crate::decoder::{DecodedFrame, FrameDecoder};
use crate::error::AnalysisError;
use crate::extractor::{FeatureExtractor, FrameScorer};
use crate::sampler::{FrameSampler, SamplingPolicy};
use crate::sequence_model::TemporalClassifier;

/// Loaded models for one of the two pipeline variants.
pub enum Strategy {
    /// Batched features into a padded sequence, scored by a temporal model
    Sequence {
        extractor: Box<dyn FeatureExtractor>,
        classifier: Box<dyn TemporalClassifier>,
    },
    /// Per-frame scores summarized by dispersion statistics
    Statistical { scorer: Box<dyn FrameScorer> },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Sequence { .. } => "sequence",
            Strategy::Statistical { .. } => "statistical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Decode,
    Extraction,
}

impl fmt::Display for SkipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipStage::Decode => f.write_str("decode"),
            SkipStage::Extraction => f.write_str("extraction"),
        }
    }
}

/// A sampled frame that contributed nothing to the result.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSkip {
    pub index: u64,
    pub stage: SkipStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub max_frames: usize,
    pub threshold: f64,
    pub sampling: SamplingPolicy,
    /// Fixed jitter seed; every call then samples the same indices
    pub seed: Option<u64>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            max_frames: 20,
            threshold: crate::decision::DEFAULT_THRESHOLD,
            sampling: SamplingPolicy::Interval,
            seed: None,
        }
    }
}

impl From<&Config> for AnalyzerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_frames: config.max_frames,
            threshold: config.threshold,
            sampling: config.sampling,
            seed: config.seed,
        }
    }
}

/// Process-wide analysis handle.
///
/// Models are loaded once and shared read-only; every call owns its video
/// handle and frame buffers, so one `Analyzer` serves concurrent requests.
pub struct Analyzer {
    decoder: Box<dyn FrameDecoder>,
    sampler: FrameSampler,
    strategy: Strategy,
    engine: DecisionEngine,
    settings: AnalyzerSettings,
}

impl Analyzer {
    pub fn new(decoder: Box<dyn FrameDecoder>, strategy: Strategy, settings: AnalyzerSettings) -> Self {
        let sampler = FrameSampler::new(settings.sampling);
        let policy = sampler.policy();
        log::info!(
            "Analyzer ready: {} strategy, {} decoder, {} sampling ({}), {} frames",
            strategy.name(),
            decoder.name(),
            policy.name(),
            if policy.is_deterministic() || settings.seed.is_some() {
                "deterministic"
            } else {
                "randomized"
            },
            settings.max_frames
        );
        Self {
            decoder,
            sampler,
            strategy,
            engine: DecisionEngine::new(),
            settings,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Classify one video. Failures are folded into the result's status.
    pub fn analyze(&self, video_path: &Path, threshold: Option<f64>) -> ClassificationResult {
        let mut tally = FrameTally::default();
        let result = match self.run(video_path, threshold, &mut tally) {
            Ok(result) => result,
            Err(e) if e.is_no_frames() => {
                log::warn!("{}: {}", video_path.display(), e);
                ClassificationResult::no_frames(e.to_string(), tally)
            }
            Err(e) => {
                log::error!("Analysis of {} failed: {}", video_path.display(), e);
                ClassificationResult::error(e.to_string(), tally)
            }
        };
        result.with_strategy(self.strategy.name())
    }

    pub fn try_analyze(&self, video_path: &Path, threshold: Option<f64>) -> Result<ClassificationResult, AnalysisError> {
        self.run(video_path, threshold, &mut FrameTally::default())
    }

    /// `tally` is kept current as frames are sampled and skipped, so it is
    /// meaningful on the error path too.
    fn run(
        &self,
        video_path: &Path,
        threshold: Option<f64>,
        tally: &mut FrameTally,
    ) -> Result<ClassificationResult, AnalysisError> {
        let threshold = threshold.unwrap_or(self.settings.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalysisError::InvalidThreshold(threshold));
        }

        let (frames, mut skips, sampled) = self.collect_frames(video_path)?;
        tally.sampled = sampled;
        tally.skipped = skips.len();
        if frames.is_empty() {
            return Err(AnalysisError::NoUsableFrames(if sampled == 0 {
                "video reports no frames".to_string()
            } else {
                format!("all {} sampled frames failed to decode", sampled)
            }));
        }

        let aggregate = match &self.strategy {
            Strategy::Sequence { extractor, classifier } => {
                let vectors = extractor.extract(&frames)?;
                let sequence = PaddedSequence::pack(vectors, self.settings.max_frames, extractor.dim())?;
                let probability_fake = classifier.predict(&sequence)?;
                Aggregate::Sequence {
                    probability_fake,
                    frames_analyzed: sequence.valid_count(),
                }
            }
            Strategy::Statistical { scorer } => {
                let scores = score_frames(scorer.as_ref(), &frames, &mut skips);
                tally.skipped = skips.len();
                AggregateStatistics::from_scores(&scores)
                    .map(Aggregate::Statistics)
                    .ok_or_else(|| {
                        AnalysisError::NoUsableFrames(format!("all {} decoded frames failed to score", frames.len()))
                    })?
            }
        };

        let result = self.engine.decide(&aggregate, threshold, *tally);

        log::info!(
            "{}: {} (p_fake={:.4}, {} frames analyzed, {} skipped)",
            video_path.display(),
            result.label,
            result.probability_fake.unwrap_or_default(),
            result.frames_analyzed,
            result.frames_skipped
        );
        Ok(result)
    }

    /// Decoded frames in sample order, the decode skips, and the sample count.
    /// The video handle is released before this returns.
    fn collect_frames(&self, video_path: &Path) -> Result<(Vec<DecodedFrame>, Vec<FrameSkip>, usize), AnalysisError> {
        let mut video = self.decoder.open(video_path)?;
        let total = video.total_frame_count();

        let indices = match self.settings.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                self.sampler.sample(total, self.settings.max_frames, &mut rng)
            }
            None => self.sampler.sample(total, self.settings.max_frames, &mut rand::rng()),
        };

        let mut frames = Vec::with_capacity(indices.len());
        let mut skips = Vec::new();
        for (&index, decoded) in indices.iter().zip(video.decode_many(&indices)) {
            match decoded {
                Some(frame) => frames.push(frame),
                None => record_skip(&mut skips, index, SkipStage::Decode, "frame could not be decoded".to_string()),
            }
        }
        Ok((frames, skips, indices.len()))
    }
}

/// Finite scores in frame order; failed or non-finite frames become skips.
fn score_frames(scorer: &dyn FrameScorer, frames: &[DecodedFrame], skips: &mut Vec<FrameSkip>) -> Vec<f32> {
    let mut scores = Vec::with_capacity(frames.len());
    for frame in frames {
        match scorer.score(frame) {
            Ok(score) if score.is_finite() => scores.push(score.clamp(0.0, 1.0)),
            Ok(score) => record_skip(skips, frame.index, SkipStage::Extraction, format!("non-finite score {}", score)),
            Err(e) => record_skip(skips, frame.index, SkipStage::Extraction, e.to_string()),
        }
    }
    scores
}

fn record_skip(skips: &mut Vec<FrameSkip>, index: u64, stage: SkipStage, reason: String) {
    log::debug!("Skipping frame {} at {}: {}", index, stage, reason);
    skips.push(FrameSkip { index, stage, reason });
}
