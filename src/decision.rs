//! Mapping aggregate scores to labels and confidence.

use serde::Serialize;

use crate::aggregate::{AggregateStatistics, ConsistencyTier};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Skip ratio above which the result carries a data-quality note.
const SKIP_RATIO_WARNING: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
    NoFrames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "FAKE")]
    Fake,
    #[serde(rename = "LIKELY FAKE")]
    LikelyFake,
    #[serde(rename = "POSSIBLY FAKE")]
    PossiblyFake,
    #[serde(rename = "UNCERTAIN")]
    Uncertain,
    #[serde(rename = "LIKELY REAL")]
    LikelyReal,
    #[serde(rename = "REAL")]
    Real,
    #[serde(rename = "ERROR")]
    Error,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fake => "FAKE",
            Label::LikelyFake => "LIKELY FAKE",
            Label::PossiblyFake => "POSSIBLY FAKE",
            Label::Uncertain => "UNCERTAIN",
            Label::LikelyReal => "LIKELY REAL",
            Label::Real => "REAL",
            Label::Error => "ERROR",
        }
    }

    /// Two-way ladder: fake iff `p >= threshold`.
    pub fn binary(probability_fake: f64, threshold: f64) -> Self {
        if probability_fake >= threshold {
            Label::Fake
        } else {
            Label::Real
        }
    }

    /// Six-tier ladder with offsets of 0.1 and 0.2 around the threshold.
    pub fn graded(probability_fake: f64, threshold: f64) -> Self {
        let p = probability_fake;
        if p > threshold + 0.2 {
            Label::Fake
        } else if p > threshold + 0.1 {
            Label::LikelyFake
        } else if p > threshold {
            Label::PossiblyFake
        } else if p < threshold - 0.2 {
            Label::Real
        } else if p < threshold - 0.1 {
            Label::LikelyReal
        } else {
            Label::Uncertain
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the aggregation step hands to the decision engine.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// Temporal model output over a padded sequence
    Sequence {
        probability_fake: f64,
        frames_analyzed: usize,
    },
    /// Dispersion statistics over per-frame scores
    Statistics(AggregateStatistics),
}

/// Frame-level bookkeeping carried into the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTally {
    pub sampled: usize,
    pub skipped: usize,
}

impl FrameTally {
    pub fn skip_ratio(&self) -> f64 {
        if self.sampled == 0 {
            0.0
        } else {
            self.skipped as f64 / self.sampled as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub status: Status,
    pub label: Label,
    pub probability_fake: Option<f64>,
    pub probability_real: Option<f64>,
    pub confidence: Option<ConsistencyTier>,
    pub frames_analyzed: usize,
    pub frames_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<AggregateStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<&'static str>,
    pub message: String,
}

impl ClassificationResult {
    /// Nothing usable came out of the video. No label is fabricated.
    pub fn no_frames(message: impl Into<String>, tally: FrameTally) -> Self {
        Self::failed(Status::NoFrames, Label::Uncertain, message, tally)
    }

    pub fn error(message: impl Into<String>, tally: FrameTally) -> Self {
        Self::failed(Status::Error, Label::Error, message, tally)
    }

    fn failed(status: Status, label: Label, message: impl Into<String>, tally: FrameTally) -> Self {
        Self {
            status,
            label,
            probability_fake: None,
            probability_real: None,
            confidence: None,
            frames_analyzed: 0,
            frames_skipped: tally.skipped,
            statistics: None,
            strategy: None,
            message: message.into(),
        }
    }

    pub fn with_strategy(mut self, strategy: &'static str) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Turns an [`Aggregate`] into a [`ClassificationResult`].
///
/// Sequence aggregates use the binary ladder; statistical aggregates use
/// the graded ladder with the consistency tier as confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, aggregate: &Aggregate, threshold: f64, tally: FrameTally) -> ClassificationResult {
        let (probability_fake, label, confidence, frames_analyzed, statistics) = match aggregate {
            Aggregate::Sequence {
                probability_fake,
                frames_analyzed,
            } => {
                let p = probability_fake.clamp(0.0, 1.0);
                (
                    p,
                    Label::binary(p, threshold),
                    margin_confidence(p, threshold),
                    *frames_analyzed,
                    None,
                )
            }
            Aggregate::Statistics(stats) => {
                let p = stats.mean.clamp(0.0, 1.0);
                (
                    p,
                    Label::graded(p, threshold),
                    stats.consistency(),
                    stats.count,
                    Some(*stats),
                )
            }
        };

        let mut message = String::from("Analysis completed successfully");
        if tally.skip_ratio() > SKIP_RATIO_WARNING {
            log::warn!(
                "{} of {} sampled frames were skipped",
                tally.skipped,
                tally.sampled
            );
            message = format!(
                "{} ({} of {} sampled frames unusable, result may be unreliable)",
                message, tally.skipped, tally.sampled
            );
        }

        ClassificationResult {
            status: Status::Ok,
            label,
            probability_fake: Some(probability_fake),
            probability_real: Some(1.0 - probability_fake),
            confidence: Some(confidence),
            frames_analyzed,
            frames_skipped: tally.skipped,
            statistics,
            strategy: None,
            message,
        }
    }
}

/// Binary-mode confidence from distance to the threshold.
fn margin_confidence(probability_fake: f64, threshold: f64) -> ConsistencyTier {
    if (probability_fake - threshold).abs() > 0.3 {
        ConsistencyTier::High
    } else {
        ConsistencyTier::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(scores: &[f32]) -> Aggregate {
        Aggregate::Statistics(AggregateStatistics::from_scores(scores).expect("stats"))
    }

    fn tally(sampled: usize, skipped: usize) -> FrameTally {
        FrameTally { sampled, skipped }
    }

    #[test]
    fn test_graded_ladder() {
        let t = 0.5;
        assert_eq!(Label::graded(0.95, t), Label::Fake);
        assert_eq!(Label::graded(0.65, t), Label::LikelyFake);
        assert_eq!(Label::graded(0.55, t), Label::PossiblyFake);
        assert_eq!(Label::graded(0.51, t), Label::PossiblyFake);
        assert_eq!(Label::graded(0.5, t), Label::Uncertain);
        assert_eq!(Label::graded(0.45, t), Label::Uncertain);
        assert_eq!(Label::graded(0.35, t), Label::LikelyReal);
        assert_eq!(Label::graded(0.1, t), Label::Real);
    }

    #[test]
    fn test_graded_ladder_follows_threshold() {
        assert_eq!(Label::graded(0.75, 0.7), Label::PossiblyFake);
        assert_eq!(Label::graded(0.45, 0.7), Label::Real);
    }

    #[test]
    fn test_binary_threshold_is_inclusive() {
        assert_eq!(Label::binary(0.5, 0.5), Label::Fake);
        assert_eq!(Label::binary(0.4999, 0.5), Label::Real);
        assert_eq!(Label::binary(0.3, 0.3), Label::Fake);
    }

    #[test]
    fn test_consistent_fake_frames() {
        let result = DecisionEngine::new().decide(&stats(&[0.9, 0.85, 0.92]), 0.5, tally(3, 0));
        assert_eq!(result.status, Status::Ok);
        assert_eq!(result.label, Label::Fake);
        assert_eq!(result.confidence, Some(ConsistencyTier::High));
        assert_eq!(result.frames_analyzed, 3);
        let p = result.probability_fake.expect("p");
        assert!((p - 0.89).abs() < 1e-6);
        assert!((result.probability_real.expect("q") - (1.0 - p)).abs() < 1e-12);
    }

    #[test]
    fn test_split_frames_are_uncertain() {
        let result = DecisionEngine::new().decide(&stats(&[0.3, 0.7, 0.5]), 0.5, tally(3, 0));
        assert_eq!(result.label, Label::Uncertain);
        assert_eq!(result.confidence, Some(ConsistencyTier::Medium));
    }

    #[test]
    fn test_sequence_aggregate_uses_binary_ladder() {
        let engine = DecisionEngine::new();
        let aggregate = Aggregate::Sequence {
            probability_fake: 0.62,
            frames_analyzed: 20,
        };
        let result = engine.decide(&aggregate, 0.5, tally(20, 0));
        assert_eq!(result.label, Label::Fake);
        assert_eq!(result.confidence, Some(ConsistencyTier::Medium));
        assert!(result.statistics.is_none());

        let aggregate = Aggregate::Sequence {
            probability_fake: 0.05,
            frames_analyzed: 20,
        };
        let result = engine.decide(&aggregate, 0.5, tally(20, 0));
        assert_eq!(result.label, Label::Real);
        assert_eq!(result.confidence, Some(ConsistencyTier::High));
    }

    #[test]
    fn test_high_skip_ratio_is_noted() {
        let result = DecisionEngine::new().decide(&stats(&[0.2]), 0.5, tally(4, 3));
        assert_eq!(result.frames_skipped, 3);
        assert!(result.message.contains("3 of 4"));

        let result = DecisionEngine::new().decide(&stats(&[0.2]), 0.5, tally(4, 1));
        assert_eq!(result.message, "Analysis completed successfully");
    }

    #[test]
    fn test_no_frames_result_has_no_label_or_probability() {
        let result = ClassificationResult::no_frames("No usable frames detected.", tally(0, 0));
        assert_eq!(result.status, Status::NoFrames);
        assert_eq!(result.label, Label::Uncertain);
        assert_eq!(result.frames_analyzed, 0);
        assert!(result.probability_fake.is_none());
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_result_serializes_to_wire_names() {
        let result = DecisionEngine::new()
            .decide(&stats(&[0.55, 0.56]), 0.5, tally(2, 0))
            .with_strategy("statistical");
        let json = serde_json::to_value(&result).expect("json");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["label"], "POSSIBLY FAKE");
        assert_eq!(json["confidence"], "HIGH");
        assert_eq!(json["frames_analyzed"], 2);
        assert_eq!(json["strategy"], "statistical");
        assert!(json["statistics"]["std_dev"].is_number());

        let error = ClassificationResult::no_frames("none", tally(0, 0));
        let json = serde_json::to_value(&error).expect("json");
        assert_eq!(json["status"], "no_frames");
        assert!(json["probability_fake"].is_null());
        assert!(json.get("statistics").is_none());
    }
}
