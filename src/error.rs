use thiserror::Error;

/// Per-request failures of the analysis pipeline.
///
/// Failures of individual frames are not represented here; they are
/// recorded as [`crate::pipeline::FrameSkip`] values and only surface as
/// `NoUsableFrames` when nothing survives.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Cannot open video {0}")]
    SourceUnavailable(String),

    #[error("No usable frames detected: {0}")]
    NoUsableFrames(String),

    #[error("Threshold {0} outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Model error: {0}")]
    Model(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn is_no_frames(&self) -> bool {
        matches!(self, AnalysisError::NoUsableFrames(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_wraps_anyhow() {
        let err: AnalysisError = anyhow::anyhow!("forward pass failed").into();
        assert!(matches!(err, AnalysisError::Model(_)));
        assert_eq!(err.to_string(), "Model error: forward pass failed");
        assert!(!err.is_no_frames());
    }

    #[test]
    fn test_no_frames_is_distinguished() {
        let err = AnalysisError::NoUsableFrames("all 20 sampled frames failed".into());
        assert!(err.is_no_frames());
    }
}
