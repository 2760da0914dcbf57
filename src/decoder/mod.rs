use std::path::Path;

use crate::error::AnalysisError;

/// Decoded frame in RGB channel order, at source resolution.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: u64,
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// An opened, seekable video. Resources are released when dropped.
pub trait VideoSource {
    /// Frame count of the primary video stream, 0 if unknown.
    fn total_frame_count(&self) -> u64;

    /// Decode one frame, `None` if that position cannot be retrieved.
    fn decode_at(&mut self, index: u64) -> Option<DecodedFrame>;

    /// One entry per requested index, in request order.
    fn decode_many(&mut self, indices: &[u64]) -> Vec<Option<DecodedFrame>> {
        indices.iter().map(|&index| self.decode_at(index)).collect()
    }
}

/// Pluggable video decoding backend
pub trait FrameDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails with [`AnalysisError::SourceUnavailable`] when the source can't be read at all.
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError>;
}

mod ffmpeg;
mod synthetic;

pub use ffmpeg::FfmpegDecoder;
pub use synthetic::SyntheticDecoder;
