use std::collections::HashSet;
use std::path::Path;

use super::{DecodedFrame, FrameDecoder, VideoSource};
use crate::error::AnalysisError;

/// In-memory decoder producing flat-colored frames, for tests and dry runs.
///
/// Frame `n` is filled with `n % 256` in every channel, so callers can tell
/// which index a frame came from by its pixels.
pub struct SyntheticDecoder {
    total_frames: u64,
    width: u32,
    height: u32,
    failing: HashSet<u64>,
    unavailable: bool,
}

impl SyntheticDecoder {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            width: 32,
            height: 24,
            failing: HashSet::new(),
            unavailable: false,
        }
    }

    /// Indices for which `decode_at` returns `None`.
    pub fn with_failing_frames(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(indices);
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Every `open` fails as if the file were missing.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(0)
        }
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError> {
        if self.unavailable {
            return Err(AnalysisError::SourceUnavailable(path.display().to_string()));
        }
        Ok(Box::new(SyntheticVideo {
            total_frames: self.total_frames,
            width: self.width,
            height: self.height,
            failing: self.failing.clone(),
        }))
    }
}

struct SyntheticVideo {
    total_frames: u64,
    width: u32,
    height: u32,
    failing: HashSet<u64>,
}

impl VideoSource for SyntheticVideo {
    fn total_frame_count(&self) -> u64 {
        self.total_frames
    }

    fn decode_at(&mut self, index: u64) -> Option<DecodedFrame> {
        if index >= self.total_frames || self.failing.contains(&index) {
            return None;
        }
        let fill = (index % 256) as u8;
        Some(DecodedFrame {
            index,
            rgb: vec![fill; self.width as usize * self.height as usize * 3],
            width: self.width,
            height: self.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frames_encode_their_index() {
        let decoder = SyntheticDecoder::new(300).with_size(4, 2);
        let mut video = decoder.open(Path::new("clip.mp4")).expect("open");
        assert_eq!(video.total_frame_count(), 300);

        let frame = video.decode_at(257).expect("frame");
        assert_eq!(frame.index, 257);
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.rgb.len(), 4 * 2 * 3);
        assert!(frame.rgb.iter().all(|&b| b == 1));
        assert!(video.decode_at(300).is_none());
    }

    #[test]
    fn test_failing_frames_return_none() {
        let decoder = SyntheticDecoder::new(10).with_failing_frames([3, 7]);
        let mut video = decoder.open(Path::new("clip.mp4")).expect("open");
        assert!(video.decode_at(3).is_none());
        assert!(video.decode_at(7).is_none());
        assert!(video.decode_at(4).is_some());

        let frames = video.decode_many(&[2, 3, 3, 9]);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].as_ref().map(|f| f.index), Some(2));
        assert!(frames[1].is_none() && frames[2].is_none());
        assert_eq!(frames[3].as_ref().map(|f| f.index), Some(9));
    }

    #[test]
    fn test_unavailable_source() {
        let decoder = SyntheticDecoder::unavailable();
        assert!(matches!(
            decoder.open(Path::new("missing.mp4")),
            Err(AnalysisError::SourceUnavailable(_))
        ));
    }
}
