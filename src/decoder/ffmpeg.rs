use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{DecodedFrame, FrameDecoder, VideoSource};
use crate::error::AnalysisError;

/// Decoder that shells out to the ffmpeg toolchain.
///
/// Sampled frames are pulled in one `select` pass into a scratch directory;
/// `decode_at` is a short-lived process writing one PNG to stdout. No decoder
/// state outlives a call.
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    fn probe(&self, path: &Path, entry: &str, count_packets: bool) -> Result<Option<u64>, AnalysisError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-select_streams", "v:0"]);
        if count_packets {
            cmd.arg("-count_packets");
        }
        let output = cmd
            .args(["-show_entries", &format!("stream={}", entry)])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                AnalysisError::SourceUnavailable(format!("{}: ffprobe not available ({})", path.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::SourceUnavailable(format!(
                "{}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        Ok(parse_frame_count(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, AnalysisError> {
        if !path.is_file() {
            return Err(AnalysisError::SourceUnavailable(format!(
                "{}: no such file",
                path.display()
            )));
        }

        // Container metadata first, packet counting reads the whole stream
        let total_frames = match self.probe(path, "nb_frames", false)? {
            Some(n) => n,
            None => self.probe(path, "nb_read_packets", true)?.unwrap_or(0),
        };

        log::info!("Opened {} ({} frames)", path.display(), total_frames);

        Ok(Box::new(FfmpegVideo {
            ffmpeg: self.ffmpeg.clone(),
            path: path.to_path_buf(),
            total_frames,
        }))
    }
}

struct FfmpegVideo {
    ffmpeg: String,
    path: PathBuf,
    total_frames: u64,
}

impl FfmpegVideo {
    fn command(&self, filter: &str) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .arg("-i")
            .arg(&self.path)
            .args(["-an", "-sn"])
            .args(["-vf", filter]);
        cmd
    }

    /// One decoder pass writing every selected frame to a scratch directory.
    /// `wanted` must be sorted and unique; `None` when the output can't be
    /// matched one-to-one with it.
    fn decode_selected(&self, wanted: &[u64]) -> Option<HashMap<u64, DecodedFrame>> {
        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Cannot create frame scratch directory: {}", e);
                return None;
            }
        };

        let filter = wanted
            .iter()
            .map(|index| format!("eq(n\\,{})", index))
            .collect::<Vec<_>>()
            .join("+");
        let output = self
            .command(&format!("select={}", filter))
            .args(["-vsync", "0"])
            .arg(scratch.path().join("frame_%05d.png"))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match output {
            Ok(result) if result.status.success() => {}
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                log::debug!("ffmpeg batch decode failed: {}", stderr.trim());
                return None;
            }
            Err(e) => {
                log::warn!("ffmpeg not available: {}", e);
                return None;
            }
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(scratch.path())
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect();
        files.sort();

        if files.len() != wanted.len() {
            log::debug!(
                "ffmpeg batch decode produced {} frames for {} selected",
                files.len(),
                wanted.len()
            );
            return None;
        }

        let mut frames = HashMap::with_capacity(wanted.len());
        for (&index, file) in wanted.iter().zip(&files) {
            match image::open(file) {
                Ok(img) => {
                    frames.insert(index, rgb_frame(index, img));
                }
                Err(e) => {
                    log::debug!("Failed to decode frame {}: {}", index, e);
                    return None;
                }
            }
        }
        Some(frames)
    }
}

impl VideoSource for FfmpegVideo {
    fn total_frame_count(&self) -> u64 {
        self.total_frames
    }

    fn decode_at(&mut self, index: u64) -> Option<DecodedFrame> {
        if index >= self.total_frames {
            return None;
        }

        let output = self
            .command(&format!("select=eq(n\\,{})", index))
            .args(["-frames:v", "1"])
            .args(["-f", "image2pipe", "-vcodec", "png", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(result) if result.status.success() && !result.stdout.is_empty() => result,
            Ok(result) => {
                let stderr = String::from_utf8_lossy(&result.stderr);
                log::debug!("ffmpeg returned no frame {}: {}", index, stderr.trim());
                return None;
            }
            Err(e) => {
                log::warn!("ffmpeg not available: {}", e);
                return None;
            }
        };

        match image::load_from_memory_with_format(&output.stdout, image::ImageFormat::Png) {
            Ok(img) => Some(rgb_frame(index, img)),
            Err(e) => {
                log::debug!("Failed to decode frame {}: {}", index, e);
                None
            }
        }
    }

    /// Single pass over the stream for all indices; frame-by-frame if the
    /// batch output doesn't line up.
    fn decode_many(&mut self, indices: &[u64]) -> Vec<Option<DecodedFrame>> {
        let mut wanted: Vec<u64> = indices
            .iter()
            .copied()
            .filter(|&index| index < self.total_frames)
            .collect();
        wanted.sort_unstable();
        wanted.dedup();

        if wanted.len() > 1 {
            if let Some(frames) = self.decode_selected(&wanted) {
                return indices.iter().map(|index| frames.get(index).cloned()).collect();
            }
        }
        indices.iter().map(|&index| self.decode_at(index)).collect()
    }
}

fn rgb_frame(index: u64, img: image::DynamicImage) -> DecodedFrame {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    DecodedFrame {
        index,
        rgb: rgb.into_raw(),
        width,
        height,
    }
}

impl Drop for FfmpegVideo {
    fn drop(&mut self) {
        log::debug!("Released {}", self.path.display());
    }
}

/// First line of ffprobe's `nokey` output as a positive count.
/// `N/A`, `0` and blank output mean the container didn't say.
fn parse_frame_count(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<u64>().ok())
        .filter(|n| *n > 0)
}
