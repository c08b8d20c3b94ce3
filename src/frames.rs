// frames.rs - Evenly spaced frame sampling from uploaded videos
use crate::error::TempFileError;
use crate::temp_files::{TempRole, TempScope};
use crate::utils::{execute_ffmpeg_command, execute_ffprobe_command, parse_frame_count, parse_frame_rate};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Blocking access to the frames of a video file.
pub trait FrameSource: Send + Sync {
    /// Total number of video frames. Errors mean the file cannot be opened.
    fn frame_count(&self, video: &Path) -> Result<u64, String>;

    /// Decode the frame at `index` and return it as JPEG bytes.
    fn decode_frame(&self, video: &Path, index: u64) -> Result<Vec<u8>, String>;
}

/// `FrameSource` backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameSource;

impl FrameSource for FfmpegFrameSource {
    fn frame_count(&self, video: &Path) -> Result<u64, String> {
        let path = video.to_str().ok_or("Video path is not valid UTF-8")?;

        // Container metadata first, it needs no decoding.
        let header = execute_ffprobe_command(&[
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=nb_frames",
            "-of", "csv=p=0",
            path,
        ])?;
        if let Some(count) = parse_frame_count(&header).filter(|c| *c > 0) {
            return Ok(count);
        }

        let counted = execute_ffprobe_command(&[
            "-v", "error",
            "-count_frames",
            "-select_streams", "v:0",
            "-show_entries", "stream=nb_read_frames",
            "-of", "csv=p=0",
            path,
        ])?;
        Ok(parse_frame_count(&counted).unwrap_or(0))
    }

    fn decode_frame(&self, video: &Path, index: u64) -> Result<Vec<u8>, String> {
        // Seek by timestamp when the frame rate is known, so only the frames
        // after the nearest keyframe are decoded.
        if let Some(fps) = video.to_str().and_then(probe_frame_rate) {
            let position = FramePosition::Seek(seek_timestamp(index, fps));
            let seeked = execute_ffmpeg_command(frame_command(video, position))?;
            if !seeked.is_empty() {
                return Ok(seeked);
            }
            tracing::debug!("seek to frame {} gave no output, selecting by index", index);
        }

        let bytes = execute_ffmpeg_command(frame_command(video, FramePosition::Select(index)))?;
        if bytes.is_empty() {
            return Err(format!("No frame decoded at index {}", index));
        }
        Ok(bytes)
    }
}

enum FramePosition {
    /// Input seek to a timestamp in seconds.
    Seek(String),
    /// Decode from the start and keep frame number `n`.
    Select(u64),
}

/// ffmpeg invocation writing exactly one JPEG frame to stdout.
fn frame_command(video: &Path, position: FramePosition) -> Command {
    let mut command = Command::new("ffmpeg");
    command.arg("-v").arg("error");
    match position {
        FramePosition::Seek(timestamp) => {
            command.arg("-ss").arg(timestamp).arg("-i").arg(video);
        }
        FramePosition::Select(index) => {
            command
                .arg("-i")
                .arg(video)
                .arg("-vf")
                .arg(format!("select=eq(n\\,{})", index));
        }
    }
    command
        .arg("-frames:v")
        .arg("1")
        .arg("-f")
        .arg("image2pipe")
        .arg("-vcodec")
        .arg("mjpeg")
        .arg("-");
    command
}

fn probe_frame_rate(path: &str) -> Option<f64> {
    let output = execute_ffprobe_command(&[
        "-v", "error",
        "-select_streams", "v:0",
        "-show_entries", "stream=avg_frame_rate",
        "-of", "csv=p=0",
        path,
    ])
    .ok()?;
    parse_frame_rate(&output)
}

/// Timestamp of frame `index`, truncated to the millisecond so it never
/// lands past the frame itself.
pub fn seek_timestamp(index: u64, fps: f64) -> String {
    let millis = (index as f64 * 1000.0 / fps).floor() as u64;
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

/// Pick up to `max_frames` indices evenly spread over `[0, total - 1]`,
/// always including the first and last frame when more than one is taken.
pub fn frame_indices(total_frames: u64, max_frames: usize) -> Vec<u64> {
    let k = (max_frames as u64).min(total_frames);
    match k {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let last = (total_frames - 1) as f64;
            (0..k)
                .map(|i| (i as f64 * last / (k - 1) as f64).round() as u64)
                .collect()
        }
    }
}

#[derive(Clone)]
pub struct FrameSampler {
    source: Arc<dyn FrameSource>,
    max_frames: usize,
}

impl FrameSampler {
    pub fn new(source: Arc<dyn FrameSource>, max_frames: usize) -> Self {
        Self { source, max_frames }
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Decode the sampled frames of `video` into scratch JPEG files tracked
    /// by `scope`, returned in frame order.
    ///
    /// A video that cannot be opened or has no frames gives an empty list.
    /// Frames that fail to decode are skipped, so the list may be shorter
    /// than the number of indices requested.
    pub async fn sample(
        &self,
        video: &Path,
        scope: &mut TempScope,
    ) -> Result<Vec<PathBuf>, TempFileError> {
        let total = {
            let source = self.source.clone();
            let owned = video.to_path_buf();
            match tokio::task::spawn_blocking(move || source.frame_count(&owned)).await {
                Ok(Ok(total)) => total,
                Ok(Err(e)) => {
                    tracing::warn!(video = %video.display(), "could not open video: {}", e);
                    return Ok(Vec::new());
                }
                Err(e) => {
                    tracing::error!("frame count task failed: {}", e);
                    return Ok(Vec::new());
                }
            }
        };

        let indices = frame_indices(total, self.max_frames);
        tracing::debug!(total_frames = total, "sampling frames at {:?}", indices);
        if indices.is_empty() {
            tracing::warn!("video has 0 frames");
            return Ok(Vec::new());
        }

        let mut frames = Vec::with_capacity(indices.len());
        for index in indices {
            let source = self.source.clone();
            let owned = video.to_path_buf();
            let decoded =
                tokio::task::spawn_blocking(move || source.decode_frame(&owned, index)).await;

            let bytes = match decoded {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    tracing::warn!("could not read frame at position {}: {}", index, e);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("decode task for frame {} failed: {}", index, e);
                    continue;
                }
            };

            frames.push(scope.persist(&bytes, "jpg", TempRole::Frame).await?);
        }

        tracing::debug!("extracted {} frames", frames.len());
        Ok(frames)
    }
}
