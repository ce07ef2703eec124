//! Still-frame thumbnail generation by spawning ffmpeg.
//!
//! The adapter probes the video's duration, samples five timecodes, and
//! keeps the frame with the largest encoded size as a cheap proxy for the
//! most informative one. Frames are extracted on I-frames only so seeking
//! stays fast on large files.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::{IngestError, Result};

const TEN_MINUTES: f64 = 600.0;
const TWO_MINUTES: f64 = 120.0;

#[derive(Debug, Clone)]
pub struct Thumbnailer {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_owned(),
            ffprobe: "ffprobe".to_owned(),
        }
    }
}

/// Pick the timecodes (in seconds) to sample for a video of the given
/// duration.
///
/// Past the ten-minute mark the first and last two minutes are skipped to
/// avoid opening and ending sequences; shorter videos sample five evenly
/// spaced points from the start.
fn sample_timecodes(duration: f64) -> Vec<f64> {
    let mut timecodes = Vec::new();
    if duration > TEN_MINUTES {
        let offset = (duration - 2.0 * TWO_MINUTES) / 5.0;
        let mut t = TWO_MINUTES;
        while t < duration - TWO_MINUTES {
            timecodes.push(t);
            t += offset;
        }
    } else if duration > 0.0 {
        let step = duration / 5.0;
        let mut t = 0.0;
        while t < duration {
            timecodes.push(t);
            t += step;
        }
    }
    timecodes
}

impl Thumbnailer {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Create a thumbnail for `video_path` at `out_path`.
    ///
    /// The image is written whole in a single write; a partial write is
    /// cleaned up. On cancellation the in-flight child process is killed
    /// and reaped before returning.
    pub async fn create(
        &self,
        token: &CancellationToken,
        video_path: &Path,
        out_path: &Path,
    ) -> Result<()> {
        let duration = self.probe_duration(token, video_path).await?;
        let mut best: Vec<u8> = Vec::new();
        for timecode in sample_timecodes(duration) {
            match self.grab_frame(token, video_path, timecode).await {
                Ok(frame) if frame.len() > best.len() => best = frame,
                Ok(_) => {}
                Err(err) => {
                    error!(path = %video_path.display(), timecode, error = %err, "failed to extract frame");
                }
            }
        }

        if best.is_empty() {
            return Err(IngestError::Thumbnail {
                path: video_path.to_path_buf(),
                message: "no sample produced a frame".to_owned(),
            });
        }

        if let Err(source) = tokio::fs::write(out_path, &best).await {
            let _ = tokio::fs::remove_file(out_path).await;
            return Err(IngestError::io(source, out_path));
        }
        debug!(path = %out_path.display(), bytes = best.len(), "wrote thumbnail");
        Ok(())
    }

    /// The duration of the video in seconds, via ffprobe.
    async fn probe_duration(&self, token: &CancellationToken, video_path: &Path) -> Result<f64> {
        let mut command = Command::new(&self.ffprobe);
        command
            .arg("-loglevel")
            .arg("quiet")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-output_format")
            .arg("default=nokey=1:noprint_wrappers=1")
            .arg(video_path);
        let stdout = self.run(token, command, video_path).await?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|err| IngestError::Thumbnail {
                path: video_path.to_path_buf(),
                message: format!("unparseable duration {:?}: {err}", text.trim()),
            })
    }

    async fn grab_frame(
        &self,
        token: &CancellationToken,
        video_path: &Path,
        timecode: f64,
    ) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-loglevel")
            .arg("quiet")
            .arg("-ss")
            .arg(format!("{timecode}"))
            .arg("-t")
            .arg("10")
            .arg("-i")
            .arg(video_path)
            .arg("-filter:v")
            .arg("select=eq(pict_type\\,I),thumbnail")
            .arg("-frames:v")
            .arg("1")
            .arg("-c:v")
            .arg("libwebp")
            .arg("-f")
            .arg("image2pipe")
            .arg("-");
        self.run(token, command, video_path).await
    }

    /// Run a child process to completion, returning its stdout. The child
    /// is spawned with kill-on-drop so a cancelled wait leaves no zombie.
    async fn run(
        &self,
        token: &CancellationToken,
        mut command: Command,
        video_path: &Path,
    ) -> Result<Vec<u8>> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let child = command
            .spawn()
            .map_err(|source| IngestError::io(source, video_path))?;

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|source| IngestError::io(source, video_path))?
            }
            _ = token.cancelled() => {
                return Err(IngestError::Thumbnail {
                    path: video_path.to_path_buf(),
                    message: "cancelled".to_owned(),
                });
            }
        };

        if !output.status.success() {
            return Err(IngestError::Thumbnail {
                path: video_path.to_path_buf(),
                message: format!("transcoder exited with {}", output.status),
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_videos_skip_opening_and_ending() {
        let timecodes = sample_timecodes(1200.0);
        assert_eq!(timecodes.len(), 5);
        for t in &timecodes {
            assert!(*t >= TWO_MINUTES && *t < 1200.0 - TWO_MINUTES, "{t}");
        }
        assert_eq!(timecodes[0], TWO_MINUTES);
    }

    #[test]
    fn short_videos_sample_from_the_start() {
        let timecodes = sample_timecodes(100.0);
        assert_eq!(timecodes, vec![0.0, 20.0, 40.0, 60.0, 80.0]);
    }

    #[test]
    fn zero_duration_yields_no_samples() {
        assert!(sample_timecodes(0.0).is_empty());
        assert!(sample_timecodes(-1.0).is_empty());
    }
}
