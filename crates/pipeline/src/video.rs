use anyhow::{Context, Result, bail};
use image::RgbImage;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

/// A sequential source of decoded frames.
pub trait FrameSource: Send {
    /// The next frame in capture order, or None at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Stored-video decoder backed by an ffmpeg child process emitting raw
/// rgb24 frames on stdout. Handles any container/codec the local
/// ffmpeg build does, without linking libav into the binary.
pub struct VideoFileSource {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .context("failed to run ffprobe")?;

    if !output.status.success() {
        bail!(
            "ffprobe rejected {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let probe: ProbeOutput =
        serde_json::from_slice(&output.stdout).context("unparseable ffprobe output")?;
    probe
        .streams
        .iter()
        .find_map(|stream| Some((stream.width?, stream.height?)))
        .with_context(|| format!("no video stream in {}", path.display()))
}

impl VideoFileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (width, height) = probe_dimensions(path)?;

        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffmpeg decoder")?;

        let stdout = child
            .stdout
            .take()
            .context("ffmpeg decoder has no stdout")?;

        tracing::info!(path = %path.display(), width, height, "video decoder started");

        Ok(Self {
            child,
            stdout,
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame_len = (self.width * self.height * 3) as usize;
        let mut pixels = vec![0u8; frame_len];
        let mut filled = 0;

        while filled < frame_len {
            let read = self
                .stdout
                .read(&mut pixels[filled..])
                .context("read from ffmpeg decoder failed")?;
            if read == 0 {
                if filled > 0 {
                    tracing::warn!(filled, frame_len, "truncated trailing frame discarded");
                }
                return Ok(None);
            }
            filled += read;
        }

        // from_raw only fails on a length mismatch, which we just filled.
        Ok(RgbImage::from_raw(self.width, self.height, pixels))
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_fails_to_open() {
        assert!(VideoFileSource::open("/nonexistent/clip.mp4").is_err());
    }

    #[test]
    fn non_video_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_video.mp4");
        std::fs::write(&path, b"plain text, no container").unwrap();
        assert!(VideoFileSource::open(&path).is_err());
    }
}
