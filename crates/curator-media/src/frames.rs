//! Streaming grayscale frame decoding.
//!
//! FFmpeg decodes the video to raw 8-bit grayscale on stdout; frames are
//! read one at a time so memory stays bounded by a single frame regardless
//! of video length. No OpenCV dependency is needed.

use std::path::Path;
use std::process::Stdio;

use image::GrayImage;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

/// Reads decoded grayscale frames from an FFmpeg child process.
pub struct GrayFrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_handle: JoinHandle<String>,
    width: u32,
    height: u32,
    frames_read: u64,
}

impl GrayFrameReader {
    /// Start decoding `path`, whose frames are `width` x `height`.
    pub async fn open(path: &Path, width: u32, height: u32) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_video(format!(
                "Invalid frame size {}x{}",
                width, height
            )));
        }

        check_ffmpeg()?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "gray", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(path = %path.display(), width, height, "Starting grayscale frame decode");

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;

        let stderr_handle = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr_handle,
            width,
            height,
            frames_read: 0,
        })
    }

    /// Bytes in one decoded frame.
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Read the next frame, or `None` at end of stream.
    ///
    /// A truncated trailing frame is treated as end of stream.
    pub async fn next_frame(&mut self) -> MediaResult<Option<GrayImage>> {
        let mut buf = vec![0u8; self.frame_len()];

        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let frame = GrayImage::from_raw(self.width, self.height, buf).ok_or_else(|| {
            MediaError::FrameDecode(format!(
                "Frame {} does not match {}x{}",
                self.frames_read, self.width, self.height
            ))
        })?;

        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Wait for the decoder to exit and report decode failures.
    pub async fn finish(mut self) -> MediaResult<u64> {
        let status = self.child.wait().await?;
        let stderr = self.stderr_handle.await.unwrap_or_default();

        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("Frame decode failed after {} frames", self.frames_read),
                Some(stderr.trim().to_string()).filter(|s| !s.is_empty()),
                status.code(),
            ));
        }

        debug!(frames = self.frames_read, "Grayscale frame decode complete");
        Ok(self.frames_read)
    }

    /// Stop decoding early.
    pub async fn abort(mut self) {
        let _ = self.child.kill().await;
        self.stderr_handle.abort();
    }
}
