//! [`VideoDecoder`] backed by the `ffprobe` and `ffmpeg` binaries.
//!
//! `ffprobe` supplies resolution and frame rate; `ffmpeg` then streams the
//! decoded video as raw `rgb24` frames over a pipe.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::decoder::{DecodeError, FrameSource, VideoDecoder};

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
}

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn read_stream_info(path: &Path) -> Result<FfprobeOutput, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::VideoNotFound(path.to_string_lossy().to_string()));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .await
        .map_err(DecodeError::NotFound)?;

    if !output.status.success() {
        return Err(DecodeError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| DecodeError::ParseError(format!("{e}: {stdout}")))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn first_video_stream(info: &FfprobeOutput) -> Option<&FfprobeStream> {
    info.streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Frame rate of the first video stream; `0.0` when unknown.
///
/// `avg_frame_rate` is preferred; containers without it report `"0/0"`,
/// in which case `r_frame_rate` is used.
pub fn parse_framerate(info: &FfprobeOutput) -> f64 {
    let Some(stream) = first_video_stream(info) else {
        return 0.0;
    };
    [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .map(parse_fraction)
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
        return 0.0;
    }
    s.parse::<f64>().unwrap_or(0.0)
}

pub fn parse_resolution(info: &FfprobeOutput) -> (u32, u32) {
    first_video_stream(info)
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0))
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegDecoder;

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DecodeError> {
        let info = read_stream_info(path).await?;
        let (width, height) = parse_resolution(&info);
        if width == 0 || height == 0 {
            return Err(DecodeError::ParseError(format!(
                "no video stream with a resolution in {}",
                path.display()
            )));
        }
        let fps = parse_framerate(&info);

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(DecodeError::NotFound)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DecodeError::IoError(std::io::Error::other("ffmpeg stdout was not captured"))
        })?;

        tracing::debug!(video = %path.display(), width, height, fps, "Opened video");
        Ok(Box::new(FfmpegSource {
            _child: child,
            stdout: BufReader::new(stdout),
            width,
            height,
            fps,
            frame: vec![0; width as usize * height as usize * 3],
            grabbed: false,
        }))
    }
}

/// Raw frame stream of one running `ffmpeg` process.
struct FfmpegSource {
    /// Killed when the source is dropped.
    _child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    frame: Vec<u8>,
    grabbed: bool,
}

#[async_trait]
impl FrameSource for FfmpegSource {
    fn native_fps(&self) -> f64 {
        self.fps
    }

    async fn grab(&mut self) -> Result<bool, DecodeError> {
        match self.stdout.read_exact(&mut self.frame).await {
            Ok(_) => {
                self.grabbed = true;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.grabbed = false;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn retrieve(&mut self) -> Result<RgbImage, DecodeError> {
        if !self.grabbed {
            return Err(DecodeError::NoFrame);
        }
        RgbImage::from_raw(self.width, self.height, self.frame.clone()).ok_or(DecodeError::NoFrame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffprobe_json(json: &str) -> FfprobeOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fraction_parsing() {
        assert_eq!(parse_fraction("30/1"), 30.0);
        assert!((parse_fraction("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_fraction("0/0"), 0.0);
        assert_eq!(parse_fraction("25"), 25.0);
        assert_eq!(parse_fraction("garbage"), 0.0);
    }

    #[test]
    fn framerate_falls_back_to_r_frame_rate() {
        let p = ffprobe_json(
            r#"{"streams":[
                {"codec_type":"audio","r_frame_rate":"0/0"},
                {"codec_type":"video","width":1920,"height":1080,"avg_frame_rate":"0/0","r_frame_rate":"25/1"}
            ]}"#,
        );
        assert_eq!(parse_framerate(&p), 25.0);
        assert_eq!(parse_resolution(&p), (1920, 1080));
    }

    #[test]
    fn missing_video_stream_has_no_rate() {
        let p = ffprobe_json(r#"{"streams":[{"codec_type":"audio"}]}"#);
        assert_eq!(parse_framerate(&p), 0.0);
        assert_eq!(parse_resolution(&p), (0, 0));
    }

    #[tokio::test]
    async fn missing_file_is_reported_before_spawning() {
        let err = FfmpegDecoder.open(Path::new("/definitely/not/here.mp4")).await.err().unwrap();
        assert!(matches!(err, DecodeError::VideoNotFound(_)));
    }
}
