//! Video backend driving an external `ffmpeg` process.
//!
//! Raw RGBA frames are piped to ffmpeg's stdin, which encodes them to H.264
//! in an MP4 container. ffmpeg cannot place sub-frames, so every push must
//! cover the whole canvas.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::RgbaImage;
use log::{error, info};

use super::{EncoderError, FrameEncoder};

pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Arguments for encoding raw frames read from stdin.
#[derive(Debug, Clone)]
pub struct FfmpegCommandBuilder {
    width: u32,
    height: u32,
    framerate: u32,
    video_codec: String,
    bitrate: u64,
    output_path: PathBuf,
}

impl FfmpegCommandBuilder {
    pub fn new(output_path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            framerate: 25,
            video_codec: "libx264".to_string(),
            bitrate: 2_000_000,
            output_path,
        }
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u64) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_video_codec(mut self, codec: String) -> Self {
        self.video_codec = codec;
        self
    }

    pub fn build(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba", "-s",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("{}x{}", self.width, self.height));
        args.push("-r".to_string());
        args.push(self.framerate.to_string());
        args.extend(["-i", "-", "-c:v"].map(String::from));
        args.push(self.video_codec.clone());
        args.push("-b:v".to_string());
        args.push(self.bitrate.to_string());
        args.extend(["-pix_fmt", "yuv420p"].map(String::from));
        args.push(self.output_path.to_string_lossy().into_owned());
        args
    }
}

struct VideoSession {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    width: u32,
    height: u32,
}

pub struct VideoEncoder {
    program: String,
    video_codec: String,
    session: Option<VideoSession>,
}

impl Default for VideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder {
    pub fn new() -> Self {
        Self {
            program: DEFAULT_FFMPEG.to_string(),
            video_codec: "libx264".to_string(),
            session: None,
        }
    }

    /// Use another ffmpeg executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = codec.into();
        self
    }
}

impl FrameEncoder for VideoEncoder {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        bits_per_frame: u32,
    ) -> Result<(), EncoderError> {
        if self.session.is_some() {
            return Err(EncoderError::AlreadyOpen);
        }
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(EncoderError::InvalidSize(width, height));
        }

        let args = FfmpegCommandBuilder::new(path.to_path_buf(), width, height)
            .with_framerate(fps)
            .with_bitrate(bits_per_frame as u64 * fps as u64)
            .with_video_codec(self.video_codec.clone())
            .build();

        info!("Starting {} {}", self.program, args.join(" "));
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn {}: {}", self.program, e);
                e
            })?;

        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncoderError::NotOpen);
        };

        self.session = Some(VideoSession {
            child,
            stdin: BufWriter::new(stdin),
            width,
            height,
        });
        Ok(())
    }

    fn push(&mut self, frame: &RgbaImage, x: u32, y: u32) -> Result<(), EncoderError> {
        let session = self.session.as_mut().ok_or(EncoderError::NotOpen)?;
        if x != 0 || y != 0 || frame.dimensions() != (session.width, session.height) {
            return Err(EncoderError::PartialFrame);
        }
        session.stdin.write_all(frame.as_raw())?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let VideoSession {
            mut child, stdin, ..
        } = session;

        // Closing stdin ends the input stream.
        let flushed = stdin.into_inner().map(drop).map_err(|e| e.into_error());
        let status = child.wait()?;
        flushed?;

        if !status.success() {
            error!("{} exited with {}", self.program, status);
            return Err(EncoderError::ProcessFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn can_encode_partial_frame(&self) -> bool {
        false
    }

    fn file_extension(&self) -> &'static str {
        "mp4"
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.child.kill();
            let _ = session.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_command_builder() {
        let args = FfmpegCommandBuilder::new(PathBuf::from("out.mp4"), 320, 240)
            .with_framerate(10)
            .with_bitrate(800_000)
            .build();

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-f") + 1], "rawvideo");
        assert_eq!(args[pos("-s") + 1], "320x240");
        assert_eq!(args[pos("-r") + 1], "10");
        assert_eq!(args[pos("-i") + 1], "-");
        assert_eq!(args[pos("-c:v") + 1], "libx264");
        assert_eq!(args[pos("-b:v") + 1], "800000");
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_missing_program_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let mut encoder = VideoEncoder::new().with_program("spiral-fun-no-such-ffmpeg");

        assert!(matches!(
            encoder.open(&path, 64, 64, 10, 80_000),
            Err(EncoderError::Io(_))
        ));
        assert!(!encoder.is_open());
        assert!(!path.exists());
    }

    #[test]
    fn test_rejects_odd_size_and_closed_push() {
        let dir = tempdir().unwrap();
        let mut encoder = VideoEncoder::new().with_program("spiral-fun-no-such-ffmpeg");
        assert!(matches!(
            encoder.open(&dir.path().join("odd.mp4"), 63, 64, 10, 80_000),
            Err(EncoderError::InvalidSize(63, 64))
        ));
        assert!(matches!(
            encoder.push(&RgbaImage::new(64, 64), 0, 0),
            Err(EncoderError::NotOpen)
        ));
        encoder.close().unwrap();
    }
}
