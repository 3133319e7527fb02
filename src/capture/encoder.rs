//! Frame encoder interface.

use std::io;
use std::path::Path;

use image::RgbaImage;

use super::{GifEncoder, VideoEncoder};
use crate::schema::{Format, RecordingConfig};

/// Appends positioned frames to an output file.
///
/// Encoders are moved onto the encode worker thread for every push.
pub trait FrameEncoder: Send {
    /// Create the output file for a `width` x `height` canvas.
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        bits_per_frame: u32,
    ) -> Result<(), EncoderError>;

    /// Append `frame` with its top-left corner at (`x`, `y`) on the canvas.
    fn push(&mut self, frame: &RgbaImage, x: u32, y: u32) -> Result<(), EncoderError>;

    /// Flush and finalize the file. Does nothing when not open.
    fn close(&mut self) -> Result<(), EncoderError>;

    fn is_open(&self) -> bool;

    /// Whether frames smaller than the canvas may be pushed.
    fn can_encode_partial_frame(&self) -> bool;

    fn file_extension(&self) -> &'static str;
}

/// Create the encoder for a recording format.
pub fn create_encoder(config: &RecordingConfig) -> Box<dyn FrameEncoder> {
    match config.format {
        Format::Gif => Box::new(
            GifEncoder::new()
                .with_quality(config.gif_quality)
                .with_loop_count(config.gif_loop),
        ),
        Format::Video => Box::new(VideoEncoder::new()),
    }
}

/// Check that a frame at (`x`, `y`) lies inside the canvas.
pub(crate) fn check_frame(
    canvas: (u32, u32),
    frame: &RgbaImage,
    x: u32,
    y: u32,
) -> Result<(), EncoderError> {
    let (width, height) = frame.dimensions();
    let fits = width > 0
        && height > 0
        && x.checked_add(width).is_some_and(|r| r <= canvas.0)
        && y.checked_add(height).is_some_and(|b| b <= canvas.1);
    if fits {
        Ok(())
    } else {
        Err(EncoderError::OutsideCanvas {
            x,
            y,
            width,
            height,
            canvas_width: canvas.0,
            canvas_height: canvas.1,
        })
    }
}

/// Codec level errors.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("GIF encoding failed: {0}")]
    Gif(#[from] gif::EncodingError),
    #[error("Encoder is not open")]
    NotOpen,
    #[error("Encoder is already open")]
    AlreadyOpen,
    #[error("Invalid canvas size {0}x{1}")]
    InvalidSize(u32, u32),
    #[error("Frame {width}x{height} at ({x}, {y}) exceeds canvas {canvas_width}x{canvas_height}")]
    OutsideCanvas {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
    #[error("Encoder only accepts full frames")]
    PartialFrame,
    #[error("{program} exited with {status}")]
    ProcessFailed { program: String, status: String },
    #[error("Encode worker terminated unexpectedly")]
    WorkerLost,
}
