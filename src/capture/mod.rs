//! Capture module - Grabbing rendered frames and streaming them to encoders.
//!
//! A recording starts with a full frame of the spiral cut rectangle. Later
//! frames only cover the region the moving circles touched since the
//! previous capture, positioned relative to the full frame. Encoding runs on
//! a worker thread that owns the encoder for the duration of one push:
//!
//! ```text
//! Player ──add_frame──▶ SceneGrabber ──image──▶ worker: FrameEncoder::push
//!    ▲                                                   │
//!    └──────────────── poll ◀── (encoder, result) ◀──────┘
//! ```

mod encoder;
mod gif_encoder;
mod grabber;
mod recorder;
mod storage;
mod surface;
mod video_encoder;

#[cfg(test)]
pub(crate) mod testing;

use std::io;
use std::path::PathBuf;

pub use encoder::{EncoderError, FrameEncoder, create_encoder};
pub(crate) use encoder::check_frame;
pub use gif_encoder::{DEFAULT_GIF_QUALITY, GifEncoder};
pub use grabber::{PendingGrab, SceneGrabber};
pub use recorder::{Recorder, RecordingStats};
pub use storage::{DirectoryStorage, Storage, output_file_name, write_image};
pub use surface::{RasterSurface, RenderSurface};
pub use video_encoder::{DEFAULT_FFMPEG, FfmpegCommandBuilder, VideoEncoder};

/// Recording failures, one message per category.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Cannot access the output directory: {0}")]
    StorageUnavailable(#[source] io::Error),
    #[error("Cannot create {}: {source}", .path.display())]
    EncoderOpenFailed {
        path: PathBuf,
        #[source]
        source: EncoderError,
    },
    #[error("Cannot grab the scene")]
    GrabFailed,
    #[error("Cannot encode frame: {0}")]
    EncodeFailed(#[source] EncoderError),
    #[error("Cannot write image: {0}")]
    ImageWrite(#[from] image::ImageError),
    #[error("Not recording")]
    NotRecording,
    #[error("A frame is still being recorded")]
    Busy,
}
