//! Animated GIF backend.
//!
//! Every pushed frame becomes an image block with its own NeuQuant palette
//! (at most 256 colors) and a graphics control block that keeps the previous
//! canvas, so later frames only need to cover what changed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbaImage;
use log::debug;

use super::{EncoderError, FrameEncoder, check_frame};

pub const DEFAULT_GIF_QUALITY: u8 = 10;

struct GifSession {
    encoder: gif::Encoder<BufWriter<File>>,
    width: u32,
    height: u32,
    /// Frame delay in centiseconds.
    delay: u16,
}

pub struct GifEncoder {
    quality: u8,
    loop_count: u16,
    session: Option<GifSession>,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GifEncoder {
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_GIF_QUALITY,
            loop_count: 0,
            session: None,
        }
    }

    /// NeuQuant sampling factor: 1 is best, 30 fastest.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 30);
        self
    }

    /// Number of loops; 0 repeats forever.
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }
}

impl FrameEncoder for GifEncoder {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
        _bits_per_frame: u32,
    ) -> Result<(), EncoderError> {
        if self.session.is_some() {
            return Err(EncoderError::AlreadyOpen);
        }
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(EncoderError::InvalidSize(width, height));
        };
        if w == 0 || h == 0 {
            return Err(EncoderError::InvalidSize(width, height));
        }

        let writer = BufWriter::new(File::create(path)?);
        let mut encoder = gif::Encoder::new(writer, w, h, &[])?;
        let repeat = match self.loop_count {
            0 => gif::Repeat::Infinite,
            n => gif::Repeat::Finite(n),
        };
        encoder.set_repeat(repeat)?;

        let delay = (100 / fps.max(1)) as u16;
        debug!("GIF opened {}x{} delay {}cs: {}", width, height, delay, path.display());
        self.session = Some(GifSession {
            encoder,
            width,
            height,
            delay,
        });
        Ok(())
    }

    fn push(&mut self, frame: &RgbaImage, x: u32, y: u32) -> Result<(), EncoderError> {
        let session = self.session.as_mut().ok_or(EncoderError::NotOpen)?;
        check_frame((session.width, session.height), frame, x, y)?;

        let (width, height) = frame.dimensions();
        let mut pixels = frame.as_raw().clone();
        // Canvas size fits u16, so does everything checked against it.
        let mut gif_frame = gif::Frame::from_rgba_speed(
            width as u16,
            height as u16,
            &mut pixels,
            self.quality as i32,
        );
        gif_frame.left = x as u16;
        gif_frame.top = y as u16;
        gif_frame.delay = session.delay;
        gif_frame.dispose = gif::DisposalMethod::Keep;

        session.encoder.write_frame(&gif_frame)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        if let Some(session) = self.session.take() {
            let mut writer = session.encoder.into_inner()?;
            writer.flush()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn can_encode_partial_frame(&self) -> bool {
        true
    }

    fn file_extension(&self) -> &'static str {
        "gif"
    }
}
