//! Test doubles for the capture pipeline.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use image::RgbaImage;

use super::{EncoderError, FrameEncoder, RasterSurface, RenderSurface};
use crate::engine::{CircleChain, DrawTracker};
use crate::schema::Color;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pushed frames as `(x, y, width, height)`.
pub(crate) type Pushes = Arc<Mutex<Vec<(u32, u32, u32, u32)>>>;

/// Encoder that only records what it is given.
pub(crate) struct MockEncoder {
    partial: bool,
    delay: Duration,
    fail_from: Option<usize>,
    canvas: Option<(u32, u32)>,
    pushes: Pushes,
}

impl MockEncoder {
    pub(crate) fn new(partial: bool) -> (Self, Pushes) {
        let pushes = Pushes::default();
        let encoder = Self {
            partial,
            delay: Duration::ZERO,
            fail_from: None,
            canvas: None,
            pushes: pushes.clone(),
        };
        (encoder, pushes)
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every push from the given zero-based push index on.
    pub(crate) fn failing_from(mut self, index: usize) -> Self {
        self.fail_from = Some(index);
        self
    }
}

impl FrameEncoder for MockEncoder {
    fn open(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        _: u32,
        _: u32,
    ) -> Result<(), EncoderError> {
        fs::write(path, b"mock")?;
        self.canvas = Some((width, height));
        Ok(())
    }

    fn push(&mut self, frame: &RgbaImage, x: u32, y: u32) -> Result<(), EncoderError> {
        let canvas = self.canvas.ok_or(EncoderError::NotOpen)?;
        super::check_frame(canvas, frame, x, y)?;
        thread::sleep(self.delay);

        let mut pushes = self.pushes.lock().map_err(|_| EncoderError::WorkerLost)?;
        let index = pushes.len();
        pushes.push((x, y, frame.width(), frame.height()));
        if self.fail_from.is_some_and(|from| index >= from) {
            return Err(EncoderError::Io(std::io::Error::other("injected failure")));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        self.canvas = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.canvas.is_some()
    }

    fn can_encode_partial_frame(&self) -> bool {
        self.partial
    }

    fn file_extension(&self) -> &'static str {
        "mock"
    }
}

/// Raster surface whose n-th grab (one-based) cannot be captured.
pub(crate) struct FlakySurface {
    inner: RasterSurface,
    fail_on: usize,
    grabs: usize,
}

impl FlakySurface {
    pub(crate) fn new(inner: RasterSurface, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            grabs: 0,
        }
    }
}

impl RenderSurface for FlakySurface {
    fn size(&self) -> (f64, f64) {
        self.inner.size()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.inner.device_pixel_ratio()
    }

    fn background(&self) -> Color {
        self.inner.background()
    }

    fn grab_region(&mut self, size: (u32, u32)) -> Option<Receiver<RgbaImage>> {
        self.grabs += 1;
        if self.grabs == self.fail_on {
            return None;
        }
        self.inner.grab_region(size)
    }

    fn render(&mut self, chain: &CircleChain, lines: &mut DrawTracker, show_circles: bool) {
        self.inner.render(chain, lines, show_circles);
    }
}
