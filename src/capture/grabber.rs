//! Cutting recordable regions out of the render surface.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use image::imageops;
use image::{Rgba, RgbaImage};
use log::debug;

use super::{RecordError, RenderSurface};
use crate::engine::CircleChain;
use crate::geometry::{PixelRect, Rect};

/// Extra device pixels around the moving circles, covering antialiased edges.
const BOUNDING_MARGIN: f64 = 2.0;

/// Computes capture rectangles for a chain and grabs them from a surface.
#[derive(Debug, Clone)]
pub struct SceneGrabber {
    device_pixel_ratio: f64,
    cut_rect: PixelRect,
}

impl SceneGrabber {
    /// Build a grabber for the area `chain` can ever reach.
    ///
    /// `margin` is in scene units and is added on every side before scaling.
    pub fn for_chain(chain: &CircleChain, device_pixel_ratio: f64, margin: u32) -> Self {
        Self {
            device_pixel_ratio,
            cut_rect: spiral_cut_rect(chain, device_pixel_ratio, margin),
        }
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Anchor-centered square bounding every possible drawing, in device pixels.
    pub fn spiral_cut_rect(&self) -> PixelRect {
        self.cut_rect
    }

    /// Device pixel rectangle around the moving circles (all but the anchor).
    pub fn bounding_rectangle(&self, chain: &CircleChain) -> PixelRect {
        chain
            .moving_bounds()
            .scaled(self.device_pixel_ratio)
            .adjusted(BOUNDING_MARGIN)
            .to_pixel_rect()
    }

    /// Start grabbing `rect` from the surface.
    ///
    /// Only one grab may be outstanding per caller.
    pub fn grab(
        &self,
        surface: &mut dyn RenderSurface,
        rect: PixelRect,
    ) -> Result<PendingGrab, RecordError> {
        if rect.is_empty() {
            return Err(RecordError::GrabFailed);
        }
        let size = surface.device_size();
        let receiver = surface.grab_region(size).ok_or_else(|| {
            debug!("Render surface {}x{} cannot be grabbed", size.0, size.1);
            RecordError::GrabFailed
        })?;
        Ok(PendingGrab {
            receiver,
            rect,
            background: Rgba(surface.background().to_rgba()),
        })
    }
}

fn spiral_cut_rect(chain: &CircleChain, device_pixel_ratio: f64, margin: u32) -> PixelRect {
    // Farthest any circle edge gets from the anchor: all circles lined up.
    let mut distance = 0.0;
    let mut reach = chain[0].radius();
    for pair in chain.circles().windows(2) {
        distance += pair[0].radius() + pair[1].radius();
        reach = f64::max(reach, distance + pair[1].radius());
    }

    Rect::centered_square(chain.anchor().center(), reach)
        .adjusted(margin as f64)
        .scaled(device_pixel_ratio)
        .to_pixel_rect()
        .with_even_size()
}

/// A grab that has been requested but not necessarily delivered yet.
pub struct PendingGrab {
    receiver: Receiver<RgbaImage>,
    rect: PixelRect,
    background: Rgba<u8>,
}

impl PendingGrab {
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Take the image if the surface already delivered it.
    pub fn try_take(&self) -> Option<Result<RgbaImage, RecordError>> {
        match self.receiver.try_recv() {
            Ok(img) => Some(Ok(self.extract(&img))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RecordError::GrabFailed)),
        }
    }

    /// Wait up to `timeout` for the image. `None` if it has not arrived yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<RgbaImage, RecordError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(img) => Some(Ok(self.extract(&img))),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(RecordError::GrabFailed)),
        }
    }

    /// Copy the grabbed rectangle; parts outside the surface get the background.
    fn extract(&self, full: &RgbaImage) -> RgbaImage {
        let mut out = RgbaImage::from_pixel(self.rect.width, self.rect.height, self.background);
        imageops::replace(&mut out, full, -(self.rect.x as i64), -(self.rect.y as i64));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RasterSurface;
    use crate::engine::DrawTracker;
    use crate::geometry::Point;
    use crate::schema::{Color, SpiralConfig};

    fn chain() -> CircleChain {
        SpiralConfig::default()
            .to_chain(5.0, Point::new(100.0, 100.0))
            .unwrap()
    }

    #[test]
    fn test_spiral_cut_rect() {
        // Radii 20, 10, 1: circle 2 reaches 30 + 11 + 1 = 42, plus a margin of 20.
        let grabber = SceneGrabber::for_chain(&chain(), 1.0, 20);
        assert_eq!(grabber.spiral_cut_rect(), PixelRect::new(38, 38, 124, 124));

        let grabber = SceneGrabber::for_chain(&chain(), 2.0, 20);
        assert_eq!(grabber.spiral_cut_rect(), PixelRect::new(76, 76, 248, 248));
    }

    #[test]
    fn test_spiral_cut_rect_is_even() {
        let grabber = SceneGrabber::for_chain(&chain(), 1.25, 3);
        let rect = grabber.spiral_cut_rect();
        assert_eq!(rect.width % 2, 0);
        assert_eq!(rect.height % 2, 0);
    }

    #[test]
    fn test_bounding_rectangle_excludes_anchor() {
        let chain = chain();
        let grabber = SceneGrabber::for_chain(&chain, 1.0, 20);
        // Circle 1 at (100, 70) r 10, circle 2 at (100, 59) r 1.
        assert_eq!(
            grabber.bounding_rectangle(&chain),
            PixelRect::new(88, 56, 24, 26)
        );
    }

    #[test]
    fn test_grab_fills_outside_with_background() {
        let chain = chain();
        let mut tracker = DrawTracker::new(1.0);
        let mut surface = RasterSurface::new(100.0, 100.0, 1.0, Color::BLACK);
        surface.render(&chain, &mut tracker, true);

        // The anchor sits on the bottom right corner; the grab hangs 10 pixels over it.
        let grabber = SceneGrabber::for_chain(&chain, 1.0, 20);
        let pending = grabber.grab(&mut surface, PixelRect::new(70, 70, 40, 40)).unwrap();
        let img = pending.try_take().unwrap().unwrap();
        assert_eq!(img.dimensions(), (40, 40));

        let background = Rgba(Color::BLACK.to_rgba());
        let mut painted = 0;
        for (x, y, pixel) in img.enumerate_pixels() {
            if x < 30 && y < 30 {
                assert_eq!(pixel, surface.image().get_pixel(70 + x, 70 + y));
                if *pixel != background {
                    painted += 1;
                }
            } else {
                assert_eq!(*pixel, background, "({}, {}) lies outside the surface", x, y);
            }
        }
        // Outlines of the anchor and circle 1 cross the inside part.
        assert!(painted > 0);
    }

    #[test]
    fn test_grab_failures() {
        let chain = chain();
        let grabber = SceneGrabber::for_chain(&chain, 1.0, 20);
        let mut surface = RasterSurface::new(100.0, 100.0, 1.0, Color::BLACK);

        // Never rendered.
        assert!(matches!(
            grabber.grab(&mut surface, PixelRect::new(0, 0, 10, 10)),
            Err(RecordError::GrabFailed)
        ));
        // Empty rectangle.
        assert!(matches!(
            grabber.grab(&mut surface, PixelRect::default()),
            Err(RecordError::GrabFailed)
        ));
    }
}
