//! Render surface collaborator and an in-memory raster implementation.

use crossbeam_channel::{Receiver, Sender, bounded};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::engine::{CircleChain, DrawTracker};
use crate::geometry::Point;
use crate::schema::Color;

/// Something the scene is rendered onto and that can hand out snapshots.
pub trait RenderSurface {
    /// Logical size in scene units.
    fn size(&self) -> (f64, f64);

    fn device_pixel_ratio(&self) -> f64;

    fn background(&self) -> Color;

    /// Size of a full snapshot in device pixels.
    fn device_size(&self) -> (u32, u32) {
        let (w, h) = self.size();
        let dpr = self.device_pixel_ratio();
        ((w * dpr).round() as u32, (h * dpr).round() as u32)
    }

    /// Request a snapshot of the whole surface scaled to `size`.
    ///
    /// Returns `None` when the surface cannot be captured. The image arrives
    /// on the returned channel exactly once, possibly only after the next
    /// call to [`RenderSurface::render`].
    fn grab_region(&mut self, size: (u32, u32)) -> Option<Receiver<RgbaImage>>;

    /// Paint newly committed line segments and, optionally, the circle outlines.
    fn render(&mut self, chain: &CircleChain, lines: &mut DrawTracker, show_circles: bool);
}

/// Software surface painting into RGBA buffers.
///
/// Lines accumulate on a persistent layer; circle outlines are painted on top
/// of a copy of that layer on every render.
pub struct RasterSurface {
    size: (f64, f64),
    device_pixel_ratio: f64,
    background: Color,
    lines: RgbaImage,
    frame: RgbaImage,
    rendered: bool,
    defer_grabs: bool,
    pending: Vec<(Sender<RgbaImage>, (u32, u32))>,
}

impl RasterSurface {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64, background: Color) -> Self {
        let w = (width * device_pixel_ratio).round().max(0.0) as u32;
        let h = (height * device_pixel_ratio).round().max(0.0) as u32;
        let lines = RgbaImage::from_pixel(w, h, Rgba(background.to_rgba()));
        Self {
            size: (width, height),
            device_pixel_ratio,
            background,
            frame: lines.clone(),
            lines,
            rendered: false,
            defer_grabs: false,
            pending: Vec::new(),
        }
    }

    /// Deliver grabs only on the next render pass, like a compositor would.
    pub fn with_deferred_grabs(mut self, defer: bool) -> Self {
        self.defer_grabs = defer;
        self
    }

    /// The most recently rendered frame.
    pub fn image(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn pending_grabs(&self) -> usize {
        self.pending.len()
    }

    fn to_device(&self, p: Point) -> (f64, f64) {
        (p.x * self.device_pixel_ratio, p.y * self.device_pixel_ratio)
    }

    fn snapshot(&self, size: (u32, u32)) -> RgbaImage {
        if self.frame.dimensions() == size {
            self.frame.clone()
        } else {
            imageops::resize(&self.frame, size.0, size.1, FilterType::Triangle)
        }
    }

    fn deliver_pending(&mut self) {
        for (tx, size) in std::mem::take(&mut self.pending) {
            // The requester may have given up on the grab.
            let _ = tx.send(self.snapshot(size));
        }
    }
}

impl RenderSurface for RasterSurface {
    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn background(&self) -> Color {
        self.background
    }

    fn grab_region(&mut self, size: (u32, u32)) -> Option<Receiver<RgbaImage>> {
        if !self.rendered || size.0 == 0 || size.1 == 0 || self.frame.width() == 0 {
            return None;
        }
        let (tx, rx) = bounded(1);
        if self.defer_grabs {
            self.pending.push((tx, size));
        } else {
            tx.send(self.snapshot(size)).ok()?;
        }
        Some(rx)
    }

    fn render(&mut self, chain: &CircleChain, lines: &mut DrawTracker, show_circles: bool) {
        let width = 1.0_f64.max(self.device_pixel_ratio);
        for segment in lines.take_new_segments() {
            let from = self.to_device(segment.from);
            let to = self.to_device(segment.to);
            draw_line(&mut self.lines, from, to, width, segment.color);
        }

        self.frame.clone_from(&self.lines);
        if show_circles {
            for circle in chain {
                let center = self.to_device(circle.center());
                let radius = circle.radius() * self.device_pixel_ratio;
                draw_circle(&mut self.frame, center, radius, circle.color());
            }
        }

        self.rendered = true;
        self.deliver_pending();
    }
}

fn put(img: &mut RgbaImage, x: f64, y: f64, color: Color) {
    let (x, y) = (x.round(), y.round());
    if x >= 0.0 && y >= 0.0 && x < img.width() as f64 && y < img.height() as f64 {
        img.put_pixel(x as u32, y as u32, Rgba(color.to_rgba()));
    }
}

fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), width: f64, color: Color) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    let half = (width / 2.0).floor() as i32;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let (x, y) = (from.0 + dx * t, from.1 + dy * t);
        for ox in -half..=half {
            for oy in -half..=half {
                put(img, x + ox as f64, y + oy as f64, color);
            }
        }
    }
}

fn draw_circle(img: &mut RgbaImage, center: (f64, f64), radius: f64, color: Color) {
    let steps = (radius * std::f64::consts::TAU).ceil().max(8.0) as usize;
    for i in 0..steps {
        let (sin, cos) = (i as f64 / steps as f64 * std::f64::consts::TAU).sin_cos();
        put(img, center.0 + radius * cos, center.1 + radius * sin, color);
    }
}
