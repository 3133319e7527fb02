//! A single circle of the chain.

use crate::geometry::{Point, Rect};
use crate::schema::Color;

/// A circle revolving around its predecessor in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    center: Point,
    radius: f64,
    /// Signed revolutions per revolution of the parent; positive is clockwise.
    speed: i32,
    color: Color,
    draw: bool,
    /// Last point committed to this circle's line.
    draw_pos: Point,
}

impl Circle {
    pub fn new(center: Point, radius: f64, speed: i32, color: Color, draw: bool) -> Self {
        Self {
            center,
            radius,
            speed,
            color,
            draw,
            draw_pos: center,
        }
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn speed(&self) -> i32 {
        self.speed
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn draw(&self) -> bool {
        self.draw
    }

    #[inline]
    pub fn draw_pos(&self) -> Point {
        self.draw_pos
    }

    pub fn is_clockwise(&self) -> bool {
        self.speed > 0
    }

    /// Scene rectangle covered by the circle outline.
    pub fn bounding_rect(&self) -> Rect {
        Rect::around_circle(self.center, self.radius)
    }

    /// Rotate the center about `rotation_center` by `angle` radians.
    pub fn rotate(&mut self, rotation_center: Point, angle: f64, clockwise: bool) {
        let angle = if clockwise { angle } else { -angle };
        self.center = self.center.rotated_about(rotation_center, angle);
    }

    /// Distance between the center and the last committed line point.
    pub fn pending_draw_length(&self) -> f64 {
        self.draw_pos.distance(self.center)
    }

    pub(crate) fn set_draw_pos(&mut self, pos: Point) {
        self.draw_pos = pos;
    }
}
