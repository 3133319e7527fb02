//! Line tracking for drawing circles.
//!
//! Each drawing circle owns a polyline. Movements shorter than the minimum
//! draw length stay pending until the center has moved far enough, keeping
//! vertex counts bounded at small step angles.

use super::{Circle, CircleChain};
use crate::geometry::Point;
use crate::schema::Color;

/// Committed line of one circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub color: Color,
    pub points: Vec<Point>,
}

impl Polyline {
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

/// A committed segment not yet handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub color: Color,
}

/// Accumulates polylines for the drawing circles of a chain.
#[derive(Debug, Clone, Default)]
pub struct DrawTracker {
    min_draw_length: f64,
    lines: Vec<Option<Polyline>>,
    pending: Vec<Segment>,
}

impl DrawTracker {
    pub fn new(min_draw_length: f64) -> Self {
        Self {
            min_draw_length,
            lines: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn min_draw_length(&self) -> f64 {
        self.min_draw_length
    }

    /// Start fresh lines at the current centers.
    pub fn prepare(&mut self, chain: &mut CircleChain) {
        self.pending.clear();
        self.lines = chain
            .iter_mut()
            .map(|circle| {
                circle.set_draw_pos(circle.center());
                circle.draw().then(|| Polyline {
                    color: circle.color(),
                    points: vec![circle.center()],
                })
            })
            .collect();
    }

    /// Commit the movement of `circle` once it exceeds the minimum length.
    pub(crate) fn track(&mut self, index: usize, circle: &mut Circle) {
        if !circle.draw() || circle.pending_draw_length() < self.min_draw_length {
            return;
        }
        self.commit(index, circle);
    }

    /// Close every line at the exact current center, ignoring the threshold.
    ///
    /// Calling it again without further movement adds nothing.
    pub fn force_draw_to_center(&mut self, chain: &mut CircleChain) {
        for (index, circle) in chain.iter_mut().enumerate() {
            if circle.draw() && circle.draw_pos() != circle.center() {
                self.commit(index, circle);
            }
        }
    }

    fn commit(&mut self, index: usize, circle: &mut Circle) {
        let Some(Some(line)) = self.lines.get_mut(index) else {
            return;
        };
        let from = circle.draw_pos();
        let to = circle.center();
        line.points.push(to);
        circle.set_draw_pos(to);
        self.pending.push(Segment {
            from,
            to,
            color: line.color,
        });
    }

    pub fn polyline(&self, index: usize) -> Option<&Polyline> {
        self.lines.get(index).and_then(Option::as_ref)
    }

    pub fn polylines(&self) -> impl Iterator<Item = &Polyline> {
        self.lines.iter().flatten()
    }

    /// Segments committed since the previous call.
    pub fn take_new_segments(&mut self) -> Vec<Segment> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_new_segments(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.polylines().map(|l| l.points.len()).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.polylines().map(Polyline::segment_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RotationEngine;
    use crate::schema::SpiralConfig;

    fn scenario_a() -> CircleChain {
        SpiralConfig::default()
            .to_chain(10.0, Point::new(100.0, 100.0))
            .unwrap()
    }

    #[test]
    fn test_prepare_only_tracks_drawing_circles() {
        let mut chain = scenario_a();
        let mut tracker = DrawTracker::new(1.0);
        tracker.prepare(&mut chain);

        assert!(tracker.polyline(0).is_none());
        assert!(tracker.polyline(1).is_none());
        assert_eq!(tracker.polyline(2).unwrap().points, vec![chain[2].center()]);
        assert_eq!(tracker.vertex_count(), 1);
        assert_eq!(tracker.segment_count(), 0);
    }

    #[test]
    fn test_committed_segments_respect_threshold() {
        let mut chain = scenario_a();
        let mut tracker = DrawTracker::new(2.0);
        tracker.prepare(&mut chain);

        let mut engine = RotationEngine::new(0.05f64.to_radians());
        for _ in 0..2000 {
            engine.step(&mut chain, &mut tracker);
        }

        let line = tracker.polyline(2).unwrap();
        let vertices = line.points.len();
        assert!(vertices > 10);
        for pair in line.points.windows(2) {
            assert!(pair[0].distance(pair[1]) >= 2.0);
        }
        assert_eq!(tracker.take_new_segments().len(), vertices - 1);
        assert!(!tracker.has_new_segments());
    }

    #[test]
    fn test_force_draw_closes_line_once() {
        let mut chain = scenario_a();
        let mut tracker = DrawTracker::new(1000.0);
        tracker.prepare(&mut chain);

        let mut engine = RotationEngine::new(0.01);
        for _ in 0..5 {
            engine.step(&mut chain, &mut tracker);
        }
        // Threshold too large for anything to be committed yet.
        assert_eq!(tracker.vertex_count(), 1);

        tracker.force_draw_to_center(&mut chain);
        let line = tracker.polyline(2).unwrap();
        assert_eq!(line.points.len(), 2);
        assert_eq!(*line.points.last().unwrap(), chain[2].center());
        assert_eq!(chain[2].draw_pos(), chain[2].center());

        tracker.force_draw_to_center(&mut chain);
        assert_eq!(tracker.vertex_count(), 2);
        assert_eq!(tracker.take_new_segments().len(), 1);
    }
}
