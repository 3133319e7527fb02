//! Ordered circle chain with the anchor circle first.

use std::ops::Index;

use super::Circle;
use crate::geometry::Rect;

/// Ordered circles; element 0 is the fixed anchor.
///
/// The shape of a chain (count, radii, speeds) is fixed once built. Only the
/// rotation engine and the draw tracker move centers and line positions.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleChain {
    circles: Vec<Circle>,
}

impl CircleChain {
    pub const MIN_CIRCLES: usize = 2;
    pub const MAX_CIRCLES: usize = 10;

    pub fn new(circles: Vec<Circle>) -> Result<Self, ChainError> {
        if circles.len() < Self::MIN_CIRCLES {
            return Err(ChainError::TooFewCircles(circles.len()));
        }
        if circles.len() > Self::MAX_CIRCLES {
            return Err(ChainError::TooManyCircles(circles.len()));
        }
        if circles[0].speed() != 0 {
            return Err(ChainError::MovingAnchor(circles[0].speed()));
        }
        if circles[0].draw() {
            return Err(ChainError::DrawingAnchor);
        }
        if let Some((index, circle)) = circles
            .iter()
            .enumerate()
            .find(|(_, c)| !(c.radius() > 0.0 && c.radius().is_finite()))
        {
            return Err(ChainError::InvalidRadius {
                index,
                radius: circle.radius(),
            });
        }
        Ok(Self { circles })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.circles.len()
    }

    /// Always false: a valid chain holds at least two circles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.circles.is_empty()
    }

    pub fn anchor(&self) -> &Circle {
        &self.circles[0]
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Circle> {
        self.circles.iter()
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Circle> {
        self.circles.get_mut(index)
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Circle> {
        self.circles.iter_mut()
    }

    /// Scene rectangle covering every circle except the anchor.
    pub fn moving_bounds(&self) -> Rect {
        self.circles[1..]
            .iter()
            .fold(Rect::default(), |acc, c| acc.united(&c.bounding_rect()))
    }
}

impl Index<usize> for CircleChain {
    type Output = Circle;

    fn index(&self, index: usize) -> &Circle {
        &self.circles[index]
    }
}

impl<'a> IntoIterator for &'a CircleChain {
    type Item = &'a Circle;
    type IntoIter = std::slice::Iter<'a, Circle>;

    fn into_iter(self) -> Self::IntoIter {
        self.circles.iter()
    }
}

/// Chain shape violations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Chain needs at least {min} circles, got {0}", min = CircleChain::MIN_CIRCLES)]
    TooFewCircles(usize),
    #[error("Chain holds at most {max} circles, got {0}", max = CircleChain::MAX_CIRCLES)]
    TooManyCircles(usize),
    #[error("Anchor circle must not rotate (speed {0})")]
    MovingAnchor(i32),
    #[error("Anchor circle must not draw")]
    DrawingAnchor,
    #[error("Circle {index} has invalid radius {radius}")]
    InvalidRadius { index: usize, radius: f64 },
}
