//! Epicyclic rotation of a circle chain.
//!
//! One step advances every moving circle by a fixed angle around the
//! *current* center of its predecessor. Rotating circle `i` also carries all
//! circles after it, so circle 2 orbits wherever circle 1 has just moved to,
//! circle 3 orbits circle 2, and so on. A circle with speed `k` is rotated
//! `|k|` times per step, sweeping `k` revolutions around its parent for each
//! revolution of the parent.

use std::f64::consts::TAU;

use super::{Circle, CircleChain, DrawTracker};

/// Slack on the full-turn comparison so exact divisions of 2π terminate on
/// the expected step despite rounding.
const CYCLE_EPSILON: f64 = 1e-9;

/// Receives every center update made during a rotation step.
pub trait MoveObserver {
    fn circle_moved(&mut self, index: usize, circle: &mut Circle);
}

impl MoveObserver for () {
    #[inline]
    fn circle_moved(&mut self, _index: usize, _circle: &mut Circle) {}
}

impl MoveObserver for DrawTracker {
    fn circle_moved(&mut self, index: usize, circle: &mut Circle) {
        self.track(index, circle);
    }
}

/// Advance the whole chain by `angle` radians.
pub fn advance<O: MoveObserver + ?Sized>(chain: &mut CircleChain, angle: f64, observer: &mut O) {
    for i in 1..chain.len() {
        advance_circle(chain, i, angle, observer);
    }
}

/// Rotate circle `index` and everything after it around circle `index - 1`.
fn advance_circle<O: MoveObserver + ?Sized>(
    chain: &mut CircleChain,
    index: usize,
    angle: f64,
    observer: &mut O,
) {
    // Earlier indices have already moved the parent during this step.
    let rotation_center = chain[index - 1].center();
    let speed = chain[index].speed();
    let clockwise = speed > 0;
    let repeats = speed.unsigned_abs();

    for j in index..chain.len() {
        let Some(circle) = chain.get_mut(j) else {
            break;
        };
        for _ in 0..repeats {
            circle.rotate(rotation_center, angle, clockwise);
            observer.circle_moved(j, circle);
        }
    }
}

/// Steps a chain through one full cycle of 2π.
#[derive(Debug, Clone)]
pub struct RotationEngine {
    step_angle: f64,
    steps: u64,
}

impl RotationEngine {
    pub fn new(step_angle: f64) -> Self {
        Self {
            step_angle,
            steps: 0,
        }
    }

    #[inline]
    pub fn step_angle(&self) -> f64 {
        self.step_angle
    }

    /// Steps performed since the start of the cycle.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Cumulative rotation angle, `steps × step_angle`.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.steps as f64 * self.step_angle
    }

    pub fn is_complete(&self) -> bool {
        self.angle() >= TAU - CYCLE_EPSILON
    }

    /// Number of steps in a full cycle.
    pub fn cycle_steps(&self) -> u64 {
        ((TAU - CYCLE_EPSILON) / self.step_angle).ceil() as u64
    }

    /// Perform one step. Returns true when this step completed the cycle.
    pub fn step<O: MoveObserver + ?Sized>(
        &mut self,
        chain: &mut CircleChain,
        observer: &mut O,
    ) -> bool {
        if self.is_complete() {
            return true;
        }
        advance(chain, self.step_angle, observer);
        self.steps += 1;
        self.is_complete()
    }

    pub fn reset(&mut self) {
        self.steps = 0;
    }
}
