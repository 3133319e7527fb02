//! Mutation sequences: a series of spirals, each a small change of the previous one.

use serde::{Deserialize, Serialize};

use super::{ConfigError, MAX_REL_RADIUS, MAX_SPEED, SpiralConfig};

/// Relative radius change of one diameter mutation.
pub const RADIUS_STEP: f64 = 0.05;

/// Circle property changed by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationTrait {
    Diameter,
    Rotations,
    Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Increment,
    Decrement,
}

impl Change {
    fn delta(self, reverse: bool) -> i32 {
        match (self, reverse) {
            (Change::Increment, false) | (Change::Decrement, true) => 1,
            (Change::Increment, true) | (Change::Decrement, false) => -1,
        }
    }
}

/// A single change applied to one circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub circle: usize,
    #[serde(rename = "trait")]
    pub kind: MutationTrait,
    pub change: Change,
    /// Direction of the circle when the sequence started; rotation changes
    /// grow or shrink the magnitude in that direction.
    #[serde(skip, default = "default_rotation_factor")]
    rotation_factor: i32,
}

fn default_rotation_factor() -> i32 {
    1
}

impl Mutation {
    pub fn new(circle: usize, kind: MutationTrait, change: Change) -> Self {
        Self {
            circle,
            kind,
            change,
            rotation_factor: 1,
        }
    }

    /// Record the starting direction of the target circle.
    pub fn init(&mut self, config: &SpiralConfig) -> Result<(), ConfigError> {
        let circle = config
            .circles
            .get(self.circle)
            .ok_or(ConfigError::InvalidMutation(self.circle))?;
        if self.circle == 0 && self.kind != MutationTrait::Diameter {
            return Err(ConfigError::InvalidMutation(self.circle));
        }
        self.rotation_factor = if circle.speed < 0 { -1 } else { 1 };
        Ok(())
    }

    /// Apply the mutation, or undo it when `reverse` is set.
    pub fn apply(&self, config: &mut SpiralConfig, reverse: bool) -> Result<(), ConfigError> {
        let circle = config
            .circles
            .get_mut(self.circle)
            .ok_or(ConfigError::InvalidMutation(self.circle))?;

        match self.kind {
            MutationTrait::Rotations => {
                let delta = self.change.delta(reverse) * self.rotation_factor;
                circle.speed = (circle.speed + delta).clamp(-MAX_SPEED, MAX_SPEED);
            }
            MutationTrait::Diameter => {
                let delta = self.change.delta(reverse) as f64 * RADIUS_STEP;
                let radius = ((circle.rel_radius + delta) * 100.0).round() / 100.0;
                circle.rel_radius = radius.clamp(RADIUS_STEP, MAX_REL_RADIUS);
            }
            MutationTrait::Direction => circle.speed = -circle.speed,
        }
        Ok(())
    }
}

/// Ordered list of spirals produced by cycling through a list of mutations.
#[derive(Debug, Clone)]
pub struct MutationSequence {
    base: SpiralConfig,
    mutations: Vec<Mutation>,
    length: usize,
    add_reverse: bool,
}

impl MutationSequence {
    /// `length` counts the base spiral as the first frame.
    pub fn new(
        base: SpiralConfig,
        mut mutations: Vec<Mutation>,
        length: usize,
        add_reverse: bool,
    ) -> Result<Self, ConfigError> {
        base.validate()?;
        for mutation in &mut mutations {
            mutation.init(&base)?;
        }
        Ok(Self {
            base,
            mutations,
            length: length.max(1),
            add_reverse,
        })
    }

    /// Number of spirals, including the reversed tail.
    pub fn total_length(&self) -> usize {
        if self.add_reverse {
            self.length * 2 - 1
        } else {
            self.length
        }
    }

    /// All spirals of the sequence in playing order.
    pub fn configs(&self) -> Result<Vec<SpiralConfig>, ConfigError> {
        let mut configs = Vec::with_capacity(self.total_length());
        let mut current = self.base.clone();
        configs.push(current.clone());

        if self.mutations.is_empty() {
            return Ok(configs);
        }

        let m = self.mutations.len();
        for frame in 1..self.total_length() {
            if frame < self.length {
                self.mutations[(frame - 1) % m].apply(&mut current, false)?;
            } else {
                // Undo the mutation of forward frame 2n-1-frame.
                let forward = 2 * self.length - 1 - frame;
                self.mutations[(forward - 1) % m].apply(&mut current, true)?;
            }
            current.validate()?;
            configs.push(current.clone());
        }

        Ok(configs)
    }
}
