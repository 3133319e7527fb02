//! Circle chain configuration in the spiral JSON format.

use serde::{Deserialize, Serialize};

use crate::engine::{ChainError, Circle, CircleChain};
use crate::geometry::Point;

/// Current config file version.
pub const CONFIG_VERSION: u32 = 1;

/// Largest radius relative to the default circle radius.
pub const MAX_REL_RADIUS: f64 = 6.0;

/// Largest number of revolutions per parent revolution.
pub const MAX_SPEED: i32 = 1000;

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Configuration of a single circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleConfig {
    /// Radius relative to the default circle radius.
    #[serde(rename = "Radius")]
    pub rel_radius: f64,
    /// Signed revolutions per parent revolution (positive is clockwise).
    #[serde(rename = "Speed")]
    pub speed: i32,
    /// Whether the circle center traces a line.
    #[serde(rename = "Draw")]
    pub draw: bool,
    #[serde(rename = "Color")]
    pub color: Color,
}

impl CircleConfig {
    pub const fn new(rel_radius: f64, speed: i32, draw: bool, color: Color) -> Self {
        Self {
            rel_radius,
            speed,
            draw,
            color,
        }
    }
}

/// A complete spiral: the ordered circle chain, anchor first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiralConfig {
    #[serde(rename = "ConfigVersion", default = "default_config_version")]
    pub config_version: u32,
    #[serde(rename = "AppVersion", default = "default_app_version")]
    pub app_version: String,
    #[serde(rename = "Circles")]
    pub circles: Vec<CircleConfig>,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self::from_circles(vec![
            CircleConfig::new(4.0, 0, false, Color::BLUE),
            CircleConfig::new(2.0, 1, false, Color::GREEN),
            CircleConfig::new(0.2, -5, true, Color::WHITE),
        ])
    }
}

impl SpiralConfig {
    pub fn from_circles(circles: Vec<CircleConfig>) -> Self {
        Self {
            config_version: CONFIG_VERSION,
            app_version: default_app_version(),
            circles,
        }
    }

    /// Built-in example spirals.
    pub fn examples() -> Vec<SpiralConfig> {
        use Color as C;
        vec![
            Self::from_circles(vec![
                CircleConfig::new(6.0, 0, false, C::BLUE),
                CircleConfig::new(2.6, 1, false, C::GREEN),
                CircleConfig::new(1.6, 5, false, C::YELLOW),
                CircleConfig::new(0.8, 40, true, C::RED),
            ]),
            Self::from_circles(vec![
                CircleConfig::new(5.0, 0, false, C::BLUE),
                CircleConfig::new(3.0, 1, false, C::YELLOW),
                CircleConfig::new(1.6, 4, true, C::RED),
                CircleConfig::new(0.2, 200, true, C::WHITE),
            ]),
            Self::from_circles(vec![
                CircleConfig::new(6.0, 0, false, C::BLUE),
                CircleConfig::new(2.1, 1, false, C::GREEN),
                CircleConfig::new(1.6, -5, false, C::YELLOW),
                CircleConfig::new(0.8, 25, true, C::RED),
                CircleConfig::new(0.4, -125, false, C::CYAN),
                CircleConfig::new(0.08, 625, true, C::WHITE),
            ]),
            Self::from_circles(vec![
                CircleConfig::new(4.8, 0, false, C::CYAN),
                CircleConfig::new(2.8, 1, false, C::YELLOW),
                CircleConfig::new(1.6, -3, true, C::GREEN),
                CircleConfig::new(0.8, 9, false, C::MAGENTA),
                CircleConfig::new(0.4, -27, true, C::BLUE),
                CircleConfig::new(0.2, 81, false, C::RED),
                CircleConfig::new(0.04, -243, true, C::WHITE),
            ]),
        ]
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SpiralConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Capture the shape of an existing chain.
    ///
    /// Relative radii are rounded to two decimals.
    pub fn from_chain(chain: &CircleChain, default_radius: f64) -> Self {
        let circles = chain
            .iter()
            .map(|c| CircleConfig {
                rel_radius: (c.radius() / default_radius * 100.0).round() / 100.0,
                speed: c.speed(),
                draw: c.draw(),
                color: c.color(),
            })
            .collect();
        Self::from_circles(circles)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.circles.len();
        if n < CircleChain::MIN_CIRCLES {
            return Err(ConfigError::TooFewCircles(n));
        }
        if n > CircleChain::MAX_CIRCLES {
            return Err(ConfigError::TooManyCircles(n));
        }
        let anchor = &self.circles[0];
        if anchor.speed != 0 {
            return Err(ConfigError::AnchorSpeed(anchor.speed));
        }
        if anchor.draw {
            return Err(ConfigError::AnchorDraws);
        }
        for (i, circle) in self.circles.iter().enumerate() {
            if !(circle.rel_radius > 0.0 && circle.rel_radius <= MAX_REL_RADIUS) {
                return Err(ConfigError::InvalidRadius {
                    circle: i,
                    radius: circle.rel_radius,
                });
            }
            if !(-MAX_SPEED..=MAX_SPEED).contains(&circle.speed) {
                return Err(ConfigError::InvalidSpeed {
                    circle: i,
                    speed: circle.speed,
                });
            }
        }
        Ok(())
    }

    /// Build the circle chain, stacking every circle on top of its predecessor.
    pub fn to_chain(&self, default_radius: f64, anchor: Point) -> Result<CircleChain, ConfigError> {
        self.validate()?;

        let mut circles: Vec<Circle> = Vec::with_capacity(self.circles.len());
        for cfg in &self.circles {
            let radius = default_radius * cfg.rel_radius;
            let center = match circles.last() {
                Some(prev) => Point::new(
                    prev.center().x,
                    prev.center().y - (prev.radius() + radius),
                ),
                None => anchor,
            };
            circles.push(Circle::new(center, radius, cfg.speed, cfg.color, cfg.draw));
        }

        Ok(CircleChain::new(circles)?)
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config must contain at least {min} circles, got {0}", min = CircleChain::MIN_CIRCLES)]
    TooFewCircles(usize),
    #[error("Config must contain at most {max} circles, got {0}", max = CircleChain::MAX_CIRCLES)]
    TooManyCircles(usize),
    #[error("Circle[0] speed({0}) must be 0")]
    AnchorSpeed(i32),
    #[error("Circle[0] cannot draw")]
    AnchorDraws,
    #[error("Circle[{circle}] radius({radius}) must be in (0, {max}]", max = MAX_REL_RADIUS)]
    InvalidRadius { circle: usize, radius: f64 },
    #[error("Circle[{circle}] speed({speed}) exceeds {max}", max = MAX_SPEED)]
    InvalidSpeed { circle: usize, speed: i32 },
    #[error("Invalid color: {0}")]
    InvalidColor(String),
    #[error("Mutation references invalid circle {0}")]
    InvalidMutation(usize),
    #[error("Invalid player setting: {0}")]
    InvalidPlayerSetting(&'static str),
    #[error("Invalid recording setting: {0}")]
    InvalidRecordingSetting(&'static str),
    #[error("Malformed config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chain(#[from] ChainError),
}
