//! Playback and recording parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Parameters of the stepping loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Rotation per step in degrees.
    pub step_angle_degrees: f64,
    /// Rotation steps performed per step timer tick.
    pub steps_per_interval: u32,
    /// Interval of the refresh timer that renders the scene.
    pub refresh_interval_ms: u64,
    /// Minimum segment length committed to a drawn line, in scene units.
    pub min_draw_length: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            step_angle_degrees: 0.05,
            steps_per_interval: 4,
            refresh_interval_ms: 40,
            min_draw_length: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Step angle in radians.
    #[inline]
    pub fn step_angle(&self) -> f64 {
        self.step_angle_degrees.to_radians()
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step_angle_degrees > 0.0 && self.step_angle_degrees <= 360.0) {
            return Err(ConfigError::InvalidPlayerSetting(
                "step angle must be in (0, 360] degrees",
            ));
        }
        if self.steps_per_interval == 0 {
            return Err(ConfigError::InvalidPlayerSetting(
                "steps per interval must be non-zero",
            ));
        }
        if !(self.min_draw_length >= 0.0) {
            return Err(ConfigError::InvalidPlayerSetting(
                "minimum draw length must not be negative",
            ));
        }
        Ok(())
    }
}

/// Output format of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Format {
    #[default]
    Gif,
    Video,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Gif => "gif",
            Format::Video => "mp4",
        }
    }
}

/// Frame rate of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameRate {
    Fps25,
    #[default]
    Fps10,
    Fps4,
    Fps2,
    Fps1,
}

impl FrameRate {
    pub fn fps(self) -> u32 {
        match self {
            FrameRate::Fps25 => 25,
            FrameRate::Fps10 => 10,
            FrameRate::Fps4 => 4,
            FrameRate::Fps2 => 2,
            FrameRate::Fps1 => 1,
        }
    }
}

/// Parameters of a recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub format: Format,
    pub frame_rate: FrameRate,
    /// Video bit budget per frame; bitrate is this times fps.
    pub bits_per_frame: u32,
    /// Capture a partial frame after this many rotation steps.
    pub steps_per_frame: u32,
    /// Pixel margin around the spiral cut rectangle.
    pub margin: u32,
    /// NeuQuant sampling factor, 1 (best) to 30 (fastest).
    pub gif_quality: u8,
    /// GIF loop count, 0 loops forever.
    pub gif_loop: u16,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format: Format::Gif,
            frame_rate: FrameRate::Fps10,
            bits_per_frame: 80_000,
            steps_per_frame: 40,
            margin: 20,
            gif_quality: 10,
            gif_loop: 0,
        }
    }
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps_per_frame == 0 {
            return Err(ConfigError::InvalidRecordingSetting(
                "steps per frame must be non-zero",
            ));
        }
        if !(1..=30).contains(&self.gif_quality) {
            return Err(ConfigError::InvalidRecordingSetting(
                "GIF quality must be in 1..=30",
            ));
        }
        if self.bits_per_frame == 0 {
            return Err(ConfigError::InvalidRecordingSetting(
                "bits per frame must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rates() {
        let fps: Vec<u32> = [
            FrameRate::Fps25,
            FrameRate::Fps10,
            FrameRate::Fps4,
            FrameRate::Fps2,
            FrameRate::Fps1,
        ]
        .into_iter()
        .map(FrameRate::fps)
        .collect();
        assert_eq!(fps, vec![25, 10, 4, 2, 1]);
    }

    #[test]
    fn test_defaults_validate() {
        PlayerConfig::default().validate().unwrap();
        RecordingConfig::default().validate().unwrap();
    }

    #[test]
    fn test_player_config_rejects_zero_step() {
        let config = PlayerConfig {
            step_angle_degrees: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            steps_per_interval: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recording_config_rejects_bad_quality() {
        let config = RecordingConfig {
            gif_quality: 31,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recording_config_json() {
        let json = r#"{
            "format": "Video",
            "frame_rate": "Fps25",
            "bits_per_frame": 40000,
            "steps_per_frame": 10,
            "margin": 8,
            "gif_quality": 5,
            "gif_loop": 3
        }"#;
        let config: RecordingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.format, Format::Video);
        assert_eq!(config.format.extension(), "mp4");
        assert_eq!(config.frame_rate.fps(), 25);
    }
}
