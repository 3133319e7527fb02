//! Spiral Fun - Epicyclic circle chains with incremental GIF/video capture.
//!
//! A chain of circles rotates like a set of epicycles: every circle turns
//! about the center of the circle before it, and a circle with pen down
//! traces its path as a polyline. One full turn of the driving angle closes
//! every line. While the chain turns, the rendered scene can be recorded
//! frame by frame into an animated GIF or a video.
//!
//! # Architecture
//!
//! - `geometry`: Points and rectangles in scene and device coordinates
//! - `schema`: Serializable chain, player and recording configuration
//! - `engine`: The circle chain, the rotation engine and line tracking
//! - `capture`: Render surfaces, frame grabbing, encoders and the recorder
//! - `player`: The stepping loop tying rotation, rendering and recording
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use spiral_fun::{
//!     capture::{DirectoryStorage, RasterSurface, Recorder, SceneGrabber},
//!     geometry::Point,
//!     player::Player,
//!     schema::{Color, PlayerConfig, RecordingConfig, SpiralConfig},
//! };
//!
//! let chain = SpiralConfig::default()
//!     .to_chain(20.0, Point::new(400.0, 400.0))
//!     .unwrap();
//!
//! let config = RecordingConfig::default();
//! let grabber = SceneGrabber::for_chain(&chain, 1.0, config.margin);
//! let storage = Arc::new(DirectoryStorage::new("recordings"));
//! let mut recorder = Recorder::create(config.clone(), grabber, storage);
//! recorder.start_recording(config.frame_rate, "").unwrap();
//!
//! let surface = RasterSurface::new(800.0, 800.0, 1.0, Color::BLACK);
//! let mut player = Player::new(chain, Box::new(surface), PlayerConfig::default()).unwrap();
//! player.play(Some(recorder));
//!
//! if let Some(stats) = player.run() {
//!     println!("{}", stats);
//! }
//! ```

pub mod capture;
pub mod engine;
pub mod geometry;
pub mod player;
pub mod schema;

// Re-export commonly used types
pub use capture::{RecordError, Recorder, RenderSurface};
pub use engine::{CircleChain, RotationEngine};
pub use player::{PlayState, Player, PlayerStats};
pub use schema::{PlayerConfig, RecordingConfig, SpiralConfig};
