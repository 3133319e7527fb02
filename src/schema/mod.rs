//! Schema module - Configuration types for spirals, playback and recording.

mod config;
mod mutation;
mod settings;

pub use config::*;
pub use mutation::*;
pub use settings::*;
