//! Engine module - Circle chains and the epicyclic rotation that drives them.

mod chain;
mod circle;
mod draw;
mod rotation;

pub use chain::*;
pub use circle::*;
pub use draw::*;
pub use rotation::*;
