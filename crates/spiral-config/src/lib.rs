//! Process-wide configuration shared by the SpiralTorch interchange crates.
//!
//! [`tracing`] installs the global subscriber; [`interchange`] holds the
//! environment-driven limits the encoder and decoder obey.

pub mod interchange;
pub mod tracing;

pub use interchange::{ConfigError, InterchangeConfig};
pub use tracing::{init_tracing, InitError};
