//! Five-channel audio-reactive LED driver.
//!
//! The host analyzes live audio into vocals, chord, snare, clap and bass
//! levels and streams them as text lines to a small LED device. The device
//! side state machine lives in [`device`] so it can be simulated and tested
//! on the host.
pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod protocol;

pub use config::BandlightConfig;
pub use error::{BandlightError, Result};
