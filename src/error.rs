//! Error types for the analysis chain and its configuration
use thiserror::Error;

/// Errors raised when a component is built with values that break its invariants,
/// or when a frame does not match the configured analysis size.
///
/// Malformed protocol input never shows up here: the decoder ignores it.
#[derive(Error, Debug)]
pub enum BandlightError {
    /// Frame length differs from the analyzer's configured size
    #[error("invalid frame length: expected {expected} samples, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    /// Frame size cannot be analyzed (zero or odd)
    #[error("invalid frame size {0}: must be a non-zero even number of samples")]
    InvalidFrameSize(usize),

    /// Peak and average weights of a band do not sum to one
    #[error("band '{band}' weights sum to {sum}, expected 1.0")]
    InvalidBandWeights { band: &'static str, sum: f32 },

    /// Band frequency range is empty or negative
    #[error("band '{band}' has an invalid range {low_hz}..{high_hz} Hz")]
    InvalidBandRange {
        band: &'static str,
        low_hz: f32,
        high_hz: f32,
    },

    /// Any other configuration value out of its allowed range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tempo override outside the accepted BPM window
    #[error("tempo {bpm} BPM outside accepted range {min}-{max}")]
    TempoOutOfRange { bpm: f32, min: f32, max: f32 },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, BandlightError>;
