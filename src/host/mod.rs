//! Host side: analysis pipeline, serial transport and session loop
pub mod pipeline;
pub mod session;
pub mod transport;
pub mod volume;

pub use pipeline::AnalysisPipeline;
pub use session::{HostSession, UserCommand};
pub use transport::{open_serial, spawn_line_reader, SerialLink};
pub use volume::{SimulatedVolume, VolumeControl};
