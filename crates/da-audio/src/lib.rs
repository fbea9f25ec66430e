//! Dummy audio output: simulates hardware mix timing without producing sound

pub mod backend;
pub mod mixer;
pub mod stats;

pub use backend::{AudioDriver, DriverError, DummyAudioDriver, MixCallback, SpeakerMode};
pub use mixer::Mixer;
pub use stats::MixStats;
