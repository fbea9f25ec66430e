//! Audio drivers

use std::fmt;
use std::io;

use da_core::ProjectSettings;
use thiserror::Error;

pub mod dummy;

pub use dummy::{configured_mix_rate, DummyAudioDriver, MixGuard, MixState};

/// Frames per mix when no buffer size is configured
pub const DEFAULT_BUFFER_FRAMES: usize = 1024;
/// Mix rate used when the configured one is missing or invalid
pub const DEFAULT_MIX_RATE: u32 = 44_100;

/// Output channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SpeakerMode {
    #[default]
    Stereo = 0,
    Surround31 = 1,
    Surround51 = 2,
    Surround71 = 3,
}

impl SpeakerMode {
    /// Enum hint string for the settings registry, indexed by ordinal
    pub const HINT: &'static str = "Stereo,Surround 3.1,Surround 5.1,Surround 7.1";

    pub const ALL: [SpeakerMode; 4] = [
        Self::Stereo,
        Self::Surround31,
        Self::Surround51,
        Self::Surround71,
    ];

    /// Number of interleaved channels for this layout
    pub const fn channels(self) -> usize {
        match self {
            Self::Stereo => 2,
            Self::Surround31 => 4,
            Self::Surround51 => 6,
            Self::Surround71 => 8,
        }
    }

    /// Map a settings ordinal to a mode
    pub const fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Stereo),
            1 => Some(Self::Surround31),
            2 => Some(Self::Surround51),
            3 => Some(Self::Surround71),
            _ => None,
        }
    }

    pub const fn ordinal(self) -> i64 {
        self as i64
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Stereo => "Stereo",
            Self::Surround31 => "Surround 3.1",
            Self::Surround51 => "Surround 5.1",
            Self::Surround71 => "Surround 7.1",
        }
    }
}

impl fmt::Display for SpeakerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of audio frames, called by a driver whenever it needs more data.
///
/// `buffer` holds exactly `frame_count * channels` interleaved samples and
/// must be filled completely. The driver's mix lock is held for the
/// duration of the call, so implementations must not block indefinitely.
pub trait MixCallback: Send + 'static {
    fn process(&mut self, frame_count: usize, buffer: &mut [i32]);
}

impl<F> MixCallback for F
where
    F: FnMut(usize, &mut [i32]) + Send + 'static,
{
    fn process(&mut self, frame_count: usize, buffer: &mut [i32]) {
        self(frame_count, buffer)
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to allocate a sample buffer of {samples} samples")]
    Allocation { samples: usize },
    #[error("Failed to spawn the timing thread: {0}")]
    ThreadSpawn(#[from] io::Error),
    #[error("Driver is already initialized")]
    AlreadyInitialized,
    #[error("Driver is not active")]
    Inactive,
    #[error("Synchronous mixing is unavailable while the timing thread is in use")]
    ThreadedMode,
    #[error("Destination holds {got} samples but {needed} are required")]
    BufferTooSmall { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Interface the audio subsystem uses to drive an output device
pub trait AudioDriver: Send {
    /// Human-readable driver name
    fn name(&self) -> &'static str;
    /// Resolve configuration, allocate buffers and start any worker threads
    fn init(&mut self, settings: &ProjectSettings) -> Result<()>;
    /// Begin requesting audio
    fn start(&mut self);
    fn mix_rate(&self) -> u32;
    fn speaker_mode(&self) -> SpeakerMode;
    fn channels(&self) -> usize {
        self.speaker_mode().channels()
    }
    /// Output latency in seconds
    fn latency(&self) -> f64 {
        0.0
    }
    /// Stop and release resources. Safe to call more than once.
    fn finish(&mut self);
}
