//! Dummy audio driver
//!
//! Emulates an output device without producing sound. In threaded mode a
//! timing thread pulls `buffer_frames` frames from the mix callback once per
//! buffer period, the same cadence real hardware would request them at. In
//! synchronous mode nothing runs on its own and the owner calls
//! [`DummyAudioDriver::pull`] at whatever rate it needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use da_core::config::AudioConfig;
use da_core::settings::{PropertyHint, PropertyInfo, MIX_RATE_KEY, SPEAKER_MODE_KEY};
use da_core::{ProjectSettings, SettingValue};
use parking_lot::{Mutex, MutexGuard};

use super::{
    AudioDriver, DriverError, MixCallback, Result, SpeakerMode, DEFAULT_BUFFER_FRAMES,
    DEFAULT_MIX_RATE,
};
use crate::stats::MixStats;

/// State serialized by the driver's mix lock
pub struct MixState {
    samples: Vec<i32>,
    channels: usize,
    callback: Box<dyn MixCallback>,
    stats: MixStats,
}

impl MixState {
    fn new(callback: Box<dyn MixCallback>) -> Self {
        Self {
            samples: Vec::new(),
            channels: SpeakerMode::Stereo.channels(),
            callback,
            stats: MixStats::new(),
        }
    }

    /// Run the mix callback for `frames` frames into the front of the buffer
    fn mix(&mut self, frames: usize) {
        let len = frames * self.channels;
        let started = self.stats.begin_mix(frames);
        self.callback.process(frames, &mut self.samples[..len]);
        self.stats.end_mix(started);
    }

    /// Internal interleaved sample buffer; empty before init and after finish
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn stats(&self) -> &MixStats {
        &self.stats
    }
}

/// Held mix lock. Dropping it unlocks.
pub type MixGuard<'a> = MutexGuard<'a, MixState>;

struct Shared {
    active: AtomicBool,
    exit_requested: AtomicBool,
    state: Mutex<MixState>,
}

/// Software audio device that only keeps time
pub struct DummyAudioDriver {
    shared: Arc<Shared>,
    mix_rate: Option<u32>,
    speaker_mode: SpeakerMode,
    channels: usize,
    buffer_frames: usize,
    use_threads: bool,
    initialized: bool,
    thread: Option<JoinHandle<()>>,
}

impl DummyAudioDriver {
    /// Create a threaded driver with the default buffer size.
    pub fn new(callback: impl MixCallback) -> Self {
        Self::with_buffer_frames(DEFAULT_BUFFER_FRAMES, callback)
    }

    /// Create a threaded driver mixing `buffer_frames` frames per period.
    pub fn with_buffer_frames(buffer_frames: usize, callback: impl MixCallback) -> Self {
        Self {
            shared: Arc::new(Shared {
                active: AtomicBool::new(false),
                exit_requested: AtomicBool::new(false),
                state: Mutex::new(MixState::new(Box::new(callback))),
            }),
            mix_rate: None,
            speaker_mode: SpeakerMode::Stereo,
            channels: SpeakerMode::Stereo.channels(),
            buffer_frames: buffer_frames.max(1),
            use_threads: true,
            initialized: false,
            thread: None,
        }
    }

    /// Create a driver from the audio section of the config file. The mix
    /// rate and speaker mode come from the settings registry at init.
    pub fn from_config(config: &AudioConfig, callback: impl MixCallback) -> Self {
        let mut driver = Self::with_buffer_frames(config.buffer_frames, callback);
        driver.use_threads = config.use_threads;
        driver
    }

    /// Resolve configuration, allocate the sample buffer and, in threaded
    /// mode, start the timing thread.
    pub fn init(&mut self, settings: &ProjectSettings) -> Result<()> {
        if self.initialized {
            return Err(DriverError::AlreadyInitialized);
        }

        settings.define(
            PropertyInfo::new(SPEAKER_MODE_KEY)
                .with_hint(PropertyHint::Enum(SpeakerMode::HINT.to_string()))
                .restart_required(),
            SettingValue::Int(SpeakerMode::Stereo.ordinal()),
        );

        self.shared.active.store(false, Ordering::Release);
        self.shared.exit_requested.store(false, Ordering::Release);

        let mix_rate = match self.mix_rate {
            Some(rate) if rate > 0 => rate,
            Some(rate) => {
                tracing::warn!(target: "audio", "Ignoring requested mix rate of {}", rate);
                configured_mix_rate(settings)
            }
            None => configured_mix_rate(settings),
        };
        self.mix_rate = Some(mix_rate);

        self.speaker_mode = configured_speaker_mode(settings);
        self.channels = self.speaker_mode.channels();

        let len = self
            .buffer_frames
            .checked_mul(self.channels)
            .ok_or(DriverError::Allocation { samples: usize::MAX })?;
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(len)
            .map_err(|_| DriverError::Allocation { samples: len })?;
        samples.resize(len, 0);

        {
            let mut state = self.shared.state.lock();
            state.samples = samples;
            state.channels = self.channels;
            state.stats.reset();
        }

        if self.use_threads {
            let shared = Arc::clone(&self.shared);
            let buffer_frames = self.buffer_frames;
            let spawned = thread::Builder::new()
                .name("audio-dummy".into())
                .spawn(move || timing_loop(shared, buffer_frames, mix_rate));

            match spawned {
                Ok(handle) => self.thread = Some(handle),
                Err(e) => {
                    self.shared.state.lock().samples = Vec::new();
                    return Err(DriverError::ThreadSpawn(e));
                }
            }
        }

        self.initialized = true;
        tracing::info!(
            target: "audio",
            "Dummy audio driver initialized: {} Hz, {} ({} channels), {} frames per buffer, {}",
            mix_rate,
            self.speaker_mode,
            self.channels,
            self.buffer_frames,
            if self.use_threads { "threaded" } else { "synchronous" }
        );
        Ok(())
    }

    /// Begin mixing. Idempotent.
    pub fn start(&self) {
        self.shared.active.store(true, Ordering::Release);
    }

    /// Mix `frames` frames synchronously into `out`, in chunks of at most
    /// `buffer_frames`. Only valid in synchronous mode after [`Self::start`].
    /// Never sleeps; the caller owns the cadence.
    pub fn pull(&self, frames: usize, out: &mut [i32]) -> Result<()> {
        if !self.initialized || !self.shared.active.load(Ordering::Acquire) {
            tracing::error!(target: "audio", "pull() called on an inactive dummy driver");
            return Err(DriverError::Inactive);
        }
        if self.use_threads {
            tracing::error!(target: "audio", "pull() called while the timing thread is running");
            return Err(DriverError::ThreadedMode);
        }

        let Some(needed) = frames.checked_mul(self.channels) else {
            tracing::error!(target: "audio", "pull() of {} frames overflows the sample count", frames);
            return Err(DriverError::BufferTooSmall {
                needed: usize::MAX,
                got: out.len(),
            });
        };
        if out.len() < needed {
            tracing::error!(target: "audio", "pull() destination too small: {} < {}", out.len(), needed);
            return Err(DriverError::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }

        let mut todo = frames;
        let mut offset = 0;
        while todo > 0 {
            let to_mix = todo.min(self.buffer_frames);
            let total = to_mix * self.channels;

            let mut state = self.shared.state.lock();
            state.mix(to_mix);
            out[offset..offset + total].copy_from_slice(&state.samples[..total]);
            drop(state);

            todo -= to_mix;
            offset += total;
        }

        Ok(())
    }

    /// Stop the timing thread and release the sample buffer. Idempotent and
    /// safe after a failed init.
    pub fn finish(&mut self) {
        if self.use_threads {
            self.shared.exit_requested.store(true, Ordering::Release);
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!(target: "audio", "Dummy audio timing thread panicked");
            }
        }

        self.shared.active.store(false, Ordering::Release);
        self.shared.state.lock().samples = Vec::new();

        if self.initialized {
            self.initialized = false;
            tracing::info!(target: "audio", "Dummy audio driver finished");
        }
    }

    /// Acquire the mix lock, serializing with the timing thread and `pull`.
    pub fn lock(&self) -> MixGuard<'_> {
        self.shared.state.lock()
    }

    /// Snapshot of the mix instrumentation
    pub fn mix_stats(&self) -> MixStats {
        self.shared.state.lock().stats.clone()
    }

    /// Seconds until the audio from the last mix is exhausted
    pub fn time_to_next_mix(&self) -> f64 {
        self.shared.state.lock().stats.time_to_next_mix(self.mix_rate())
    }

    /// Resolved mix rate, or the default before init
    pub fn mix_rate(&self) -> u32 {
        self.mix_rate.unwrap_or(DEFAULT_MIX_RATE)
    }

    pub fn speaker_mode(&self) -> SpeakerMode {
        self.speaker_mode
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    pub fn uses_threads(&self) -> bool {
        self.use_threads
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Request a mix rate. Meant for use before init; afterwards only the
    /// reported value changes, the timing thread keeps its period.
    pub fn set_mix_rate(&mut self, rate: u32) {
        self.mix_rate = Some(rate);
    }

    /// Select a speaker mode. Init re-reads the mode from settings, and the
    /// buffer is never resized, so changes after init are ignored.
    pub fn set_speaker_mode(&mut self, mode: SpeakerMode) {
        if self.initialized {
            tracing::warn!(target: "audio", "Ignoring speaker mode change to {} after init", mode);
            return;
        }
        self.speaker_mode = mode;
        self.channels = mode.channels();
    }

    /// Choose between the timing thread and synchronous pulls. Only
    /// honoured before init.
    pub fn set_use_threads(&mut self, use_threads: bool) {
        if self.initialized {
            tracing::warn!(target: "audio", "Ignoring threading mode change after init");
            return;
        }
        self.use_threads = use_threads;
    }
}

impl AudioDriver for DummyAudioDriver {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn init(&mut self, settings: &ProjectSettings) -> Result<()> {
        DummyAudioDriver::init(self, settings)
    }

    fn start(&mut self) {
        DummyAudioDriver::start(self)
    }

    fn mix_rate(&self) -> u32 {
        DummyAudioDriver::mix_rate(self)
    }

    fn speaker_mode(&self) -> SpeakerMode {
        self.speaker_mode
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn finish(&mut self) {
        DummyAudioDriver::finish(self)
    }
}

impl Drop for DummyAudioDriver {
    fn drop(&mut self) {
        self.finish();
    }
}

fn timing_loop(shared: Arc<Shared>, buffer_frames: usize, mix_rate: u32) {
    let usdelay = (buffer_frames as f64 / f64::from(mix_rate) * 1_000_000.0) as u64;
    let delay = Duration::from_micros(usdelay);
    da_core::audio_debug!("Timing thread started, period {:?}", delay);

    while !shared.exit_requested.load(Ordering::Acquire) {
        if shared.active.load(Ordering::Acquire) {
            shared.state.lock().mix(buffer_frames);
        }

        thread::sleep(delay);
    }

    da_core::audio_debug!("Timing thread stopped");
}

/// Read the configured mix rate, falling back to the default on bad values.
/// Feature overrides apply, so this is the rate `init` resolves when no
/// explicit rate was requested.
pub fn configured_mix_rate(settings: &ProjectSettings) -> u32 {
    let value = settings.get_or_define(MIX_RATE_KEY, SettingValue::Int(i64::from(DEFAULT_MIX_RATE)));
    match value.as_int().and_then(|v| u32::try_from(v).ok()) {
        Some(rate) if rate > 0 => rate,
        _ => {
            tracing::warn!(
                target: "audio",
                "Invalid mix rate of {}, consider reassigning setting '{}'. Defaulting mix rate to value {}.",
                value,
                MIX_RATE_KEY,
                DEFAULT_MIX_RATE
            );
            DEFAULT_MIX_RATE
        }
    }
}

/// Read the configured speaker mode. Never fails: anything outside the
/// known ordinals falls back to stereo with a warning.
fn configured_speaker_mode(settings: &ProjectSettings) -> SpeakerMode {
    let value = settings
        .get(SPEAKER_MODE_KEY)
        .unwrap_or(SettingValue::Int(SpeakerMode::Stereo.ordinal()));

    if let Some(mode) = value.as_int().and_then(SpeakerMode::from_ordinal) {
        return mode;
    }

    tracing::warn!(
        target: "audio",
        "Invalid speaker_mode of {}, consider reassigning setting '{}'. Defaulting to stereo mode: 0.",
        value,
        SPEAKER_MODE_KEY
    );
    SpeakerMode::Stereo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent() -> impl MixCallback {
        |_frames: usize, buf: &mut [i32]| buf.fill(0)
    }

    #[test]
    fn configured_speaker_mode_falls_back() {
        let settings = ProjectSettings::new();
        settings.set(SPEAKER_MODE_KEY, SettingValue::Int(7));
        assert_eq!(configured_speaker_mode(&settings), SpeakerMode::Stereo);

        settings.set(SPEAKER_MODE_KEY, SettingValue::from("5.1"));
        assert_eq!(configured_speaker_mode(&settings), SpeakerMode::Stereo);

        settings.set(SPEAKER_MODE_KEY, SettingValue::Int(2));
        assert_eq!(configured_speaker_mode(&settings), SpeakerMode::Surround51);
    }

    #[test]
    fn configured_mix_rate_validates() {
        let settings = ProjectSettings::new();
        assert_eq!(configured_mix_rate(&settings), DEFAULT_MIX_RATE);

        settings.set(MIX_RATE_KEY, SettingValue::Int(48_000));
        assert_eq!(configured_mix_rate(&settings), 48_000);

        settings.set(MIX_RATE_KEY, SettingValue::Int(-5));
        assert_eq!(configured_mix_rate(&settings), DEFAULT_MIX_RATE);

        settings.set_features(["web"]);
        settings.set(&format!("{MIX_RATE_KEY}.web"), SettingValue::Int(32_000));
        assert_eq!(configured_mix_rate(&settings), 32_000);
    }

    #[test]
    fn oversized_buffer_is_allocation_error() {
        let mut driver = DummyAudioDriver::with_buffer_frames(usize::MAX / 2 + 1, silent());
        driver.set_use_threads(false);
        assert!(matches!(
            driver.init(&ProjectSettings::new()),
            Err(DriverError::Allocation { samples: usize::MAX })
        ));
        assert!(!driver.is_initialized());
        driver.finish();
    }

    #[test]
    fn overflowing_pull_is_rejected() {
        let mut driver = DummyAudioDriver::with_buffer_frames(64, silent());
        driver.set_use_threads(false);
        driver.init(&ProjectSettings::new()).unwrap();
        driver.start();

        let mut out = [0i32; 8];
        assert!(matches!(
            driver.pull(usize::MAX / 2 + 1, &mut out),
            Err(DriverError::BufferTooSmall { needed: usize::MAX, got: 8 })
        ));
        assert_eq!(driver.mix_stats().mix_count(), 0);
    }

    #[test]
    fn init_defines_speaker_mode_setting() {
        let settings = ProjectSettings::new();
        let mut driver = DummyAudioDriver::new(silent());
        driver.set_use_threads(false);
        driver.init(&settings).unwrap();

        let info = settings.property_info(SPEAKER_MODE_KEY).unwrap();
        assert!(info.restart_if_changed);
        assert_eq!(info.hint, PropertyHint::Enum(SpeakerMode::HINT.to_string()));
        assert_eq!(settings.get(SPEAKER_MODE_KEY), Some(SettingValue::Int(0)));
        driver.finish();
    }

    #[test]
    fn explicit_mix_rate_is_kept() {
        let settings = ProjectSettings::new();
        settings.set(MIX_RATE_KEY, SettingValue::Int(22_050));

        let mut driver = DummyAudioDriver::new(silent());
        driver.set_use_threads(false);
        driver.set_mix_rate(96_000);
        driver.init(&settings).unwrap();
        assert_eq!(driver.mix_rate(), 96_000);
    }

    #[test]
    fn double_init_is_rejected() {
        let settings = ProjectSettings::new();
        let mut driver = DummyAudioDriver::new(silent());
        driver.set_use_threads(false);
        driver.init(&settings).unwrap();
        assert!(matches!(driver.init(&settings), Err(DriverError::AlreadyInitialized)));

        driver.finish();
        assert!(driver.init(&settings).is_ok());
    }

    #[test]
    fn setters_after_init_are_ignored() {
        let settings = ProjectSettings::new();
        let mut driver = DummyAudioDriver::new(silent());
        driver.set_use_threads(false);
        driver.init(&settings).unwrap();

        driver.set_use_threads(true);
        driver.set_speaker_mode(SpeakerMode::Surround71);
        assert!(!driver.uses_threads());
        assert_eq!(driver.channels(), 2);
    }

    #[test]
    fn trait_object_reports_name() {
        let driver: Box<dyn AudioDriver> = Box::new(DummyAudioDriver::new(silent()));
        assert_eq!(driver.name(), "Dummy");
        assert_eq!(driver.latency(), 0.0);
        assert_eq!(driver.channels(), 2);
    }
}
