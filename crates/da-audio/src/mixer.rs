//! Test tone mixer

use std::f64::consts::TAU;

use crate::backend::MixCallback;

/// Mix callback that renders a sine tone on every channel as interleaved
/// 32-bit PCM. Used by the headless runner and the benchmarks so there is
/// real data flowing through the driver. The channel count is taken from
/// the size of each request.
#[derive(Debug, Clone)]
pub struct Mixer {
    mix_rate: u32,
    frequency: f64,
    volume: f32,
    phase: f64,
    frames_mixed: u64,
}

impl Mixer {
    /// Create a 440 Hz tone at unity volume.
    pub fn new(mix_rate: u32) -> Self {
        Self {
            mix_rate: mix_rate.max(1),
            frequency: 440.0,
            volume: 1.0,
            phase: 0.0,
            frames_mixed: 0,
        }
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set master volume (clamped between 0.0 and 1.0).
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Get the current volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Frames rendered since creation
    pub fn frames_mixed(&self) -> u64 {
        self.frames_mixed
    }

    /// Render `frames` frames into `buffer`, which holds `frames * channels`
    /// interleaved samples.
    pub fn render(&mut self, frames: usize, buffer: &mut [i32]) {
        if frames == 0 {
            return;
        }
        let channels = (buffer.len() / frames).max(1);
        let step = TAU * self.frequency / f64::from(self.mix_rate);
        let amplitude = f64::from(i32::MAX) * f64::from(self.volume);

        for frame in buffer.chunks_exact_mut(channels).take(frames) {
            let sample = (self.phase.sin() * amplitude) as i32;
            frame.fill(sample);
            self.phase = (self.phase + step) % TAU;
        }
        self.frames_mixed += frames as u64;
    }
}

impl MixCallback for Mixer {
    fn process(&mut self, frame_count: usize, buffer: &mut [i32]) {
        self.render(frame_count, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_interleaved_frames() {
        let mut mixer = Mixer::new(48_000).with_frequency(1_000.0);
        let mut buf = vec![0i32; 8];
        mixer.render(4, &mut buf);

        // Both channels carry the same sample
        for frame in buf.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        // Starts at phase zero
        assert_eq!(buf[0], 0);
        assert!(buf[2] > 0);
        assert_eq!(mixer.frames_mixed(), 4);
    }

    #[test]
    fn zero_volume_is_silent() {
        let mut mixer = Mixer::new(44_100);
        mixer.set_volume(-3.0);
        assert_eq!(mixer.volume(), 0.0);

        let mut buf = vec![7i32; 16];
        mixer.render(4, &mut buf);
        assert!(buf.iter().all(|&s| s == 0));
    }

    #[test]
    fn continues_phase_across_calls() {
        let mut split = Mixer::new(8_000);
        let mut whole = Mixer::new(8_000);

        let mut a = vec![0i32; 10];
        split.render(6, &mut a[..6]);
        split.render(4, &mut a[6..]);

        let mut b = vec![0i32; 10];
        whole.render(10, &mut b);

        assert_eq!(a, b);
    }
}
