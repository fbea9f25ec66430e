//! Mix timing instrumentation

use std::time::{Duration, Instant};

/// Bookkeeping updated around every mix callback invocation.
#[derive(Debug, Clone, Default)]
pub struct MixStats {
    last_mix_time: Option<Instant>,
    last_mix_frames: usize,
    mix_count: u64,
    total_frames: u64,
    busy_time: Duration,
}

impl MixStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a mix of `frames` frames. Returns the start instant
    /// to hand back to [`MixStats::end_mix`].
    pub fn begin_mix(&mut self, frames: usize) -> Instant {
        let now = Instant::now();
        self.last_mix_time = Some(now);
        self.last_mix_frames = frames;
        now
    }

    /// Mark the end of a mix started at `started`.
    pub fn end_mix(&mut self, started: Instant) {
        self.busy_time += started.elapsed();
        self.mix_count += 1;
        self.total_frames += self.last_mix_frames as u64;
    }

    /// Number of completed mix callbacks
    pub fn mix_count(&self) -> u64 {
        self.mix_count
    }

    /// Total frames produced across all mixes
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn last_mix_frames(&self) -> usize {
        self.last_mix_frames
    }

    /// Accumulated time spent inside the mix callback
    pub fn busy_time(&self) -> Duration {
        self.busy_time
    }

    /// Time since the most recent mix started
    pub fn time_since_last_mix(&self) -> Option<Duration> {
        self.last_mix_time.map(|t| t.elapsed())
    }

    /// Seconds until the audio produced by the last mix runs out. Negative
    /// once the consumer is late.
    pub fn time_to_next_mix(&self, mix_rate: u32) -> f64 {
        let Some(since) = self.time_since_last_mix() else {
            return 0.0;
        };
        let buffered = self.last_mix_frames as f64 / f64::from(mix_rate.max(1));
        buffered - since.as_secs_f64()
    }

    /// Seconds of audio produced so far
    pub fn total_time(&self, mix_rate: u32) -> f64 {
        self.total_frames as f64 / f64::from(mix_rate.max(1))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_mixes() {
        let mut stats = MixStats::new();
        assert_eq!(stats.time_since_last_mix(), None);

        let t = stats.begin_mix(64);
        stats.end_mix(t);
        let t = stats.begin_mix(36);
        stats.end_mix(t);

        assert_eq!(stats.mix_count(), 2);
        assert_eq!(stats.total_frames(), 100);
        assert_eq!(stats.last_mix_frames(), 36);
        assert!(stats.time_since_last_mix().is_some());
        assert!((stats.total_time(100) - 1.0).abs() < f64::EPSILON);

        stats.reset();
        assert_eq!(stats.mix_count(), 0);
    }

    #[test]
    fn time_to_next_mix_decreases() {
        let mut stats = MixStats::new();
        let t = stats.begin_mix(48_000);
        stats.end_mix(t);

        let first = stats.time_to_next_mix(48_000);
        std::thread::sleep(Duration::from_millis(5));
        let second = stats.time_to_next_mix(48_000);

        assert!(first <= 1.0);
        assert!(second < first);
    }
}
