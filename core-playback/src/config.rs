//! Playback engine configuration.
//!
//! Thresholds are opaque inputs from the host's configuration layer; the
//! engine applies them without interpreting where they came from.

use std::time::Duration;

/// Tunables for the playback engine and its idle sweep.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Upper bound on waiting for a track's payload before `start` or the
    /// advance handler gives up on it.
    pub max_download_wait: Duration,
    /// How long a session may be solo in its output channel while sounding
    /// before the sweep pauses it.
    pub pause_threshold: Duration,
    /// How long a session may be solo while not sounding before the sweep
    /// tears it down.
    pub stop_threshold: Duration,
    /// Interval between idle sweep passes.
    pub sweep_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_download_wait: Duration::from_secs(300),
            pause_threshold: Duration::from_secs(60),
            stop_threshold: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl PlaybackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_download_wait(mut self, wait: Duration) -> Self {
        self.max_download_wait = wait;
        self
    }

    pub fn with_pause_threshold(mut self, threshold: Duration) -> Self {
        self.pause_threshold = threshold;
        self
    }

    pub fn with_stop_threshold(mut self, threshold: Duration) -> Self {
        self.stop_threshold = threshold;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
