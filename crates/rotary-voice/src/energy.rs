//! Energy-threshold voice activity classification.
//!
//! No recognition happens here: a recording is "speech" when its RMS amplitude
//! is above the configured threshold, otherwise "silence".

use crate::error::{VoiceError, VoiceResult};
use crate::session::Disposition;
use std::time::Duration;
use tracing::debug;

/// Mono 16-bit samples captured during one listen window.
#[derive(Debug, Clone)]
pub struct RecordingBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl RecordingBuffer {
    pub fn with_capacity(sample_rate: u32, capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            sample_rate,
        }
    }

    pub fn extend(&mut self, chunk: &[i16]) {
        self.samples.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Root-mean-square amplitude over the whole clip, `None` when empty.
    pub fn rms(&self) -> Option<f64> {
        rms(&self.samples)
    }
}

/// RMS of 16-bit samples, in sample units (0..=32768).
pub fn rms(samples: &[i16]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    Some((sum_sq / samples.len() as f64).sqrt())
}

/// Result of classifying a recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    pub disposition: Disposition,
    pub rms: Option<f64>,
}

/// Classifies recordings against a fixed silence threshold.
#[derive(Debug, Clone, Copy)]
pub struct EnergyDetector {
    threshold: f64,
}

impl EnergyDetector {
    pub fn new(threshold: f64) -> VoiceResult<Self> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(VoiceError::Config(format!(
                "silence threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    /// Speech strictly above the threshold, silence at or below it.
    /// An empty recording counts as silence.
    pub fn classify(&self, recording: &RecordingBuffer) -> Analysis {
        let rms = recording.rms();
        let disposition = match rms {
            Some(level) if level > self.threshold => Disposition::Speech,
            _ => Disposition::Silence,
        };
        debug!(
            rms = ?rms,
            threshold = self.threshold,
            samples = recording.len(),
            duration_ms = recording.duration().as_millis() as u64,
            "recording classified as {}",
            disposition
        );
        Analysis { disposition, rms }
    }
}
