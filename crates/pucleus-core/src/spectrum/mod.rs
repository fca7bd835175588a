//! Immutable-snapshot histogram model for pulse-height spectra.
//!
//! A [`SpectrumSeries`] owns one count per channel for its whole life; every
//! transform (smoothing, restore) replaces the counts wholesale. The
//! original/working pair the surrounding tool keeps per loaded file lives in
//! [`TrackedSpectrum`].

mod pulses;

pub use pulses::{PulseSample, PulseTrain, PulseTrainError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("spectrum requires at least 1 channel")]
    Empty,
    #[error("channel {channel} has invalid count {value}; counts must be finite and >= 0")]
    InvalidCount { channel: usize, value: f64 },
    #[error("channel range is empty after clamping: start={start}, end={end}, channels={channels}")]
    EmptyRange {
        start: usize,
        end: usize,
        channels: usize,
    },
    #[error("probability density is unavailable for an all-zero spectrum")]
    DegenerateDistribution,
    #[error("acquisition time must be finite and > 0, got {value}")]
    InvalidTotalTime { value: f64 },
}

/// Linear channel-to-energy scale carried as spectrum metadata when a file
/// arrives pre-calibrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyScale {
    pub slope: f64,
    pub intercept: f64,
}

impl EnergyScale {
    pub fn channel_to_energy(&self, channel: f64) -> f64 {
        self.slope * channel + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSeries {
    counts: Vec<f64>,
    total_time: Option<f64>,
    energy_scale: Option<EnergyScale>,
}

impl SpectrumSeries {
    pub fn from_raw(counts: Vec<f64>, total_time: Option<f64>) -> Result<Self, SpectrumError> {
        if counts.is_empty() {
            return Err(SpectrumError::Empty);
        }
        for (channel, &value) in counts.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SpectrumError::InvalidCount { channel, value });
            }
        }
        if let Some(time) = total_time
            && (!time.is_finite() || time <= 0.0)
        {
            return Err(SpectrumError::InvalidTotalTime { value: time });
        }

        Ok(Self {
            counts,
            total_time,
            energy_scale: None,
        })
    }

    pub fn with_energy_scale(mut self, scale: EnergyScale) -> Self {
        self.energy_scale = Some(scale);
        self
    }

    /// Replacement constructor for transforms that already validated their
    /// output shape (same length, non-negative). Metadata is carried over.
    pub(crate) fn replace_counts(&self, counts: Vec<f64>) -> Self {
        debug_assert_eq!(counts.len(), self.counts.len());
        Self {
            counts,
            total_time: self.total_time,
            energy_scale: self.energy_scale,
        }
    }

    pub fn channels(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn count(&self, channel: usize) -> Option<f64> {
        self.counts.get(channel).copied()
    }

    pub fn total_time(&self) -> Option<f64> {
        self.total_time
    }

    pub fn energy_scale(&self) -> Option<EnergyScale> {
        self.energy_scale
    }

    /// Read-only window over `[start, end)` with both bounds clamped to the
    /// channel range. An empty window after clamping is a caller error.
    pub fn slice(&self, start: usize, end: usize) -> Result<&[f64], SpectrumError> {
        let clamped_start = start.min(self.counts.len());
        let clamped_end = end.min(self.counts.len());
        if clamped_start >= clamped_end {
            return Err(SpectrumError::EmptyRange {
                start,
                end,
                channels: self.counts.len(),
            });
        }
        Ok(&self.counts[clamped_start..clamped_end])
    }

    pub fn sum(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / self.counts.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.counts.iter().copied().fold(0.0, f64::max)
    }

    /// Count rate in counts per second, available only for timed spectra.
    pub fn count_rate(&self) -> Option<f64> {
        self.total_time.map(|time| self.sum() / time)
    }

    pub fn probability_density(&self) -> Result<Vec<f64>, SpectrumError> {
        let total = self.sum();
        if total <= 0.0 {
            return Err(SpectrumError::DegenerateDistribution);
        }
        Ok(self.counts.iter().map(|count| count / total).collect())
    }

    /// Count at a possibly fractional channel, linearly interpolated between
    /// the two neighboring channels. `None` outside `[0, channels)`.
    pub fn interpolated_count(&self, channel: f64) -> Option<f64> {
        if !channel.is_finite() || channel < 0.0 {
            return None;
        }
        let floor = channel.floor() as usize;
        if floor >= self.counts.len() {
            return None;
        }
        let fraction = channel - floor as f64;
        if fraction == 0.0 || floor + 1 >= self.counts.len() {
            return Some(self.counts[floor]);
        }
        Some(self.counts[floor] * (1.0 - fraction) + self.counts[floor + 1] * fraction)
    }
}

/// Original/working pair for one loaded spectrum plus the log of applied
/// smoothing operations. Restoring yields counts bit-identical to the
/// original and clears the log.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSpectrum {
    original: SpectrumSeries,
    working: SpectrumSeries,
    applied: Vec<String>,
}

impl TrackedSpectrum {
    pub fn new(original: SpectrumSeries) -> Self {
        let working = original.clone();
        Self {
            original,
            working,
            applied: Vec::new(),
        }
    }

    pub fn original(&self) -> &SpectrumSeries {
        &self.original
    }

    pub fn working(&self) -> &SpectrumSeries {
        &self.working
    }

    pub fn applied_operations(&self) -> &[String] {
        &self.applied
    }

    /// Replace the working series with a transform result and record its
    /// label. The original is never touched.
    pub fn record(&mut self, label: impl Into<String>, transformed: SpectrumSeries) {
        self.working = transformed;
        self.applied.push(label.into());
    }

    pub fn restore(&mut self) {
        self.working = self.original.clone();
        self.applied.clear();
    }
}
