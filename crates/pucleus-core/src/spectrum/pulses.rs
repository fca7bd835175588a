//! Pulse-mode ingestion: raw per-event pulse heights, optionally paired with
//! arrival times, binned by amplitude into a [`SpectrumSeries`].

use super::{SpectrumError, SpectrumSeries};

/// One detector event. `arrival_time` is seconds from acquisition start and
/// is present for all samples of a train or none of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseSample {
    pub amplitude: f64,
    pub arrival_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PulseTrainError {
    #[error("pulse train requires at least 1 sample")]
    Empty,
    #[error("sample {index} has invalid amplitude {value}; amplitudes must be finite and >= 0")]
    InvalidAmplitude { index: usize, value: f64 },
    #[error("sample {index} mixes timed and untimed events within one train")]
    MixedTiming { index: usize },
    #[error("sample {index} has arrival time {current} out of order")]
    NonMonotonicTime { index: usize, current: f64 },
    #[error("histogram requires at least 1 channel")]
    NoChannels,
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PulseTrain {
    samples: Vec<PulseSample>,
    timed: bool,
}

impl PulseTrain {
    pub fn new(samples: Vec<PulseSample>) -> Result<Self, PulseTrainError> {
        if samples.is_empty() {
            return Err(PulseTrainError::Empty);
        }

        let timed = samples[0].arrival_time.is_some();
        let mut previous_time = f64::NEG_INFINITY;
        for (index, sample) in samples.iter().enumerate() {
            if !sample.amplitude.is_finite() || sample.amplitude < 0.0 {
                return Err(PulseTrainError::InvalidAmplitude {
                    index,
                    value: sample.amplitude,
                });
            }
            match sample.arrival_time {
                Some(time) if timed => {
                    if !time.is_finite() || time < previous_time {
                        return Err(PulseTrainError::NonMonotonicTime {
                            index,
                            current: time,
                        });
                    }
                    previous_time = time;
                }
                None if !timed => {}
                _ => return Err(PulseTrainError::MixedTiming { index }),
            }
        }

        Ok(Self { samples, timed })
    }

    pub fn from_amplitudes(amplitudes: Vec<f64>) -> Result<Self, PulseTrainError> {
        Self::new(
            amplitudes
                .into_iter()
                .map(|amplitude| PulseSample {
                    amplitude,
                    arrival_time: None,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_timed(&self) -> bool {
        self.timed
    }

    pub fn samples(&self) -> &[PulseSample] {
        &self.samples
    }

    /// Acquisition span of a timed train (last arrival), if known.
    pub fn total_time(&self) -> Option<f64> {
        if !self.timed {
            return None;
        }
        self.samples
            .last()
            .and_then(|sample| sample.arrival_time)
            .filter(|time| *time > 0.0)
    }

    /// Bin event amplitudes into a fixed number of channels. Amplitudes at or
    /// above `channels` (one amplitude unit per channel) land in the last
    /// channel, matching how an MCA saturates its top bin.
    pub fn bin_into(&self, channels: usize) -> Result<SpectrumSeries, PulseTrainError> {
        if channels == 0 {
            return Err(PulseTrainError::NoChannels);
        }

        let mut counts = vec![0.0; channels];
        for sample in &self.samples {
            let channel = (sample.amplitude.floor() as usize).min(channels - 1);
            counts[channel] += 1.0;
        }

        Ok(SpectrumSeries::from_raw(counts, self.total_time())?)
    }

    /// Histogram of inter-arrival gaps as a probability density over
    /// `bins` uniform gap intervals. Empty for untimed trains.
    pub fn interval_density(&self, bins: usize) -> Vec<f64> {
        if !self.timed || bins == 0 || self.samples.len() < 2 {
            return Vec::new();
        }

        let gaps: Vec<f64> = self
            .samples
            .windows(2)
            .filter_map(|pair| Some(pair[1].arrival_time? - pair[0].arrival_time?))
            .collect();
        let max_gap = gaps.iter().copied().fold(0.0, f64::max);
        if max_gap <= 0.0 {
            return vec![0.0; bins];
        }

        let mut histogram = vec![0.0; bins];
        for gap in &gaps {
            let bin = ((gap / max_gap) * bins as f64).floor() as usize;
            histogram[bin.min(bins - 1)] += 1.0;
        }
        let total = gaps.len() as f64;
        for value in &mut histogram {
            *value /= total;
        }
        histogram
    }
}

#[cfg(test)]
mod tests {
    use super::{PulseSample, PulseTrain, PulseTrainError};

    #[test]
    fn amplitudes_bin_into_fixed_channel_histogram() {
        let train =
            PulseTrain::from_amplitudes(vec![0.2, 1.7, 1.1, 3.0, 250.0]).expect("train builds");

        let spectrum = train.bin_into(8).expect("binning succeeds");

        assert_eq!(spectrum.channels(), 8);
        assert_eq!(spectrum.count(0), Some(1.0));
        assert_eq!(spectrum.count(1), Some(2.0));
        assert_eq!(spectrum.count(3), Some(1.0));
        // overflow amplitude saturates into the top channel
        assert_eq!(spectrum.count(7), Some(1.0));
        assert_eq!(spectrum.sum(), 5.0);
    }

    #[test]
    fn timed_train_supplies_total_time() {
        let train = PulseTrain::new(vec![
            PulseSample {
                amplitude: 4.0,
                arrival_time: Some(0.5),
            },
            PulseSample {
                amplitude: 2.0,
                arrival_time: Some(12.5),
            },
        ])
        .expect("train builds");

        assert!(train.is_timed());
        assert_eq!(train.total_time(), Some(12.5));
        let spectrum = train.bin_into(16).expect("binning succeeds");
        assert_eq!(spectrum.total_time(), Some(12.5));
    }

    #[test]
    fn mixed_timing_is_rejected() {
        let error = PulseTrain::new(vec![
            PulseSample {
                amplitude: 1.0,
                arrival_time: Some(1.0),
            },
            PulseSample {
                amplitude: 1.0,
                arrival_time: None,
            },
        ])
        .expect_err("mixed timing should fail");
        assert_eq!(error, PulseTrainError::MixedTiming { index: 1 });
    }

    #[test]
    fn interval_density_sums_to_one_for_timed_trains() {
        let samples = (0..10)
            .map(|i| PulseSample {
                amplitude: 1.0,
                arrival_time: Some(i as f64 * 0.25),
            })
            .collect();
        let train = PulseTrain::new(samples).expect("train builds");

        let density = train.interval_density(4);
        assert_eq!(density.len(), 4);
        let total: f64 = density.iter().sum();
        assert!((total - 1.0).abs() < 1.0e-12);
    }
}
