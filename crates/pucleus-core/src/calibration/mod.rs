//! Channel-to-energy calibration from operator-supplied reference points,
//! and the counts-vs-counts regression view used to compare two spectra.

use crate::numerics::{LinearFit, LsqError, linear_regression, r_squared};
use crate::spectrum::{EnergyScale, SpectrumSeries};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration point for channel {channel} already exists")]
    DuplicateChannel { channel: u32 },
    #[error("no calibration point for channel {channel}")]
    UnknownChannel { channel: u32 },
    #[error("calibration energy must be finite, got {value}")]
    InvalidEnergy { value: f64 },
    #[error("spectra differ in length: {left} vs {right} channels")]
    LengthMismatch { left: usize, right: usize },
    #[error(transparent)]
    Fit(#[from] LsqError),
}

/// One operator-entered `(channel, energy)` reference pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub channel: u32,
    pub energy: f64,
}

/// Linear energy calibration fit over the current point set.
///
/// The regression is recomputed from scratch whenever the set changes; it is
/// available only once two or more points exist. Conversion while
/// uncalibrated is an explicit "unavailable" (`None`), never an error; the
/// surrounding tool always has a channels-only fallback display.
#[derive(Debug, Clone, Default)]
pub struct EnergyCalibration {
    points: Vec<CalibrationPoint>,
    fit: Option<LinearFit>,
}

impl EnergyCalibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn add_point(&mut self, channel: u32, energy: f64) -> Result<(), CalibrationError> {
        if !energy.is_finite() {
            return Err(CalibrationError::InvalidEnergy { value: energy });
        }
        if self.points.iter().any(|point| point.channel == channel) {
            return Err(CalibrationError::DuplicateChannel { channel });
        }
        self.points.push(CalibrationPoint { channel, energy });
        self.recompute();
        Ok(())
    }

    pub fn remove_point(&mut self, channel: u32) -> Result<(), CalibrationError> {
        let before = self.points.len();
        self.points.retain(|point| point.channel != channel);
        if self.points.len() == before {
            return Err(CalibrationError::UnknownChannel { channel });
        }
        self.recompute();
        Ok(())
    }

    /// Seed the point set from a pre-calibrated spectrum's metadata, the way
    /// the tool recreates two synthetic points when a calibrated file is
    /// loaded. No-op if any points already exist.
    pub fn adopt_scale(&mut self, scale: EnergyScale, reference_channel: u32) {
        if !self.points.is_empty() {
            return;
        }
        self.points.push(CalibrationPoint {
            channel: 0,
            energy: scale.channel_to_energy(0.0),
        });
        if reference_channel > 0 {
            self.points.push(CalibrationPoint {
                channel: reference_channel,
                energy: scale.channel_to_energy(reference_channel as f64),
            });
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.points.len() < 2 {
            self.fit = None;
            return;
        }
        let channels: Vec<f64> = self.points.iter().map(|p| p.channel as f64).collect();
        let energies: Vec<f64> = self.points.iter().map(|p| p.energy).collect();
        // Unique channels guarantee a non-degenerate abscissa.
        self.fit = linear_regression(&channels, &energies).ok();
    }

    pub fn is_calibrated(&self) -> bool {
        self.fit.is_some()
    }

    pub fn slope(&self) -> Option<f64> {
        self.fit.map(|fit| fit.slope)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fit.map(|fit| fit.intercept)
    }

    pub fn channel_to_energy(&self, channel: f64) -> Option<f64> {
        self.fit.map(|fit| fit.evaluate(channel))
    }

    pub fn energy_to_channel(&self, energy: f64) -> Option<f64> {
        let fit = self.fit?;
        (fit.slope != 0.0).then(|| (energy - fit.intercept) / fit.slope)
    }

    /// Goodness of fit over the current points; 1.0 for a perfect line.
    pub fn r_squared(&self) -> Option<f64> {
        let fit = self.fit?;
        let channels: Vec<f64> = self.points.iter().map(|p| p.channel as f64).collect();
        let energies: Vec<f64> = self.points.iter().map(|p| p.energy).collect();
        Some(r_squared(&fit, &channels, &energies))
    }

    pub fn as_energy_scale(&self) -> Option<EnergyScale> {
        self.fit.map(|fit| EnergyScale {
            slope: fit.slope,
            intercept: fit.intercept,
        })
    }
}

/// Channel-wise regression of one spectrum's counts onto another's, with the
/// coefficient of determination. This is the similarity view the tool shows
/// when comparing a processed spectrum against the original it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountsRegression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

pub fn regress_counts(
    reference: &SpectrumSeries,
    subject: &SpectrumSeries,
) -> Result<CountsRegression, CalibrationError> {
    if reference.channels() != subject.channels() {
        return Err(CalibrationError::LengthMismatch {
            left: reference.channels(),
            right: subject.channels(),
        });
    }
    let fit = linear_regression(reference.counts(), subject.counts())?;
    let r_squared = r_squared(&fit, reference.counts(), subject.counts());
    Ok(CountsRegression {
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared,
    })
}
