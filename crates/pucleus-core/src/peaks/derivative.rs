//! Finite-difference search: a least-squares derivative of order 1 to 3 is
//! evaluated over an odd stencil, and apexes are read off the zero
//! crossings consistent with a local maximum.

use super::{
    DEFAULT_EDGE_SENSITIVITY, PeakSearchError, PeakSet, ScanRange, assemble_peaks, recenter_apex,
};
use crate::spectrum::SpectrumSeries;

/// Largest stencil the third-order stencil tolerates before noise
/// amplification swamps the signal.
const LEVEL3_MAX_DOTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivative {
    /// Derivative order: 1, 2 or 3.
    pub level: usize,
    /// Stencil width in channels; odd.
    pub dots: usize,
}

impl Derivative {
    pub fn new(level: usize, dots: usize) -> Self {
        Self { level, dots }
    }

    fn validate(&self, channels: usize) -> Result<(), PeakSearchError> {
        if !(1..=3).contains(&self.level) {
            return Err(PeakSearchError::UnsupportedLevel { level: self.level });
        }
        if self.dots % 2 == 0 {
            return Err(PeakSearchError::EvenStencil { dots: self.dots });
        }
        let minimum = match self.level {
            1 => 3,
            _ => 5,
        };
        if self.dots < minimum {
            return Err(PeakSearchError::StencilTooNarrow {
                level: self.level,
                minimum,
                dots: self.dots,
            });
        }
        if self.level == 3 && self.dots > LEVEL3_MAX_DOTS {
            return Err(PeakSearchError::UnsupportedStencil { dots: self.dots });
        }
        if channels <= self.dots {
            return Err(PeakSearchError::SeriesTooShort {
                channels,
                half_width: self.dots / 2,
            });
        }
        Ok(())
    }

    pub fn search<'a>(
        &self,
        series: &'a SpectrumSeries,
        range: ScanRange,
    ) -> Result<PeakSet<'a>, PeakSearchError> {
        self.validate(series.channels())?;
        let (start, end) = range.resolve(series.channels());
        let counts = series.counts();
        let half = self.dots / 2;

        let weights = stencil_weights(self.level, half);
        // Derivative samples for channels [start + half, end - half); entry
        // i corresponds to channel start + half + i.
        let first_channel = start + half;
        let last_channel = end.saturating_sub(half);
        if last_channel <= first_channel {
            return Ok(PeakSet::from_ordered(Vec::new()));
        }

        let derivative: Vec<f64> = (first_channel..last_channel)
            .map(|channel| {
                weights
                    .iter()
                    .enumerate()
                    .map(|(position, weight)| weight * counts[channel - half + position])
                    .sum()
            })
            .collect();

        let tolerance = sign_tolerance(&derivative);
        let apexes: Vec<usize> = match self.level {
            1 => falling_zero_crossings(&derivative, tolerance)
                .into_iter()
                .map(|index| recenter_apex(counts, first_channel + index, half, start, end))
                .collect(),
            2 => negative_troughs(&derivative, tolerance)
                .into_iter()
                .map(|index| recenter_apex(counts, first_channel + index, half, start, end))
                .collect(),
            _ => rising_zero_crossings(&derivative, tolerance)
                .into_iter()
                .map(|index| recenter_apex(counts, first_channel + index, half, start, end))
                .collect(),
        };

        let set = assemble_peaks(
            series,
            apexes,
            DEFAULT_EDGE_SENSITIVITY,
            half.max(1),
            start,
            end,
        );
        tracing::info!(
            start,
            end,
            level = self.level,
            dots = self.dots,
            peaks = set.len(),
            "derivative search finished"
        );
        Ok(set)
    }
}

/// Least-squares derivative weights over offsets `-half..=half`, from the
/// orthogonal-polynomial projection of the fitted coefficient:
/// order 1 uses `j`, order 2 uses `j^2 - S2/S0`, order 3 uses
/// `j^3 - (S4/S2) j`, each normalized so an exact monomial input returns
/// its true derivative at the center.
fn stencil_weights(level: usize, half: usize) -> Vec<f64> {
    let offsets: Vec<f64> = (-(half as isize)..=half as isize)
        .map(|j| j as f64)
        .collect();
    let points = offsets.len() as f64;

    let moment = |power: i32| -> f64 { offsets.iter().map(|j| j.powi(power)).sum() };

    match level {
        1 => {
            let norm = moment(2);
            offsets.iter().map(|j| j / norm).collect()
        }
        2 => {
            let shift = moment(2) / points;
            let basis: Vec<f64> = offsets.iter().map(|j| j * j - shift).collect();
            let norm: f64 = basis.iter().map(|value| value * value).sum();
            // Second derivative of the fitted quadratic is twice its
            // leading coefficient.
            basis.iter().map(|value| 2.0 * value / norm).collect()
        }
        _ => {
            let shift = moment(4) / moment(2);
            let basis: Vec<f64> = offsets.iter().map(|j| j.powi(3) - shift * j).collect();
            let norm: f64 = basis.iter().map(|value| value * value).sum();
            basis.iter().map(|value| 6.0 * value / norm).collect()
        }
    }
}

/// Magnitude below which a derivative sample counts as zero. Rounding in
/// the stencil sums would otherwise turn a perfectly flat baseline into a
/// forest of sub-epsilon sign changes.
fn sign_tolerance(values: &[f64]) -> f64 {
    let max_abs = values.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    (max_abs * 1.0e-9).max(1.0e-9)
}

/// Indexes where the sequence leaves the positive region and next leaves
/// the dead band on the negative side: the first-derivative signature of a
/// maximum. A derivative that merely decays into the band (a peak tail
/// flattening out) is not a crossing.
fn falling_zero_crossings(values: &[f64], tolerance: f64) -> Vec<usize> {
    sign_flips(values, tolerance, |value| value > tolerance, |value| {
        value < -tolerance
    })
}

/// Indexes where the sequence leaves the negative region and next leaves
/// the dead band on the positive side: the third-derivative signature of
/// the apex (the second derivative's minimum).
fn rising_zero_crossings(values: &[f64], tolerance: f64) -> Vec<usize> {
    sign_flips(values, tolerance, |value| value < -tolerance, |value| {
        value > tolerance
    })
}

fn sign_flips(
    values: &[f64],
    tolerance: f64,
    leaving: impl Fn(f64) -> bool,
    arriving: impl Fn(f64) -> bool,
) -> Vec<usize> {
    let mut flips = Vec::new();
    for index in 0..values.len().saturating_sub(1) {
        if !leaving(values[index]) || leaving(values[index + 1]) {
            continue;
        }
        let landed = values[index + 1..]
            .iter()
            .find(|value| value.abs() > tolerance);
        if landed.is_some_and(|value| arriving(*value)) {
            flips.push(index);
        }
    }
    flips
}

/// Index of the most negative sample inside each contiguous negative run:
/// the second-derivative signature of a peak core.
fn negative_troughs(values: &[f64], tolerance: f64) -> Vec<usize> {
    let mut troughs = Vec::new();
    let mut current: Option<(usize, f64)> = None;

    for (index, &value) in values.iter().enumerate() {
        if value < -tolerance {
            match current {
                Some((_, best)) if value >= best => {}
                _ => current = Some((index, value)),
            }
        } else if let Some((trough, _)) = current.take() {
            troughs.push(trough);
        }
    }
    if let Some((trough, _)) = current {
        troughs.push(trough);
    }
    troughs
}
