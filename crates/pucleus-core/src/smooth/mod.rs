//! Stateless smoothing filters. Each filter maps a [`SpectrumSeries`] to a
//! new series of identical length; channels closer to a boundary than the
//! stencil half-width are passed through unchanged, with no wraparound or
//! truncated windows.

use crate::numerics::polynomial_fit;
use crate::spectrum::SpectrumSeries;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmoothError {
    #[error("{filter} window width must be odd, got {width}")]
    EvenWindow { filter: &'static str, width: usize },
    #[error("{filter} window width must be >= {minimum}, got {width}")]
    WindowTooNarrow {
        filter: &'static str,
        minimum: usize,
        width: usize,
    },
    #[error("{filter} half-width must be >= 1")]
    ZeroHalfWidth { filter: &'static str },
    #[error("{filter} channel step must be >= 1")]
    ZeroStep { filter: &'static str },
    #[error(
        "{filter} stencil spans {span} channels and does not fit a {channels}-channel spectrum"
    )]
    StencilExceedsRange {
        filter: &'static str,
        span: usize,
        channels: usize,
    },
    #[error("{filter} center fit failed: {reason}")]
    CenterFit {
        filter: &'static str,
        reason: String,
    },
}

/// One smoothing pass with its parameters. The variants mirror the three
/// interchangeable methods the acquisition tool offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingFilter {
    /// Flat mean over an odd window of `width` channels.
    MovingAverage { width: usize },
    /// Counts-weighted centroid smoothing: each output channel takes the
    /// series value interpolated at the local statistical centroid, which
    /// biases peak positions less than a flat average.
    Barycenter { width: usize },
    /// Quadratic least-squares fit over a `2 * half_width + 1` stencil with
    /// `step` channels between stencil points, evaluated at the center.
    PolyLeastSquares { half_width: usize, step: usize },
}

impl SmoothingFilter {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MovingAverage { .. } => "moving-average",
            Self::Barycenter { .. } => "barycenter",
            Self::PolyLeastSquares { .. } => "polynomial-least-squares",
        }
    }

    /// Human-readable label recorded in the applied-operations log.
    pub fn label(&self) -> String {
        match self {
            Self::MovingAverage { width } => format!("{width}-point moving average"),
            Self::Barycenter { width } => format!("{width}-point barycenter smoothing"),
            Self::PolyLeastSquares { half_width, step } => format!(
                "{}-point least-squares smoothing, step {step}",
                2 * half_width + 1
            ),
        }
    }

    pub fn apply(&self, series: &SpectrumSeries) -> Result<SpectrumSeries, SmoothError> {
        match *self {
            Self::MovingAverage { width } => moving_average(series, width),
            Self::Barycenter { width } => barycenter(series, width),
            Self::PolyLeastSquares { half_width, step } => {
                poly_least_squares(series, half_width, step)
            }
        }
    }
}

fn validate_window(filter: &'static str, width: usize, minimum: usize) -> Result<usize, SmoothError> {
    if width < minimum {
        return Err(SmoothError::WindowTooNarrow {
            filter,
            minimum,
            width,
        });
    }
    if width % 2 == 0 {
        return Err(SmoothError::EvenWindow { filter, width });
    }
    Ok(width / 2)
}

fn moving_average(series: &SpectrumSeries, width: usize) -> Result<SpectrumSeries, SmoothError> {
    let half = validate_window("moving-average", width, 1)?;
    let counts = series.counts();
    let mut smoothed = counts.to_vec();

    if counts.len() > 2 * half {
        for center in half..counts.len() - half {
            let window = &counts[center - half..=center + half];
            smoothed[center] = window.iter().sum::<f64>() / width as f64;
        }
    }

    Ok(series.replace_counts(smoothed))
}

fn barycenter(series: &SpectrumSeries, width: usize) -> Result<SpectrumSeries, SmoothError> {
    let half = validate_window("barycenter", width, 3)?;
    let counts = series.counts();
    let mut smoothed = counts.to_vec();

    if counts.len() > 2 * half {
        for center in half..counts.len() - half {
            let window = &counts[center - half..=center + half];
            let mass: f64 = window.iter().sum();
            if mass <= 0.0 {
                continue;
            }
            let centroid_offset: f64 = window
                .iter()
                .enumerate()
                .map(|(position, count)| (position as f64 - half as f64) * count / mass)
                .sum();
            let centroid_channel = center as f64 + centroid_offset;
            if let Some(value) = series.interpolated_count(centroid_channel) {
                smoothed[center] = value;
            }
        }
    }

    Ok(series.replace_counts(smoothed))
}

fn poly_least_squares(
    series: &SpectrumSeries,
    half_width: usize,
    step: usize,
) -> Result<SpectrumSeries, SmoothError> {
    const FILTER: &str = "polynomial-least-squares";

    if half_width == 0 {
        return Err(SmoothError::ZeroHalfWidth { filter: FILTER });
    }
    if step == 0 {
        return Err(SmoothError::ZeroStep { filter: FILTER });
    }

    let reach = half_width * step;
    let span = 2 * reach + 1;
    let counts = series.counts();
    if span > counts.len() {
        return Err(SmoothError::StencilExceedsRange {
            filter: FILTER,
            span,
            channels: counts.len(),
        });
    }

    let offsets: Vec<f64> = (-(half_width as isize)..=half_width as isize)
        .map(|j| (j * step as isize) as f64)
        .collect();
    let mut smoothed = counts.to_vec();

    for center in reach..counts.len() - reach {
        let window: Vec<f64> = offsets
            .iter()
            .map(|offset| counts[(center as isize + *offset as isize) as usize])
            .collect();
        // Quadratic fit evaluated at offset 0 is its constant coefficient.
        let coefficients =
            polynomial_fit(&offsets, &window, 2).map_err(|source| SmoothError::CenterFit {
                filter: FILTER,
                reason: source.to_string(),
            })?;
        smoothed[center] = coefficients[0].max(0.0);
    }

    Ok(series.replace_counts(smoothed))
}

#[cfg(test)]
mod tests {
    use super::{SmoothError, SmoothingFilter};
    use crate::spectrum::SpectrumSeries;

    fn series(counts: &[f64]) -> SpectrumSeries {
        SpectrumSeries::from_raw(counts.to_vec(), None).expect("series should build")
    }

    #[test]
    fn moving_average_preserves_length_and_edges() {
        let input = series(&[10.0, 0.0, 30.0, 0.0, 10.0, 50.0, 10.0]);
        let filter = SmoothingFilter::MovingAverage { width: 3 };

        let output = filter.apply(&input).expect("filter should apply");

        assert_eq!(output.channels(), input.channels());
        assert_eq!(output.count(0), input.count(0));
        assert_eq!(output.count(6), input.count(6));
        assert_eq!(output.count(1), Some((10.0 + 0.0 + 30.0) / 3.0));
        assert_eq!(output.count(3), Some((30.0 + 0.0 + 10.0) / 3.0));
    }

    #[test]
    fn even_window_is_rejected_before_scanning() {
        let input = series(&[1.0, 2.0, 3.0]);
        let error = SmoothingFilter::MovingAverage { width: 4 }
            .apply(&input)
            .expect_err("even width should fail");
        assert_eq!(
            error,
            SmoothError::EvenWindow {
                filter: "moving-average",
                width: 4
            }
        );
    }

    #[test]
    fn barycenter_leaves_flat_regions_and_edges_alone() {
        let input = series(&[5.0, 5.0, 5.0, 5.0, 5.0]);
        let filter = SmoothingFilter::Barycenter { width: 3 };

        let output = filter.apply(&input).expect("filter should apply");

        // A flat window has its centroid at the center channel.
        assert_eq!(output.counts(), input.counts());
    }

    #[test]
    fn barycenter_pulls_counts_toward_local_mass() {
        let input = series(&[0.0, 10.0, 100.0, 10.0, 0.0]);
        let filter = SmoothingFilter::Barycenter { width: 3 };

        let output = filter.apply(&input).expect("filter should apply");

        assert_eq!(output.channels(), 5);
        assert_eq!(output.count(0), Some(0.0));
        assert_eq!(output.count(4), Some(0.0));
        // The window around the apex is symmetric, so the apex is kept.
        assert_eq!(output.count(2), Some(100.0));
    }

    #[test]
    fn poly_least_squares_reproduces_a_parabola() {
        let counts: Vec<f64> = (0..21)
            .map(|i| {
                let x = i as f64 - 10.0;
                200.0 - x * x
            })
            .collect();
        let input = series(&counts);
        let filter = SmoothingFilter::PolyLeastSquares {
            half_width: 3,
            step: 1,
        };

        let output = filter.apply(&input).expect("filter should apply");

        // A quadratic fit is exact on quadratic data away from the edges.
        for channel in 3..18 {
            let expected = counts[channel];
            let actual = output.count(channel).expect("channel exists");
            assert!(
                (actual - expected).abs() < 1.0e-9,
                "channel {channel}: {actual} vs {expected}"
            );
        }
        assert_eq!(output.count(0), input.count(0));
        assert_eq!(output.count(20), input.count(20));
    }

    #[test]
    fn oversized_stencil_is_rejected() {
        let input = series(&[1.0, 2.0, 3.0, 4.0]);
        let error = SmoothingFilter::PolyLeastSquares {
            half_width: 4,
            step: 1,
        }
        .apply(&input)
        .expect_err("stencil wider than the spectrum should fail");
        assert_eq!(
            error,
            SmoothError::StencilExceedsRange {
                filter: "polynomial-least-squares",
                span: 9,
                channels: 4
            }
        );
    }

    #[test]
    fn labels_describe_the_applied_operation() {
        assert_eq!(
            SmoothingFilter::MovingAverage { width: 5 }.label(),
            "5-point moving average"
        );
        assert_eq!(
            SmoothingFilter::PolyLeastSquares {
                half_width: 2,
                step: 3
            }
            .label(),
            "5-point least-squares smoothing, step 3"
        );
    }
}
