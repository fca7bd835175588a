//! Statistical threshold search: a channel is a peak apex candidate when its
//! count exceeds both neighbors `m` channels away by more than the Poisson
//! significance margin `k * sqrt(count)`.

use super::{PeakSearchError, PeakSet, ScanRange, assemble_peaks, recenter_apex, significance_margin};
use crate::spectrum::SpectrumSeries;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleCompare {
    /// Sensitivity in standard deviations of counting noise; larger values
    /// accept fewer bumps as real. Typical settings sit in `[1.0, 1.5]`.
    pub k: f64,
    /// Minimum resolvable peak half-width in channels.
    pub m: usize,
}

impl SimpleCompare {
    pub fn new(k: f64, m: usize) -> Self {
        Self { k, m }
    }

    fn validate(&self, channels: usize) -> Result<(), PeakSearchError> {
        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(PeakSearchError::InvalidSensitivity { value: self.k });
        }
        if self.m == 0 {
            return Err(PeakSearchError::ZeroHalfWidth);
        }
        if channels <= 2 * self.m {
            return Err(PeakSearchError::SeriesTooShort {
                channels,
                half_width: self.m,
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

        // Contiguous runs of candidate channels collapse to one apex each,
        // re-centered on the window maximum.
        let mut apexes = Vec::new();
        let mut run_start: Option<usize> = None;

        let scan_from = start + self.m;
        let scan_to = end.saturating_sub(self.m);
        for channel in scan_from..scan_to {
            if self.is_candidate(counts, channel) {
                run_start.get_or_insert(channel);
            } else if let Some(first) = run_start.take() {
                let mid = (first + channel - 1) / 2;
                apexes.push(recenter_apex(counts, mid, self.m, start, end));
            }
        }
        if let Some(first) = run_start {
            let mid = (first + scan_to.saturating_sub(1)) / 2;
            apexes.push(recenter_apex(counts, mid, self.m, start, end));
        }

        let set = assemble_peaks(series, apexes, self.k, self.m, start, end);
        tracing::info!(
            start,
            end,
            k = self.k,
            m = self.m,
            peaks = set.len(),
            "simple-compare search finished"
        );
        Ok(set)
    }

    fn is_candidate(&self, counts: &[f64], channel: usize) -> bool {
        let count = counts[channel];
        let threshold = count - significance_margin(self.k, count);
        threshold > counts[channel - self.m] && threshold > counts[channel + self.m]
    }
}

#[cfg(test)]
mod tests {
    use super::SimpleCompare;
    use crate::peaks::{PeakSearchError, ScanRange};
    use crate::spectrum::SpectrumSeries;

    fn gaussian_series(
        channels: usize,
        center: f64,
        sigma: f64,
        height: f64,
        baseline: f64,
    ) -> SpectrumSeries {
        let counts = (0..channels)
            .map(|i| {
                let x = (i as f64 - center) / sigma;
                baseline + height * (-0.5 * x * x).exp()
            })
            .collect();
        SpectrumSeries::from_raw(counts, None).expect("series should build")
    }

    #[test]
    fn single_gaussian_bump_yields_exactly_one_peak() {
        let spectrum = gaussian_series(1024, 500.0, 8.0, 10_000.0, 10.0);
        let finder = SimpleCompare::new(1.2, 5);

        let peaks = finder
            .search(&spectrum, ScanRange::full())
            .expect("search should run");

        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert!(peak.position() > 480.0 && peak.position() < 520.0);
        assert!((peak.left_edge() as f64) < peak.position());
        assert!(peak.position() < peak.right_edge() as f64);
        assert!(peak.net_area() <= peak.raw_area());

        let window = peak.channel_window();
        assert_eq!(window.len(), peak.right_edge() - peak.left_edge() + 1);
        assert!((window.iter().sum::<f64>() - peak.raw_area()).abs() < 1.0e-9);
    }

    #[test]
    fn two_separated_bumps_come_back_in_channel_order() {
        let mut counts: Vec<f64> = vec![5.0; 512];
        for (center, height) in [(120.0_f64, 4_000.0), (360.0, 6_000.0)] {
            for (i, value) in counts.iter_mut().enumerate() {
                let x = (i as f64 - center) / 6.0;
                *value += height * (-0.5 * x * x).exp();
            }
        }
        let spectrum = SpectrumSeries::from_raw(counts, None).expect("series should build");

        let peaks = SimpleCompare::new(1.0, 4)
            .search(&spectrum, ScanRange::full())
            .expect("search should run");

        assert_eq!(peaks.len(), 2);
        assert!(peaks[0].position() < peaks[1].position());
        assert!((peaks[0].position() - 120.0).abs() < 5.0);
        assert!((peaks[1].position() - 360.0).abs() < 5.0);
    }

    #[test]
    fn bump_hard_against_the_boundary_is_silently_omitted() {
        // Apex close enough to channel 0 that the left edge walk must run
        // out of range: the peak is dropped, not an error.
        let mut counts: Vec<f64> = vec![10.0; 256];
        for (i, value) in counts.iter_mut().enumerate() {
            let x = (i as f64 - 6.0) / 4.0;
            *value += 8_000.0 * (-0.5 * x * x).exp();
        }
        let spectrum = SpectrumSeries::from_raw(counts, None).expect("series should build");

        let peaks = SimpleCompare::new(1.2, 5)
            .search(&spectrum, ScanRange::full())
            .expect("search should run");

        assert!(peaks.is_empty());
    }

    #[test]
    fn malformed_parameters_fail_before_scanning() {
        let spectrum = gaussian_series(64, 32.0, 4.0, 100.0, 1.0);

        let error = SimpleCompare::new(0.0, 5)
            .search(&spectrum, ScanRange::full())
            .expect_err("non-positive k should fail");
        assert_eq!(error, PeakSearchError::InvalidSensitivity { value: 0.0 });

        let error = SimpleCompare::new(1.2, 0)
            .search(&spectrum, ScanRange::full())
            .expect_err("zero half-width should fail");
        assert_eq!(error, PeakSearchError::ZeroHalfWidth);

        let error = SimpleCompare::new(1.2, 40)
            .search(&spectrum, ScanRange::full())
            .expect_err("half-width wider than the series should fail");
        assert!(matches!(error, PeakSearchError::SeriesTooShort { .. }));
    }

    #[test]
    fn flat_noise_free_background_has_no_peaks() {
        let spectrum =
            SpectrumSeries::from_raw(vec![25.0; 300], None).expect("series should build");

        let peaks = SimpleCompare::new(1.0, 3)
            .search(&spectrum, ScanRange::full())
            .expect("search should run");

        assert!(peaks.is_empty());
    }
}
