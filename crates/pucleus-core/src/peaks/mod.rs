//! Peak detection over a channel range.
//!
//! Two interchangeable algorithms share one contract: parameters are
//! validated before any scan runs, a degenerate scan range falls back to the
//! full series, results come back in ascending channel order, and a peak
//! whose edge walk runs past the scan boundary is silently dropped (a
//! documented contract of the search, reported via a `tracing` debug event,
//! not an error).

mod derivative;
mod simple_compare;

pub use derivative::Derivative;
pub use simple_compare::SimpleCompare;

use crate::spectrum::SpectrumSeries;

/// Significance used for the edge walk when the detection algorithm has no
/// sensitivity parameter of its own (the derivative method).
pub(crate) const DEFAULT_EDGE_SENSITIVITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeakSearchError {
    #[error("sensitivity k must be finite and > 0, got {value}")]
    InvalidSensitivity { value: f64 },
    #[error("peak half-width m must be >= 1")]
    ZeroHalfWidth,
    #[error("spectrum of {channels} channels is too short for half-width {half_width}")]
    SeriesTooShort { channels: usize, half_width: usize },
    #[error("derivative level must be 1, 2 or 3, got {level}")]
    UnsupportedLevel { level: usize },
    #[error("derivative stencil must be odd, got {dots} dots")]
    EvenStencil { dots: usize },
    #[error("level {level} derivative needs at least {minimum} dots, got {dots}")]
    StencilTooNarrow {
        level: usize,
        minimum: usize,
        dots: usize,
    },
    #[error("level 3 derivative supports at most 7 dots, got {dots}")]
    UnsupportedStencil { dots: usize },
}

/// Half-open channel range `[start, end)` to scan. A degenerate request
/// (`end` within one channel of `start`, in either order) selects the whole
/// series, which is how the surrounding tool treats an empty selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub start: usize,
    pub end: usize,
}

impl ScanRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn full() -> Self {
        Self { start: 0, end: usize::MAX }
    }

    /// Resolve against a concrete series: clamp to the channel range and
    /// substitute the full series for degenerate selections.
    pub(crate) fn resolve(self, channels: usize) -> (usize, usize) {
        let start = self.start.min(channels);
        let end = self.end.min(channels);
        if end.saturating_sub(start) <= 1 {
            (0, channels)
        } else {
            (start, end)
        }
    }
}

/// One detected feature, borrowing the series it was found in for area and
/// height queries. Discarded wholesale and rebuilt on every new search.
#[derive(Debug, Clone, Copy)]
pub struct Peak<'a> {
    series: &'a SpectrumSeries,
    position: f64,
    left_edge: usize,
    right_edge: usize,
}

impl<'a> Peak<'a> {
    pub(crate) fn new(
        series: &'a SpectrumSeries,
        position: f64,
        left_edge: usize,
        right_edge: usize,
    ) -> Self {
        debug_assert!((left_edge as f64) < position && position < right_edge as f64);
        Self {
            series,
            position,
            left_edge,
            right_edge,
        }
    }

    /// Apex channel; fractional when the parabolic refinement around the
    /// apex count resolves the centroid between two channels.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn left_edge(&self) -> usize {
        self.left_edge
    }

    pub fn right_edge(&self) -> usize {
        self.right_edge
    }

    /// Count at the (possibly fractional) apex position.
    pub fn height(&self) -> f64 {
        self.series
            .interpolated_count(self.position)
            .unwrap_or_default()
    }

    /// Sum of counts over `[left_edge, right_edge]`, background included.
    pub fn raw_area(&self) -> f64 {
        self.series.counts()[self.left_edge..=self.right_edge]
            .iter()
            .sum()
    }

    /// Raw area minus a linear background interpolated between the two edge
    /// counts across the span. Clamped at zero for pathological baselines.
    pub fn net_area(&self) -> f64 {
        let counts = self.series.counts();
        let span = (self.right_edge - self.left_edge + 1) as f64;
        let background = (counts[self.left_edge] + counts[self.right_edge]) * span / 2.0;
        (self.raw_area() - background).max(0.0)
    }

    /// The slice of channels belonging to this peak, edges included.
    pub fn channel_window(&self) -> &'a [f64] {
        &self.series.counts()[self.left_edge..=self.right_edge]
    }
}

/// Ordered, read-only result of one search. Indexable, with a fresh
/// iterator on every call.
#[derive(Debug, Clone)]
pub struct PeakSet<'a> {
    peaks: Vec<Peak<'a>>,
}

impl<'a> PeakSet<'a> {
    pub(crate) fn from_ordered(peaks: Vec<Peak<'a>>) -> Self {
        debug_assert!(
            peaks
                .windows(2)
                .all(|pair| pair[0].position() < pair[1].position())
        );
        Self { peaks }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Peak<'a>> {
        self.peaks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak<'a>> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak<'a>] {
        &self.peaks
    }
}

impl<'a> std::ops::Index<usize> for PeakSet<'a> {
    type Output = Peak<'a>;

    fn index(&self, index: usize) -> &Peak<'a> {
        &self.peaks[index]
    }
}

impl<'a, 'b> IntoIterator for &'b PeakSet<'a> {
    type Item = &'b Peak<'a>;
    type IntoIter = std::slice::Iter<'b, Peak<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

/// Poisson significance margin: the count excess required before a local
/// difference is accepted as statistically real.
pub(crate) fn significance_margin(k: f64, count: f64) -> f64 {
    k * count.max(0.0).sqrt()
}

/// Walk outward from `apex` until the margin test says the count has
/// dropped to the local background trend on both sides. `None` when either
/// walk reaches the scan boundary first; the caller drops the peak.
pub(crate) fn walk_edges(
    counts: &[f64],
    apex: usize,
    k: f64,
    m: usize,
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let left = walk_left(counts, apex, k, m, start)?;
    let right = walk_right(counts, apex, k, m, end)?;
    Some((left, right))
}

fn walk_left(counts: &[f64], apex: usize, k: f64, m: usize, start: usize) -> Option<usize> {
    let mut channel = apex.checked_sub(1)?;
    while channel >= start + m {
        let count = counts[channel];
        if count - significance_margin(k, count) <= counts[channel - m] {
            return Some(channel);
        }
        channel -= 1;
    }
    None
}

fn walk_right(counts: &[f64], apex: usize, k: f64, m: usize, end: usize) -> Option<usize> {
    let mut channel = apex + 1;
    while channel + m < end {
        let count = counts[channel];
        if count - significance_margin(k, count) <= counts[channel + m] {
            return Some(channel);
        }
        channel += 1;
    }
    None
}

/// Channel of maximum count within `±m` of `center`, clamped to the scan
/// range. Ties resolve to the leftmost channel.
pub(crate) fn recenter_apex(
    counts: &[f64],
    center: usize,
    m: usize,
    start: usize,
    end: usize,
) -> usize {
    let window_start = center.saturating_sub(m).max(start);
    let window_end = (center + m + 1).min(end);
    let mut best = center;
    let mut best_count = counts[center];
    for channel in window_start..window_end {
        if counts[channel] > best_count {
            best = channel;
            best_count = counts[channel];
        }
    }
    best
}

/// Refine an integer apex to a fractional centroid with a three-point
/// parabola. The correction stays within half a channel, so the edge
/// ordering invariant survives.
pub(crate) fn refine_apex(counts: &[f64], apex: usize) -> f64 {
    if apex == 0 || apex + 1 >= counts.len() {
        return apex as f64;
    }
    let left = counts[apex - 1];
    let center = counts[apex];
    let right = counts[apex + 1];
    let curvature = left - 2.0 * center + right;
    if curvature >= 0.0 || curvature.abs() < f64::EPSILON {
        return apex as f64;
    }
    let offset = 0.5 * (left - right) / curvature;
    apex as f64 + offset.clamp(-0.5, 0.5)
}

/// Shared tail of both algorithms: edge walk, drop-on-missing-edge, apex
/// refinement, ascending order with apex dedup.
pub(crate) fn assemble_peaks<'a>(
    series: &'a SpectrumSeries,
    mut apexes: Vec<usize>,
    k: f64,
    m: usize,
    start: usize,
    end: usize,
) -> PeakSet<'a> {
    apexes.sort_unstable();
    apexes.dedup();

    let counts = series.counts();
    let mut peaks: Vec<Peak<'a>> = Vec::with_capacity(apexes.len());

    for apex in apexes {
        let Some((left_edge, right_edge)) = walk_edges(counts, apex, k, m, start, end) else {
            tracing::debug!(apex, start, end, "peak discarded: edge ran past scan range");
            continue;
        };
        let position = refine_apex(counts, apex);
        if let Some(previous) = peaks.last()
            && position <= previous.position()
        {
            continue;
        }
        peaks.push(Peak::new(series, position, left_edge, right_edge));
    }

    PeakSet::from_ordered(peaks)
}
