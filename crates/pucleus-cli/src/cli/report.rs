use serde::Serialize;

/// JSON shape of a `peaks` run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PeakReport {
    pub spectrum: String,
    pub algorithm: String,
    pub channels: usize,
    pub calibrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_tolerance: Option<f64>,
    pub peaks: Vec<PeakEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PeakEntry {
    pub position: f64,
    pub left_edge: usize,
    pub right_edge: usize,
    pub height: f64,
    pub raw_area: f64,
    pub net_area: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
}

pub(super) fn render_human_summary(report: &PeakReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{}: {} channels, {} ({})",
        report.spectrum,
        report.channels,
        if report.calibrated {
            "energy axis calibrated"
        } else {
            "uncalibrated"
        },
        report.algorithm
    ));

    if report.peaks.is_empty() {
        lines.push("No peaks found.".to_string());
        return lines.join("\n");
    }

    lines.push(format!("{} peak(s):", report.peaks.len()));
    for (index, peak) in report.peaks.iter().enumerate() {
        let mut line = format!(
            "  #{}  channel {:.1}  edges [{}, {}]  height {:.1}  net area {:.1}",
            index + 1,
            peak.position,
            peak.left_edge,
            peak.right_edge,
            peak.height,
            peak.net_area
        );
        if let Some(energy) = peak.energy {
            line.push_str(&format!("  energy {energy:.1}"));
        }
        if !peak.matches.is_empty() {
            line.push_str(&format!("  matches {}", peak.matches.join(", ")));
        }
        lines.push(line);
    }
    if let Some(tolerance) = report.match_tolerance {
        lines.push(format!("Match tolerance: {tolerance:.2}"));
    }
    lines.join("\n")
}
