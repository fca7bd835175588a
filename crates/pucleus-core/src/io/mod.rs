//! Reading and writing spectra on disk.
//!
//! Two formats are supported: a JSON document carrying counts plus the
//! acquisition metadata, and a plain ASCII column of counts (one channel per
//! line) with optional `#`-prefixed metadata comments, the interchange form
//! most MCA tooling can produce. Written files always use `\n` line endings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::spectrum::{EnergyScale, SpectrumError, SpectrumSeries};

#[derive(Debug, thiserror::Error)]
pub enum SpectrumIoError {
    #[error("cannot read spectrum file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write spectrum file `{path}`: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse spectrum file `{path}`: {detail}")]
    Parse { path: String, detail: String },
    #[error("spectrum file `{path}` is invalid: {source}")]
    Invalid {
        path: String,
        #[source]
        source: SpectrumError,
    },
}

/// On-disk JSON shape of a spectrum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpectrumDocument {
    counts: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    energy_slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    energy_intercept: Option<f64>,
}

impl SpectrumDocument {
    fn from_series(series: &SpectrumSeries) -> Self {
        Self {
            counts: series.counts().to_vec(),
            total_time: series.total_time(),
            energy_slope: series.energy_scale().map(|scale| scale.slope),
            energy_intercept: series.energy_scale().map(|scale| scale.intercept),
        }
    }

    fn into_series(self, path: &Path) -> Result<SpectrumSeries, SpectrumIoError> {
        let series =
            SpectrumSeries::from_raw(self.counts, self.total_time).map_err(|source| {
                SpectrumIoError::Invalid {
                    path: path.display().to_string(),
                    source,
                }
            })?;
        match (self.energy_slope, self.energy_intercept) {
            (Some(slope), Some(intercept)) => {
                Ok(series.with_energy_scale(EnergyScale { slope, intercept }))
            }
            (None, None) => Ok(series),
            _ => Err(SpectrumIoError::Parse {
                path: path.display().to_string(),
                detail: "energySlope and energyIntercept must appear together".to_string(),
            }),
        }
    }
}

pub fn read_json(path: &Path) -> Result<SpectrumSeries, SpectrumIoError> {
    let text = read_text(path)?;
    let document: SpectrumDocument =
        serde_json::from_str(&text).map_err(|error| SpectrumIoError::Parse {
            path: path.display().to_string(),
            detail: error.to_string(),
        })?;
    document.into_series(path)
}

pub fn write_json(path: &Path, series: &SpectrumSeries) -> Result<(), SpectrumIoError> {
    let document = SpectrumDocument::from_series(series);
    let mut text = serde_json::to_string_pretty(&document).map_err(|error| {
        SpectrumIoError::Write {
            path: path.display().to_string(),
            source: std::io::Error::other(error),
        }
    })?;
    text.push('\n');
    write_text(path, &text)
}

/// Reads the ASCII column format: one count per line, blank lines ignored,
/// `#` comments may carry `time:` and `energy: <slope> <intercept>`
/// metadata.
pub fn read_ascii(path: &Path) -> Result<SpectrumSeries, SpectrumIoError> {
    let text = read_text(path)?;
    let mut counts = Vec::new();
    let mut total_time = None;
    let mut scale = None;
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            parse_metadata_comment(comment.trim(), &mut total_time, &mut scale);
            continue;
        }
        let count: f64 = line.parse().map_err(|_| SpectrumIoError::Parse {
            path: path.display().to_string(),
            detail: format!("line {}: `{line}` is not a count", index + 1),
        })?;
        counts.push(count);
    }
    let series = SpectrumSeries::from_raw(counts, total_time).map_err(|source| {
        SpectrumIoError::Invalid {
            path: path.display().to_string(),
            source,
        }
    })?;
    Ok(match scale {
        Some(scale) => series.with_energy_scale(scale),
        None => series,
    })
}

pub fn write_ascii(path: &Path, series: &SpectrumSeries) -> Result<(), SpectrumIoError> {
    let mut text = String::new();
    if let Some(time) = series.total_time() {
        text.push_str(&format!("# time: {time}\n"));
    }
    if let Some(scale) = series.energy_scale() {
        text.push_str(&format!("# energy: {} {}\n", scale.slope, scale.intercept));
    }
    for count in series.counts() {
        text.push_str(&format!("{count}\n"));
    }
    write_text(path, &text)
}

/// Picks the format from the extension: `.json` is JSON, anything else the
/// ASCII column form.
pub fn read_spectrum(path: &Path) -> Result<SpectrumSeries, SpectrumIoError> {
    if has_json_extension(path) {
        read_json(path)
    } else {
        read_ascii(path)
    }
}

pub fn write_spectrum(path: &Path, series: &SpectrumSeries) -> Result<(), SpectrumIoError> {
    if has_json_extension(path) {
        write_json(path, series)
    } else {
        write_ascii(path, series)
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn parse_metadata_comment(
    comment: &str,
    total_time: &mut Option<f64>,
    scale: &mut Option<EnergyScale>,
) {
    if let Some(value) = comment.strip_prefix("time:")
        && let Ok(time) = value.trim().parse::<f64>()
    {
        *total_time = Some(time);
        return;
    }
    if let Some(value) = comment.strip_prefix("energy:") {
        let mut fields = value.split_whitespace();
        if let (Some(slope), Some(intercept)) = (fields.next(), fields.next())
            && let (Ok(slope), Ok(intercept)) = (slope.parse::<f64>(), intercept.parse::<f64>())
            && fields.next().is_none()
        {
            *scale = Some(EnergyScale { slope, intercept });
        }
    }
}

fn read_text(path: &Path) -> Result<String, SpectrumIoError> {
    let text = fs::read_to_string(path).map_err(|source| SpectrumIoError::Read {
        path: path.display().to_string(),
        source,
    })?;
    // Normalize line endings so files from other platforms parse cleanly.
    Ok(text.replace("\r\n", "\n"))
}

fn write_text(path: &Path, text: &str) -> Result<(), SpectrumIoError> {
    fs::write(path, text).map_err(|source| SpectrumIoError::Write {
        path: path.display().to_string(),
        source,
    })
}
