use std::path::{Path, PathBuf};

use anyhow::Context;
use pucleus_core::calibration::EnergyCalibration;
use pucleus_core::domain::PucleusError;
use pucleus_core::io;
use pucleus_core::library::{LibrarySet, NuclideLibrary, tolerance_from_peak_energies};
use pucleus_core::peaks::{Derivative, PeakSet, ScanRange, SimpleCompare};
use pucleus_core::smooth::SmoothingFilter;
use pucleus_core::spectrum::{PulseSample, PulseTrain, SpectrumSeries};

use super::CliError;
use super::report::{PeakEntry, PeakReport, render_human_summary};

#[derive(clap::Args)]
pub(super) struct InfoArgs {
    /// Spectrum file (.json or ASCII column)
    spectrum: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct SmoothArgs {
    /// Input spectrum file
    input: PathBuf,

    /// Output spectrum file
    output: PathBuf,

    /// Smoothing method
    #[arg(long, value_enum, default_value_t = SmoothMethod::MovingAverage)]
    method: SmoothMethod,

    /// Window width in channels (moving-average, barycenter); odd
    #[arg(long, default_value_t = 5)]
    width: usize,

    /// Stencil half-width in points (poly-lsq)
    #[arg(long, default_value_t = 2)]
    half_width: usize,

    /// Channels between stencil points (poly-lsq)
    #[arg(long, default_value_t = 1)]
    step: usize,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SmoothMethod {
    MovingAverage,
    Barycenter,
    PolyLsq,
}

#[derive(clap::Args)]
pub(super) struct PeaksArgs {
    /// Spectrum file
    spectrum: PathBuf,

    /// Search algorithm
    #[arg(long, value_enum, default_value_t = Algorithm::SimpleCompare)]
    algorithm: Algorithm,

    /// Channel range to scan, as `start:end`
    #[arg(long)]
    range: Option<String>,

    /// Sensitivity in noise standard deviations (simple-compare)
    #[arg(long, default_value_t = 1.0)]
    k: f64,

    /// Minimum peak half-width in channels (simple-compare)
    #[arg(long, default_value_t = 1)]
    m: usize,

    /// Derivative order 1-3 (derivative)
    #[arg(long, default_value_t = 2)]
    level: usize,

    /// Stencil width in channels, odd (derivative)
    #[arg(long, default_value_t = 5)]
    dots: usize,

    /// Calibration point as `channel=energy`; repeatable
    #[arg(long = "calibrate", value_name = "CH=ENERGY")]
    calibrate: Vec<String>,

    /// Nuclide library file; repeatable
    #[arg(long = "library", value_name = "FILE")]
    library: Vec<PathBuf>,

    /// Emit the report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Algorithm {
    SimpleCompare,
    Derivative,
}

#[derive(clap::Args)]
pub(super) struct HistogramArgs {
    /// Pulse-train file: one `amplitude[,time]` row per line
    pulses: PathBuf,

    /// Output spectrum file
    output: PathBuf,

    /// Number of histogram channels
    #[arg(long)]
    channels: usize,
}

pub(super) fn run_info_command(args: InfoArgs) -> Result<i32, CliError> {
    let series = io::read_spectrum(&args.spectrum).map_err(PucleusError::from)?;

    println!("{}", args.spectrum.display());
    println!("  channels:     {}", series.channels());
    println!("  total counts: {}", series.sum());
    println!("  max count:    {}", series.max());
    println!("  mean count:   {:.3}", series.mean());
    match series.total_time() {
        Some(time) => println!("  live time:    {time} s"),
        None => println!("  live time:    unknown"),
    }
    if let Some(rate) = series.count_rate() {
        println!("  count rate:   {rate:.3} /s");
    }
    match series.energy_scale() {
        Some(scale) => println!(
            "  energy axis:  E = {} * ch + {}",
            scale.slope, scale.intercept
        ),
        None => println!("  energy axis:  uncalibrated"),
    }
    println!(
        "  density:      {}",
        if series.probability_density().is_ok() {
            "available"
        } else {
            "unavailable (zero total)"
        }
    );
    Ok(0)
}

pub(super) fn run_smooth_command(args: SmoothArgs) -> Result<i32, CliError> {
    let filter = match args.method {
        SmoothMethod::MovingAverage => SmoothingFilter::MovingAverage { width: args.width },
        SmoothMethod::Barycenter => SmoothingFilter::Barycenter { width: args.width },
        SmoothMethod::PolyLsq => SmoothingFilter::PolyLeastSquares {
            half_width: args.half_width,
            step: args.step,
        },
    };

    let series = io::read_spectrum(&args.input).map_err(PucleusError::from)?;
    let smoothed = filter.apply(&series).map_err(PucleusError::from)?;
    io::write_spectrum(&args.output, &smoothed).map_err(PucleusError::from)?;

    println!("Applied {} -> {}", filter.label(), args.output.display());
    Ok(0)
}

pub(super) fn run_peaks_command(args: PeaksArgs) -> Result<i32, CliError> {
    let series = io::read_spectrum(&args.spectrum).map_err(PucleusError::from)?;
    let range = parse_scan_range(args.range.as_deref())?;

    let calibration = build_calibration(&series, &args.calibrate)?;

    let (algorithm_label, peaks) = match args.algorithm {
        Algorithm::SimpleCompare => {
            let search = SimpleCompare::new(args.k, args.m);
            let peaks = search.search(&series, range).map_err(PucleusError::from)?;
            (format!("simple-compare k={} m={}", args.k, args.m), peaks)
        }
        Algorithm::Derivative => {
            let search = Derivative::new(args.level, args.dots);
            let peaks = search.search(&series, range).map_err(PucleusError::from)?;
            (
                format!("derivative level={} dots={}", args.level, args.dots),
                peaks,
            )
        }
    };

    let report = build_report(&args, algorithm_label, &series, &peaks, &calibration)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&report)
            .context("peak report serialization failed")?;
        println!("{rendered}");
    } else {
        println!("{}", render_human_summary(&report));
    }
    Ok(0)
}

pub(super) fn run_histogram_command(args: HistogramArgs) -> Result<i32, CliError> {
    let train = read_pulse_train(&args.pulses)?;
    let series = train
        .bin_into(args.channels)
        .map_err(|error| PucleusError::input_validation("PULSES.BIN", error.to_string()))?;
    io::write_spectrum(&args.output, &series).map_err(PucleusError::from)?;

    println!(
        "Binned {} pulses into {} channels -> {}",
        train.len(),
        series.channels(),
        args.output.display()
    );
    Ok(0)
}

fn parse_scan_range(range: Option<&str>) -> Result<ScanRange, CliError> {
    let Some(range) = range else {
        return Ok(ScanRange::full());
    };
    let parts: Vec<&str> = range.split(':').collect();
    if let [start, end] = parts[..]
        && let (Ok(start), Ok(end)) = (start.trim().parse(), end.trim().parse())
    {
        return Ok(ScanRange::new(start, end));
    }
    Err(CliError::Usage(format!(
        "Invalid --range '{range}'; expected 'start:end' with channel numbers."
    )))
}

fn build_calibration(
    series: &SpectrumSeries,
    pairs: &[String],
) -> Result<EnergyCalibration, CliError> {
    let mut calibration = EnergyCalibration::new();
    if pairs.is_empty() {
        if let Some(scale) = series.energy_scale() {
            let last = series.channels().saturating_sub(1) as u32;
            calibration.adopt_scale(scale, last);
        }
        return Ok(calibration);
    }
    for pair in pairs {
        let (channel, energy) = pair
            .split_once('=')
            .and_then(|(channel, energy)| {
                let channel = channel.trim().parse::<u32>().ok()?;
                let energy = energy.trim().parse::<f64>().ok()?;
                Some((channel, energy))
            })
            .ok_or_else(|| {
                CliError::Usage(format!(
                    "Invalid --calibrate '{pair}'; expected 'channel=energy'."
                ))
            })?;
        calibration
            .add_point(channel, energy)
            .map_err(PucleusError::from)?;
    }
    Ok(calibration)
}

fn build_report(
    args: &PeaksArgs,
    algorithm: String,
    series: &SpectrumSeries,
    peaks: &PeakSet<'_>,
    calibration: &EnergyCalibration,
) -> Result<PeakReport, CliError> {
    let mut libraries = LibrarySet::new();
    for path in &args.library {
        let library =
            NuclideLibrary::load(&library_name(path), path).map_err(PucleusError::from)?;
        tracing::info!("loaded {}", library.summary());
        libraries.add(library).map_err(PucleusError::from)?;
    }

    let energies: Vec<Option<f64>> = peaks
        .iter()
        .map(|peak| calibration.channel_to_energy(peak.position()))
        .collect();

    // Matching needs an energy axis; the tolerance adapts to how tightly
    // the found peaks are spaced.
    let mut tolerance = None;
    if !libraries.is_empty() && calibration.is_calibrated() {
        let known: Vec<f64> = energies.iter().filter_map(|energy| *energy).collect();
        let adapted = tolerance_from_peak_energies(&known);
        libraries.set_tolerance(adapted).map_err(PucleusError::from)?;
        tolerance = Some(adapted);
    }

    let entries = peaks
        .iter()
        .zip(&energies)
        .map(|(peak, energy)| {
            let matches = match energy {
                Some(energy) if !libraries.is_empty() => libraries
                    .match_energy(*energy)
                    .into_iter()
                    .map(|(library, nuclide)| format!("{library}:{nuclide}"))
                    .collect(),
                _ => Vec::new(),
            };
            PeakEntry {
                position: peak.position(),
                left_edge: peak.left_edge(),
                right_edge: peak.right_edge(),
                height: peak.height(),
                raw_area: peak.raw_area(),
                net_area: peak.net_area(),
                energy: *energy,
                matches,
            }
        })
        .collect();

    Ok(PeakReport {
        spectrum: args.spectrum.display().to_string(),
        algorithm,
        channels: series.channels(),
        calibrated: calibration.is_calibrated(),
        match_tolerance: tolerance,
        peaks: entries,
    })
}

fn library_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_pulse_train(path: &Path) -> Result<PulseTrain, CliError> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read pulse file `{}`", path.display()))?;

    let mut samples = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (amplitude_field, time_field) = match line.split_once(',') {
            Some((amplitude, time)) => (amplitude.trim(), Some(time.trim())),
            None => (line, None),
        };
        let amplitude: f64 = amplitude_field.parse().map_err(|_| {
            PucleusError::input_validation(
                "PULSES.FORMAT",
                format!("line {}: `{line}` is not a pulse row", index + 1),
            )
        })?;
        let arrival_time = match time_field {
            None => None,
            Some(field) => Some(field.parse::<f64>().map_err(|_| {
                PucleusError::input_validation(
                    "PULSES.FORMAT",
                    format!("line {}: `{field}` is not an arrival time", index + 1),
                )
            })?),
        };
        samples.push(PulseSample {
            amplitude,
            arrival_time,
        });
    }

    PulseTrain::new(samples)
        .map_err(|error| PucleusError::input_validation("PULSES.TRAIN", error.to_string()).into())
}
