//! Analysis engine for multichannel-analyzer (MCA) gamma-ray spectra.
//!
//! The engine is a set of synchronous, CPU-bound transforms over explicit
//! snapshots: a histogram data model ([`spectrum::SpectrumSeries`]),
//! smoothing filters, peak-search algorithms, channel-to-energy calibration,
//! and nuclide-library matching. No transform mutates its input; callers own
//! all shared state.

pub mod calibration;
pub mod domain;
pub mod io;
pub mod library;
pub mod numerics;
pub mod peaks;
pub mod smooth;
pub mod spectrum;

pub use calibration::EnergyCalibration;
pub use domain::{PucleusError, PucleusErrorCategory, PucleusResult};
pub use library::{LibrarySet, NuclideLibrary};
pub use peaks::{Peak, PeakSet, ScanRange};
pub use smooth::SmoothingFilter;
pub use spectrum::SpectrumSeries;
