//! Nuclide gamma-line libraries and energy matching.
//!
//! A library is a flat list of `(nuclide, energy)` gamma lines loaded from a
//! simple comma-separated text format. Matching compares a query energy
//! against every line within a symmetric tolerance; the tolerance is derived
//! from the spacing of the peaks under analysis so that crowded spectra get
//! tighter matching automatically.

use std::fmt;
use std::fs;
use std::path::Path;

/// Fallback matching tolerance in energy units when the peak set is too
/// small to derive one from spacing.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LibraryError {
    #[error("library `{name}` contains no usable gamma lines")]
    EmptyLibrary { name: String },
    #[error("library `{name}` is already loaded")]
    DuplicateLibrary { name: String },
    #[error("no library named `{name}` is loaded")]
    UnknownLibrary { name: String },
    #[error("matching tolerance must be finite and non-negative, got {value}")]
    InvalidTolerance { value: f64 },
}

/// One gamma line: the emitting nuclide and its energy, with an optional
/// relative emission intensity when the source file carries one.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaLine {
    pub nuclide: String,
    pub energy: f64,
    pub intensity: Option<f64>,
}

/// All gamma lines of one nuclide, grouped from the flat line list.
#[derive(Debug, Clone, PartialEq)]
pub struct NuclideEntry {
    pub name: String,
    pub lines: Vec<GammaLine>,
}

/// A source line the parser had to skip, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub content: String,
    pub reason: String,
}

impl fmt::Display for SkippedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line_number, self.reason, self.content)
    }
}

/// A named collection of gamma lines with a current matching tolerance.
#[derive(Debug, Clone)]
pub struct NuclideLibrary {
    name: String,
    lines: Vec<GammaLine>,
    tolerance: f64,
    skipped: Vec<SkippedLine>,
}

impl NuclideLibrary {
    pub fn from_lines(name: &str, lines: Vec<GammaLine>) -> Result<Self, LibraryError> {
        if lines.is_empty() {
            return Err(LibraryError::EmptyLibrary {
                name: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            lines,
            tolerance: DEFAULT_MATCH_TOLERANCE,
            skipped: Vec::new(),
        })
    }

    /// Parses the text form: one `nuclide,energy[,intensity]` record per
    /// line, `#` starting a comment, blank lines ignored. Records that do
    /// not parse are skipped and reported, not fatal; a file that yields no
    /// usable record at all is an error.
    pub fn parse(name: &str, text: &str) -> Result<Self, LibraryError> {
        let mut lines = Vec::new();
        let mut skipped = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_record(trimmed) {
                Ok(line) => lines.push(line),
                Err(reason) => skipped.push(SkippedLine {
                    line_number,
                    content: trimmed.to_string(),
                    reason,
                }),
            }
        }
        if lines.is_empty() {
            return Err(LibraryError::EmptyLibrary {
                name: name.to_string(),
            });
        }
        for skip in &skipped {
            tracing::warn!(library = name, %skip, "skipped unparseable library line");
        }
        let mut library = Self::from_lines(name, lines)?;
        library.skipped = skipped;
        Ok(library)
    }

    pub fn load(name: &str, path: &Path) -> Result<Self, LibraryLoadError> {
        let text = fs::read_to_string(path).map_err(|source| LibraryLoadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(name, &text)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gamma_lines(&self) -> &[GammaLine] {
        &self.lines
    }

    /// Lines grouped per nuclide, in first-appearance order.
    pub fn entries(&self) -> Vec<NuclideEntry> {
        let mut entries: Vec<NuclideEntry> = Vec::new();
        for line in &self.lines {
            match entries.iter_mut().find(|entry| entry.name == line.nuclide) {
                Some(entry) => entry.lines.push(line.clone()),
                None => entries.push(NuclideEntry {
                    name: line.nuclide.clone(),
                    lines: vec![line.clone()],
                }),
            }
        }
        entries
    }

    pub fn skipped_lines(&self) -> &[SkippedLine] {
        &self.skipped
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), LibraryError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(LibraryError::InvalidTolerance { value: tolerance });
        }
        self.tolerance = tolerance;
        Ok(())
    }

    /// Adapts the tolerance to the minimum spacing of the peak energies
    /// under analysis: half the smallest gap, so two adjacent peaks can
    /// never both claim the same line.
    pub fn set_tolerance_from_spacing(&mut self, min_gap: f64) -> Result<(), LibraryError> {
        self.set_tolerance(min_gap / 2.0)
    }

    /// Nuclide names whose gamma lines lie within the tolerance of `energy`,
    /// deduplicated, in library order. Never fails; no match is an empty
    /// list.
    pub fn match_energy(&self, energy: f64) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for line in &self.lines {
            if (line.energy - energy).abs() <= self.tolerance
                && !names.contains(&line.nuclide.as_str())
            {
                names.push(&line.nuclide);
            }
        }
        names
    }

    /// One-line description for listings: name, line count, energy span.
    pub fn summary(&self) -> String {
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for line in &self.lines {
            low = low.min(line.energy);
            high = high.max(line.energy);
        }
        format!(
            "{}: {} gamma lines, {:.1}-{:.1}",
            self.name,
            self.lines.len(),
            low,
            high
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryLoadError {
    #[error("cannot read library file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Library(#[from] LibraryError),
}

fn parse_record(record: &str) -> Result<GammaLine, String> {
    let mut fields = record.split(',').map(str::trim);
    let nuclide = fields.next().filter(|f| !f.is_empty());
    let energy_field = fields.next();
    let intensity_field = fields.next();
    if fields.next().is_some() {
        return Err("too many fields".to_string());
    }
    let nuclide = nuclide.ok_or_else(|| "missing nuclide name".to_string())?;
    let energy_field = energy_field.ok_or_else(|| "missing energy field".to_string())?;
    let energy: f64 = energy_field
        .parse()
        .map_err(|_| format!("energy `{energy_field}` is not a number"))?;
    if !energy.is_finite() || energy < 0.0 {
        return Err(format!("energy {energy} is out of range"));
    }
    let intensity = match intensity_field {
        None | Some("") => None,
        Some(field) => Some(
            field
                .parse::<f64>()
                .map_err(|_| format!("intensity `{field}` is not a number"))?,
        ),
    };
    Ok(GammaLine {
        nuclide: nuclide.to_string(),
        energy,
        intensity,
    })
}

/// The set of concurrently loaded libraries, keyed by unique name.
#[derive(Debug, Clone, Default)]
pub struct LibrarySet {
    members: Vec<NuclideLibrary>,
}

impl LibrarySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[NuclideLibrary] {
        &self.members
    }

    pub fn add(&mut self, library: NuclideLibrary) -> Result<(), LibraryError> {
        if self.members.iter().any(|m| m.name() == library.name()) {
            return Err(LibraryError::DuplicateLibrary {
                name: library.name().to_string(),
            });
        }
        self.members.push(library);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<NuclideLibrary, LibraryError> {
        let index = self
            .members
            .iter()
            .position(|m| m.name() == name)
            .ok_or_else(|| LibraryError::UnknownLibrary {
                name: name.to_string(),
            })?;
        Ok(self.members.remove(index))
    }

    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), LibraryError> {
        for member in &mut self.members {
            member.set_tolerance(tolerance)?;
        }
        Ok(())
    }

    pub fn set_tolerance_from_spacing(&mut self, min_gap: f64) -> Result<(), LibraryError> {
        for member in &mut self.members {
            member.set_tolerance_from_spacing(min_gap)?;
        }
        Ok(())
    }

    /// Matches across every loaded library; results carry the library name
    /// so identically named nuclides from different sources stay apart.
    pub fn match_energy(&self, energy: f64) -> Vec<(&str, &str)> {
        let mut matches = Vec::new();
        for member in &self.members {
            for nuclide in member.match_energy(energy) {
                matches.push((member.name(), nuclide));
            }
        }
        matches
    }
}

/// Half the smallest gap between adjacent energies, the spacing-derived
/// tolerance for a sorted-or-not list of peak energies. Falls back to the
/// default with fewer than two peaks.
pub fn tolerance_from_peak_energies(energies: &[f64]) -> f64 {
    if energies.len() < 2 {
        return DEFAULT_MATCH_TOLERANCE;
    }
    let mut sorted = energies.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut min_gap = f64::INFINITY;
    for pair in sorted.windows(2) {
        min_gap = min_gap.min(pair[1] - pair[0]);
    }
    if min_gap.is_finite() {
        min_gap / 2.0
    } else {
        DEFAULT_MATCH_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_MATCH_TOLERANCE, GammaLine, LibraryError, LibrarySet, NuclideLibrary,
        tolerance_from_peak_energies,
    };

    fn sample_library() -> NuclideLibrary {
        NuclideLibrary::parse(
            "common",
            "# common check sources\n\
             Cs-137,661.7,85.1\n\
             Co-60,1173.2\n\
             Co-60,1332.5\n\
             K-40,1460.8\n",
        )
        .expect("sample library should parse")
    }

    #[test]
    fn entries_group_lines_per_nuclide_in_first_appearance_order() {
        let entries = sample_library().entries();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "Cs-137");
        assert_eq!(entries[1].name, "Co-60");
        assert_eq!(entries[1].lines.len(), 2);
        assert_eq!(entries[1].lines[1].energy, 1332.5);
        assert_eq!(entries[2].name, "K-40");
    }

    #[test]
    fn widening_the_tolerance_never_loses_a_match() {
        let mut library = sample_library();
        library
            .set_tolerance(5.0)
            .expect("finite tolerance should be accepted");
        let narrow: Vec<String> = library
            .match_energy(1250.0)
            .into_iter()
            .map(str::to_string)
            .collect();

        library
            .set_tolerance(90.0)
            .expect("finite tolerance should be accepted");
        let wide = library.match_energy(1250.0);

        assert!(narrow.is_empty());
        assert_eq!(wide, vec!["Co-60"]);
        assert!(narrow.iter().all(|name| wide.contains(&name.as_str())));
    }

    #[test]
    fn summary_names_the_library_and_its_energy_span() {
        assert_eq!(
            sample_library().summary(),
            "common: 4 gamma lines, 661.7-1460.8"
        );
    }

    #[test]
    fn parses_records_and_skips_bad_lines() {
        let library = NuclideLibrary::parse(
            "messy",
            "Cs-137,661.7\n\
             not-a-record\n\
             ,123.0\n\
             Na-22,abc\n\
             Co-60,1332.5,99.98\n",
        )
        .expect("two good lines should survive");

        assert_eq!(library.gamma_lines().len(), 2);
        assert_eq!(library.skipped_lines().len(), 3);
        assert_eq!(library.skipped_lines()[0].line_number, 2);
        assert_eq!(
            library.gamma_lines()[1],
            GammaLine {
                nuclide: "Co-60".to_string(),
                energy: 1332.5,
                intensity: Some(99.98),
            }
        );
    }

    #[test]
    fn a_file_with_no_usable_records_is_an_error() {
        let error = NuclideLibrary::parse("empty", "# only comments\n\n")
            .expect_err("no records should fail");
        assert_eq!(
            error,
            LibraryError::EmptyLibrary {
                name: "empty".to_string()
            }
        );
    }

    #[test]
    fn matching_respects_the_tolerance() {
        let mut library = sample_library();
        library.set_tolerance(5.0).expect("tolerance");

        assert_eq!(library.match_energy(660.0), vec!["Cs-137"]);
        assert_eq!(library.match_energy(1400.0), Vec::<&str>::new());

        // Both Co-60 lines inside one wide window report the nuclide once.
        library.set_tolerance(200.0).expect("tolerance");
        assert_eq!(library.match_energy(1250.0), vec!["Co-60"]);
    }

    #[test]
    fn tighter_spacing_gives_tighter_tolerance() {
        let wide = tolerance_from_peak_energies(&[100.0, 500.0, 900.0]);
        let tight = tolerance_from_peak_energies(&[100.0, 140.0, 900.0]);
        assert!((wide - 200.0).abs() < 1.0e-12);
        assert!((tight - 20.0).abs() < 1.0e-12);
        assert!(tight < wide);

        assert_eq!(tolerance_from_peak_energies(&[661.7]), DEFAULT_MATCH_TOLERANCE);
    }

    #[test]
    fn library_set_rejects_duplicate_names() {
        let mut set = LibrarySet::new();
        set.add(sample_library()).expect("first copy");
        let error = set
            .add(sample_library())
            .expect_err("same name twice should fail");
        assert_eq!(
            error,
            LibraryError::DuplicateLibrary {
                name: "common".to_string()
            }
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn library_set_matches_across_members() {
        let mut set = LibrarySet::new();
        set.add(sample_library()).expect("library");
        set.add(
            NuclideLibrary::parse("medical", "I-131,364.5\nTc-99m,140.5\n")
                .expect("library"),
        )
        .expect("library");
        set.set_tolerance_from_spacing(10.0).expect("tolerance");

        assert_eq!(set.match_energy(141.0), vec![("medical", "Tc-99m")]);
        assert_eq!(set.match_energy(661.7), vec![("common", "Cs-137")]);
        assert!(set.match_energy(2000.0).is_empty());
    }
}
