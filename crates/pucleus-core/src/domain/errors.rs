use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PucleusResult<T> = Result<T, PucleusError>;

/// Error taxonomy shared by the engine and the CLI boundary.
///
/// Configuration errors are rejected before any scan runs; data errors are
/// reported per offending item; I/O failures carry path context. Degenerate
/// analysis states (uncalibrated energy axis, zero-sum distribution) are not
/// errors at this level at all; they surface as `Option`/explicit results in
/// the modules that produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PucleusErrorCategory {
    Success,
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl PucleusErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PucleusError {
    category: PucleusErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl PucleusError {
    pub fn new(
        category: PucleusErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            PucleusErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(PucleusErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(PucleusErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(PucleusErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> PucleusErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for PucleusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.label(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for PucleusError {}

impl From<crate::spectrum::SpectrumError> for PucleusError {
    fn from(source: crate::spectrum::SpectrumError) -> Self {
        Self::input_validation("SPECTRUM.INVALID", source.to_string())
    }
}

impl From<crate::smooth::SmoothError> for PucleusError {
    fn from(source: crate::smooth::SmoothError) -> Self {
        Self::input_validation("SMOOTH.PARAMETER", source.to_string())
    }
}

impl From<crate::peaks::PeakSearchError> for PucleusError {
    fn from(source: crate::peaks::PeakSearchError) -> Self {
        Self::input_validation("PEAKS.PARAMETER", source.to_string())
    }
}

impl From<crate::calibration::CalibrationError> for PucleusError {
    fn from(source: crate::calibration::CalibrationError) -> Self {
        Self::input_validation("CALIBRATION.POINT", source.to_string())
    }
}

impl From<crate::library::LibraryError> for PucleusError {
    fn from(source: crate::library::LibraryError) -> Self {
        Self::input_validation("LIBRARY.SOURCE", source.to_string())
    }
}

impl From<crate::library::LibraryLoadError> for PucleusError {
    fn from(source: crate::library::LibraryLoadError) -> Self {
        match source {
            crate::library::LibraryLoadError::Read { .. } => {
                Self::io_system("LIBRARY.FILE", source.to_string())
            }
            crate::library::LibraryLoadError::Library(inner) => inner.into(),
        }
    }
}

impl From<crate::io::SpectrumIoError> for PucleusError {
    fn from(source: crate::io::SpectrumIoError) -> Self {
        Self::io_system("IO.SPECTRUM", source.to_string())
    }
}

impl From<crate::numerics::LsqError> for PucleusError {
    fn from(source: crate::numerics::LsqError) -> Self {
        Self::computation("NUMERICS.LSQ", source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{PucleusError, PucleusErrorCategory};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (PucleusErrorCategory::Success, 0, "Success"),
            (
                PucleusErrorCategory::InputValidationError,
                2,
                "InputValidationError",
            ),
            (PucleusErrorCategory::IoSystemError, 3, "IoSystemError"),
            (PucleusErrorCategory::ComputationError, 4, "ComputationError"),
            (PucleusErrorCategory::InternalError, 5, "InternalError"),
        ];

        for (category, exit_code, label) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.label(), label);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = PucleusError::input_validation(
            "SMOOTH.PARAMETER",
            "moving-average width must be odd, got 4",
        );

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [SMOOTH.PARAMETER] moving-average width must be odd, got 4"
        );
        assert_eq!(
            error.fatal_exit_line().as_deref(),
            Some("FATAL EXIT CODE: 2")
        );
    }
}
