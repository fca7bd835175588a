mod commands;
mod report;

use clap::Parser;
use pucleus_core::domain::PucleusError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_pucleus_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "pucleus", about = "MCA gamma-ray spectrum analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Summarize a spectrum file
    Info(commands::InfoArgs),
    /// Apply a smoothing filter and write the result
    Smooth(commands::SmoothArgs),
    /// Search a spectrum for peaks, optionally calibrating and matching
    Peaks(commands::PeaksArgs),
    /// Bin a pulse-train file into a spectrum histogram
    Histogram(commands::HistogramArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Info(args) => commands::run_info_command(args),
        CliCommand::Smooth(args) => commands::run_smooth_command(args),
        CliCommand::Peaks(args) => commands::run_peaks_command(args),
        CliCommand::Histogram(args) => commands::run_histogram_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(PucleusError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<PucleusError> for CliError {
    fn from(error: PucleusError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_pucleus_error(&self) -> PucleusError {
        match self {
            Self::Usage(message) => {
                PucleusError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => PucleusError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
