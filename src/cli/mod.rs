// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::CliArgs;

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Values not given on the command line fall back to their environment
/// variables (see `--help`). If parsing fails, clap displays an error message
/// or help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
