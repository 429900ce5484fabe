//! Command-line interface
//!
//! The whole surface is one optional positional argument: the working
//! directory the agents operate in. Everything else happens in the
//! interactive loop.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "splain",
    about = "Code explainer agents - your AI team for understanding code",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/splain/logs/splain.log"
)]
pub struct Cli {
    /// Working directory the agents operate in (defaults to the current
    /// directory). Supports ~ and env-var expansion.
    pub working_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_means_no_working_dir() {
        let cli = Cli::parse_from(["splain"]);
        assert!(cli.working_dir.is_none());
    }

    #[test]
    fn test_positional_working_dir() {
        let cli = Cli::parse_from(["splain", "/tmp/project"]);
        assert_eq!(cli.working_dir, Some(PathBuf::from("/tmp/project")));
    }
}
