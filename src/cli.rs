use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// SAML metadata connection provisioner
#[derive(Parser, Debug)]
#[command(
    name = "metaprov",
    version,
    about = "Provision SAML 2.0 metadata entities as federation server connections",
    long_about = "Reads a SAML 2.0 metadata document, verifies its signature, adds the \
                  connection settings the federation server expects to every entity and \
                  saves (or deletes) one connection per IDP and SP role through the \
                  connection management web service.",
    after_help = "\
EXAMPLES:
  metaprov create                          Provision using ./metaprov.toml
  metaprov create --dry-run                Print connection documents, call nothing
  metaprov delete --config prod.toml       Remove every connection of the document
  metaprov create --no-verify -q           Skip signature verification, warnings only
  metaprov create --json > report.json     Machine-readable run report

CONFIGURATION:
  --config PATH, else ./metaprov.toml, else ~/.metaprov.toml

EXIT CODES:
  0  Run completed
  1  Signature verification failed or the federation server refused a call
  2  Tool failure (e.g., unreadable settings, malformed metadata)"
)]
pub struct Cli {
    /// What to do with the entities of the document
    #[arg(value_enum)]
    pub mode: Mode,

    /// Settings file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Metadata URL or path, overriding the settings file
    #[arg(long, value_name = "SOURCE")]
    pub metadata: Option<String>,

    /// PEM certificate to verify the metadata signature with, overriding the settings file
    #[arg(long, value_name = "PEM", conflicts_with = "no_verify")]
    pub certificate: Option<PathBuf>,

    /// Do not verify the metadata signature (it is still removed)
    #[arg(long)]
    pub no_verify: bool,

    /// Print connection documents instead of calling the federation server
    #[arg(long)]
    pub dry_run: bool,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Save a connection per role
    Create,
    /// Delete the connection of every role
    Delete,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Create => write!(f, "create"),
            Mode::Delete => write!(f, "delete"),
        }
    }
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_and_flags() {
        let cli = Cli::try_parse_from(["metaprov", "delete", "--dry-run", "-v"]).unwrap();
        assert_eq!(cli.mode, Mode::Delete);
        assert!(cli.dry_run);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["metaprov", "update"]).is_err());
        assert!(Cli::try_parse_from(["metaprov"]).is_err());
    }

    #[test]
    fn certificate_conflicts_with_no_verify() {
        assert!(
            Cli::try_parse_from(["metaprov", "create", "--certificate", "a.pem", "--no-verify"])
                .is_err()
        );
    }
}
