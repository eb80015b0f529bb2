//! Command-line interface definitions for the `softlayer-cpi` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::Parser;

/// Top-level CLI for the `softlayer-cpi` binary.
///
/// The director writes one JSON request to stdin; the response is written to
/// stdout. Credentials and wait limits come from `softlayer-cpi.toml` or `SL_*`
/// environment variables.
#[derive(Debug, Parser)]
#[command(
    name = "softlayer-cpi",
    about = "BOSH cloud provider interface for SoftLayer virtual guests",
    version
)]
pub(crate) struct Cli {
    /// Read agent options from this JSON file instead of the configured one.
    #[arg(long, value_name = "PATH")]
    pub(crate) agent_options: Option<Utf8PathBuf>,
}
