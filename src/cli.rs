//! Command-line surface assembly
//!
//! The top-level command carries the process-wide options (thread count,
//! output format and mode, request timeout); every resource subtree is
//! generated from its flag catalog by the registration helpers in
//! `commands`. The builder API is used throughout because the verb trees are
//! data-driven — the catalogs, not hand-written structs, decide which flags
//! exist.
//!
//! Hierarchy: `gwadm <resource> <verb> [--flag value ...]`, with `batch` and
//! (where the catalog marks flags recursive) `recursive` nested under each
//! verb.

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::commands;
use crate::error::{Error, Result};
use crate::output::{Format, OutputConfig};

/// Process-wide options parsed from the top-level matches
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    /// Requested worker count; clamped against the configured ceiling later
    pub threads: Option<usize>,
    pub output: OutputConfig,
    /// HTTP request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Builds the full command tree
pub fn build_cli() -> Command {
    Command::new("gwadm")
        .about("Batch-capable driver for the Google Workspace admin REST surface")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("n")
                .global(true)
                .help("Number of concurrent workers for batch and recursive operations"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("json|yaml")
                .global(true)
                .help("Output serialization format"),
        )
        .arg(
            Arg::new("streamOutput")
                .long("streamOutput")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit one result record per line as results arrive"),
        )
        .arg(
            Arg::new("compressOutput")
                .long("compressOutput")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Compact JSON instead of indented"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("ms")
                .global(true)
                .help("HTTP request timeout in milliseconds"),
        )
        .subcommands(commands::resource_commands())
}

/// Extracts the global options from parsed matches
pub fn global_opts(matches: &ArgMatches) -> Result<GlobalOpts> {
    let threads = match matches.get_one::<String>("threads") {
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
            Error::InvalidInvocation(format!("--threads {:?} is not a number", raw))
        })?),
        None => None,
    };

    let format = match matches.get_one::<String>("format") {
        Some(raw) => Format::parse(raw).ok_or_else(|| {
            Error::InvalidInvocation(format!("--format must be json or yaml, got {:?}", raw))
        })?,
        None => Format::Json,
    };

    let timeout_ms = match matches.get_one::<String>("timeout-ms") {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            Error::InvalidInvocation(format!("--timeout-ms {:?} is not a number", raw))
        })?,
        None => 30_000,
    };

    Ok(GlobalOpts {
        threads,
        output: OutputConfig {
            format,
            compress: matches.get_flag("compressOutput"),
            stream: matches.get_flag("streamOutput"),
        },
        timeout_ms,
    })
}
