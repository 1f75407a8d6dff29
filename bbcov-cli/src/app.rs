use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// bbcov - inspection and offline branch coverage checking of basic-block dumps
#[derive(Debug, Parser)]
#[command(name = "bbcov", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display dump overview: version, encoding, module table, and block counts.
    Info {
        /// Path to the dump file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Also list every block record.
        #[arg(short, long)]
        blocks: bool,
    },

    /// Re-run the conditional branch coverage check over one or more dumps.
    Check {
        /// Dump files recorded with branch detail (-check_cbr).
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,

        /// Only print per-module statistics, not the individual missed edges.
        #[arg(short, long)]
        summary_only: bool,
    },
}
