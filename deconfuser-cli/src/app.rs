use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deconfuser::deobfuscation::PassId;

/// deconfuser - structural deobfuscation of js-confuser output
#[derive(Debug, Parser)]
#[command(name = "deconfuser", version, about, long_about = None)]
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
    /// Deobfuscate one or more scripts.
    Deobfuscate {
        /// Scripts to process. Several files are processed in parallel.
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,

        /// Output file, or directory when several files are given.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Output filename suffix (default: "_deobfuscated").
        #[arg(long, default_value = "_deobfuscated")]
        suffix: String,

        /// Wall-clock limit of each sandbox evaluation, in milliseconds.
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Skip a pass (repeatable), e.g. --disable opaque-predicates.
        #[arg(long, value_name = "PASS")]
        disable: Vec<PassId>,

        /// Never execute input code: disable every pass that needs the sandbox.
        #[arg(long)]
        static_only: bool,

        /// Show what each file's run changed.
        #[arg(long)]
        stats: bool,

        /// Write a JSON report.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Report which templates a script contains without modifying it.
    Detect {
        /// Scripts to inspect.
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,
    },

    /// List the pipeline passes in the order they run.
    Passes,
}
