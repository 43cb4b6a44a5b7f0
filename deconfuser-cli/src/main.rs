mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })?;

    let cli = Cli::parse();

    // Show deconfuser info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("deconfuser", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Detect { paths } => commands::detect::run(paths, &cli.global),
        Command::Passes => commands::passes::run(&cli.global),
        Command::Deobfuscate {
            paths,
            output,
            suffix,
            timeout_ms,
            disable,
            static_only,
            stats,
            report,
        } => commands::deobfuscate::run(
            paths,
            &commands::deobfuscate::DeobfuscateOptions {
                output: output.as_deref(),
                suffix,
                timeout_ms: *timeout_ms,
                disable,
                static_only: *static_only,
                show_stats: *stats,
                report: report.as_deref(),
                global: &cli.global,
            },
        ),
    }
}
