use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use deconfuser::deobfuscation::{DeobfuscationEngine, DeobfuscationResult, EngineConfig, PassId};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, process_files},
    output::write_json,
};

#[derive(Debug, Serialize)]
struct DeobfuscationReport {
    file: String,
    output: String,
    templates: Vec<String>,
    passes_run: usize,
    time_ms: u128,
    stats: StatsReport,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    strings_decoded: usize,
    literals_inlined: usize,
    calls_unwrapped: usize,
    predicates_resolved: usize,
    globals_restored: usize,
    stack_slots_resolved: usize,
    properties_inlined: usize,
    declarations_removed: usize,
    statements_removed: usize,
}

pub struct DeobfuscateOptions<'a> {
    pub output: Option<&'a Path>,
    pub suffix: &'a str,
    pub timeout_ms: Option<u64>,
    pub disable: &'a [PassId],
    pub static_only: bool,
    pub show_stats: bool,
    pub report: Option<&'a Path>,
    pub global: &'a GlobalOptions,
}

pub fn run(paths: &[PathBuf], opts: &DeobfuscateOptions) -> anyhow::Result<()> {
    let config = build_config(opts);
    let many = paths.len() > 1;
    if many {
        if let Some(out_dir) = opts.output {
            std::fs::create_dir_all(out_dir).with_context(|| {
                format!("failed to create output directory: {}", out_dir.display())
            })?;
        }
    }

    let (reports, failures) = process_files(paths, |file| {
        let mut engine = DeobfuscationEngine::new(config.clone());
        let (clean, result) = engine
            .process_file(file)
            .with_context(|| format!("deobfuscation failed: {}", file.display()))?;

        let output_path = resolve_output_path(file, opts.output, opts.suffix, many);
        std::fs::write(&output_path, clean)
            .with_context(|| format!("failed to write output: {}", output_path.display()))?;

        Ok(build_report(file, &output_path, &result))
    });

    if let Some(report_file) = opts.report {
        if many {
            write_json(&reports, report_file)?;
        } else if let Some(report) = reports.first() {
            write_json(report, report_file)?;
        }
        eprintln!("Report written to {}", report_file.display());
    }

    if opts.global.json {
        let json = if many {
            serde_json::to_string_pretty(&reports)?
        } else {
            serde_json::to_string_pretty(&reports.first())?
        };
        println!("{json}");
    } else {
        for report in &reports {
            display_report(report, opts.show_stats);
        }
        if many {
            eprintln!();
            eprintln!(
                "Processed {} files: {} succeeded, {} failed",
                reports.len() + failures,
                reports.len(),
                failures
            );
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} file(s) could not be deobfuscated");
    }
    Ok(())
}

fn build_config(opts: &DeobfuscateOptions) -> EngineConfig {
    let mut config = if opts.static_only {
        EngineConfig::static_only()
    } else {
        EngineConfig::default()
    };
    for pass in opts.disable {
        config = config.without(*pass);
    }
    if let Some(ms) = opts.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    config
}

fn resolve_output_path(input: &Path, output: Option<&Path>, suffix: &str, many: bool) -> PathBuf {
    if let Some(out) = output {
        // A directory (or several inputs) gets the suffixed file inside it
        if many || out.is_dir() {
            return out.join(suffixed_filename(input, suffix));
        }
        return out.to_path_buf();
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(suffixed_filename(input, suffix))
}

fn suffixed_filename(input: &Path, suffix: &str) -> String {
    let stem = input
        .file_stem()
        .map_or("output", |s| s.to_str().unwrap_or("output"));
    let ext = input.extension().map_or("js", |e| e.to_str().unwrap_or("js"));
    format!("{stem}{suffix}.{ext}")
}

fn build_report(input: &Path, output: &Path, result: &DeobfuscationResult) -> DeobfuscationReport {
    let derived = result.stats();
    let warnings: Vec<String> = result
        .events
        .warnings()
        .map(|ev| match ev.offset {
            Some(offset) => format!("@{offset}: {}", ev.message),
            None => ev.message.clone(),
        })
        .collect();

    DeobfuscationReport {
        file: file_display_name(input),
        output: file_display_name(output),
        templates: result.detection.present().map(|k| k.to_string()).collect(),
        passes_run: result.passes_run,
        time_ms: result.total_time.as_millis(),
        stats: StatsReport {
            strings_decoded: derived.strings_decoded,
            literals_inlined: derived.literals_inlined,
            calls_unwrapped: derived.calls_unwrapped,
            predicates_resolved: derived.predicates_resolved,
            globals_restored: derived.globals_restored,
            stack_slots_resolved: derived.stack_slots_resolved,
            properties_inlined: derived.properties_inlined,
            declarations_removed: derived.declarations_removed,
            statements_removed: derived.statements_removed,
        },
        warnings,
    }
}

fn display_report(report: &DeobfuscationReport, show_stats: bool) {
    eprintln!("Deobfuscation complete: {} -> {}", report.file, report.output);
    if report.templates.is_empty() {
        eprintln!("  Templates:   none detected");
    } else {
        eprintln!("  Templates:   {}", report.templates.join(", "));
    }

    if show_stats {
        display_stats(&report.stats);
    }

    eprintln!("  Passes:      {}", report.passes_run);
    #[allow(clippy::cast_precision_loss)]
    let time_secs = report.time_ms as f64 / 1000.0;
    eprintln!("  Time:        {time_secs:.2}s");

    if !report.warnings.is_empty() {
        eprintln!("  Warnings:    {}", report.warnings.len());
        for w in &report.warnings {
            eprintln!("    - {w}");
        }
    }
}

fn display_stats(s: &StatsReport) {
    let rows = [
        ("Strings:", s.strings_decoded, "decoded"),
        ("Literals:", s.literals_inlined, "inlined"),
        ("Wrappers:", s.calls_unwrapped, "calls unwrapped"),
        ("Predicates:", s.predicates_resolved, "resolved"),
        ("Globals:", s.globals_restored, "restored"),
        ("Stack:", s.stack_slots_resolved, "slots resolved"),
        ("Properties:", s.properties_inlined, "inlined"),
        ("Removed:", s.declarations_removed, "declarations"),
        ("Removed:", s.statements_removed, "statements"),
    ];
    for (label, count, what) in rows {
        if count > 0 {
            eprintln!("  {label:<12} {count} {what}");
        }
    }
}
