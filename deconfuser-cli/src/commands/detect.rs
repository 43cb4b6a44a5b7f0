use std::path::{Path, PathBuf};

use anyhow::Context;
use deconfuser::deobfuscation::{DeobfuscationEngine, DetectionEvidence, EngineConfig};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, process_files},
    output::{confidence_label, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct EvidenceInfo {
    evidence_type: &'static str,
    description: String,
    confidence: usize,
}

#[derive(Debug, Serialize)]
struct TemplateInfo {
    template: String,
    score: usize,
    present: bool,
    evidence: Vec<EvidenceInfo>,
}

#[derive(Debug, Serialize)]
struct DetectionInfo {
    file: String,
    detected: bool,
    threshold: usize,
    templates: Vec<TemplateInfo>,
}

pub fn run(paths: &[PathBuf], opts: &GlobalOptions) -> anyhow::Result<()> {
    let (results, failures) = process_files(paths, detect_file);

    print_output(&results, opts, |results| {
        for info in results {
            display_detection(info);
        }
        if results.len() + failures > 1 {
            let detected = results.iter().filter(|r| r.detected).count();
            println!(
                "Scanned {} files, {} with templates detected, {} failed",
                results.len() + failures,
                detected,
                failures
            );
        }
    })?;

    if failures > 0 && results.is_empty() {
        anyhow::bail!("no file could be inspected");
    }
    Ok(())
}

fn detect_file(path: &Path) -> anyhow::Result<DetectionInfo> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let engine = DeobfuscationEngine::new(EngineConfig::default());
    let report = engine
        .detect(&source)
        .with_context(|| format!("detection failed: {}", path.display()))?;

    let templates = report
        .all()
        .iter()
        .map(|(kind, score)| TemplateInfo {
            template: kind.to_string(),
            score: score.score(),
            present: score.meets_threshold(report.threshold()),
            evidence: score
                .evidence()
                .map(|ev| EvidenceInfo {
                    evidence_type: evidence_type_name(ev),
                    description: match ev {
                        DetectionEvidence::Template { description, .. } => description.clone(),
                        _ => ev.short_description(),
                    },
                    confidence: ev.confidence(),
                })
                .collect(),
        })
        .collect();

    Ok(DetectionInfo {
        file: file_display_name(path),
        detected: report.detected(),
        threshold: report.threshold(),
        templates,
    })
}

fn display_detection(info: &DetectionInfo) {
    if info.templates.is_empty() {
        println!("{}: no js-confuser template found", info.file);
        return;
    }
    if info.detected {
        println!("{}: js-confuser templates detected", info.file);
    } else {
        println!(
            "{}: only below-threshold evidence (threshold {})",
            info.file, info.threshold
        );
    }

    let mut table = TabWriter::new(&[
        ("TEMPLATE", Align::Left),
        ("SCORE", Align::Right),
        ("CONFIDENCE", Align::Left),
        ("PRESENT", Align::Left),
    ])
    .indent("  ");
    for t in &info.templates {
        table.row(vec![
            t.template.clone(),
            t.score.to_string(),
            confidence_label(t.score).to_string(),
            if t.present { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.print();

    for t in &info.templates {
        for ev in &t.evidence {
            log::debug!("{}: {} (confidence: {})", t.template, ev.description, ev.confidence);
        }
    }
}

fn evidence_type_name(ev: &DetectionEvidence) -> &'static str {
    match ev {
        DetectionEvidence::Template { .. } => "Template",
        DetectionEvidence::Repeated { .. } => "Repeated",
        DetectionEvidence::Helper { .. } => "Helper",
    }
}
