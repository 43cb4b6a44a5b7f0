//! Template detection.
//!
//! The [`TemplateDetector`] runs every matcher of [`crate::deobfuscation::templates`] over a
//! tree and scores what they find. Detection never edits the tree; the matchers are the same
//! ones the passes use, so a template the report lists is one the pipeline will attempt.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    analysis::BindingIndex,
    deobfuscation::{
        detection::{DetectionEvidence, DetectionReport, DetectionScore},
        events::{EventKind, EventLog},
        templates::{
            anti_tooling, duplicate_literal, flattening_object, function_length,
            global_concealing, minified_arrow, opaque_predicate, placeholder, stack,
            string_compression, string_concealing, TemplateKind, TemplateMatch,
        },
    },
    syntax::SourceTree,
};

/// Confidence of a function-length helper, which only accompanies the stack template.
const HELPER_CONFIDENCE: usize = 20;

/// Scores which templates a script contains.
///
/// # Example
///
/// ```rust,ignore
/// use deconfuser::deobfuscation::TemplateDetector;
///
/// let detector = TemplateDetector::new(50);
/// let report = detector.detect(&tree, &events);
/// for kind in report.present() {
///     println!("{kind}");
/// }
/// ```
pub struct TemplateDetector {
    threshold: usize,
}

impl Default for TemplateDetector {
    fn default() -> Self {
        Self::new(50)
    }
}

impl TemplateDetector {
    /// Creates a detector.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum score for a template to count as present (typically 0-100).
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Returns the detection threshold.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Sets the detection threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum score for positive detection.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    /// Runs every matcher over `tree`.
    ///
    /// Each match is recorded on `events` as [`EventKind::TemplateMatched`], followed by one
    /// [`EventKind::DetectionComplete`] carrying the report summary.
    ///
    /// # Arguments
    ///
    /// * `tree` - The script to inspect; not modified.
    /// * `events` - Log receiving the detection events.
    ///
    /// # Returns
    ///
    /// A [`DetectionReport`] with a score for every template that left evidence.
    pub fn detect(&self, tree: &SourceTree, events: &EventLog) -> DetectionReport {
        let bindings = BindingIndex::crawl(&tree.script);
        let mut matches: Vec<Box<dyn TemplateMatch>> = Vec::new();

        let arrows = minified_arrow::find(tree, &bindings);
        let wrapper = arrows.first().map(|m| m.wrapper.clone());
        let helpers = function_length::find(tree, &bindings, wrapper.as_ref());

        collect(&mut matches, anti_tooling::find(tree, &bindings));
        collect(&mut matches, arrows);
        collect(&mut matches, duplicate_literal::find(tree, &bindings));
        collect(&mut matches, stack::find(tree));
        collect(&mut matches, string_compression::find(tree, &bindings));
        collect(&mut matches, string_concealing::find(tree, &bindings));
        collect(&mut matches, placeholder::find(tree, &bindings));
        collect(&mut matches, opaque_predicate::find(tree, &bindings));
        collect(&mut matches, global_concealing::find(tree, &bindings));
        collect(&mut matches, flattening_object::find(tree, &bindings));

        let mut by_kind: BTreeMap<TemplateKind, Vec<&dyn TemplateMatch>> = BTreeMap::new();
        for found in &matches {
            events
                .record(EventKind::TemplateMatched)
                .at(found.site().offset())
                .pass("detection")
                .message(found.describe());
            by_kind.entry(found.kind()).or_default().push(found.as_ref());
        }

        let mut scores: BTreeMap<TemplateKind, DetectionScore> = BTreeMap::new();
        for (kind, found) in by_kind {
            score_matches(scores.entry(kind).or_default(), kind, &found);
        }
        for helper in &helpers {
            events
                .record(EventKind::TemplateMatched)
                .at(helper.site().offset())
                .pass("detection")
                .message(helper.describe());
            scores
                .entry(helper.kind())
                .or_default()
                .add(DetectionEvidence::Helper {
                    kind: helper.kind(),
                    name: helper.helper.0.to_string(),
                    confidence: HELPER_CONFIDENCE,
                });
        }

        let report = DetectionReport::new(scores.into_iter().collect(), self.threshold);
        debug!("detection: {report}");
        events
            .record(EventKind::DetectionComplete)
            .pass("detection")
            .message(report.summary());
        report
    }
}

fn collect<M: TemplateMatch + 'static>(into: &mut Vec<Box<dyn TemplateMatch>>, found: Vec<M>) {
    into.extend(
        found
            .into_iter()
            .map(|m| Box::new(m) as Box<dyn TemplateMatch>),
    );
}

/// Distinctive templates score every instance; templates whose shape also occurs in ordinary
/// code score their instances together, capped.
fn score_matches(score: &mut DetectionScore, kind: TemplateKind, found: &[&dyn TemplateMatch]) {
    let confidence = kind.confidence();
    match found {
        [single] => score.add(DetectionEvidence::Template {
            kind,
            offset: single.site().offset(),
            description: single.describe(),
            confidence,
        }),
        many if confidence < 50 => {
            score.add(DetectionEvidence::Repeated {
                kind,
                count: many.len(),
                confidence_per_match: confidence,
            });
        }
        many => {
            for found in many {
                score.add(DetectionEvidence::Template {
                    kind,
                    offset: found.site().offset(),
                    description: found.describe(),
                    confidence,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateDetector;
    use crate::{
        deobfuscation::{
            templates::{string_compression, TemplateKind},
            EventKind, EventLog,
        },
        syntax::{with_globals, SourceTree},
        Result,
    };

    #[test]
    fn test_detects_string_compression() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(string_compression::tests::SOURCE)?;
            let events = EventLog::new();
            let report = TemplateDetector::new(50).detect(&tree, &events);
            assert!(report.detected());
            assert!(report.has(TemplateKind::StringCompression));
            assert!(events.count_kind(EventKind::TemplateMatched) >= 1);
            assert_eq!(events.count_kind(EventKind::DetectionComplete), 1);
            Ok(())
        })
    }

    #[test]
    fn test_plain_script_detects_nothing() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("function add(a, b) { return a + b; } log(add(1, 2));")?;
            let report = TemplateDetector::default().detect(&tree, &EventLog::new());
            assert!(!report.detected());
            assert!(report.all().is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_weak_templates_are_capped() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "var a = 'x'; use(a); a = 'y'; var b = 'z'; use(b); b = 'w'; \
                 var c = 1; use(c); c = 2;",
            )?;
            let report = TemplateDetector::new(50).detect(&tree, &EventLog::new());
            assert_eq!(report.score(TemplateKind::Placeholder), 30);
            assert!(!report.has(TemplateKind::Placeholder));
            Ok(())
        })
    }
}
