//! Detection scoring and evidence types for template identification.
//!
//! This module provides types for scoring how confidently each obfuscation template is present
//! in a script and tracking what evidence contributed to the score.

use std::fmt;

use strum::IntoEnumIterator;

use crate::deobfuscation::templates::TemplateKind;

/// Confidence score for template detection.
///
/// Scores are on a 0-100+ scale:
/// - 0-20: Very low confidence (shape also common in hand-written code)
/// - 21-50: Low confidence (a single weak instance)
/// - 51-75: Medium confidence (a distinctive instance or several weak ones)
/// - 76-100+: High confidence (several distinctive instances)
#[derive(Debug, Clone, Default)]
pub struct DetectionScore {
    /// Primary score (0-100+, higher = more confident).
    score: usize,
    /// Evidence that contributed to this score.
    evidence: Vec<DetectionEvidence>,
}

impl DetectionScore {
    /// Creates a new empty detection score with zero confidence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total confidence score.
    #[must_use]
    pub fn score(&self) -> usize {
        self.score
    }

    /// Returns an iterator over all evidence that contributed to this score.
    pub fn evidence(&self) -> impl Iterator<Item = &DetectionEvidence> {
        self.evidence.iter()
    }

    /// Adds evidence and increases the score by the evidence's confidence value.
    pub fn add(&mut self, evidence: DetectionEvidence) {
        self.score += evidence.confidence();
        self.evidence.push(evidence);
    }

    /// Checks if the score meets or exceeds a threshold.
    #[must_use]
    pub fn meets_threshold(&self, threshold: usize) -> bool {
        self.score >= threshold
    }

    /// Comma-separated short descriptions of the evidence, or "no evidence".
    #[must_use]
    pub fn evidence_summary(&self) -> String {
        if self.evidence.is_empty() {
            return "no evidence".to_string();
        }

        self.evidence()
            .map(DetectionEvidence::short_description)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DetectionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "score={} ({})", self.score, self.evidence_summary())
    }
}

/// Evidence that contributed to template detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvidence {
    /// A matcher recognised one instance of a template.
    Template {
        /// The template matched.
        kind: TemplateKind,
        /// Byte offset of the construct in the source.
        offset: u32,
        /// What the matcher found.
        description: String,
        /// Confidence contribution.
        confidence: usize,
    },

    /// A template recognised many times, scored as one item.
    Repeated {
        /// The template matched.
        kind: TemplateKind,
        /// Number of instances.
        count: usize,
        /// Confidence contribution of each instance.
        confidence_per_match: usize,
    },

    /// A helper that only ever accompanies a template (the function-length helper of the stack
    /// template, for instance).
    Helper {
        /// The template the helper belongs to.
        kind: TemplateKind,
        /// Name of the helper binding.
        name: String,
        /// Confidence contribution.
        confidence: usize,
    },
}

impl DetectionEvidence {
    /// Returns the confidence contribution of this evidence.
    ///
    /// For `Repeated`, the confidence is `count * confidence_per_match`, capped at 50.
    #[must_use]
    pub fn confidence(&self) -> usize {
        match self {
            Self::Repeated {
                count,
                confidence_per_match,
                ..
            } => (*count * confidence_per_match).min(50),
            Self::Template { confidence, .. } | Self::Helper { confidence, .. } => *confidence,
        }
    }

    /// The template this evidence is for.
    #[must_use]
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::Template { kind, .. } | Self::Repeated { kind, .. } | Self::Helper { kind, .. } => {
                *kind
            }
        }
    }

    /// Generates a short description suitable for summaries.
    ///
    /// # Returns
    ///
    /// A compact string describing this evidence (e.g., "stack@120", "helper:defineLength").
    #[must_use]
    pub fn short_description(&self) -> String {
        match self {
            Self::Template { kind, offset, .. } => format!("{kind}@{offset}"),
            Self::Repeated { kind, count, .. } => format!("{kind}x{count}"),
            Self::Helper { name, .. } => format!("helper:{name}"),
        }
    }
}

/// Result of running template detection over a script.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Every template with a non-zero score, sorted by score descending.
    scores: Vec<(TemplateKind, DetectionScore)>,

    /// The detection threshold that was used.
    threshold: usize,
}

impl DetectionReport {
    /// Creates an empty report with the specified threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - The minimum score required for a template to count as present.
    #[must_use]
    pub fn empty(threshold: usize) -> Self {
        Self {
            scores: Vec::new(),
            threshold,
        }
    }

    /// Creates a report from per-template scores.
    ///
    /// Templates without evidence are dropped; the rest are ordered by score descending, ties
    /// in pipeline order.
    ///
    /// # Arguments
    ///
    /// * `scores` - Scores by template.
    /// * `threshold` - The detection threshold that was used.
    #[must_use]
    pub fn new(scores: Vec<(TemplateKind, DetectionScore)>, threshold: usize) -> Self {
        let mut scores: Vec<_> = scores
            .into_iter()
            .filter(|(_, score)| score.score() > 0 || !score.evidence.is_empty())
            .collect();
        scores.sort_by(|(ka, a), (kb, b)| b.score().cmp(&a.score()).then(ka.cmp(kb)));
        Self { scores, threshold }
    }

    /// True if any template meets the threshold.
    #[must_use]
    pub fn detected(&self) -> bool {
        self.scores
            .iter()
            .any(|(_, score)| score.meets_threshold(self.threshold))
    }

    /// Templates meeting the threshold, highest score first.
    pub fn present(&self) -> impl Iterator<Item = TemplateKind> + '_ {
        self.scores
            .iter()
            .filter(|(_, score)| score.meets_threshold(self.threshold))
            .map(|(kind, _)| *kind)
    }

    /// Checks if a template meets the threshold.
    ///
    /// # Arguments
    ///
    /// * `kind` - The template to check.
    #[must_use]
    pub fn has(&self, kind: TemplateKind) -> bool {
        self.get(kind)
            .is_some_and(|score| score.meets_threshold(self.threshold))
    }

    /// The score of a template, if it left any evidence.
    #[must_use]
    pub fn get(&self, kind: TemplateKind) -> Option<&DetectionScore> {
        self.scores
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, score)| score)
    }

    /// The numeric score of a template (0 without evidence).
    #[must_use]
    pub fn score(&self, kind: TemplateKind) -> usize {
        self.get(kind).map_or(0, DetectionScore::score)
    }

    /// All templates that left evidence, sorted by score descending.
    #[must_use]
    pub fn all(&self) -> &[(TemplateKind, DetectionScore)] {
        &self.scores
    }

    /// Returns the detection threshold that was used.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Templates that left no evidence at all.
    pub fn absent(&self) -> impl Iterator<Item = TemplateKind> + '_ {
        TemplateKind::iter().filter(|kind| self.get(*kind).is_none())
    }

    /// Generates a human-readable summary of the detection results.
    #[must_use]
    pub fn summary(&self) -> String {
        let present: Vec<String> = self
            .scores
            .iter()
            .filter(|(_, score)| score.meets_threshold(self.threshold))
            .map(|(kind, score)| format!("{kind} (score={})", score.score()))
            .collect();
        if present.is_empty() {
            format!(
                "No template detected ({} below threshold {})",
                self.scores.len(),
                self.threshold
            )
        } else {
            format!(
                "Detected: {}; {} total candidates",
                present.join(", "),
                self.scores.len()
            )
        }
    }
}

impl fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
