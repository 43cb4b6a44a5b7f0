//! Event logging for the deobfuscation pipeline.
//!
//! Every rewrite a pass performs is recorded as an [`Event`], as is every site that was left
//! alone because the sandbox could not produce a value. Statistics are derived from the log
//! ([`DerivedStats`]) rather than tracked separately.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (rewrite, warning, pass error, etc.)
//! - [`EventLog`] - Append-only collection of events with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events; records on drop
//!
//! # Example
//!
//! ```rust
//! use deconfuser::deobfuscation::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::StringDecoded)
//!     .at(120)
//!     .pass("string-compression")
//!     .message("decoded \"hello\"");
//! log.warn("evaluation timed out");
//!
//! assert_eq!(log.count_kind(EventKind::StringDecoded), 1);
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt, time::Duration};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A decoder call was replaced by the string it returns.
    StringDecoded,
    /// A reference was replaced by the literal it is bound to.
    LiteralInlined,
    /// A wrapper call was replaced by its payload.
    CallUnwrapped,
    /// A predicate expression was replaced by its value.
    PredicateResolved,
    /// A global accessor call was replaced by the global's name.
    GlobalRestored,
    /// A read of a virtual stack slot was resolved.
    StackSlotResolved,
    /// A read of a constant object property was inlined.
    PropertyInlined,
    /// Literal expressions were folded.
    ConstantFolded,
    /// A conditional with a constant test was replaced by its taken branch.
    BranchPruned,
    /// A declaration that was no longer referenced was removed.
    DeclarationRemoved,
    /// A statement without effect was removed.
    StatementRemoved,

    /// A template instance was recognised.
    TemplateMatched,
    /// A dependency closure grew after a missing name was reported.
    ClosureGrown,

    /// Template detection completed.
    DetectionComplete,
    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,
    /// Source text was regenerated.
    CodeRegenerated,

    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::StringDecoded => "string decoded",
            Self::LiteralInlined => "literal inlined",
            Self::CallUnwrapped => "call unwrapped",
            Self::PredicateResolved => "predicate resolved",
            Self::GlobalRestored => "global restored",
            Self::StackSlotResolved => "stack slot resolved",
            Self::PropertyInlined => "property inlined",
            Self::ConstantFolded => "constants folded",
            Self::BranchPruned => "branch pruned",
            Self::DeclarationRemoved => "declaration removed",
            Self::StatementRemoved => "statement removed",
            Self::TemplateMatched => "template matched",
            Self::ClosureGrown => "closure grown",
            Self::DetectionComplete => "detection complete",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::CodeRegenerated => "code regenerated",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the tree.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::StringDecoded
                | Self::LiteralInlined
                | Self::CallUnwrapped
                | Self::PredicateResolved
                | Self::GlobalRestored
                | Self::StackSlotResolved
                | Self::PropertyInlined
                | Self::ConstantFolded
                | Self::BranchPruned
                | Self::DeclarationRemoved
                | Self::StatementRemoved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// Source offset of the affected node, if any.
    pub offset: Option<u32>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "[{}] @{} {}", self.kind, offset, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    offset: Option<u32>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            offset: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the source offset where the event occurred.
    pub fn at(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            offset: self.offset.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only collection of events from one run.
///
/// Events can be appended through a shared reference.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events recorded by one pass.
    pub fn filter_pass<'a>(&'a self, pass: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.pass.as_deref() == Some(pass))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind == EventKind::Warning)
    }

    fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.iter().filter(|e| e.kind.is_transformation()).count()
    }

    /// Generates a human-readable summary of all events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Decoder calls replaced by their string.
    pub strings_decoded: usize,
    /// References replaced by literals.
    pub literals_inlined: usize,
    /// Wrapper calls replaced by their payload.
    pub calls_unwrapped: usize,
    /// Opaque predicates replaced by their value.
    pub predicates_resolved: usize,
    /// Global accessor calls replaced by global names.
    pub globals_restored: usize,
    /// Virtual stack reads resolved.
    pub stack_slots_resolved: usize,
    /// Constant object properties inlined.
    pub properties_inlined: usize,
    /// Folding rounds that changed the tree.
    pub constants_folded: usize,
    /// Pruning rounds that changed the tree.
    pub branches_pruned: usize,
    /// Declarations removed.
    pub declarations_removed: usize,
    /// Statements removed.
    pub statements_removed: usize,
    /// Template instances recognised.
    pub templates_matched: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Number of passes run.
    pub passes_run: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            strings_decoded: get(EventKind::StringDecoded),
            literals_inlined: get(EventKind::LiteralInlined),
            calls_unwrapped: get(EventKind::CallUnwrapped),
            predicates_resolved: get(EventKind::PredicateResolved),
            globals_restored: get(EventKind::GlobalRestored),
            stack_slots_resolved: get(EventKind::StackSlotResolved),
            properties_inlined: get(EventKind::PropertyInlined),
            constants_folded: get(EventKind::ConstantFolded),
            branches_pruned: get(EventKind::BranchPruned),
            declarations_removed: get(EventKind::DeclarationRemoved),
            statements_removed: get(EventKind::StatementRemoved),
            templates_matched: get(EventKind::TemplateMatched),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            passes_run: get(EventKind::PassCompleted),
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = [
            (self.strings_decoded, "strings decoded"),
            (self.literals_inlined, "literals inlined"),
            (self.calls_unwrapped, "calls unwrapped"),
            (self.predicates_resolved, "predicates resolved"),
            (self.globals_restored, "globals restored"),
            (self.stack_slots_resolved, "stack slots resolved"),
            (self.properties_inlined, "properties inlined"),
            (self.declarations_removed, "declarations removed"),
            (self.statements_removed, "statements removed"),
            (self.errors, "errors"),
            (self.warnings, "warnings"),
        ];
        let parts: Vec<String> = counters
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();

        let stats = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };

        if self.total_time.as_millis() > 0 {
            format!(
                "{} in {:?} ({} passes)",
                stats, self.total_time, self.passes_run
            )
        } else {
            stats
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Truncates a string for display, adding ellipsis if needed.
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::StringDecoded));
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();

        log.record(EventKind::StringDecoded)
            .at(0x10)
            .message("decoded \"hello\"");

        assert_eq!(log.len(), 1);
        let event = log.iter().next().unwrap();
        assert_eq!(event.offset, Some(0x10));
        assert_eq!(event.message, "decoded \"hello\"");
    }

    #[test]
    fn test_default_message() {
        let log = EventLog::new();
        log.record(EventKind::GlobalRestored).at(4);

        let event = log.iter().next().unwrap();
        assert_eq!(event.message, "global restored");
    }

    #[test]
    fn test_filters() {
        let log = EventLog::new();
        log.record(EventKind::LiteralInlined).pass("placeholder");
        log.warn("some warning");
        log.record(EventKind::DeclarationRemoved).pass("placeholder");
        log.record(EventKind::TemplateMatched).pass("opaque-predicates");

        assert_eq!(log.transformation_count(), 2);
        assert_eq!(log.filter_pass("placeholder").count(), 2);
        assert_eq!(log.warnings().count(), 1);
    }

    #[test]
    fn test_summary_and_stats() {
        let log = EventLog::new();
        log.record(EventKind::StringDecoded);
        log.record(EventKind::StringDecoded);
        log.record(EventKind::CallUnwrapped);
        log.record(EventKind::PassCompleted);
        log.warn("a warning");

        assert!(log.summary().contains("2 string decoded"));

        let stats = DerivedStats::from_log(&log);
        assert_eq!(stats.strings_decoded, 2);
        assert_eq!(stats.calls_unwrapped, 1);
        assert_eq!(stats.passes_run, 1);
        assert_eq!(stats.warnings, 1);
        assert_eq!(
            stats.summary(),
            "2 strings decoded, 1 calls unwrapped, 1 warnings"
        );
    }

    #[test]
    fn test_clone() {
        let log = EventLog::new();
        log.record(EventKind::BranchPruned);
        log.record(EventKind::ConstantFolded);

        let copy = log.clone();
        assert_eq!(copy.len(), 2);
        assert!(copy.has(EventKind::ConstantFolded));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghij", 6), "abc...");
    }
}
