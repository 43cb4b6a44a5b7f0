//! Outcome of one deobfuscation run.

use std::{fmt, time::Duration};

use crate::deobfuscation::{
    detection::DetectionReport,
    events::{DerivedStats, EventLog},
};

/// What a run detected, what it changed, and how long it took.
#[derive(Debug, Clone, Default)]
pub struct DeobfuscationResult {
    /// Templates detected before the pipeline ran.
    pub detection: DetectionReport,
    /// Every event recorded during detection and the passes.
    pub events: EventLog,
    /// Number of pipeline steps that ran.
    pub passes_run: usize,
    /// Wall-clock time of the run.
    pub total_time: Duration,
}

impl DeobfuscationResult {
    /// Creates a result from a detection report and an event log.
    ///
    /// # Arguments
    ///
    /// * `detection` - The detection report.
    /// * `events` - The events of the run.
    #[must_use]
    pub fn new(detection: DetectionReport, events: EventLog) -> Self {
        Self {
            detection,
            events,
            passes_run: 0,
            total_time: Duration::ZERO,
        }
    }

    /// Sets timing information.
    ///
    /// # Arguments
    ///
    /// * `total_time` - Wall-clock time of the run.
    /// * `passes_run` - Number of pipeline steps that ran.
    ///
    /// # Returns
    ///
    /// The modified result (builder pattern).
    #[must_use]
    pub fn with_timing(mut self, total_time: Duration, passes_run: usize) -> Self {
        self.total_time = total_time;
        self.passes_run = passes_run;
        self
    }

    /// Counters derived from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        let mut stats = DerivedStats::from_log(&self.events).with_time(self.total_time);
        stats.passes_run = self.passes_run;
        stats
    }

    /// True if any pass changed the tree.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.events.transformation_count() > 0
    }

    /// One-line summary of what changed.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stats().summary()
    }

    /// Multi-line summary including detection.
    #[must_use]
    pub fn detailed_summary(&self) -> String {
        let mut out = String::from("Deobfuscation complete\n");
        out.push_str(&format!("  Detection: {}\n", self.detection.summary()));
        out.push_str(&format!("  Changes:   {}\n", self.summary()));
        let warnings = self.events.warnings().count();
        if warnings > 0 {
            out.push_str(&format!("  Warnings:  {warnings}\n"));
        }
        out
    }
}

impl fmt::Display for DeobfuscationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::DeobfuscationResult;
    use crate::deobfuscation::{DetectionReport, EventKind, EventLog};

    #[test]
    fn test_deobfuscation_result_summary() {
        let result = DeobfuscationResult::new(DetectionReport::empty(50), EventLog::new());
        assert_eq!(result.summary(), "no transformations");
        assert!(!result.changed());

        let detailed = result.detailed_summary();
        assert!(detailed.contains("Deobfuscation complete"));
        assert!(detailed.contains("Detection"));
    }

    #[test]
    fn test_stats_from_events() {
        let events = EventLog::new();
        events.record(EventKind::StringDecoded).at(4);
        events.record(EventKind::StringDecoded).at(9);
        events.warn("site left unmodified");
        let result = DeobfuscationResult::new(DetectionReport::empty(50), events)
            .with_timing(Duration::from_millis(12), 7);

        let stats = result.stats();
        assert_eq!(stats.strings_decoded, 2);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.passes_run, 7);
        assert!(result.changed());
        assert!(result.summary().starts_with("2 strings decoded, 1 warnings"));
        assert!(result.detailed_summary().contains("Warnings:  1"));
    }
}
