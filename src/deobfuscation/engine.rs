//! Main deobfuscation engine.
//!
//! The [`DeobfuscationEngine`] is the main entry point for deobfuscating scripts. It
//! orchestrates parsing, detection, pass execution and code generation.

use std::{path::Path, time::Instant};

use log::{debug, info, warn};

use crate::{
    deobfuscation::{
        config::EngineConfig,
        context::PassContext,
        detection::DetectionReport,
        detector::TemplateDetector,
        events::{EventKind, EventLog},
        result::DeobfuscationResult,
        scheduler::PassScheduler,
    },
    syntax::{with_globals, SourceTree},
    Result,
};

/// Main deobfuscation engine.
///
/// The engine orchestrates the complete pipeline:
///
/// 1. **Parsing**: Build the tree; a hard parse failure aborts the run
/// 2. **Detection**: Score which templates the script contains
/// 3. **Pass Execution**: Run the pipeline passes once, in order
/// 4. **Code Generation**: Print the mutated tree
///
/// Every run gets its own [`PassContext`] and its own syntax globals, so runs never share
/// state and an engine can process any number of scripts.
///
/// # Example
///
/// ```rust,no_run
/// use deconfuser::deobfuscation::{DeobfuscationEngine, EngineConfig};
///
/// let mut engine = DeobfuscationEngine::new(EngineConfig::default());
/// let (clean, result) = engine.process_file("obfuscated.js")?;
/// println!("{}", result.summary());
/// # Ok::<(), deconfuser::Error>(())
/// ```
pub struct DeobfuscationEngine {
    /// Configuration.
    config: EngineConfig,
    /// Template detector.
    detector: TemplateDetector,
    /// Pass scheduler.
    scheduler: PassScheduler,
}

impl Default for DeobfuscationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl DeobfuscationEngine {
    /// Creates a new engine with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration controlling enabled passes, limits and thresholds.
    ///
    /// # Returns
    ///
    /// A new `DeobfuscationEngine` instance ready to process scripts.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            detector: TemplateDetector::new(config.detection_threshold),
            scheduler: PassScheduler::new(),
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the pass scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &PassScheduler {
        &self.scheduler
    }

    /// Processes a script through the complete pipeline.
    ///
    /// # Arguments
    ///
    /// * `source` - The obfuscated script.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - The regenerated script
    /// - A [`DeobfuscationResult`] with detection info, events and timing
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] if the script cannot be parsed, or the first error a
    /// pass or the code generator returns.
    pub fn process_source(&mut self, source: &str) -> Result<(String, DeobfuscationResult)> {
        let start = Instant::now();
        with_globals(|| {
            let mut tree = SourceTree::parse(source)?;
            let mut ctx = PassContext::new(self.config.clone());
            for recovered in tree.recovered_errors() {
                warn!("recovered parse error: {recovered}");
                ctx.events.warn(format!("recovered parse error: {recovered}"));
            }

            let detection = self.detector.detect(&tree, &ctx.events);
            let passes_run = self.scheduler.run(&mut tree, &mut ctx)?;

            let output = tree.generate()?;
            ctx.events
                .record(EventKind::CodeRegenerated)
                .message(format!("{} bytes", output.len()));

            let result = DeobfuscationResult::new(detection, ctx.events)
                .with_timing(start.elapsed(), passes_run);
            info!("{}", result.summary());
            Ok((output, result))
        })
    }

    /// Reads a script from disk and processes it.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the script.
    ///
    /// # Returns
    ///
    /// A tuple containing the regenerated script and results.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be read, otherwise as
    /// [`process_source`](Self::process_source).
    pub fn process_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<(String, DeobfuscationResult)> {
        let path = path.as_ref();
        debug!("processing {}", path.display());
        let source = std::fs::read_to_string(path)?;
        self.process_source(&source)
    }

    /// Runs detection only.
    ///
    /// # Arguments
    ///
    /// * `source` - The script to inspect.
    ///
    /// # Returns
    ///
    /// The [`DetectionReport`]; the script is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] if the script cannot be parsed.
    pub fn detect(&self, source: &str) -> Result<DetectionReport> {
        with_globals(|| {
            let tree = SourceTree::parse(source)?;
            Ok(self.detector.detect(&tree, &EventLog::new()))
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::DeobfuscationEngine;
    use crate::{
        deobfuscation::{templates::TemplateKind, EngineConfig, EventKind, PassId},
        test::normalize,
        Error, Result,
    };

    #[test]
    fn test_engine_default() {
        let engine = DeobfuscationEngine::default();
        assert_eq!(engine.config().detection_threshold, 50);
        assert_eq!(engine.scheduler().len(), 16);
    }

    #[test]
    fn test_process_source() -> Result<()> {
        let mut engine = DeobfuscationEngine::new(EngineConfig::static_only());
        let (output, result) = engine.process_source(
            "function decoy(){} decoy(log('a' + 'b')); var o = 1 + 2; log(o);",
        )?;
        assert_eq!(output, normalize(r#"log("ab"); var o = 3; log(o);"#)?);
        assert!(result.changed());
        assert!(result.detection.get(TemplateKind::AntiTooling).is_some());
        assert_eq!(result.passes_run, 12);
        assert!(result.events.has(EventKind::DetectionComplete));
        assert!(result.events.has(EventKind::CodeRegenerated));
        Ok(())
    }

    #[test]
    fn test_parse_failure_produces_no_output() {
        let mut engine = DeobfuscationEngine::default();
        let result = engine.process_source("var = ;");
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_disabled_pass_leaves_template() -> Result<()> {
        let config = EngineConfig::static_only().without(PassId::AntiTooling);
        let mut engine = DeobfuscationEngine::new(config);
        let source = "function decoy(){} decoy(log(1));";
        let (output, _) = engine.process_source(source)?;
        assert_eq!(output, normalize(source)?);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let mut engine = DeobfuscationEngine::default();
        let result = engine.process_file("/nonexistent/deconfuser/input.js");
        assert!(matches!(result, Err(Error::FileError(_))));
    }
}
