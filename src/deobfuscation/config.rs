//! Configuration for the deobfuscation engine.
//!
//! Controls which passes run, how often the iterating passes may repeat, and the resource
//! bounds of the sandbox.

use std::time::Duration;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::oracle::OracleConfig;

/// Identifies a pass of the pipeline.
///
/// Names are kebab-case (`"string-concealing"`) for the command line and reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PassId {
    /// Removes empty decoy wrappers around calls.
    AntiTooling,
    /// Unwraps the helper that fakes a lambda's parameter count.
    MinifiedArrow,
    /// Inlines literals hoisted into a factory array.
    DuplicateLiteral,
    /// Strips the `Object.defineProperty(fn, "length", ..)` helper and records length hints.
    FunctionLength,
    /// Resolves parameters virtualised onto an indexed stack.
    Stack,
    /// Decodes strings from the compressed string table.
    StringCompression,
    /// Decodes strings hidden behind the packed-integer encoder.
    StringConcealing,
    /// Inlines single-use placeholder literals.
    Placeholder,
    /// Folds literal expressions.
    ConstantFolding,
    /// Evaluates opaque predicates.
    OpaquePredicates,
    /// Replaces conditionals with constant tests by the taken branch.
    BranchPruning,
    /// Restores globals hidden behind the switch accessor.
    GlobalConcealing,
    /// Inlines the constant object used by flattened control flow.
    FlatteningObject,
}

impl PassId {
    /// True if the pass needs the sandbox.
    #[must_use]
    pub fn uses_oracle(&self) -> bool {
        matches!(
            self,
            Self::DuplicateLiteral
                | Self::StringCompression
                | Self::StringConcealing
                | Self::OpaquePredicates
        )
    }

    /// The kebab-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Every pass id.
    pub fn all() -> impl Iterator<Item = PassId> {
        Self::iter()
    }
}

/// Configuration for the deobfuscation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Passes that are skipped.
    pub disabled: Vec<PassId>,

    /// Maximum rewrite rounds of the stack interpreter per run (default: 16).
    pub stack_max_iterations: usize,

    /// Maximum closure growth retries per concealed-string site (default: 64).
    pub concealing_max_retries: usize,

    /// Minimum confidence (0-100) for a template to count as present in the detection
    /// report (default: 50).
    pub detection_threshold: usize,

    /// Resource bounds of every sandbox evaluation.
    pub oracle: OracleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            stack_max_iterations: 16,
            concealing_max_retries: 64,
            detection_threshold: 50,
            oracle: OracleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that never executes input code.
    ///
    /// Every pass that needs the sandbox is disabled; the remaining passes only rewrite the
    /// tree.
    #[must_use]
    pub fn static_only() -> Self {
        Self {
            disabled: PassId::all().filter(PassId::uses_oracle).collect(),
            ..Self::default()
        }
    }

    /// True unless `pass` was disabled.
    #[must_use]
    pub fn is_enabled(&self, pass: PassId) -> bool {
        !self.disabled.contains(&pass)
    }

    /// Disables a pass.
    ///
    /// # Arguments
    ///
    /// * `pass` - The pass to skip.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn without(mut self, pass: PassId) -> Self {
        if !self.disabled.contains(&pass) {
            self.disabled.push(pass);
        }
        self
    }

    /// Sets the wall-clock limit of each sandbox evaluation.
    ///
    /// # Arguments
    ///
    /// * `timeout` - The limit per evaluation.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.oracle.timeout = timeout;
        self
    }

    /// Sets the detection threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Minimum confidence (0-100).
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_detection_threshold(mut self, threshold: usize) -> Self {
        self.detection_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, time::Duration};

    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.disabled.is_empty());
        assert_eq!(config.stack_max_iterations, 16);
        assert_eq!(config.oracle.timeout, Duration::from_secs(2));
        assert!(PassId::all().all(|p| config.is_enabled(p)));
    }

    #[test]
    fn test_static_only() {
        let config = EngineConfig::static_only();
        assert!(!config.is_enabled(PassId::StringConcealing));
        assert!(!config.is_enabled(PassId::OpaquePredicates));
        assert!(config.is_enabled(PassId::Stack));
        assert!(config.is_enabled(PassId::GlobalConcealing));
    }

    #[test]
    fn test_pass_names() {
        assert_eq!(PassId::StringConcealing.to_string(), "string-concealing");
        assert_eq!(PassId::FlatteningObject.name(), "flattening-object");
        assert_eq!(PassId::from_str("anti-tooling").ok(), Some(PassId::AntiTooling));
        assert!(PassId::from_str("unknown").is_err());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .without(PassId::Stack)
            .without(PassId::Stack)
            .with_timeout(Duration::from_millis(100))
            .with_detection_threshold(10);
        assert_eq!(config.disabled, vec![PassId::Stack]);
        assert_eq!(config.oracle.timeout, Duration::from_millis(100));
        assert_eq!(config.detection_threshold, 10);
    }
}
