//! # deconfuser Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the deconfuser library.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all deconfuser operations
pub use crate::Error;

/// The result type used throughout deconfuser
pub use crate::Result;

/// One-call deobfuscation with the default configuration
pub use crate::deobfuscate;

// ================================================================================================
// Engine
// ================================================================================================

/// Engine, configuration and run results
pub use crate::deobfuscation::{
    DeobfuscationEngine, DeobfuscationResult, DerivedStats, EngineConfig, PassId,
};

/// Detection
pub use crate::deobfuscation::{
    DetectionEvidence, DetectionReport, DetectionScore, TemplateDetector, TemplateKind,
};

/// Events recorded during a run
pub use crate::deobfuscation::{Event, EventKind, EventLog};

// ================================================================================================
// Pass System
// ================================================================================================

/// Writing and scheduling passes
pub use crate::deobfuscation::{Pass, PassContext, PassHints, PassScheduler};

// ================================================================================================
// Tree and Oracle
// ================================================================================================

/// The program tree and its helpers
pub use crate::syntax::{with_globals, SiteKey, SourceTree};

/// Bindings and liveness
pub use crate::analysis::{try_safe_delete, BindingIndex};

/// Sandboxed evaluation
pub use crate::oracle::{OracleConfig, OracleOutcome, Sandbox, SandboxValue};
