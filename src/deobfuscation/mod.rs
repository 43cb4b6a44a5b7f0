//! Deobfuscation framework for scripts protected by js-confuser.
//!
//! The obfuscator rewrites a script by instantiating a fixed set of templates: helper
//! functions and code shapes it injects and then calls. This module recognises those
//! templates structurally and undoes them, one pass per template, over a single mutable tree.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Deobfuscation Pipeline                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Input: script text                                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    Parse & Resolve                              │    │
//! │  │  SourceTree: swc parser, scope resolution (name, context)       │    │
//! │  └────────────────────────────┬────────────────────────────────────┘    │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    Template Detection                           │    │
//! │  │  Every matcher runs read-only; per-template confidence scores   │    │
//! │  └────────────────────────────┬────────────────────────────────────┘    │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                    Pass Scheduler (fixed order)                 │    │
//! │  │  Wrappers:  anti-tooling, minified arrow                        │    │
//! │  │  Values:    duplicate literals, stack, string compression,      │    │
//! │  │             string concealing, placeholders                     │    │
//! │  │  Control:   opaque predicates, branch pruning                   │    │
//! │  │  Names:     global concealing, flattening object                │    │
//! │  │  Folding between stages                                         │    │
//! │  └────────────────────────────┬────────────────────────────────────┘    │
//! │                               ▼                                         │
//! │  Output: regenerated text + DeobfuscationResult (detection, events)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! ## Engine
//!
//! [`DeobfuscationEngine`] parses, detects, runs the scheduler and prints the result.
//!
//! ## Templates and Detection
//!
//! - [`templates`] - one pure matcher per template
//! - [`TemplateDetector`] - runs every matcher and scores the findings
//! - [`DetectionScore`] / [`DetectionReport`] - confidence-based detection
//!
//! ## Pass System
//!
//! - [`Pass`] - a rewrite over the whole tree
//! - [`PassScheduler`] - runs the passes in their fixed order
//! - [`PassContext`] - configuration, events, sandbox and cross-pass hints of one run
//! - [`EventLog`] - tracks what the passes changed and where
//!
//! The passes are documented in [`passes`]; the stack interpreter in [`stack`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use deconfuser::deobfuscation::{DeobfuscationEngine, EngineConfig, PassId};
//!
//! let config = EngineConfig::default()
//!     .without(PassId::OpaquePredicates)
//!     .with_detection_threshold(30);
//!
//! let mut engine = DeobfuscationEngine::new(config);
//! let (clean, result) = engine.process_source("/* obfuscated */")?;
//! println!("{}", result.summary());
//! # Ok::<(), deconfuser::Error>(())
//! ```

mod config;
mod context;
mod detection;
mod detector;
mod engine;
mod events;
mod pass;
mod result;
mod scheduler;

pub mod passes;
pub mod stack;
pub mod templates;

pub use config::{EngineConfig, PassId};
pub use context::{PassContext, PassHints};
pub use detection::{DetectionEvidence, DetectionReport, DetectionScore};
pub use detector::TemplateDetector;
pub use engine::DeobfuscationEngine;
pub use events::{truncate_string, DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use pass::Pass;
pub use result::DeobfuscationResult;
pub use scheduler::PassScheduler;
pub use templates::TemplateKind;
