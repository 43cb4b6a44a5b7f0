//! State threaded through the pass pipeline.
//!
//! A [`PassContext`] is created per run and handed to every pass. It carries the configuration,
//! the event log, the sandbox factory, and [`PassHints`]: facts one pass learns that a later
//! pass needs. Nothing here is global; two runs never share a context.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::warn;
use swc_core::ecma::ast::Id;

use crate::{
    deobfuscation::{
        config::EngineConfig,
        events::{EventKind, EventLog},
    },
    oracle::{OracleError, OracleOutcome, Sandbox, SandboxValue},
    syntax::SiteKey,
};

/// Facts recorded by one pass for the benefit of later passes.
#[derive(Debug, Clone, Default)]
pub struct PassHints {
    /// The wrapper removed by the minified-arrow pass. Its shape resembles the function-length
    /// helper, so the stack pass must not match it again.
    pub arrow_wrapper: Option<Id>,

    /// Declared parameter counts recovered from function-length helper calls, keyed by the
    /// function the helper was applied to.
    pub stack_lengths: HashMap<Id, usize>,
}

/// Per-run context passed into every pass.
pub struct PassContext {
    /// Engine configuration.
    pub config: EngineConfig,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Factory for isolated evaluations.
    pub sandbox: Sandbox,

    /// Cross-pass facts.
    pub hints: PassHints,

    start_time: Instant,
}

impl PassContext {
    /// Creates a context for one run.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let sandbox = Sandbox::new(config.oracle.clone());
        Self {
            config,
            events: EventLog::new(),
            sandbox,
            hints: PassHints::default(),
            start_time: Instant::now(),
        }
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Unpacks an oracle outcome for a site that cannot grow its closure.
    ///
    /// Any failure is terminal for the site: a warning event is recorded, and `None` tells the
    /// caller to leave the site unmodified.
    pub fn accept(
        &self,
        pass: &str,
        site: SiteKey,
        outcome: OracleOutcome,
    ) -> Option<SandboxValue> {
        match outcome.into_value() {
            Ok(value) => Some(value),
            Err(error) => {
                self.oracle_failed(pass, site, &error);
                None
            }
        }
    }

    /// Records an oracle failure at `site`.
    pub fn oracle_failed(&self, pass: &str, site: SiteKey, error: &OracleError) {
        warn!("{pass}: site {site} left unmodified: {error}");
        self.events
            .record(EventKind::Warning)
            .at(site.offset())
            .pass(pass)
            .message(format!("site left unmodified: {error}"));
    }

    /// Records a rewrite.
    pub fn changed(&self, kind: EventKind, pass: &str, site: SiteKey, message: impl Into<String>) {
        self.events
            .record(kind)
            .at(site.offset())
            .pass(pass)
            .message(message);
    }
}
