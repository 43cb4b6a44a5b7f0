//! Pass scheduling.
//!
//! The [`PassScheduler`] owns the pipeline: the passes in their fixed order. Every pass runs
//! exactly once per [`PassScheduler::run`]; the passes that iterate (stack interpretation and
//! the string-concealing retries) do so internally.

use std::time::Instant;

use log::{debug, error};

use crate::{
    deobfuscation::{
        context::PassContext,
        events::EventKind,
        pass::Pass,
        passes::{
            AntiToolingPass, BranchPruningPass, ConstantFoldingPass, DuplicateLiteralPass,
            FlatteningObjectPass, FunctionLengthPass, GlobalConcealingPass, MinifiedArrowPass,
            OpaquePredicatesPass, PlaceholderPass, StackPass, StringCompressionPass,
            StringConcealingPass,
        },
    },
    syntax::SourceTree,
    Result,
};

/// Runs the pipeline passes in order.
pub struct PassScheduler {
    passes: Vec<Box<dyn Pass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PassScheduler {
    /// Creates a scheduler holding the full pipeline.
    ///
    /// Passes disabled in the configuration are still listed here; [`run`](Self::run) skips
    /// them.
    #[must_use]
    pub fn new() -> Self {
        let passes: Vec<Box<dyn Pass>> = vec![
            Box::new(AntiToolingPass::new()),
            Box::new(MinifiedArrowPass::new()),
            Box::new(DuplicateLiteralPass::new()),
            Box::new(FunctionLengthPass::new()),
            Box::new(StackPass::new()),
            Box::new(StringCompressionPass::new()),
            Box::new(StringConcealingPass::new()),
            Box::new(PlaceholderPass::new()),
            Box::new(ConstantFoldingPass::new()),
            Box::new(StackPass::new()),
            Box::new(OpaquePredicatesPass::new()),
            Box::new(ConstantFoldingPass::new()),
            Box::new(BranchPruningPass::new()),
            Box::new(GlobalConcealingPass::new()),
            Box::new(FlatteningObjectPass::new()),
            Box::new(ConstantFoldingPass::new()),
        ];
        Self { passes }
    }

    /// Creates a scheduler over a custom pass list.
    ///
    /// # Arguments
    ///
    /// * `passes` - The passes, in the order they run.
    #[must_use]
    pub fn with_passes(passes: Vec<Box<dyn Pass>>) -> Self {
        Self { passes }
    }

    /// The scheduled passes, in order.
    pub fn passes(&self) -> impl Iterator<Item = &dyn Pass> {
        self.passes.iter().map(AsRef::as_ref)
    }

    /// Number of scheduled steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// True if no pass is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every enabled pass once, in order.
    ///
    /// Each pass is bracketed by [`EventKind::PassStarted`] and [`EventKind::PassCompleted`]
    /// events. A pass error is recorded as [`EventKind::Error`] and aborts the run.
    ///
    /// # Arguments
    ///
    /// * `tree` - The tree to transform in place.
    /// * `ctx` - The per-run context.
    ///
    /// # Returns
    ///
    /// The number of passes that ran.
    ///
    /// # Errors
    ///
    /// Returns the first error a pass returns.
    pub fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<usize> {
        let mut ran = 0;
        for (step, pass) in self.passes.iter().enumerate() {
            let name = pass.name();
            if !ctx.config.is_enabled(pass.id()) {
                debug!("step {}: {name} disabled", step + 1);
                continue;
            }

            ctx.events.record(EventKind::PassStarted).pass(name);
            let start = Instant::now();
            let changed = match pass.run(tree, ctx) {
                Ok(changed) => changed,
                Err(e) => {
                    error!("{name} failed: {e}");
                    ctx.events
                        .record(EventKind::Error)
                        .pass(name)
                        .message(e.to_string());
                    return Err(e);
                }
            };
            ran += 1;

            debug!(
                "step {}: {name} {} in {:?}",
                step + 1,
                if changed { "changed the tree" } else { "found nothing" },
                start.elapsed()
            );
            ctx.events
                .record(EventKind::PassCompleted)
                .pass(name)
                .message(if changed { "changed" } else { "unchanged" });
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::PassScheduler;
    use crate::{
        deobfuscation::{EngineConfig, EventKind, PassContext, PassId},
        syntax::{with_globals, SourceTree},
        Result,
    };

    #[test]
    fn test_pipeline_order() {
        let scheduler = PassScheduler::new();
        let ids: Vec<PassId> = scheduler.passes().map(|p| p.id()).collect();
        assert_eq!(ids.len(), 16);
        assert_eq!(ids[0], PassId::AntiTooling);
        assert_eq!(ids[3], PassId::FunctionLength);
        assert_eq!(ids[4], PassId::Stack);
        assert_eq!(ids[9], PassId::Stack);
        assert_eq!(ids[15], PassId::ConstantFolding);
        assert_eq!(
            ids.iter().filter(|id| **id == PassId::ConstantFolding).count(),
            3
        );
    }

    #[test]
    fn test_disabled_passes_are_skipped() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("var a = 1 + 2;")?;
            let config = EngineConfig::static_only().without(PassId::ConstantFolding);
            let mut ctx = PassContext::new(config);
            let ran = PassScheduler::new().run(&mut tree, &mut ctx)?;
            // 16 steps minus 4 sandbox passes minus 3 folding steps
            assert_eq!(ran, 9);
            assert_eq!(ctx.events.count_kind(EventKind::PassStarted), 9);
            assert_eq!(ctx.events.count_kind(EventKind::PassCompleted), 9);
            assert!(ctx.events.filter_pass("constant-folding").next().is_none());
            Ok(())
        })
    }
}
