//! Constant folding and branch pruning as pipeline stages.
//!
//! Both wrap the collaborators in [`crate::syntax`] and only add event reporting. They run
//! several times in the pipeline, after each pass that tends to leave literal expressions
//! behind.

use swc_core::common::Spanned;

use crate::{
    deobfuscation::{config::PassId, context::PassContext, events::EventKind, pass::Pass},
    syntax::{BranchPruner, ConstantFolder, SiteKey, SourceTree},
    Result,
};

/// Folds literal arithmetic, string, comparison and unary expressions.
pub struct ConstantFoldingPass;

impl Default for ConstantFoldingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantFoldingPass {
    /// Creates a new constant-folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for ConstantFoldingPass {
    fn id(&self) -> PassId {
        PassId::ConstantFolding
    }

    fn description(&self) -> &'static str {
        "Folds pure literal expressions"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let changed = ConstantFolder::new(tree.unresolved_mark()).fold(&mut tree.script);
        if changed {
            ctx.changed(
                EventKind::ConstantFolded,
                self.name(),
                SiteKey::of(tree.script.span()),
                "folded literal expressions",
            );
        }
        Ok(changed)
    }
}

/// Replaces conditionals with literal tests by the branch they take.
pub struct BranchPruningPass;

impl Default for BranchPruningPass {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchPruningPass {
    /// Creates a new branch-pruning pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for BranchPruningPass {
    fn id(&self) -> PassId {
        PassId::BranchPruning
    }

    fn description(&self) -> &'static str {
        "Replaces conditionals with constant tests by the taken branch"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let changed = BranchPruner::new(tree.unresolved_mark()).prune(&mut tree.script);
        if changed {
            ctx.changed(
                EventKind::BranchPruned,
                self.name(),
                SiteKey::of(tree.script.span()),
                "pruned dead branches",
            );
        }
        Ok(changed)
    }
}
