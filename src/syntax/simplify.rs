//! Constant folding and dead-branch pruning.
//!
//! Both are thin drivers around the `swc` optimizers. Each optimizer is run until it reports no
//! further change, which makes a single call idempotent.

use swc_core::{
    common::{pass::Repeated, Mark},
    ecma::{
        ast::Script,
        transforms::optimization::simplify::{dead_branch_remover, expr_simplifier},
        visit::VisitMutWith,
    },
};

/// Upper bound on optimizer rounds per call.
const MAX_ROUNDS: usize = 64;

/// Folds pure literal arithmetic, string, comparison and unary expressions.
pub struct ConstantFolder {
    unresolved_mark: Mark,
}

impl ConstantFolder {
    /// Creates a folder that treats names carrying `unresolved_mark` as globals.
    #[must_use]
    pub fn new(unresolved_mark: Mark) -> Self {
        Self { unresolved_mark }
    }

    /// Folds `script` in place. Returns `true` if anything changed.
    pub fn fold(&self, script: &mut Script) -> bool {
        let mut simplifier = expr_simplifier(self.unresolved_mark, Default::default());
        let mut changed = false;
        for _ in 0..MAX_ROUNDS {
            script.visit_mut_with(&mut simplifier);
            if !simplifier.changed() {
                break;
            }
            changed = true;
            simplifier.reset();
        }
        changed
    }
}

/// Replaces conditionals whose test is a literal with the taken branch.
pub struct BranchPruner {
    unresolved_mark: Mark,
}

impl BranchPruner {
    /// Creates a pruner that treats names carrying `unresolved_mark` as globals.
    #[must_use]
    pub fn new(unresolved_mark: Mark) -> Self {
        Self { unresolved_mark }
    }

    /// Prunes `script` in place. Returns `true` if anything changed.
    pub fn prune(&self, script: &mut Script) -> bool {
        let mut remover = dead_branch_remover(self.unresolved_mark);
        let mut changed = false;
        for _ in 0..MAX_ROUNDS {
            script.visit_mut_with(&mut remover);
            if !remover.changed() {
                break;
            }
            changed = true;
            remover.reset();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        syntax::{with_globals, SourceTree},
        Result,
    };

    use super::{BranchPruner, ConstantFolder};

    #[test]
    fn test_fold_arithmetic() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("use(1 + 2);")?;
            let folder = ConstantFolder::new(tree.unresolved_mark());
            assert!(folder.fold(&mut tree.script));
            assert!(!folder.fold(&mut tree.script));
            assert!(tree.generate()?.contains("use(3)"));
            Ok(())
        })
    }

    #[test]
    fn test_prune_literal_ternary() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("use(true ? a : b);")?;
            let pruner = BranchPruner::new(tree.unresolved_mark());
            pruner.prune(&mut tree.script);
            let folder = ConstantFolder::new(tree.unresolved_mark());
            folder.fold(&mut tree.script);
            let text = tree.generate()?;
            assert!(text.contains("use(a)"), "{text}");
            Ok(())
        })
    }
}
