//! Opaque predicate evaluation.
//!
//! ```text
//! var P = (function () { var o = {}; o.n = 7; return o; })();
//! var r = P.n > 3 ? real() : decoy();     ==>     var r = true ? real() : decoy();
//! ```
//!
//! Each test that reads only the predicate object is evaluated in a fresh sandbox seeded with
//! the object's declaration, and replaced by its value. Branch pruning later removes the dead
//! arm; the object is deleted here once no test reads it.

use log::debug;

use crate::{
    analysis::{try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        passes::utils::closure_of, templates::opaque_predicate,
    },
    syntax::{edit::ExprReplacer, locate_all, SourceTree},
    Result,
};

/// Replaces opaque predicate tests by their value.
pub struct OpaquePredicatesPass;

impl Default for OpaquePredicatesPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OpaquePredicatesPass {
    /// Creates a new opaque-predicates pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for OpaquePredicatesPass {
    fn id(&self) -> PassId {
        PassId::OpaquePredicates
    }

    fn description(&self) -> &'static str {
        "Evaluates opaque predicate tests in the sandbox"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let objects = opaque_predicate::find(tree, &bindings);

        let mut changed = false;
        for found in objects {
            let Some(closure) = closure_of(&tree.script, [&found.object]) else {
                continue;
            };
            let located = locate_all(&tree.script, found.tests.iter().copied());
            let mut replacer = ExprReplacer::new();
            for site in &found.tests {
                let Some(test) = located.get(site) else {
                    continue;
                };
                let target = tree.print_expr(&test.expr)?;
                let outcome = ctx.sandbox.evaluate(&closure, tree, &target)?;
                let Some(value) = ctx.accept(self.name(), *site, outcome) else {
                    continue;
                };
                ctx.changed(
                    EventKind::PredicateResolved,
                    self.name(),
                    *site,
                    format!("predicate is {value}"),
                );
                replacer.insert(*site, value.to_expr(tree)?);
            }
            let applied = replacer.apply(&mut tree.script);
            debug!("{}: resolved {applied} test(s) on '{}'", self.name(), found.object.0);
            changed |= applied > 0;

            if try_safe_delete(tree, &found.object) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    found.site,
                    format!("removed predicate object '{}'", found.object.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}
