//! Concealed global restoration.
//!
//! ```text
//! var G = realm() || {};
//! function global(key) { switch (key) { case 4021: return G["console"]; ... } }
//! global(4021).log("hi");                 ==>     console.log("hi");
//! ```
//!
//! Each accessor call with a known key becomes a reference to the global. The replacement
//! identifier carries the unresolved context, so it reads the global even where the accessor
//! was called from a nested scope. The accessor, the realm wrapper and the realm function are
//! deleted once nothing reads them.

use swc_core::ecma::ast::{Expr, Id};

use crate::{
    analysis::{try_safe_delete_all, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        passes::utils::record_removals, templates::global_concealing,
    },
    syntax::{edit::ExprReplacer, SourceTree},
    Result,
};

/// Restores globals hidden behind a switch accessor.
pub struct GlobalConcealingPass;

impl Default for GlobalConcealingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalConcealingPass {
    /// Creates a new global-concealing pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for GlobalConcealingPass {
    fn id(&self) -> PassId {
        PassId::GlobalConcealing
    }

    fn description(&self) -> &'static str {
        "Restores globals hidden behind a switch accessor"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let accessors = global_concealing::find(tree, &bindings);

        let mut changed = false;
        for found in accessors {
            let mut replacer = ExprReplacer::new();
            for (site, name) in &found.rewrites {
                replacer.insert(*site, Box::new(Expr::Ident(tree.global_ident(name))));
                ctx.changed(
                    EventKind::GlobalRestored,
                    self.name(),
                    *site,
                    format!("restored global '{name}'"),
                );
            }
            changed |= replacer.apply(&mut tree.script) > 0;

            let runtime: Vec<Id> = std::iter::once(found.accessor.clone())
                .chain(found.support.iter().cloned())
                .collect();
            let removed = try_safe_delete_all(tree, &runtime);
            record_removals(ctx, self.name(), found.site, removed, "global accessor");
            changed |= removed > 0;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::GlobalConcealingPass;
    use crate::{
        deobfuscation::EventKind,
        test::{normalize, run_pass},
        Result,
    };

    const ACCESSOR: &str = "\
        function realm(){ return this; } \
        var G = realm() || {}; \
        function global(key){ switch (key) { case 4021: return G['console']; case 877: return G['Math']; } }";

    #[test]
    fn test_globals_are_restored() -> Result<()> {
        let source = format!("{ACCESSOR} global(4021).log(global(877).max(1, 2));");
        let run = run_pass(&GlobalConcealingPass::new(), &source)?;
        assert!(run.changed);
        assert_eq!(run.output, normalize("console.log(Math.max(1, 2));")?);
        assert_eq!(run.ctx.events.count_kind(EventKind::GlobalRestored), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_key_keeps_accessor() -> Result<()> {
        let source = format!("{ACCESSOR} global(4021).log(global(k));");
        let run = run_pass(&GlobalConcealingPass::new(), &source)?;
        assert_eq!(
            run.output,
            normalize(&format!("{ACCESSOR} console.log(global(k));"))?
        );
        Ok(())
    }
}
