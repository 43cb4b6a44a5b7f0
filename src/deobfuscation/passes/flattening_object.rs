//! Flattening object inlining.
//!
//! ```text
//! var o = { "a": 1, "decoy": 4 };                    switch (state) {
//! switch (state) {                                       case 1: f(1); break;
//!     case 1: f(o["a"]); o["decoy"] = 9; break;  ==>  }
//! }
//! ```
//!
//! Reads of properties that are never written are replaced by their initial literal; statements
//! that only write properties nobody reads are removed. The object goes away when no access is
//! left.

use crate::{
    analysis::{try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        templates::flattening_object,
    },
    syntax::{
        build::detached,
        edit::{ExprReplacer, StmtEditor},
        SourceTree,
    },
    Result,
};

/// Inlines the constant object used by flattened control flow.
pub struct FlatteningObjectPass;

impl Default for FlatteningObjectPass {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatteningObjectPass {
    /// Creates a new flattening-object pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for FlatteningObjectPass {
    fn id(&self) -> PassId {
        PassId::FlatteningObject
    }

    fn description(&self) -> &'static str {
        "Inlines the constant object used by flattened control flow"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let objects = flattening_object::find(tree, &bindings);

        let mut changed = false;
        for found in objects {
            let mut replacer = ExprReplacer::new();
            for (site, value) in &found.reads {
                replacer.insert(*site, detached(value));
                ctx.changed(
                    EventKind::PropertyInlined,
                    self.name(),
                    *site,
                    format!("inlined property of '{}'", found.object.0),
                );
            }
            let mut statements = StmtEditor::new();
            for site in &found.dead_writes {
                statements.remove(*site);
                ctx.changed(
                    EventKind::StatementRemoved,
                    self.name(),
                    *site,
                    format!("removed decoy write to '{}'", found.object.0),
                );
            }
            changed |= replacer.apply(&mut tree.script) + statements.apply(&mut tree.script) > 0;

            if try_safe_delete(tree, &found.object) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    found.site,
                    format!("removed flattening object '{}'", found.object.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}
