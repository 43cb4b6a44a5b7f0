//! Single-use placeholder inlining.
//!
//! ```text
//! var x = "secret";
//! use(x);                 ==>     use("secret");
//! x = "other";
//! ```
//!
//! The initial value is copied to the one read that can observe it, then the declaration and
//! the overwrite are removed through [`try_safe_delete`].

use crate::{
    analysis::{try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        templates::placeholder,
    },
    syntax::{build::detached, edit::ExprReplacer, SourceTree},
    Result,
};

/// Inlines single-use placeholder literals.
pub struct PlaceholderPass;

impl Default for PlaceholderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceholderPass {
    /// Creates a new placeholder pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for PlaceholderPass {
    fn id(&self) -> PassId {
        PassId::Placeholder
    }

    fn description(&self) -> &'static str {
        "Inlines literals that are read once before being overwritten"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let placeholders = placeholder::find(tree, &bindings);
        if placeholders.is_empty() {
            return Ok(false);
        }

        let mut replacer = ExprReplacer::new();
        for found in &placeholders {
            replacer.insert(found.read, detached(&found.init));
        }
        let mut changed = replacer.apply(&mut tree.script) > 0;

        for found in &placeholders {
            ctx.changed(
                EventKind::LiteralInlined,
                self.name(),
                found.read,
                format!("inlined placeholder '{}'", found.id.0),
            );
            if try_safe_delete(tree, &found.id) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    found.site,
                    format!("removed placeholder '{}'", found.id.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}
