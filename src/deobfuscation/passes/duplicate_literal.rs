//! Duplicate-literal inlining.
//!
//! Repeated literals are hoisted into an array returned by a factory and read back through an
//! accessor:
//!
//! ```text
//! function arr() { return ["a", "b", "c"]; }
//! var A = arr();                                  use("b");
//! function get(i) { return A[i]; }        ==>
//! use(get(1));
//! ```
//!
//! The array may also be declared bare and assigned later (`var A; ... A = arr();`); the
//! assignment is then appended to the prelude. Every accessor call with literal arguments is
//! evaluated in its own sandbox and replaced by the value. When the array has no readers left,
//! its assignment, declaration and factory are removed.

use log::debug;

use crate::{
    analysis::{try_safe_delete, try_safe_delete_all, BindingIndex},
    deobfuscation::{
        config::PassId,
        context::PassContext,
        events::{truncate_string, EventKind},
        pass::Pass,
        passes::utils::{closure_of, is_literal_call, record_removals},
        templates::duplicate_literal::{self, DuplicateLiteralMatch},
    },
    syntax::{
        edit::{ExprReplacer, StmtEditor},
        locate, locate_all, SourceTree,
    },
    Result,
};

/// Inlines literals hoisted into a factory array.
pub struct DuplicateLiteralPass;

impl Default for DuplicateLiteralPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateLiteralPass {
    /// Creates a new duplicate-literal pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Prelude text declaring the factory, the array and the accessors, with the assignment
    /// that fills the array when it is not the declarator.
    fn prelude(tree: &SourceTree, found: &DuplicateLiteralMatch) -> Result<Option<String>> {
        let ids = [&found.factory, &found.array].into_iter().chain(&found.accessors);
        let Some(closure) = closure_of(&tree.script, ids) else {
            return Ok(None);
        };
        let mut prelude = closure.prelude(tree)?;
        if let Some(assignment) = found.assignment {
            let Some(assign) = locate(&tree.script, assignment) else {
                return Ok(None);
            };
            prelude.push_str(&tree.print_expr(&assign.expr)?);
        }
        Ok(Some(prelude))
    }

    /// Removes the array once nothing reads it, then the factory.
    fn remove_array(
        &self,
        tree: &mut SourceTree,
        ctx: &PassContext,
        found: &DuplicateLiteralMatch,
    ) {
        let bindings = BindingIndex::crawl(&tree.script);
        if bindings.get(&found.array).is_some_and(|b| b.is_referenced()) {
            return;
        }

        if let Some(assignment) = found.assignment {
            if let Some(statement) = locate(&tree.script, assignment).and_then(|l| l.statement) {
                let mut editor = StmtEditor::new();
                editor.remove(statement);
                if editor.apply(&mut tree.script) > 0 {
                    ctx.changed(
                        EventKind::StatementRemoved,
                        self.name(),
                        statement,
                        format!("removed fill of '{}'", found.array.0),
                    );
                }
            }
        }
        if try_safe_delete(tree, &found.array) {
            ctx.changed(
                EventKind::DeclarationRemoved,
                self.name(),
                found.site,
                format!("removed array '{}'", found.array.0),
            );
        }
        if try_safe_delete(tree, &found.factory) {
            ctx.changed(
                EventKind::DeclarationRemoved,
                self.name(),
                found.site,
                format!("removed factory '{}'", found.factory.0),
            );
        }
    }
}

impl Pass for DuplicateLiteralPass {
    fn id(&self) -> PassId {
        PassId::DuplicateLiteral
    }

    fn description(&self) -> &'static str {
        "Inlines literals hoisted into a factory array"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let arrays = duplicate_literal::find(tree, &bindings);

        let mut changed = false;
        for found in arrays {
            let Some(prelude) = Self::prelude(tree, &found)? else {
                debug!("{}: '{}' has no standalone declaration", self.name(), found.array.0);
                continue;
            };

            let bindings = BindingIndex::crawl(&tree.script);
            let calls: Vec<_> = found
                .accessors
                .iter()
                .filter_map(|accessor| bindings.get(accessor))
                .flat_map(|b| b.calls().filter_map(|r| r.call_site()))
                .collect();

            let located = locate_all(&tree.script, calls.iter().copied());
            let mut replacer = ExprReplacer::new();
            for site in &calls {
                let Some(call) = located.get(site).filter(|f| is_literal_call(&f.expr)) else {
                    continue;
                };
                let target = tree.print_expr(&call.expr)?;
                let outcome = ctx.sandbox.evaluate_source(&prelude, &target)?;
                let Some(value) = ctx.accept(self.name(), *site, outcome) else {
                    continue;
                };
                ctx.changed(
                    EventKind::LiteralInlined,
                    self.name(),
                    *site,
                    format!("inlined {}", truncate_string(&value.to_string(), 60)),
                );
                replacer.insert(*site, value.to_expr(tree)?);
            }
            changed |= replacer.apply(&mut tree.script) > 0;

            let removed = try_safe_delete_all(tree, &found.accessors);
            record_removals(ctx, self.name(), found.site, removed, "accessors");
            changed |= removed > 0;
            self.remove_array(tree, ctx, &found);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::DuplicateLiteralPass;
    use crate::{
        deobfuscation::EventKind,
        test::{normalize, run_pass},
        Result,
    };

    #[test]
    fn test_declarator_form() -> Result<()> {
        let run = run_pass(
            &DuplicateLiteralPass::new(),
            "function arr(){ return ['a','b','c']; } var A = arr(); \
             function get(i){ return A[i]; } use(get(1), get(1));",
        )?;
        assert!(run.changed);
        assert_eq!(run.output, normalize(r#"use("b", "b");"#)?);
        assert_eq!(run.ctx.events.count_kind(EventKind::LiteralInlined), 2);
        Ok(())
    }

    #[test]
    fn test_assignment_form() -> Result<()> {
        let run = run_pass(
            &DuplicateLiteralPass::new(),
            "var A; function arr(){ return [1, 2]; } A = arr(); \
             var get = (i) => A[i - 1]; use(get(2));",
        )?;
        assert_eq!(run.output, normalize("use(2);")?);
        Ok(())
    }

    #[test]
    fn test_remaining_reader_keeps_array() -> Result<()> {
        let run = run_pass(
            &DuplicateLiteralPass::new(),
            "function arr(){ return ['x']; } var A = arr(); \
             function get(i){ return A[i]; } use(get(0), get(k));",
        )?;
        assert_eq!(
            run.output,
            normalize(
                "function arr(){ return ['x']; } var A = arr(); \
                 function get(i){ return A[i]; } use(\"x\", get(k));"
            )?
        );
        Ok(())
    }
}
