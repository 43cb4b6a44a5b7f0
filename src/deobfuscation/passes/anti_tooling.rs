//! Anti-tooling decoy removal.
//!
//! The obfuscator wraps statements in calls of an empty function so that tools pattern-matching
//! on call targets see nothing useful:
//!
//! ```text
//! function d() {}                     log(1);
//! d(log(1), log(2));          ==>     log(2);
//! var x = d(f());                     var x = (f(), void 0);
//! ```
//!
//! # Algorithm
//!
//! 1. Crawl bindings and find every decoy with [`anti_tooling::find`].
//! 2. A call that forms a whole expression statement is replaced by one statement per argument,
//!    preserving evaluation order. A lone `if`, `else` or loop body becomes a block.
//! 3. A call in value position becomes a comma sequence of its arguments followed by
//!    `void 0`, which is what the decoy returned.
//! 4. Calls with spread arguments are left alone.
//! 5. The decoy is deleted once nothing references it.

use std::iter;

use log::debug;
use swc_core::{
    common::DUMMY_SP,
    ecma::ast::{Expr, SeqExpr},
};

use crate::{
    analysis::{try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        templates::anti_tooling,
    },
    syntax::{
        build::{expr_stmt, undefined},
        edit::{ExprReplacer, StmtEditor},
        locate_all, SourceTree,
    },
    Result,
};

/// Replaces calls of empty decoy functions by their arguments.
pub struct AntiToolingPass;

impl Default for AntiToolingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiToolingPass {
    /// Creates a new anti-tooling pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for AntiToolingPass {
    fn id(&self) -> PassId {
        PassId::AntiTooling
    }

    fn description(&self) -> &'static str {
        "Replaces calls of empty decoy functions by their arguments"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let decoys = anti_tooling::find(tree, &bindings);
        if decoys.is_empty() {
            return Ok(false);
        }

        let mut changed = false;
        for decoy in decoys {
            let located = locate_all(&tree.script, decoy.calls.iter().copied());
            let mut statements = StmtEditor::new();
            let mut values = ExprReplacer::new();

            for site in &decoy.calls {
                let Some(found) = located.get(site) else {
                    continue;
                };
                let Expr::Call(call) = &found.expr else {
                    continue;
                };
                if call.args.iter().any(|arg| arg.spread.is_some()) {
                    continue;
                }
                let args = call.args.iter().map(|arg| arg.expr.clone());
                match found.statement {
                    Some(statement) => statements.splice(statement, args.map(expr_stmt).collect()),
                    None => values.insert(
                        *site,
                        Box::new(Expr::Seq(SeqExpr {
                            span: DUMMY_SP,
                            exprs: args.chain(iter::once(Box::new(undefined()))).collect(),
                        })),
                    ),
                }
            }

            // statements first: a spliced argument may itself be a decoy call in value position
            let mut applied = statements.apply_sites(&mut tree.script);
            applied.extend(values.apply_sites(&mut tree.script));
            debug!("{}: unwrapped {} call(s) of '{}'", self.name(), applied.len(), decoy.decoy.0);
            for site in decoy.calls.iter().filter(|site| applied.contains(site)) {
                ctx.changed(
                    EventKind::CallUnwrapped,
                    self.name(),
                    *site,
                    format!("unwrapped call of decoy '{}'", decoy.decoy.0),
                );
            }
            changed |= !applied.is_empty();

            if try_safe_delete(tree, &decoy.decoy) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    decoy.site,
                    format!("removed decoy '{}'", decoy.decoy.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::AntiToolingPass;
    use crate::{
        deobfuscation::{EventKind, Pass},
        test::{normalize, run_pass},
        Result,
    };

    #[test]
    fn test_pass_metadata() {
        let pass = AntiToolingPass::new();
        assert_eq!(pass.name(), "anti-tooling");
        assert!(!pass.description().is_empty());
    }

    #[test]
    fn test_statement_calls_are_spliced() -> Result<()> {
        let run = run_pass(&AntiToolingPass::new(), "function f(){} f(log(1), log(2));")?;
        assert!(run.changed);
        assert_eq!(run.output, normalize("log(1); log(2);")?);
        assert_eq!(run.ctx.events.count_kind(EventKind::CallUnwrapped), 1);
        assert_eq!(run.ctx.events.count_kind(EventKind::DeclarationRemoved), 1);
        Ok(())
    }

    #[test]
    fn test_value_position_keeps_undefined() -> Result<()> {
        let run = run_pass(&AntiToolingPass::new(), "function f(){} var x = f(g());")?;
        assert_eq!(run.output, normalize("var x = (g(), void 0);")?);
        Ok(())
    }

    #[test]
    fn test_spread_call_keeps_decoy() -> Result<()> {
        let source = "function f(){} f(...xs); f(a);";
        let run = run_pass(&AntiToolingPass::new(), source)?;
        assert_eq!(run.output, normalize("function f(){} f(...xs); a;")?);
        Ok(())
    }

    #[test]
    fn test_nothing_to_do() -> Result<()> {
        let source = "function f(a){ return a; } f(1);";
        let run = run_pass(&AntiToolingPass::new(), source)?;
        assert!(!run.changed);
        assert_eq!(run.output, normalize(source)?);
        Ok(())
    }

    #[test]
    fn test_lone_body_becomes_block() -> Result<()> {
        let run = run_pass(
            &AntiToolingPass::new(),
            "function d(){} if (c) d(log(1), log(2)); else d(log(3)); while (c) d(log(4), log(5));",
        )?;
        assert_eq!(
            run.output,
            normalize("if (c) { log(1); log(2); } else log(3); while (c) { log(4); log(5); }")?
        );
        assert_eq!(run.ctx.events.count_kind(EventKind::CallUnwrapped), 3);
        assert_eq!(run.ctx.events.count_kind(EventKind::DeclarationRemoved), 1);
        Ok(())
    }

    #[test]
    fn test_reassigned_decoy_is_kept() -> Result<()> {
        let source = "function d(){} d = real; d(log(1));";
        let run = run_pass(&AntiToolingPass::new(), source)?;
        assert!(!run.changed);
        assert_eq!(run.output, normalize(source)?);
        assert_eq!(run.ctx.events.count_kind(EventKind::CallUnwrapped), 0);
        Ok(())
    }
}
