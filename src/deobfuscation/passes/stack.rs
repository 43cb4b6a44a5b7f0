//! Parameter stack resolution.
//!
//! Runs [`StackInterpreter`] rounds until the tree stops changing, folding constants between
//! rounds so that a slot computed from other slots (`s[1] = s[0] * 3`) becomes a literal the
//! next round can propagate.
//!
//! The pipeline runs this pass twice: once right after the function-length helper has recorded
//! length hints, and again after placeholders and string decoding have turned more writes into
//! literals.

use log::debug;
use swc_core::ecma::visit::VisitMutWith;

use crate::{
    analysis::BindingIndex,
    deobfuscation::{
        config::PassId,
        context::PassContext,
        events::EventKind,
        pass::Pass,
        stack::{StackInterpreter, StackReport},
    },
    syntax::{ConstantFolder, SourceTree},
    Result,
};

/// Resolves parameters virtualised onto an indexed stack.
pub struct StackPass;

impl Default for StackPass {
    fn default() -> Self {
        Self::new()
    }
}

impl StackPass {
    /// Creates a new stack pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn record(&self, ctx: &PassContext, report: &StackReport) {
        if let Some(reason) = report.declined {
            debug!("{}: stack '{}' declined: {reason}", self.name(), report.stack.0);
            return;
        }
        for site in &report.resolved {
            ctx.changed(
                EventKind::StackSlotResolved,
                self.name(),
                *site,
                format!("resolved read of stack '{}'", report.stack.0),
            );
        }
        if report.dropped_writes > 0 {
            ctx.changed(
                EventKind::StatementRemoved,
                self.name(),
                report.function,
                format!(
                    "dropped {} unread write(s) to stack '{}'",
                    report.dropped_writes, report.stack.0
                ),
            );
        }
        if report.removed {
            ctx.changed(
                EventKind::DeclarationRemoved,
                self.name(),
                report.function,
                format!("removed stack '{}'", report.stack.0),
            );
        }
    }
}

impl Pass for StackPass {
    fn id(&self) -> PassId {
        PassId::Stack
    }

    fn description(&self) -> &'static str {
        "Resolves parameters virtualised onto an indexed stack"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let folder = ConstantFolder::new(tree.unresolved_mark());
        let mut changed = false;

        for round in 0..ctx.config.stack_max_iterations {
            let bindings = BindingIndex::crawl(&tree.script);
            let mut interpreter =
                StackInterpreter::new(&bindings, &ctx.hints.stack_lengths, tree.unresolved_mark());
            tree.script.visit_mut_with(&mut interpreter);
            let reports = interpreter.into_reports();

            for report in &reports {
                self.record(ctx, report);
            }
            if !reports.iter().any(StackReport::changed) {
                debug!("{}: fixpoint after {round} round(s)", self.name());
                break;
            }
            changed = true;
            folder.fold(&mut tree.script);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::StackPass;
    use crate::{
        deobfuscation::{
            passes::FunctionLengthPass, EngineConfig, EventKind, Pass, PassContext,
        },
        syntax::{with_globals, SourceTree},
        test::{normalize, run_pass},
        Result,
    };

    #[test]
    fn test_local_array() -> Result<()> {
        let run = run_pass(
            &StackPass::new(),
            "function f(){var s=[]; s[0]=arguments[0]; s[1]=5; return s[0]+s[1]}",
        )?;
        assert!(run.changed);
        assert_eq!(run.output, normalize("function f(){ return arguments[0] + 5; }")?);
        assert!(run.ctx.events.count_kind(EventKind::StackSlotResolved) >= 2);
        Ok(())
    }

    #[test]
    fn test_declined_stack_is_untouched() -> Result<()> {
        let source = "function f(...s){ s[1] = 1; log(s); return s[1]; }";
        let run = run_pass(&StackPass::new(), source)?;
        assert!(!run.changed);
        assert_eq!(run.output, normalize(source)?);
        assert!(run.ctx.events.is_empty());
        Ok(())
    }

    #[test]
    fn test_length_hint_from_helper() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse(
                "function h(fn, n){ Object.defineProperty(fn, 'length', { value: n, configurable: true }); return fn; } \
                 function f(...s){ s[2] = 4; return s[0] + s[2]; } h(f, 1);",
            )?;
            let mut ctx = PassContext::new(EngineConfig::default());
            FunctionLengthPass::new().run(&mut tree, &mut ctx)?;
            StackPass::new().run(&mut tree, &mut ctx)?;
            assert_eq!(
                tree.generate()?,
                normalize("function f(...s){ return s[0] + 4; }")?
            );
            Ok(())
        })
    }
}
