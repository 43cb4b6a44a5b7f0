//! Minified-arrow unwrapping.
//!
//! Arrow functions have no `arguments`, so when the obfuscator rewrites one it passes it
//! through a helper that returns a plain forwarding function with the original `length`:
//!
//! ```text
//! function w(fn, len = 0) { ... }
//! var add = w((a, b) => a + b, 2);      ==>     var add = (a, b) => a + b;
//! ```
//!
//! Every call of the helper is replaced by its first argument. The wrapper's name is recorded in
//! the pass hints, because the function-length helper has the same trailing
//! `Object.defineProperty` call and must not claim it.

use log::debug;
use swc_core::ecma::ast::Expr;

use crate::{
    analysis::{try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        templates::minified_arrow,
    },
    syntax::{edit::ExprReplacer, locate_all, SourceTree},
    Result,
};

/// Replaces calls of the arrow rewrapping helper by the wrapped function.
pub struct MinifiedArrowPass;

impl Default for MinifiedArrowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl MinifiedArrowPass {
    /// Creates a new minified-arrow pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for MinifiedArrowPass {
    fn id(&self) -> PassId {
        PassId::MinifiedArrow
    }

    fn description(&self) -> &'static str {
        "Replaces calls of the arrow rewrapping helper by the wrapped function"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let wrappers = minified_arrow::find(tree, &bindings);

        let mut changed = false;
        for wrapper in wrappers {
            ctx.hints.arrow_wrapper = Some(wrapper.wrapper.clone());

            let located = locate_all(&tree.script, wrapper.calls.iter().copied());
            let mut replacer = ExprReplacer::new();
            for site in &wrapper.calls {
                let Some(Expr::Call(call)) = located.get(site).map(|found| &found.expr) else {
                    continue;
                };
                let Some(first) = call.args.first().filter(|arg| arg.spread.is_none()) else {
                    continue;
                };
                replacer.insert(*site, first.expr.clone());
                ctx.changed(
                    EventKind::CallUnwrapped,
                    self.name(),
                    *site,
                    format!("unwrapped '{}' call", wrapper.wrapper.0),
                );
            }
            for site in &wrapper.other_uses {
                ctx.events
                    .record(EventKind::Warning)
                    .at(site.offset())
                    .pass(self.name())
                    .message(format!("'{}' used as a value; left in place", wrapper.wrapper.0));
            }

            let applied = replacer.apply(&mut tree.script);
            debug!("{}: unwrapped {applied} call(s) of '{}'", self.name(), wrapper.wrapper.0);
            changed |= applied > 0;

            if try_safe_delete(tree, &wrapper.wrapper) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    wrapper.site,
                    format!("removed wrapper '{}'", wrapper.wrapper.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::MinifiedArrowPass;
    use crate::{
        deobfuscation::EventKind,
        test::{normalize, run_pass},
        Result,
    };

    const WRAPPER: &str = "function w(fn, len = 0) {\
        var f = function () { return fn(...arguments); };\
        return Object.defineProperty(f, 'length', { value: len, configurable: true });\
    }";

    #[test]
    fn test_calls_are_unwrapped() -> Result<()> {
        let source = format!("{WRAPPER} var add = w((a, b) => a + b, 2); add(1, 2);");
        let run = run_pass(&MinifiedArrowPass::new(), &source)?;
        assert!(run.changed);
        assert_eq!(run.output, normalize("var add = (a, b) => a + b; add(1, 2);")?);
        assert!(run.ctx.hints.arrow_wrapper.is_some());
        Ok(())
    }

    #[test]
    fn test_value_use_keeps_wrapper() -> Result<()> {
        let source = format!("{WRAPPER} var g = w(() => 1); register(w);");
        let run = run_pass(&MinifiedArrowPass::new(), &source)?;
        assert_eq!(
            run.output,
            normalize(&format!("{WRAPPER} var g = () => 1; register(w);"))?
        );
        assert_eq!(run.ctx.events.count_kind(EventKind::Warning), 1);
        Ok(())
    }
}
