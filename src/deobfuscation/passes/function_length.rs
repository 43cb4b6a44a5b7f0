//! Function-length helper removal and length hints.
//!
//! Functions whose parameters were moved onto a stack lose their declared `length`. The
//! obfuscator restores it with a helper:
//!
//! ```text
//! function h(fn, n = 0) {
//!     Object.defineProperty(fn, "length", { value: n, configurable: false });
//!     return fn;
//! }
//! h(add, 2);                                  // statement: removed
//! var mul = h(function (...s) { ... }, 2);    // value: replaced by the function
//! ```
//!
//! Each call yields a length hint (`add -> 2`, `mul -> 2`) stored in
//! [`PassHints::stack_lengths`](crate::deobfuscation::PassHints) for the stack pass. The helper
//! registered by the minified-arrow pass is never considered.

use log::debug;
use swc_core::ecma::ast::{Expr, Id};

use crate::{
    analysis::{index_value, try_safe_delete, BindingIndex},
    deobfuscation::{
        config::PassId, context::PassContext, events::EventKind, pass::Pass,
        templates::function_length,
    },
    syntax::{
        edit::{ExprReplacer, StmtEditor},
        locate_all, Located, SourceTree,
    },
    Result,
};

/// Removes the function-length helper and records the lengths it applied.
pub struct FunctionLengthPass;

impl Default for FunctionLengthPass {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionLengthPass {
    /// Creates a new function-length pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// The function a helper call applies to: a plain reference, a named function expression, or
/// the variable the call initialises.
fn target_of(found: &Located, fn_arg: &Expr) -> Option<Id> {
    match fn_arg.unwrap_parens() {
        Expr::Ident(ident) => Some(ident.to_id()),
        Expr::Fn(f) => f
            .ident
            .as_ref()
            .map(|i| i.to_id())
            .or_else(|| found.declarator.clone()),
        Expr::Arrow(_) => found.declarator.clone(),
        _ => None,
    }
}

impl Pass for FunctionLengthPass {
    fn id(&self) -> PassId {
        PassId::FunctionLength
    }

    fn description(&self) -> &'static str {
        "Removes the function-length helper and records stack length hints"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let helpers = function_length::find(tree, &bindings, ctx.hints.arrow_wrapper.as_ref());

        let mut changed = false;
        for helper in helpers {
            let located = locate_all(&tree.script, helper.calls.iter().copied());
            let mut statements = StmtEditor::new();
            let mut values = ExprReplacer::new();

            for site in &helper.calls {
                let Some(found) = located.get(site) else {
                    continue;
                };
                let Expr::Call(call) = &found.expr else {
                    continue;
                };
                let Some(fn_arg) = call.args.first().filter(|arg| arg.spread.is_none()) else {
                    continue;
                };
                let length = match call.args.get(1) {
                    Some(arg) if arg.spread.is_none() => index_value(&arg.expr),
                    Some(_) => None,
                    None => Some(0),
                };
                if let (Some(target), Some(length)) = (target_of(found, &fn_arg.expr), length) {
                    debug!("{}: '{}' has length {length}", self.name(), target.0);
                    ctx.hints.stack_lengths.insert(target, length);
                }

                match found.statement {
                    Some(statement) if matches!(&*fn_arg.expr, Expr::Ident(_)) => {
                        statements.remove(statement);
                    }
                    _ => values.insert(*site, fn_arg.expr.clone()),
                }
                ctx.changed(
                    EventKind::CallUnwrapped,
                    self.name(),
                    *site,
                    format!("removed '{}' call", helper.helper.0),
                );
            }

            changed |= statements.apply(&mut tree.script) + values.apply(&mut tree.script) > 0;

            if try_safe_delete(tree, &helper.helper) {
                ctx.changed(
                    EventKind::DeclarationRemoved,
                    self.name(),
                    helper.site,
                    format!("removed helper '{}'", helper.helper.0),
                );
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::FunctionLengthPass;
    use crate::{
        deobfuscation::{EngineConfig, Pass, PassContext},
        syntax::{with_globals, SourceTree},
        test::{normalize, run_pass},
        Result,
    };

    const HELPER: &str = "function h(fn, n = 0) {\
        Object['defineProperty'](fn, 'length', { 'value': n, 'configurable': false });\
        return fn;\
    }";

    fn lengths(source: &str) -> Result<Vec<(String, usize)>> {
        with_globals(|| {
            let mut tree = SourceTree::parse(source)?;
            let mut ctx = PassContext::new(EngineConfig::default());
            FunctionLengthPass::new().run(&mut tree, &mut ctx)?;
            let mut lengths: Vec<(String, usize)> = ctx
                .hints
                .stack_lengths
                .iter()
                .map(|(id, n)| (id.0.to_string(), *n))
                .collect();
            lengths.sort();
            Ok(lengths)
        })
    }

    #[test]
    fn test_calls_removed() -> Result<()> {
        let source = format!(
            "{HELPER} function add(...s){{ return s[0] + s[1]; }} h(add, 2); \
             var mul = h(function(...s){{ return s[0] * s[1]; }}, 2);"
        );
        let run = run_pass(&FunctionLengthPass::new(), &source)?;
        assert!(run.changed);
        assert_eq!(
            run.output,
            normalize(
                "function add(...s){ return s[0] + s[1]; } \
                 var mul = function(...s){ return s[0] * s[1]; };"
            )?
        );
        Ok(())
    }

    #[test]
    fn test_length_hints() -> Result<()> {
        let source = format!(
            "{HELPER} function add(...s){{ return s[0]; }} h(add, 2); \
             var mul = h((...s) => s[0]); var k = h(named, x);"
        );
        assert_eq!(
            lengths(&source)?,
            vec![("add".to_string(), 2), ("mul".to_string(), 0)]
        );
        Ok(())
    }
}
