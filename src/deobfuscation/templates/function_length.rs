//! The function-length helper of stack virtualisation.
//!
//! ```text
//! function setLength(fn, n = 0) {
//!     Object.defineProperty(fn, "length", { value: n, configurable: false });
//!     return fn;
//! }
//! setLength(add, 2);
//! ```
//!
//! Once parameters move onto a rest stack the function's `length` reads 0, so the obfuscator
//! restores it with this helper. Each call tells how many parameters the function declared.
//! The helper is found by its `defineProperty`-style call: first argument the helper's own
//! first parameter, third argument an object with exactly the keys `value` and `configurable`.
//! A reassigned helper is not trusted.

use swc_core::ecma::{
    ast::{ArrowExpr, CallExpr, Expr, ExprOrSpread, Function, Id, Prop, PropOrSpread},
    visit::{Visit, VisitWith},
};

use crate::{
    analysis::{prop_name_key, BindingIndex},
    deobfuscation::templates::{for_each_callable, TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// The helper and its calls.
#[derive(Debug, Clone)]
pub struct FunctionLengthMatch {
    /// The helper.
    pub helper: Id,
    /// Range of its declaration.
    pub site: SiteKey,
    /// Calls of the helper.
    pub calls: Vec<SiteKey>,
}

impl TemplateMatch for FunctionLengthMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Stack
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!("function-length helper '{}'", self.helper.0)
    }
}

/// Finds the helper, skipping `exclude` (the arrow wrapper, which has a similar call).
#[must_use]
pub fn find(
    tree: &SourceTree,
    bindings: &BindingIndex,
    exclude: Option<&Id>,
) -> Vec<FunctionLengthMatch> {
    let mut found = Vec::new();
    for_each_callable(&tree.script, |callable| {
        if exclude == Some(&callable.id) {
            return;
        }
        let (Some(target), Some(body)) = (callable.param_id(0), callable.body) else {
            return;
        };
        let mut finder = DescriptorCall {
            target: &target,
            found: false,
        };
        body.visit_with(&mut finder);
        if !finder.found {
            return;
        }
        let Some(binding) = bindings.get(&callable.id).filter(|b| b.is_constant()) else {
            return;
        };
        found.push(FunctionLengthMatch {
            helper: callable.id.clone(),
            site: callable.site,
            calls: binding.calls().filter_map(|r| r.call_site()).collect(),
        });
    });
    found
}

/// Looks for `_(target, _, { value: _, configurable: _ })` outside nested functions.
struct DescriptorCall<'a> {
    target: &'a Id,
    found: bool,
}

impl Visit for DescriptorCall<'_> {
    fn visit_call_expr(&mut self, n: &CallExpr) {
        if let [ExprOrSpread { spread: None, expr: first }, _, ExprOrSpread { spread: None, expr: descriptor }, ..] =
            n.args.as_slice()
        {
            let on_target = matches!(&**first, Expr::Ident(i) if i.to_id() == *self.target);
            if on_target && is_length_descriptor(descriptor) {
                self.found = true;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_function(&mut self, _: &Function) {}

    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}
}

fn is_length_descriptor(expr: &Expr) -> bool {
    let Expr::Object(obj) = expr.unwrap_parens() else {
        return false;
    };
    let keys: Vec<Option<String>> = obj
        .props
        .iter()
        .map(|prop| match prop {
            PropOrSpread::Prop(prop) => match &**prop {
                Prop::KeyValue(kv) => prop_name_key(&kv.key),
                _ => None,
            },
            PropOrSpread::Spread(_) => None,
        })
        .collect();
    matches!(
        keys.as_slice(),
        [Some(value), Some(configurable)] if value == "value" && configurable == "configurable"
    )
}

#[cfg(test)]
mod tests {
    use super::find;
    use crate::{
        analysis::BindingIndex,
        syntax::{with_globals, SourceTree},
        Result,
    };

    const HELPER: &str = "function h(fn, n = 0) {\
        Object['defineProperty'](fn, 'length', { 'value': n, 'configurable': false });\
        return fn;\
    }";

    #[test]
    fn test_finds_helper() -> Result<()> {
        with_globals(|| {
            let source = format!("{HELPER} function add(...s){{}} h(add, 2);");
            let tree = SourceTree::parse(&source)?;
            let bindings = BindingIndex::crawl(&tree.script);
            let found = find(&tree, &bindings, None);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].calls.len(), 1);

            let helper = found[0].helper.clone();
            assert!(find(&tree, &bindings, Some(&helper)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_other_descriptors() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function h(fn){ Object.defineProperty(fn, 'x', { get: g, configurable: true }); }",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script), None).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_helper() -> Result<()> {
        with_globals(|| {
            let source = format!("{HELPER} function add(...s){{}} h = other; h(add, 2);");
            let tree = SourceTree::parse(&source)?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script), None).is_empty());
            Ok(())
        })
    }
}
