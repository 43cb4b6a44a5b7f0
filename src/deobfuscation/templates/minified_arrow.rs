//! The arrow-function rewrapping helper.
//!
//! ```text
//! function w(fn, len = 0) {
//!     var f = function () { return fn(...arguments); };
//!     return Object.defineProperty(f, "length", { value: len, configurable: true });
//! }
//! var add = w((a, b) => a + b, 2);
//! ```
//!
//! The helper only exists to give an arrow function a `length`. The shape is checked
//! structurally: a first parameter, a body of exactly two statements, the first declaring a
//! function that forwards `...arguments` to that parameter, the second returning a call whose
//! first argument is the forwarding function.

use swc_core::ecma::ast::{Callee, Decl, Expr, ExprOrSpread, Id, Pat, ReturnStmt, Stmt};

use crate::{
    analysis::{BindingIndex, ReferenceRole},
    deobfuscation::templates::{for_each_callable, TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// The wrapper helper and its uses.
#[derive(Debug, Clone)]
pub struct MinifiedArrowMatch {
    /// The helper.
    pub wrapper: Id,
    /// Range of its declaration.
    pub site: SiteKey,
    /// Calls of the helper.
    pub calls: Vec<SiteKey>,
    /// References that are not calls; left alone.
    pub other_uses: Vec<SiteKey>,
}

impl TemplateMatch for MinifiedArrowMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::MinifiedArrow
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!("arrow wrapper '{}' ({} calls)", self.wrapper.0, self.calls.len())
    }
}

/// Finds the wrapper helper.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<MinifiedArrowMatch> {
    let mut found = Vec::new();
    for_each_callable(&tree.script, |callable| {
        if !callable.is_declaration() {
            return;
        }
        let (Some(target), Some(body)) = (callable.param_id(0), callable.body) else {
            return;
        };
        let [first, second] = body else {
            return;
        };
        let Some(forwarder) = forwarding_function(first, &target) else {
            return;
        };
        if !returns_call_on(second, &forwarder) {
            return;
        }
        let Some(binding) = bindings.get(&callable.id).filter(|b| b.is_constant()) else {
            return;
        };
        let (calls, other_uses) = binding
            .references
            .iter()
            .partition::<Vec<_>, _>(|r| r.role == ReferenceRole::Callee);
        found.push(MinifiedArrowMatch {
            wrapper: callable.id.clone(),
            site: callable.site,
            calls: calls.iter().filter_map(|r| r.call_site()).collect(),
            other_uses: other_uses.iter().map(|r| r.site).collect(),
        });
    });
    found
}

/// `var f = function () { return target(...arguments); }`, returning `f`.
fn forwarding_function(stmt: &Stmt, target: &Id) -> Option<Id> {
    let Stmt::Decl(Decl::Var(var)) = stmt else {
        return None;
    };
    let [declarator] = var.decls.as_slice() else {
        return None;
    };
    let Pat::Ident(name) = &declarator.name else {
        return None;
    };
    let Expr::Fn(fn_expr) = declarator.init.as_deref()?.unwrap_parens() else {
        return None;
    };
    let [Stmt::Return(ReturnStmt { arg: Some(arg), .. })] =
        fn_expr.function.body.as_ref()?.stmts.as_slice()
    else {
        return None;
    };
    let Expr::Call(call) = arg.unwrap_parens() else {
        return None;
    };
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let forwards = matches!(&**callee, Expr::Ident(i) if i.to_id() == *target)
        && matches!(
            call.args.as_slice(),
            [ExprOrSpread { spread: Some(_), expr }]
                if matches!(&**expr, Expr::Ident(i) if &*i.sym == "arguments")
        );
    forwards.then(|| name.id.to_id())
}

fn returns_call_on(stmt: &Stmt, forwarder: &Id) -> bool {
    let Stmt::Return(ReturnStmt { arg: Some(arg), .. }) = stmt else {
        return false;
    };
    let Expr::Call(call) = arg.unwrap_parens() else {
        return false;
    };
    matches!(
        call.args.first(),
        Some(ExprOrSpread { spread: None, expr }) if matches!(&**expr, Expr::Ident(i) if i.to_id() == *forwarder)
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

    const WRAPPER: &str = "function w(fn, len = 0) {\
        var f = function () { return fn(...arguments); };\
        return Object.defineProperty(f, 'length', { value: len, configurable: true });\
    }";

    #[test]
    fn test_finds_wrapper() -> Result<()> {
        with_globals(|| {
            let source = format!("{WRAPPER} var add = w((a, b) => a + b, 2); var x = w;");
            let tree = SourceTree::parse(&source)?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            assert_eq!(&*found[0].wrapper.0, "w");
            assert_eq!(found[0].calls.len(), 1);
            assert_eq!(found[0].other_uses.len(), 1);
            Ok(())
        })
    }

    #[test]
    fn test_declines_other_forwarders() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function w(fn){ var f = function(){ return other(...arguments); }; return g(f); }",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_wrapper() -> Result<()> {
        with_globals(|| {
            let source = format!("{WRAPPER} w = other; var add = w((a, b) => a + b, 2);");
            let tree = SourceTree::parse(&source)?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }
}
