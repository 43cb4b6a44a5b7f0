//! Opaque predicates.
//!
//! ```text
//! var P = (function () {
//!     var o = {};
//!     o.n = 7;
//!     Object.defineProperty(o, "list", { get: function () { return [1, 2]; } });
//!     return o;
//! })();
//! var r = P.n > 3 ? real() : decoy();
//! ```
//!
//! An object built by an immediately invoked function and used only inside conditional tests.
//! A test qualifies when it reads no name other than the object, so evaluating it alone gives
//! the value it has in the program.

use std::collections::HashSet;

use swc_core::ecma::{
    ast::{Callee, Decl, Expr, Id, Stmt},
    visit::{Visit, VisitWith},
};

use crate::{
    analysis::{find_declaration, BindingIndex, ReferenceRole},
    deobfuscation::templates::{TemplateKind, TemplateMatch},
    syntax::{locate_all, SiteKey, SourceTree},
};

/// A predicate object and the tests that read it.
#[derive(Debug, Clone)]
pub struct OpaquePredicateMatch {
    /// The object binding.
    pub object: Id,
    /// Conditional tests reading only the object, in source order.
    pub tests: Vec<SiteKey>,
    /// Range of the declaring identifier.
    pub site: SiteKey,
}

impl TemplateMatch for OpaquePredicateMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::OpaquePredicate
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!("predicate object '{}' in {} test(s)", self.object.0, self.tests.len())
    }
}

/// Finds predicate objects.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<OpaquePredicateMatch> {
    bindings
        .iter()
        .filter(|b| b.is_constant() && b.is_referenced())
        .filter(|b| {
            b.references
                .iter()
                .all(|r| r.role == ReferenceRole::MemberObject && r.test_site.is_some())
        })
        .filter(|b| built_by_iife(tree, &b.id))
        .filter_map(|binding| {
            let mut seen = HashSet::new();
            let sites: Vec<SiteKey> = binding
                .references
                .iter()
                .filter_map(|r| r.test_site)
                .filter(|site| seen.insert(*site))
                .collect();
            let located = locate_all(&tree.script, sites.iter().copied());
            let tests: Vec<SiteKey> = sites
                .into_iter()
                .filter(|site| {
                    located
                        .get(site)
                        .is_some_and(|found| reads_only(&found.expr, &binding.id))
                })
                .collect();
            (!tests.is_empty()).then(|| OpaquePredicateMatch {
                object: binding.id.clone(),
                tests,
                site: binding.site(),
            })
        })
        .collect()
}

fn built_by_iife(tree: &SourceTree, id: &Id) -> bool {
    let Some(declaration) = find_declaration(&tree.script, id) else {
        return false;
    };
    let Stmt::Decl(Decl::Var(var)) = &declaration.stmt else {
        return false;
    };
    let init = var.decls.first().and_then(|d| d.init.as_deref());
    let Some(Expr::Call(call)) = init.map(Expr::unwrap_parens) else {
        return false;
    };
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    call.args.is_empty() && matches!(callee.unwrap_parens(), Expr::Fn(_) | Expr::Arrow(_))
}

/// True if every identifier `expr` reads is `id`.
fn reads_only(expr: &Expr, id: &Id) -> bool {
    struct Reads<'a> {
        id: &'a Id,
        foreign: bool,
    }
    impl Visit for Reads<'_> {
        fn visit_expr(&mut self, n: &Expr) {
            match n {
                Expr::Ident(ident) => self.foreign |= ident.to_id() != *self.id,
                _ => n.visit_children_with(self),
            }
        }
    }
    let mut reads = Reads { id, foreign: false };
    expr.visit_with(&mut reads);
    !reads.foreign
}
