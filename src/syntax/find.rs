//! Read-only lookup of expressions by site.

use std::collections::{HashMap, HashSet};

use swc_core::{
    common::Spanned,
    ecma::{
        ast::{Expr, ExprStmt, Id, Pat, Script, VarDeclarator},
        visit::{Visit, VisitWith},
    },
};

use crate::syntax::SiteKey;

/// An expression found by its site, with its parent when that matters to a rewrite.
#[derive(Debug, Clone)]
pub struct Located {
    /// Copy of the expression.
    pub expr: Expr,
    /// Site of the expression statement this expression is the whole of.
    pub statement: Option<SiteKey>,
    /// Variable this expression initialises.
    pub declarator: Option<Id>,
}

/// Finds the expression at `site`.
#[must_use]
pub fn locate(script: &Script, site: SiteKey) -> Option<Located> {
    locate_all(script, [site]).remove(&site)
}

/// Finds the expressions at all `sites` in one traversal.
pub fn locate_all(
    script: &Script,
    sites: impl IntoIterator<Item = SiteKey>,
) -> HashMap<SiteKey, Located> {
    let mut locator = Locator {
        targets: sites.into_iter().filter(|s| !s.is_synthetic()).collect(),
        found: HashMap::new(),
    };
    if !locator.targets.is_empty() {
        script.visit_with(&mut locator);
    }
    locator.found
}

struct Locator {
    targets: HashSet<SiteKey>,
    found: HashMap<SiteKey, Located>,
}

impl Locator {
    fn record(&mut self, expr: &Expr, statement: Option<SiteKey>, declarator: Option<Id>) {
        let site = SiteKey::of(expr.span());
        if self.targets.contains(&site) {
            self.found.entry(site).or_insert_with(|| Located {
                expr: expr.clone(),
                statement,
                declarator,
            });
        }
    }
}

impl Visit for Locator {
    fn visit_expr_stmt(&mut self, n: &ExprStmt) {
        self.record(&n.expr, Some(SiteKey::of(n.span)), None);
        n.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        if let (Pat::Ident(name), Some(init)) = (&n.name, &n.init) {
            self.record(init, None, Some(name.id.to_id()));
        }
        n.visit_children_with(self);
    }

    fn visit_expr(&mut self, n: &Expr) {
        self.record(n, None, None);
        n.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::ast::{Decl, Expr, Stmt};

    use super::locate;
    use crate::{
        syntax::{with_globals, SiteKey, SourceTree},
        Result,
    };

    #[test]
    fn test_locate_statement_and_declarator() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("f(1); var x = g(2);")?;
            let Stmt::Expr(call) = &tree.script.body[0] else {
                panic!("expected statement");
            };
            let found = locate(&tree.script, SiteKey::from_node(&*call.expr)).expect("call");
            assert_eq!(found.statement, Some(SiteKey::of(call.span)));
            assert!(matches!(found.expr, Expr::Call(_)));

            let Stmt::Decl(Decl::Var(var)) = &tree.script.body[1] else {
                panic!("expected declaration");
            };
            let init = var.decls[0].init.as_deref().expect("init");
            let found = locate(&tree.script, SiteKey::from_node(init)).expect("init");
            assert_eq!(found.declarator.map(|id| id.0.to_string()), Some("x".into()));
            assert!(found.statement.is_none());
            Ok(())
        })
    }
}
