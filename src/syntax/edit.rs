//! In-place tree editors keyed by [`SiteKey`].
//!
//! Matchers never hold references into the tree. They describe rewrites as site keys plus
//! replacement nodes, and one of the editors below applies them in a single mutable traversal.
//! Every editor reports how many of its edits were applied; an edit whose site no longer exists
//! is silently dropped.

use std::collections::{HashMap, HashSet};

use swc_core::{
    common::{util::take::Take, Spanned, DUMMY_SP},
    ecma::{
        ast::{BlockStmt, Decl, EmptyStmt, Expr, ForStmt, Pat, Script, Stmt, VarDeclOrExpr},
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::{analysis::is_pure, syntax::SiteKey};

/// Replaces expressions found at given sites.
#[derive(Default)]
pub struct ExprReplacer {
    replacements: HashMap<SiteKey, Box<Expr>>,
    applied: HashSet<SiteKey>,
}

impl ExprReplacer {
    /// Creates an empty replacer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the expression at `site` to be replaced by `expr`.
    pub fn insert(&mut self, site: SiteKey, expr: Box<Expr>) {
        if !site.is_synthetic() {
            self.replacements.insert(site, expr);
        }
    }

    /// Number of scheduled replacements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    /// True if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Applies all scheduled replacements and returns how many were made.
    pub fn apply(self, script: &mut Script) -> usize {
        self.apply_to(script)
    }

    /// Applies the replacements within any subtree, such as a single function body.
    pub fn apply_to<N: VisitMutWith<Self>>(self, node: &mut N) -> usize {
        self.apply_sites(node).len()
    }

    /// Applies the replacements within `node` and returns the sites that were replaced.
    pub fn apply_sites<N: VisitMutWith<Self>>(mut self, node: &mut N) -> HashSet<SiteKey> {
        if !self.replacements.is_empty() {
            node.visit_mut_with(&mut self);
        }
        self.applied
    }
}

impl VisitMut for ExprReplacer {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.replacements.is_empty() {
            return;
        }
        let site = SiteKey::of(expr.span());
        if let Some(replacement) = self.replacements.remove(&site) {
            *expr = *replacement;
            self.applied.insert(site);
            return;
        }
        expr.visit_mut_children_with(self);
    }
}

/// Removes statements or splices replacement statement lists in their place.
///
/// A statement standing alone as the body of an `if`, loop or label is replaced by a block of
/// its replacement, or by an empty statement when removed.
#[derive(Default)]
pub struct StmtEditor {
    remove: HashSet<SiteKey>,
    splice: HashMap<SiteKey, Vec<Stmt>>,
    applied: HashSet<SiteKey>,
}

impl StmtEditor {
    /// Creates an empty editor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the statement at `site` for removal.
    pub fn remove(&mut self, site: SiteKey) {
        if !site.is_synthetic() {
            self.remove.insert(site);
        }
    }

    /// Schedules the statement at `site` to be replaced by `stmts` (possibly empty).
    pub fn splice(&mut self, site: SiteKey, stmts: Vec<Stmt>) {
        if !site.is_synthetic() {
            self.splice.insert(site, stmts);
        }
    }

    /// True if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.splice.is_empty()
    }

    /// Applies all scheduled edits and returns how many were made.
    pub fn apply(self, script: &mut Script) -> usize {
        self.apply_sites(script).len()
    }

    /// Applies all scheduled edits and returns the sites that were edited.
    pub fn apply_sites(mut self, script: &mut Script) -> HashSet<SiteKey> {
        if !self.is_empty() {
            script.visit_mut_with(&mut self);
        }
        self.applied
    }
}

impl VisitMut for StmtEditor {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        // list members are edited in place below, not as lone bodies
        for stmt in stmts.iter_mut() {
            stmt.visit_mut_children_with(self);
        }
        if self.is_empty() {
            return;
        }
        let old = std::mem::take(stmts);
        for stmt in old {
            let site = SiteKey::of(stmt.span());
            if self.remove.remove(&site) {
                self.applied.insert(site);
            } else if let Some(replacement) = self.splice.remove(&site) {
                self.applied.insert(site);
                stmts.extend(replacement);
            } else {
                stmts.push(stmt);
            }
        }
    }

    fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
        stmt.visit_mut_children_with(self);
        let site = SiteKey::of(stmt.span());
        if self.remove.remove(&site) {
            self.applied.insert(site);
            *stmt = Stmt::Empty(EmptyStmt { span: DUMMY_SP });
        } else if let Some(mut replacement) = self.splice.remove(&site) {
            self.applied.insert(site);
            *stmt = if replacement.is_empty() {
                Stmt::Empty(EmptyStmt { span: DUMMY_SP })
            } else if matches!(replacement.as_slice(), [Stmt::Expr(_)]) {
                replacement.remove(0)
            } else {
                Stmt::Block(BlockStmt {
                    span: DUMMY_SP,
                    stmts: replacement,
                })
            };
        }
    }
}

/// Removes declarations identified by the site of their declaring identifier.
///
/// Handles function and class declarations and variable declarators; a `var` statement left
/// without declarators is dropped.
#[derive(Default)]
pub struct DeclRemover {
    idents: HashSet<SiteKey>,
    applied: usize,
}

impl DeclRemover {
    /// Creates an empty remover.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the declaration whose identifier sits at `site`.
    pub fn insert(&mut self, site: SiteKey) {
        if !site.is_synthetic() {
            self.idents.insert(site);
        }
    }

    /// Applies the removals and returns how many declarations were removed.
    pub fn apply(mut self, script: &mut Script) -> usize {
        if self.idents.is_empty() {
            return 0;
        }
        script.visit_mut_with(&mut self);
        self.applied
    }

    fn declarator_removed(&mut self, name: &Pat) -> bool {
        match name {
            Pat::Ident(binding) if self.idents.contains(&SiteKey::of(binding.id.span)) => {
                self.applied += 1;
                true
            }
            _ => false,
        }
    }
}

impl VisitMut for DeclRemover {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        stmts.visit_mut_children_with(self);
        stmts.retain_mut(|stmt| match stmt {
            Stmt::Decl(Decl::Fn(f)) if self.idents.contains(&SiteKey::of(f.ident.span)) => {
                self.applied += 1;
                false
            }
            Stmt::Decl(Decl::Class(c)) if self.idents.contains(&SiteKey::of(c.ident.span)) => {
                self.applied += 1;
                false
            }
            Stmt::Decl(Decl::Var(var)) => {
                let before = var.decls.len();
                var.decls.retain(|d| !self.declarator_removed(&d.name));
                !(before > 0 && var.decls.is_empty())
            }
            _ => true,
        });
    }

    fn visit_mut_for_stmt(&mut self, n: &mut ForStmt) {
        n.visit_mut_children_with(self);
        if let Some(VarDeclOrExpr::VarDecl(var)) = &mut n.init {
            let before = var.decls.len();
            var.decls.retain(|d| !self.declarator_removed(&d.name));
            if before > 0 && var.decls.is_empty() {
                n.init = None;
            }
        }
    }
}

/// Rewrites assignments `x = rhs` at given sites to `rhs`.
///
/// An expression statement whose assignment becomes a pure expression is dropped entirely.
#[derive(Default)]
pub struct AssignmentUnwrapper {
    sites: HashSet<SiteKey>,
    applied: usize,
}

impl AssignmentUnwrapper {
    /// Creates an unwrapper for the assignment expressions at `sites`.
    pub fn new(sites: impl IntoIterator<Item = SiteKey>) -> Self {
        Self {
            sites: sites.into_iter().filter(|s| !s.is_synthetic()).collect(),
            applied: 0,
        }
    }

    /// Applies the rewrites and returns how many assignments were unwrapped.
    pub fn apply(mut self, script: &mut Script) -> usize {
        if self.sites.is_empty() {
            return 0;
        }
        script.visit_mut_with(&mut self);
        self.applied
    }
}

impl VisitMut for AssignmentUnwrapper {
    fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
        let old = std::mem::take(stmts);
        for mut stmt in old {
            if let Stmt::Expr(expr_stmt) = &mut stmt {
                if let Expr::Assign(assign) = &mut *expr_stmt.expr {
                    if self.sites.remove(&SiteKey::of(assign.span)) {
                        self.applied += 1;
                        let mut rhs = assign.right.take();
                        rhs.visit_mut_with(self);
                        if !is_pure(&rhs) {
                            expr_stmt.expr = rhs;
                            stmts.push(stmt);
                        }
                        continue;
                    }
                }
            }
            stmt.visit_mut_with(self);
            stmts.push(stmt);
        }
    }

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);
        if let Expr::Assign(assign) = expr {
            if self.sites.remove(&SiteKey::of(assign.span)) {
                self.applied += 1;
                *expr = *assign.right.take();
            }
        }
    }
}
