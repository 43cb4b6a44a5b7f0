//! Functions whose parameters live on an indexed stack.
//!
//! Detection only; the rewrite is the abstract interpretation in
//! [`crate::deobfuscation::stack`]. A function qualifies when its stack (a trailing rest
//! parameter or a top-level `var s = []`) is written at a literal index or has a literal
//! `.length` assigned, by a statement directly in the body.

use swc_core::ecma::{
    ast::{
        ArrowExpr, AssignTarget, BlockStmtOrExpr, Decl, Expr, Function, Id, MemberProp, Pat,
        SimpleAssignTarget, Stmt,
    },
    visit::{Visit, VisitWith},
};

use crate::{
    analysis::{index_value, is_literal},
    deobfuscation::templates::{TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// A function with a virtualised parameter stack.
#[derive(Debug, Clone)]
pub struct StackMatch {
    /// Range of the function.
    pub function: SiteKey,
    /// The stack binding.
    pub stack: Id,
    /// True for a rest parameter, false for a local array.
    pub rest: bool,
    /// Literal `.length` assigned to the stack, if any.
    pub length: Option<usize>,
}

impl TemplateMatch for StackMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Stack
    }

    fn site(&self) -> SiteKey {
        self.function
    }

    fn describe(&self) -> String {
        let shape = if self.rest { "rest parameter" } else { "local array" };
        format!("stack '{}' ({shape})", self.stack.0)
    }
}

/// Finds candidate stack functions.
#[must_use]
pub fn find(tree: &SourceTree) -> Vec<StackMatch> {
    let mut finder = Finder::default();
    tree.script.visit_with(&mut finder);
    finder.found
}

#[derive(Default)]
struct Finder {
    found: Vec<StackMatch>,
}

impl Finder {
    fn check(&mut self, function: SiteKey, rest: Option<Id>, body: &[Stmt]) {
        let candidates = rest
            .into_iter()
            .map(|id| (id, true))
            .chain(body.iter().filter_map(local_array).map(|id| (id, false)));
        for (stack, is_rest) in candidates {
            let mut writes = 0;
            let mut length = None;
            for stmt in body {
                match stack_write(stmt, &stack) {
                    Some(Write::Slot) => writes += 1,
                    Some(Write::Length(n)) => length = length.or(Some(n)),
                    None => {}
                }
            }
            if writes > 0 || length.is_some() {
                self.found.push(StackMatch {
                    function,
                    stack,
                    rest: is_rest,
                    length,
                });
            }
        }
    }
}

impl Visit for Finder {
    fn visit_function(&mut self, n: &Function) {
        n.visit_children_with(self);
        if let Some(body) = &n.body {
            let rest = n.params.last().and_then(|p| rest_id(&p.pat));
            self.check(SiteKey::of(n.span), rest, &body.stmts);
        }
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        n.visit_children_with(self);
        if let BlockStmtOrExpr::BlockStmt(body) = &*n.body {
            let rest = n.params.last().and_then(rest_id);
            self.check(SiteKey::of(n.span), rest, &body.stmts);
        }
    }
}

fn rest_id(pat: &Pat) -> Option<Id> {
    match pat {
        Pat::Rest(rest) => match &*rest.arg {
            Pat::Ident(binding) => Some(binding.id.to_id()),
            _ => None,
        },
        _ => None,
    }
}

fn local_array(stmt: &Stmt) -> Option<Id> {
    let Stmt::Decl(Decl::Var(var)) = stmt else {
        return None;
    };
    let [declarator] = var.decls.as_slice() else {
        return None;
    };
    match (&declarator.name, declarator.init.as_deref()) {
        (Pat::Ident(name), Some(Expr::Array(arr))) if arr.elems.is_empty() => Some(name.id.to_id()),
        _ => None,
    }
}

enum Write {
    Slot,
    Length(usize),
}

fn stack_write(stmt: &Stmt, stack: &Id) -> Option<Write> {
    let Stmt::Expr(expr_stmt) = stmt else {
        return None;
    };
    let Expr::Assign(assign) = &*expr_stmt.expr else {
        return None;
    };
    let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &assign.left else {
        return None;
    };
    if !matches!(&*member.obj, Expr::Ident(i) if i.to_id() == *stack) {
        return None;
    }
    match &member.prop {
        MemberProp::Computed(c) if index_value(&c.expr).is_some() => Some(Write::Slot),
        MemberProp::Ident(name) if &*name.sym == "length" && is_literal(&assign.right) => {
            index_value(&assign.right).map(Write::Length)
        }
        _ => None,
    }
}
