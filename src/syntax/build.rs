//! Small constructors for synthesized nodes.

use swc_core::{
    common::{BytePos, Span, DUMMY_SP},
    ecma::{
        ast::{
            Bool, ComputedPropName, Expr, ExprStmt, Id, Ident, Lit, MemberExpr, MemberProp, Null,
            Number, Stmt, Str, UnaryExpr, UnaryOp,
        },
        visit::{VisitMut, VisitMutWith},
    },
};

/// A string literal without raw text, printed with minimal escaping.
#[must_use]
pub fn str_lit(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    }))
}

/// A non-negative numeric literal.
#[must_use]
pub fn num_lit(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

/// A boolean literal.
#[must_use]
pub fn bool_lit(value: bool) -> Expr {
    Expr::Lit(Lit::Bool(Bool {
        span: DUMMY_SP,
        value,
    }))
}

/// The `null` literal.
#[must_use]
pub fn null_lit() -> Expr {
    Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))
}

/// A new identifier node for the binding `id`.
#[must_use]
pub fn ident(id: &Id) -> Ident {
    Ident::new(id.0.clone(), DUMMY_SP.with_ctxt(id.1))
}

/// `void 0`, which reads as `undefined` even where that name is shadowed.
#[must_use]
pub fn undefined() -> Expr {
    Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Void,
        arg: Box::new(num_lit(0.0)),
    })
}

/// `-arg`
#[must_use]
pub fn negate(arg: Expr) -> Expr {
    Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Minus,
        arg: Box::new(arg),
    })
}

/// `obj[index]`
#[must_use]
pub fn index_member(obj: Expr, index: usize) -> Expr {
    #[allow(clippy::cast_precision_loss)]
    let index = num_lit(index as f64);
    Expr::Member(MemberExpr {
        span: DUMMY_SP,
        obj: Box::new(obj),
        prop: MemberProp::Computed(ComputedPropName {
            span: DUMMY_SP,
            expr: Box::new(index),
        }),
    })
}

/// Wraps an expression into a statement.
#[must_use]
pub fn expr_stmt(expr: Box<Expr>) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr,
    })
}

/// Clones `expr` with every source position cleared.
///
/// Syntax contexts are kept, so identifiers still resolve to the same bindings. Use this when one
/// node is copied to several places; the copies must not share a [`crate::syntax::SiteKey`].
#[must_use]
pub fn detached(expr: &Expr) -> Box<Expr> {
    let mut copy = Box::new(expr.clone());
    copy.visit_mut_with(&mut Detach);
    copy
}

struct Detach;

impl VisitMut for Detach {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = Span::new(BytePos(0), BytePos(0), span.ctxt);
    }
}
