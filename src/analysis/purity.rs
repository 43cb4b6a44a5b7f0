//! Side-effect and literal predicates over expressions.

use swc_core::ecma::ast::{
    ArrayLit, BinExpr, Expr, Lit, MemberProp, ObjectLit, Prop, PropName, PropOrSpread, UnaryOp,
};

/// True for a primitive literal: string, number, boolean, `null`, bigint, a template without
/// substitutions, or a sign/negation applied to one of those.
#[must_use]
pub fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(Lit::Str(_) | Lit::Num(_) | Lit::Bool(_) | Lit::Null(_) | Lit::BigInt(_)) => {
            true
        }
        Expr::Tpl(tpl) => tpl.exprs.is_empty(),
        Expr::Unary(u) => {
            matches!(
                u.op,
                UnaryOp::Minus | UnaryOp::Plus | UnaryOp::Bang | UnaryOp::Tilde
            ) && is_literal(&u.arg)
        }
        Expr::Paren(p) => is_literal(&p.expr),
        _ => false,
    }
}

/// True for a literal, or an array/object literal built only from literals.
#[must_use]
pub fn is_literal_composite(expr: &Expr) -> bool {
    match expr {
        Expr::Array(ArrayLit { elems, .. }) => elems.iter().all(|elem| match elem {
            None => true,
            Some(e) => e.spread.is_none() && is_literal_composite(&e.expr),
        }),
        Expr::Object(obj) => is_static_object(obj, is_literal_composite),
        Expr::Paren(p) => is_literal_composite(&p.expr),
        other => is_literal(other),
    }
}

fn is_static_object(obj: &ObjectLit, value_ok: fn(&Expr) -> bool) -> bool {
    obj.props.iter().all(|prop| match prop {
        PropOrSpread::Prop(prop) => match &**prop {
            Prop::KeyValue(kv) => prop_name_key(&kv.key).is_some() && value_ok(&kv.value),
            _ => false,
        },
        PropOrSpread::Spread(_) => false,
    })
}

/// True if evaluating `expr` can have no observable effect.
///
/// Conservative: identifier reads, literals, function values and operators over literals
/// qualify; calls, member reads (getters) and assignments never do.
#[must_use]
pub fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::Fn(_) | Expr::Arrow(_) | Expr::This(_) => true,
        Expr::Array(arr) => arr.elems.iter().all(|elem| match elem {
            None => true,
            Some(e) => e.spread.is_none() && is_pure(&e.expr),
        }),
        Expr::Object(obj) => is_static_object(obj, is_pure),
        Expr::Unary(u) => u.op != UnaryOp::Delete && is_pure(&u.arg),
        Expr::Bin(BinExpr { left, right, .. }) => {
            is_literal_composite(left) && is_literal_composite(right)
        }
        Expr::Seq(seq) => seq.exprs.iter().all(|e| is_pure(e)),
        Expr::Cond(c) => is_pure(&c.test) && is_pure(&c.cons) && is_pure(&c.alt),
        Expr::Paren(p) => is_pure(&p.expr),
        other => is_literal(other),
    }
}

/// Numeric value of a (possibly negated) number literal.
#[must_use]
pub fn number_value(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Lit(Lit::Num(n)) => Some(n.value),
        Expr::Unary(u) if u.op == UnaryOp::Minus => number_value(&u.arg).map(|v| -v),
        Expr::Unary(u) if u.op == UnaryOp::Plus => number_value(&u.arg),
        Expr::Paren(p) => number_value(&p.expr),
        _ => None,
    }
}

/// Value of a literal usable as an array index.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn index_value(expr: &Expr) -> Option<usize> {
    let value = number_value(expr)?;
    if value >= 0.0 && value.fract() == 0.0 && value < f64::from(u32::MAX) {
        Some(value as usize)
    } else {
        None
    }
}

/// Value of a string literal.
#[must_use]
pub fn string_value(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
        Expr::Paren(p) => string_value(&p.expr),
        _ => None,
    }
}

/// Property key spelled by a member access (`o.k`, `o["k"]`, `o[1]`).
#[must_use]
pub fn static_member_key(prop: &MemberProp) -> Option<String> {
    match prop {
        MemberProp::Ident(ident) => Some(ident.sym.to_string()),
        MemberProp::Computed(c) => match &*c.expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            Expr::Lit(Lit::Num(n)) => Some(js_number_key(n.value)),
            _ => None,
        },
        MemberProp::PrivateName(_) => None,
    }
}

/// Property key spelled by an object literal key.
#[must_use]
pub fn prop_name_key(name: &PropName) -> Option<String> {
    match name {
        PropName::Ident(ident) => Some(ident.sym.to_string()),
        PropName::Str(s) => Some(s.value.to_string()),
        PropName::Num(n) => Some(js_number_key(n.value)),
        PropName::Computed(c) => match &*c.expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            Expr::Lit(Lit::Num(n)) => Some(js_number_key(n.value)),
            _ => None,
        },
        PropName::BigInt(_) => None,
    }
}

/// Formats a number the way it reads as a property key.
#[must_use]
pub fn js_number_key(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        syntax::{with_globals, SourceTree},
        Result,
    };

    use super::*;

    fn expr(text: &str) -> Result<Box<Expr>> {
        with_globals(|| SourceTree::parse("")?.parse_expr(text))
    }

    #[test]
    fn test_literals() -> Result<()> {
        assert!(is_literal(&*expr("-5")?));
        assert!(is_literal(&*expr("`plain`")?));
        assert!(!is_literal(&*expr("`a${b}`")?));
        assert!(is_literal_composite(&*expr("[1, \"a\", {k: null}]")?));
        assert!(!is_literal_composite(&*expr("[1, f()]")?));
        Ok(())
    }

    #[test]
    fn test_purity() -> Result<()> {
        assert!(is_pure(&*expr("function () { sideEffect(); }")?));
        assert!(is_pure(&*expr("(1, a, \"x\")")?));
        assert!(!is_pure(&*expr("a.b")?));
        assert!(!is_pure(&*expr("delete a")?));
        assert!(!is_pure(&*expr("a + b")?));
        Ok(())
    }

    #[test]
    fn test_keys_and_indexes() -> Result<()> {
        assert_eq!(index_value(&*expr("3")?), Some(3));
        assert_eq!(index_value(&*expr("-1")?), None);
        assert_eq!(index_value(&*expr("1.5")?), None);
        assert_eq!(number_value(&*expr("-(2)")?), Some(-2.0));
        assert_eq!(js_number_key(12.0), "12");
        assert_eq!(js_number_key(0.5), "0.5");
        Ok(())
    }
}
