use std::fmt;

use boa_engine::{Context, JsValue};
use swc_core::ecma::ast::Expr;

use crate::{
    oracle::OracleError,
    syntax::{
        build::{bool_lit, negate, null_lit, num_lit, str_lit},
        SourceTree,
    },
    Result,
};

/// A value produced by the sandbox, detached from the engine that computed it.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// A boolean.
    Bool(bool),
    /// A number, including `NaN`, infinities and negative zero.
    Number(f64),
    /// A string.
    String(String),
    /// An array or plain object, in its JSON form.
    Json(serde_json::Value),
}

impl SandboxValue {
    /// Copies `value` out of the engine.
    ///
    /// # Errors
    ///
    /// Functions, symbols and bigints are [`OracleError::Unrepresentable`]; objects that cannot
    /// be serialised (cycles, accessors that throw) are [`OracleError::Marshal`].
    pub(crate) fn from_js(
        value: &JsValue,
        context: &mut Context,
    ) -> std::result::Result<Self, OracleError> {
        if value.is_undefined() {
            return Ok(Self::Undefined);
        }
        if value.is_null() {
            return Ok(Self::Null);
        }
        if let Some(b) = value.as_boolean() {
            return Ok(Self::Bool(b));
        }
        if let Some(n) = value.as_number() {
            return Ok(Self::Number(n));
        }
        if let Some(s) = value.as_string() {
            return Ok(Self::String(s.to_std_string_escaped()));
        }
        if value.is_callable() {
            return Err(OracleError::Unrepresentable("function"));
        }
        if value.is_symbol() {
            return Err(OracleError::Unrepresentable("symbol"));
        }
        if value.is_bigint() {
            return Err(OracleError::Unrepresentable("bigint"));
        }
        value
            .to_json(context)
            .map(Self::Json)
            .map_err(|e| OracleError::Marshal(e.to_string()))
    }

    /// True if the value is a primitive that prints as a literal.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Json(_))
    }

    /// Builds the expression node that evaluates to this value.
    ///
    /// Primitives become literals; `NaN`, `Infinity` and `undefined` become references to the
    /// global names; negative numbers become a unary minus. Arrays and objects are printed as
    /// JSON and reparsed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Codegen`] if the JSON form cannot be reparsed.
    pub fn to_expr(&self, tree: &SourceTree) -> Result<Box<Expr>> {
        let expr = match self {
            Self::Undefined => Expr::Ident(tree.global_ident("undefined")),
            Self::Null => null_lit(),
            Self::Bool(b) => bool_lit(*b),
            Self::Number(n) if n.is_nan() => Expr::Ident(tree.global_ident("NaN")),
            Self::Number(n) => {
                let magnitude = if n.is_infinite() {
                    Expr::Ident(tree.global_ident("Infinity"))
                } else {
                    num_lit(n.abs())
                };
                if n.is_sign_negative() {
                    negate(magnitude)
                } else {
                    magnitude
                }
            }
            Self::String(s) => str_lit(s),
            Self::Json(json) => return tree.parse_expr(&json.to_string()),
        };
        Ok(Box::new(expr))
    }
}

impl fmt::Display for SandboxValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Json(json) => write!(f, "{json}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::string_value,
        oracle::SandboxValue,
        syntax::{with_globals, SourceTree},
        Result,
    };

    fn printed(value: SandboxValue) -> Result<String> {
        with_globals(|| {
            let tree = SourceTree::parse("")?;
            let expr = value.to_expr(&tree)?;
            Ok(tree.print_expr(&expr)?.trim().trim_end_matches(';').to_string())
        })
    }

    #[test]
    fn test_primitives() -> Result<()> {
        assert_eq!(printed(SandboxValue::Number(-3.0))?, "-3");
        assert_eq!(printed(SandboxValue::Number(f64::NAN))?, "NaN");
        assert_eq!(printed(SandboxValue::Number(f64::NEG_INFINITY))?, "-Infinity");
        assert_eq!(printed(SandboxValue::Undefined)?, "undefined");

        let text = printed(SandboxValue::String("a\"b".into()))?;
        with_globals(|| {
            let tree = SourceTree::parse("")?;
            assert_eq!(string_value(&*tree.parse_expr(&text)?).as_deref(), Some("a\"b"));
            Ok(())
        })
    }

    #[test]
    fn test_json_is_reparsed() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("")?;
            let value = SandboxValue::Json(serde_json::json!([1, "x", null]));
            let expr = value.to_expr(&tree)?;
            let array = expr.as_array().expect("array literal");
            assert_eq!(array.elems.len(), 3);
            assert!(!value.is_primitive());
            Ok(())
        })
    }
}
