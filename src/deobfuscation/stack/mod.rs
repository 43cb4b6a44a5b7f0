//! Abstract interpretation of virtualised parameter stacks.
//!
//! The obfuscator moves a function's parameters into an array, either a trailing rest parameter
//! or a local `[]`, and rewrites every parameter access into an indexed access. Extra slots are
//! used as scratch variables, sometimes aliasing one another:
//!
//! ```text
//! function add(...s) {          function add(...s) {
//!     s.length = 2;                 s.length = 2;
//!     s[3] = 10;          ==>       return s[0] + s[1] + 10;
//!     s[2] = s[0];              }
//!     return s[2] + s[1] + s[3];
//! }
//! ```
//!
//! [`StackInterpreter`] runs one round: it tracks every slot through a [`StackCache`] of
//! [`StackCell`]s and rewrites reads it can resolve. The stack pass repeats rounds with constant
//! folding in between until nothing changes.

mod cell;
mod interpreter;

pub use cell::{StackCache, StackCell};
pub use interpreter::{StackInterpreter, StackReport, StackShape};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use swc_core::ecma::visit::VisitMutWith;

    use crate::{
        analysis::BindingIndex,
        deobfuscation::stack::{StackInterpreter, StackReport},
        syntax::{with_globals, ConstantFolder, SourceTree},
        test::normalize,
        Result,
    };

    fn interpret(source: &str, rounds: usize) -> Result<(String, Vec<StackReport>)> {
        with_globals(|| {
            let mut tree = SourceTree::parse(source)?;
            let mut all = Vec::new();
            for _ in 0..rounds {
                let bindings = BindingIndex::crawl(&tree.script);
                let lengths = HashMap::new();
                let mut interpreter =
                    StackInterpreter::new(&bindings, &lengths, tree.unresolved_mark());
                tree.script.visit_mut_with(&mut interpreter);
                let reports = interpreter.into_reports();
                let changed = reports.iter().any(StackReport::changed);
                all.extend(reports);
                if !changed {
                    break;
                }
                ConstantFolder::new(tree.unresolved_mark()).fold(&mut tree.script);
            }
            Ok((tree.generate()?, all))
        })
    }

    #[test]
    fn test_local_array_with_arguments() -> Result<()> {
        let (text, _) = interpret(
            "function f(){var s=[]; s[0]=arguments[0]; s[1]=5; return s[0]+s[1]}",
            8,
        )?;
        assert_eq!(text, normalize("function f(){ return arguments[0] + 5; }")?);
        Ok(())
    }

    #[test]
    fn test_rest_parameter_alias() -> Result<()> {
        let (text, reports) = interpret(
            "function f(...s){ s.length = 2; s[3] = 10; s[2] = s[0]; return s[2] + s[1] + s[3]; }",
            8,
        )?;
        assert_eq!(
            text,
            normalize("function f(...s){ s.length = 2; return s[0] + s[1] + 10; }")?
        );
        assert_eq!(reports[0].length, Some(2));
        Ok(())
    }

    #[test]
    fn test_chain_needs_folding() -> Result<()> {
        let (text, _) = interpret(
            "function f(){ var s = []; s[0] = 2; s[1] = s[0] * 3; return s[1]; }",
            8,
        )?;
        assert_eq!(text, normalize("function f(){ return 6; }")?);
        Ok(())
    }

    #[test]
    fn test_poisoned_slot_is_kept() -> Result<()> {
        let source = "function f(...s){ s[1] = 1; if (s[0]) { s[1] = 2; } return s[1]; }";
        let (text, reports) = interpret(source, 8)?;
        assert_eq!(text, normalize(source)?);
        assert!(reports.iter().all(|r| !r.changed()));
        Ok(())
    }

    #[test]
    fn test_escaping_stack_is_declined() -> Result<()> {
        let source = "function f(...s){ s[1] = 1; log(s); return s[1]; }";
        let (text, reports) = interpret(source, 8)?;
        assert_eq!(text, normalize(source)?);
        assert_eq!(reports[0].declined, Some("escapes as a value"));
        Ok(())
    }

    #[test]
    fn test_nested_function_reads() -> Result<()> {
        let (text, _) = interpret(
            "function f(...s){ s[1] = 'a'; var g = function(){ return s[1]; }; \
             function h(){ return s[1]; } return g() + h(); }",
            8,
        )?;
        assert_eq!(
            text,
            normalize(
                "function f(...s){ s[1] = 'a'; var g = function(){ return 'a'; }; \
                 function h(){ return s[1]; } return g() + h(); }"
            )?
        );
        Ok(())
    }

    #[test]
    fn test_later_write_blocks_nested_read() -> Result<()> {
        let source = "function f(...s){ s[1] = 1; var g = () => s[1]; s[1] = 2; return g(); }";
        let (text, _) = interpret(source, 8)?;
        assert_eq!(text, normalize(source)?);
        Ok(())
    }

    #[test]
    fn test_arrow_does_not_copy_arguments() -> Result<()> {
        let source = "var f = (...s) => { s[1] = arguments[0]; return s[1]; };";
        let (text, _) = interpret(source, 8)?;
        assert_eq!(text, normalize(source)?);
        Ok(())
    }

    #[test]
    fn test_truncation_reads_undefined() -> Result<()> {
        let (text, _) = interpret(
            "function f(...s){ s.length = 1; return s[0] + s[3]; }",
            8,
        )?;
        assert_eq!(
            text,
            normalize("function f(...s){ s.length = 1; return s[0] + void 0; }")?
        );
        Ok(())
    }
}
