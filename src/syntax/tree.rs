//! The program tree and its text conversions.

use swc_core::{
    common::{input::StringInput, sync::Lrc, FileName, Mark, SourceMap, Spanned, DUMMY_SP},
    ecma::{
        ast::{Expr, ExprStmt, Ident, Script, Stmt},
        codegen::{text_writer::JsWriter, Emitter},
        parser::{Parser, Syntax},
        transforms::base::{fixer::fixer, resolver},
        visit::VisitMutWith,
    },
};

use crate::{Error, Result};

/// A parsed script plus everything needed to print it and to parse new fragments into it.
///
/// Identifiers are resolved on construction: each carries a syntax context, so the pair
/// `(name, context)` ([`swc_core::ecma::ast::Id`]) names exactly one binding. Snippets parsed
/// later through [`SourceTree::parse_expr`] share the source map, so their positions never
/// collide with positions of the input.
///
/// All constructors and rewrites must run inside a [`crate::syntax::with_globals`] scope.
pub struct SourceTree {
    /// The program body, mutated in place by the passes.
    pub script: Script,
    cm: Lrc<SourceMap>,
    unresolved_mark: Mark,
    top_level_mark: Mark,
    recovered: Vec<String>,
}

impl SourceTree {
    /// Parses `source` as a classic script and resolves its identifiers.
    ///
    /// Recoverable parser diagnostics are tolerated and kept (see
    /// [`SourceTree::recovered_errors`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the parser cannot produce a tree.
    pub fn parse(source: &str) -> Result<Self> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let fm = cm.new_source_file(FileName::Custom("input.js".into()).into(), source.into());
        let base = fm.start_pos.0;

        let mut parser = Parser::new(
            Syntax::Es(Default::default()),
            StringInput::from(&*fm),
            None,
        );
        let mut script = parser.parse_script().map_err(|e| Error::Parse {
            message: e.kind().msg().into_owned(),
            offset: e.span().lo.0.saturating_sub(base),
        })?;
        let recovered = parser
            .take_errors()
            .into_iter()
            .map(|e| e.kind().msg().into_owned())
            .collect();

        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        script.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, false));

        Ok(Self {
            script,
            cm,
            unresolved_mark,
            top_level_mark,
            recovered,
        })
    }

    /// Regenerates source text from the current tree.
    ///
    /// Parentheses required by rewrites are restored first. Output is comment-free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if the emitter fails.
    pub fn generate(&mut self) -> Result<String> {
        self.script.visit_mut_with(&mut fixer(None));
        self.emit(&self.script)
    }

    /// Prints a list of statements as a standalone script fragment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if the emitter fails.
    pub fn print_stmts(&self, stmts: &[Stmt]) -> Result<String> {
        let mut fragment = Script {
            span: DUMMY_SP,
            body: stmts.to_vec(),
            shebang: None,
        };
        fragment.visit_mut_with(&mut fixer(None));
        self.emit(&fragment)
    }

    /// Prints a single statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if the emitter fails.
    pub fn print_stmt(&self, stmt: &Stmt) -> Result<String> {
        self.print_stmts(std::slice::from_ref(stmt))
    }

    /// Prints an expression as an expression statement.
    ///
    /// Evaluating the printed text yields the expression's value as completion value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if the emitter fails.
    pub fn print_expr(&self, expr: &Expr) -> Result<String> {
        let stmt = Stmt::Expr(ExprStmt {
            span: DUMMY_SP,
            expr: Box::new(expr.clone()),
        });
        self.print_stmt(&stmt)
    }

    /// Parses a standalone expression into this tree's source map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codegen`] if `text` is not a single expression.
    pub fn parse_expr(&self, text: &str) -> Result<Box<Expr>> {
        let fm = self
            .cm
            .new_source_file(FileName::Custom("snippet.js".into()).into(), text.into());
        let mut parser = Parser::new(
            Syntax::Es(Default::default()),
            StringInput::from(&*fm),
            None,
        );
        let expr = parser
            .parse_expr()
            .map_err(|e| codegen_error!("cannot reparse value: {}", e.kind().msg()))?;
        if let Some(err) = parser.take_errors().into_iter().next() {
            return Err(codegen_error!("cannot reparse value: {}", err.kind().msg()));
        }
        Ok(expr)
    }

    /// Creates a reference to a global name (unresolved context).
    #[must_use]
    pub fn global_ident(&self, name: &str) -> Ident {
        Ident::new(name.into(), DUMMY_SP.apply_mark(self.unresolved_mark))
    }

    /// Mark applied to references of undeclared names.
    #[must_use]
    pub fn unresolved_mark(&self) -> Mark {
        self.unresolved_mark
    }

    /// Mark applied to top-level declarations.
    #[must_use]
    pub fn top_level_mark(&self) -> Mark {
        self.top_level_mark
    }

    /// Recoverable parser diagnostics that were tolerated.
    #[must_use]
    pub fn recovered_errors(&self) -> &[String] {
        &self.recovered
    }

    fn emit(&self, script: &Script) -> Result<String> {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter {
                cfg: Default::default(),
                cm: self.cm.clone(),
                comments: None,
                wr: JsWriter::new(self.cm.clone(), "\n", &mut buf, None),
            };
            emitter
                .emit_script(script)
                .map_err(|e| codegen_error!("emit failed: {}", e))?;
        }
        String::from_utf8(buf).map_err(|e| codegen_error!("output is not UTF-8: {}", e))
    }
}
