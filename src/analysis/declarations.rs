//! Locating the statement that declares a binding.
//!
//! The sandbox preludes are built from standalone declarations: a `var` statement is narrowed to
//! the single declarator that introduces the name, so evaluating it declares exactly one binding.

use swc_core::{
    common::DUMMY_SP,
    ecma::{
        ast::{ClassDecl, Decl, FnDecl, Id, Pat, Script, Stmt, VarDecl, VarDeclarator},
        visit::{Visit, VisitWith},
    },
};

use crate::syntax::SiteKey;

/// A declaration lifted out of the tree as a standalone statement.
#[derive(Debug, Clone)]
pub struct DeclarationSite {
    /// The declared binding.
    pub id: Id,
    /// Range of the declaration; orders preludes by original position.
    pub position: SiteKey,
    /// The declaration, narrowed to this binding.
    pub stmt: Stmt,
    /// True if the declaration sits directly in the script body.
    pub top_level: bool,
}

/// Finds the declaration that introduces `id`.
///
/// Function and class declarations and `var`/`let`/`const` declarators with a plain identifier
/// target are found; parameters and destructured names are not.
#[must_use]
pub fn find_declaration(script: &Script, id: &Id) -> Option<DeclarationSite> {
    let mut finder = Finder {
        accept: |candidate: &Id| candidate == id,
        depth: 0,
        found: Vec::new(),
    };
    script.visit_with(&mut finder);
    finder.found.into_iter().next()
}

/// Finds a declaration of `name` in any scope, preferring one in the script body.
#[must_use]
pub fn find_declaration_by_name(script: &Script, name: &str) -> Option<DeclarationSite> {
    let mut finder = Finder {
        accept: |candidate: &Id| &*candidate.0 == name,
        depth: 0,
        found: Vec::new(),
    };
    script.visit_with(&mut finder);
    let mut found = finder.found;
    match found.iter().position(|site| site.top_level) {
        Some(index) => Some(found.swap_remove(index)),
        None => found.into_iter().next(),
    }
}

struct Finder<F> {
    accept: F,
    depth: usize,
    found: Vec<DeclarationSite>,
}

impl<F: Fn(&Id) -> bool> Finder<F> {
    fn record(&mut self, id: Id, position: SiteKey, stmt: Stmt) {
        self.found.push(DeclarationSite {
            id,
            position,
            stmt,
            top_level: self.depth == 0,
        });
    }
}

impl<F: Fn(&Id) -> bool> Visit for Finder<F> {
    fn visit_stmt(&mut self, n: &Stmt) {
        match n {
            Stmt::Decl(Decl::Fn(FnDecl { ident, function, .. })) => {
                if (self.accept)(&ident.to_id()) {
                    self.record(ident.to_id(), SiteKey::of(function.span), n.clone());
                }
            }
            Stmt::Decl(Decl::Class(ClassDecl { ident, class, .. })) => {
                if (self.accept)(&ident.to_id()) {
                    self.record(ident.to_id(), SiteKey::of(class.span), n.clone());
                }
            }
            _ => {}
        }
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        for declarator in &n.decls {
            if let Pat::Ident(binding) = &declarator.name {
                let id = binding.id.to_id();
                if (self.accept)(&id) {
                    // `depth` was bumped by the enclosing statement
                    let top_level = self.depth == 1;
                    self.found.push(DeclarationSite {
                        id,
                        position: SiteKey::of(n.span),
                        stmt: narrow(n, declarator),
                        top_level,
                    });
                }
            }
        }
        n.visit_children_with(self);
    }
}

fn narrow(decl: &VarDecl, declarator: &VarDeclarator) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        decls: vec![declarator.clone()],
        ..decl.clone()
    })))
}

#[cfg(test)]
mod tests {
    use swc_core::ecma::ast::{Decl, Stmt};

    use crate::{
        analysis::{find_declaration, find_declaration_by_name, BindingIndex},
        syntax::{with_globals, SourceTree},
        Result,
    };

    #[test]
    fn test_var_is_narrowed() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("var a = 1, b = 2, c = 3;")?;
            let index = BindingIndex::crawl(&tree.script);
            let b = index.named("b").next().expect("b declared");

            let site = find_declaration(&tree.script, &b.id).expect("declaration found");
            assert!(site.top_level);
            let Stmt::Decl(Decl::Var(var)) = &site.stmt else {
                panic!("expected var");
            };
            assert_eq!(var.decls.len(), 1);
            assert_eq!(tree.print_stmt(&site.stmt)?.trim(), "var b = 2;");
            Ok(())
        })
    }

    #[test]
    fn test_by_name_prefers_top_level() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("function g() { var q = 1; } var q = 2;")?;
            let site = find_declaration_by_name(&tree.script, "q").expect("found");
            assert!(site.top_level);
            assert_eq!(tree.print_stmt(&site.stmt)?.trim(), "var q = 2;");

            assert!(find_declaration_by_name(&tree.script, "missing").is_none());
            Ok(())
        })
    }

    #[test]
    fn test_function_declaration() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse("if (x) { function h() { return 1; } }")?;
            let site = find_declaration_by_name(&tree.script, "h").expect("found");
            assert!(!site.top_level);
            assert!(matches!(site.stmt, Stmt::Decl(Decl::Fn(_))));
            Ok(())
        })
    }
}
