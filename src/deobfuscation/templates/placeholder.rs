//! Single-use placeholder literals.
//!
//! ```text
//! var x = "secret";
//! use(x);
//! x = "other";
//! ```
//!
//! A variable initialised with a literal (or an array/object of literals), read exactly once and
//! overwritten exactly once after that read. The read, the overwrite and the declaration share
//! the same function and loop, so the read always sees the initial value.

use swc_core::ecma::ast::{Decl, Expr, Id, Stmt, VarDeclKind};

use crate::{
    analysis::{
        find_declaration, is_literal_composite, BindingIndex, DeclarationKind, FunctionFrame,
        ReferenceRole, ViolationKind,
    },
    deobfuscation::templates::{TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// A placeholder and its single effective read.
#[derive(Debug, Clone)]
pub struct PlaceholderMatch {
    /// The variable.
    pub id: Id,
    /// The initial value.
    pub init: Box<Expr>,
    /// The identifier read to inline.
    pub read: SiteKey,
    /// The overwrite.
    pub overwrite: SiteKey,
    /// Range of the declaring identifier.
    pub site: SiteKey,
}

impl TemplateMatch for PlaceholderMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::Placeholder
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!("placeholder '{}'", self.id.0)
    }
}

fn frame_site(frame: Option<&FunctionFrame>) -> Option<SiteKey> {
    frame.map(|f| f.site)
}

/// Finds placeholder variables.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<PlaceholderMatch> {
    bindings
        .iter()
        .filter(|b| {
            matches!(
                b.kind,
                DeclarationKind::Var(VarDeclKind::Var | VarDeclKind::Let)
            )
        })
        .filter_map(|binding| {
            let [reference] = binding.references.as_slice() else {
                return None;
            };
            let [violation] = binding.violations.as_slice() else {
                return None;
            };
            if violation.kind != ViolationKind::Assign
                || reference.role == ReferenceRole::Callee
                || !reference.site.precedes(violation.site)
            {
                return None;
            }
            let function = frame_site(binding.function.as_ref());
            let same_scope = frame_site(reference.function.as_ref()) == function
                && frame_site(violation.function.as_ref()) == function
                && reference.loop_site == binding.loop_site
                && violation.loop_site == binding.loop_site;
            if !same_scope {
                return None;
            }
            let init = literal_init(tree, &binding.id)?;
            Some(PlaceholderMatch {
                id: binding.id.clone(),
                init,
                read: reference.site,
                overwrite: violation.site,
                site: binding.site(),
            })
        })
        .collect()
}

fn literal_init(tree: &SourceTree, id: &Id) -> Option<Box<Expr>> {
    let declaration = find_declaration(&tree.script, id)?;
    let Stmt::Decl(Decl::Var(var)) = declaration.stmt else {
        return None;
    };
    let init = var.decls.into_iter().next()?.init?;
    is_literal_composite(&init).then_some(init)
}
