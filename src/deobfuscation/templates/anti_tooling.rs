//! Anti-tooling decoys.
//!
//! ```text
//! function d() {}
//! d(check(1), check(2));
//! ```
//!
//! An empty function declaration without parameters whose only job is to be called with the real
//! expressions as arguments. Calling it evaluates the arguments left to right and nothing else.

use swc_core::ecma::ast::Id;

use crate::{
    analysis::BindingIndex,
    deobfuscation::templates::{for_each_callable, TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// A decoy and the calls made through it.
#[derive(Debug, Clone)]
pub struct AntiToolingMatch {
    /// The empty function.
    pub decoy: Id,
    /// Range of its declaration.
    pub site: SiteKey,
    /// Call expressions that use it as callee.
    pub calls: Vec<SiteKey>,
}

impl TemplateMatch for AntiToolingMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::AntiTooling
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!("decoy '{}' called {} times", self.decoy.0, self.calls.len())
    }
}

/// Finds every empty, parameterless function declaration that is called at least once and never
/// reassigned.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<AntiToolingMatch> {
    let mut found = Vec::new();
    for_each_callable(&tree.script, |callable| {
        if !callable.is_declaration()
            || !callable.params.is_empty()
            || !callable.body.is_some_and(<[_]>::is_empty)
        {
            return;
        }
        let Some(binding) = bindings.get(&callable.id).filter(|b| b.is_constant()) else {
            return;
        };
        let calls: Vec<SiteKey> = binding.calls().filter_map(|r| r.call_site()).collect();
        if !calls.is_empty() {
            found.push(AntiToolingMatch {
                decoy: callable.id.clone(),
                site: callable.site,
                calls,
            });
        }
    });
    found
}
