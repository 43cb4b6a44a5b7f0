//! Shared utilities for the passes that evaluate call sites in the sandbox.

use swc_core::ecma::ast::{Expr, Id, Script};

use crate::{
    analysis::{find_declaration, is_literal},
    deobfuscation::{context::PassContext, events::EventKind},
    oracle::DependencyClosure,
    syntax::SiteKey,
};

/// True if `expr` is a call whose arguments are all plain literals.
///
/// Only such calls can be evaluated standalone: any other argument may read a local the
/// prelude cannot declare.
#[must_use]
pub fn is_literal_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call(call)
        if call.args.iter().all(|arg| arg.spread.is_none() && is_literal(&arg.expr)))
}

/// Builds a closure from the declarations of `ids`.
///
/// # Returns
///
/// `None` if any of the bindings has no standalone declaration.
#[must_use]
pub fn closure_of<'a>(
    script: &Script,
    ids: impl IntoIterator<Item = &'a Id>,
) -> Option<DependencyClosure> {
    let mut closure = DependencyClosure::new();
    for id in ids {
        closure.insert(find_declaration(script, id)?);
    }
    Some(closure)
}

/// Records the outcome of a `try_safe_delete_all` over a template's runtime.
pub fn record_removals(ctx: &PassContext, pass: &str, site: SiteKey, removed: usize, what: &str) {
    if removed > 0 {
        ctx.changed(
            EventKind::DeclarationRemoved,
            pass,
            site,
            format!("removed {removed} declaration(s) of the {what}"),
        );
    }
}
