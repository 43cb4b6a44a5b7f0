//! Concealed globals.
//!
//! ```text
//! var G = realm() || {};
//! function global(key) {
//!     switch (key) {
//!         case 4021: return G["console"];
//!         case 877:  return G["Math"];
//!     }
//! }
//! global(4021).log(global(877).max(1, 2));
//! ```
//!
//! The accessor has one parameter and switches on it. Each case maps a literal key to a global
//! name, either returned as `G["name"]` or assigned as `name_var = "name"`. A call with a known
//! key becomes a reference to the global, unless some scope declares that name. The accessor and
//! the realm bindings behind it must never be reassigned.

use std::collections::HashMap;

use swc_core::ecma::ast::{
    AssignOp, AssignTarget, BinaryOp, Callee, Decl, Expr, ExprOrSpread, Id, SimpleAssignTarget,
    Stmt,
};

use crate::{
    analysis::{
        find_declaration, js_number_key, number_value, static_member_key, string_value,
        BindingIndex,
    },
    deobfuscation::templates::{for_each_callable, TemplateKind, TemplateMatch},
    syntax::{locate_all, SiteKey, SourceTree},
};

/// A switch case key, compared the way `switch` does (`1` and `"1"` differ).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaseKey {
    /// A numeric key, in property-key spelling.
    Number(String),
    /// A string key.
    Str(String),
}

impl CaseKey {
    fn of(expr: &Expr) -> Option<Self> {
        if let Some(n) = number_value(expr) {
            return Some(Self::Number(js_number_key(n)));
        }
        string_value(expr).map(Self::Str)
    }
}

/// The accessor, what it maps, and the calls to rewrite.
#[derive(Debug, Clone)]
pub struct GlobalConcealingMatch {
    /// The switch accessor.
    pub accessor: Id,
    /// Case keys to global names.
    pub mapping: HashMap<CaseKey, String>,
    /// Calls with a known key and the global each one reads.
    pub rewrites: Vec<(SiteKey, String)>,
    /// Top-level bindings the accessor reads (the realm wrapper) and the realm behind them.
    pub support: Vec<Id>,
    /// Range of the accessor.
    pub site: SiteKey,
}

impl TemplateMatch for GlobalConcealingMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::GlobalConcealing
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!(
            "global accessor '{}' ({} names, {} calls)",
            self.accessor.0,
            self.mapping.len(),
            self.rewrites.len()
        )
    }
}

/// Finds switch accessors over globals.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<GlobalConcealingMatch> {
    let mut accessors = Vec::new();
    for_each_callable(&tree.script, |callable| {
        let (Some(key), Some(body), 1) = (callable.param_id(0), callable.body, callable.params.len())
        else {
            return;
        };
        let mapping = switch_mapping(body, &key);
        if !mapping.is_empty() {
            accessors.push((callable.id.clone(), callable.site, mapping));
        }
    });

    accessors
        .into_iter()
        .filter_map(|(accessor, site, mapping)| {
            let binding = bindings.get(&accessor).filter(|b| b.is_constant())?;
            let calls: Vec<SiteKey> = binding.calls().filter_map(|r| r.call_site()).collect();
            let located = locate_all(&tree.script, calls.iter().copied());
            let rewrites: Vec<(SiteKey, String)> = calls
                .into_iter()
                .filter_map(|call| {
                    let Expr::Call(expr) = &located.get(&call)?.expr else {
                        return None;
                    };
                    let [ExprOrSpread { spread: None, expr: arg }] = expr.args.as_slice() else {
                        return None;
                    };
                    let name = mapping.get(&CaseKey::of(arg)?)?;
                    (!bindings.declares(name)).then(|| (call, name.clone()))
                })
                .collect();
            if rewrites.is_empty() {
                return None;
            }
            Some(GlobalConcealingMatch {
                support: support(tree, bindings, &accessor),
                accessor,
                mapping,
                rewrites,
                site,
            })
        })
        .collect()
}

fn switch_mapping(body: &[Stmt], key: &Id) -> HashMap<CaseKey, String> {
    let mut mapping = HashMap::new();
    for stmt in body {
        let Stmt::Switch(switch) = stmt else {
            continue;
        };
        if !matches!(&*switch.discriminant, Expr::Ident(i) if i.to_id() == *key) {
            continue;
        }
        for case in &switch.cases {
            let (Some(test), Some(first)) = (&case.test, case.cons.first()) else {
                continue;
            };
            if let (Some(case_key), Some(name)) = (CaseKey::of(test), case_name(first)) {
                if is_identifier_name(&name) {
                    mapping.insert(case_key, name);
                }
            }
        }
    }
    mapping
}

/// `return G["name"]` or `local = "name"`.
fn case_name(stmt: &Stmt) -> Option<String> {
    match stmt {
        Stmt::Return(ret) => match ret.arg.as_deref()?.unwrap_parens() {
            Expr::Member(member) if matches!(&*member.obj, Expr::Ident(_)) => {
                static_member_key(&member.prop)
            }
            _ => None,
        },
        Stmt::Expr(expr_stmt) => match &*expr_stmt.expr {
            Expr::Assign(assign)
                if assign.op == AssignOp::Assign
                    && matches!(
                        assign.left,
                        AssignTarget::Simple(SimpleAssignTarget::Ident(_))
                    ) =>
            {
                string_value(&assign.right)
            }
            _ => None,
        },
        _ => None,
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Top-level bindings read inside `accessor`, followed by the realm functions that initialise
/// them.
fn support(tree: &SourceTree, bindings: &BindingIndex, accessor: &Id) -> Vec<Id> {
    let mut support: Vec<Id> = bindings
        .iter()
        .filter(|b| b.function.is_none() && b.id != *accessor && b.is_constant())
        .filter(|b| {
            b.references.iter().any(|r| {
                r.function
                    .as_ref()
                    .is_some_and(|f| f.owner.as_ref() == Some(accessor))
            })
        })
        .map(|b| b.id.clone())
        .collect();
    let realms: Vec<Id> = support
        .iter()
        .filter_map(|id| {
            let declaration = find_declaration(&tree.script, id)?;
            let Stmt::Decl(Decl::Var(var)) = declaration.stmt else {
                return None;
            };
            realm_call(var.decls.first()?.init.as_deref()?)
        })
        .filter(|realm| bindings.get(realm).is_some_and(|b| b.is_constant()))
        .collect();
    for realm in realms {
        if !support.contains(&realm) {
            support.push(realm);
        }
    }
    support
}

/// The function called by `realm()` or `realm() || fallback`.
fn realm_call(init: &Expr) -> Option<Id> {
    match init.unwrap_parens() {
        Expr::Call(call) => match &call.callee {
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) => Some(ident.to_id()),
                _ => None,
            },
            _ => None,
        },
        Expr::Bin(bin) if bin.op == BinaryOp::LogicalOr => realm_call(&bin.left),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{find, CaseKey};
    use crate::{
        analysis::BindingIndex,
        syntax::{with_globals, SourceTree},
        Result,
    };

    const ACCESSOR: &str = "\
        function realm(){ return this; } \
        var G = realm() || {}; \
        function global(key){ var name; \
          switch (key) { case 4021: return G['console']; case 877: name = 'Math'; break; case 5: return G['3d']; } \
          return G[name]; }";

    #[test]
    fn test_finds_accessor() -> Result<()> {
        with_globals(|| {
            let source = format!("{ACCESSOR} global(4021).log(global(877).max(1, 2), global(9));");
            let tree = SourceTree::parse(&source)?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            let found = &found[0];
            assert_eq!(found.mapping.len(), 2);
            assert_eq!(
                found.mapping.get(&CaseKey::Number("877".into())).map(String::as_str),
                Some("Math")
            );
            assert_eq!(found.rewrites.len(), 2);
            let support: Vec<_> = found.support.iter().map(|id| id.0.to_string()).collect();
            assert_eq!(support, vec!["G", "realm"]);
            Ok(())
        })
    }

    #[test]
    fn test_shadowed_name_is_skipped() -> Result<()> {
        with_globals(|| {
            let source = format!("{ACCESSOR} function f(console){{ return console; }} global(4021);");
            let tree = SourceTree::parse(&source)?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_accessor() -> Result<()> {
        with_globals(|| {
            let source = format!("{ACCESSOR} global = other; global(4021).log(1);");
            let tree = SourceTree::parse(&source)?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_reassigned_realm_is_not_support() -> Result<()> {
        with_globals(|| {
            let source = format!("{ACCESSOR} realm = other; G = fake; global(4021).log(1);");
            let tree = SourceTree::parse(&source)?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            assert!(found[0].support.is_empty(), "{:?}", found[0].support);
            Ok(())
        })
    }
}
