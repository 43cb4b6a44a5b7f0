//! The stateless object of flattened control flow.
//!
//! ```text
//! var o = { "a": 1, "b": "x", "decoy": 4 };
//! switch (state) {
//!     case 1: f(o["a"]); o["decoy"] = 9; break;
//!     case 2: g(o.b); break;
//! }
//! ```
//!
//! An object literal of constant properties, never reassigned, referenced only as the object of
//! member accesses inside `switch` cases. Properties that are read and never written are
//! inlined; statements that only write properties nobody reads are dropped.

use std::collections::{HashMap, HashSet};

use swc_core::ecma::{
    ast::{
        AssignExpr, AssignOp, AssignTarget, Decl, Expr, ExprStmt, Id, MemberExpr, Prop,
        PropOrSpread, SimpleAssignTarget, Stmt, UnaryExpr, UnaryOp, UpdateExpr,
    },
    visit::{Visit, VisitWith},
};

use crate::{
    analysis::{
        find_declaration, is_literal, prop_name_key, static_member_key, BindingIndex,
        ReferenceRole,
    },
    deobfuscation::templates::{TemplateKind, TemplateMatch},
    syntax::{SiteKey, SourceTree},
};

/// A flattening object and the rewrites it licenses.
#[derive(Debug, Clone)]
pub struct FlatteningObjectMatch {
    /// The object binding.
    pub object: Id,
    /// Member reads to replace, with the literal each one reads.
    pub reads: Vec<(SiteKey, Box<Expr>)>,
    /// Statements writing only unread properties.
    pub dead_writes: Vec<SiteKey>,
    /// Range of the declaring identifier.
    pub site: SiteKey,
}

impl TemplateMatch for FlatteningObjectMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::FlatteningObject
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!(
            "flattening object '{}' ({} reads, {} dead writes)",
            self.object.0,
            self.reads.len(),
            self.dead_writes.len()
        )
    }
}

/// Finds flattening objects.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<FlatteningObjectMatch> {
    bindings
        .iter()
        .filter(|b| b.is_constant() && b.is_referenced())
        .filter(|b| {
            b.references
                .iter()
                .all(|r| r.role == ReferenceRole::MemberObject && r.in_switch_case)
        })
        .filter_map(|binding| {
            let properties = constant_properties(tree, &binding.id)?;
            let mut scan = Scan {
                object: &binding.id,
                reads: Vec::new(),
                writes: Vec::new(),
                mutated: HashSet::new(),
                declined: false,
            };
            tree.script.visit_with(&mut scan);
            if scan.declined {
                return None;
            }

            let read_keys: HashSet<&str> = scan.reads.iter().map(|(_, k)| k.as_str()).collect();
            let reads: Vec<(SiteKey, Box<Expr>)> = scan
                .reads
                .iter()
                .filter(|(_, key)| !scan.mutated.contains(key))
                .filter_map(|(site, key)| Some((*site, properties.get(key)?.clone())))
                .collect();
            let dead_writes: Vec<SiteKey> = scan
                .writes
                .iter()
                .filter(|(_, key)| !read_keys.contains(key.as_str()))
                .map(|(site, _)| *site)
                .collect();
            if reads.is_empty() && dead_writes.is_empty() {
                return None;
            }
            Some(FlatteningObjectMatch {
                object: binding.id.clone(),
                reads,
                dead_writes,
                site: binding.site(),
            })
        })
        .collect()
}

/// Keys and literal values of the object initialiser; `None` unless every property is a
/// static key with a literal value.
fn constant_properties(tree: &SourceTree, id: &Id) -> Option<HashMap<String, Box<Expr>>> {
    let declaration = find_declaration(&tree.script, id)?;
    let Stmt::Decl(Decl::Var(var)) = declaration.stmt else {
        return None;
    };
    let init = var.decls.into_iter().next()?.init?;
    let Expr::Object(obj) = *init else {
        return None;
    };
    let mut properties = HashMap::new();
    for prop in obj.props {
        let PropOrSpread::Prop(prop) = prop else {
            return None;
        };
        let Prop::KeyValue(kv) = *prop else {
            return None;
        };
        if !is_literal(&kv.value) {
            return None;
        }
        properties.insert(prop_name_key(&kv.key)?, kv.value);
    }
    Some(properties)
}

/// Classifies every member access on the object.
struct Scan<'a> {
    object: &'a Id,
    /// Member expression sites read, with their key.
    reads: Vec<(SiteKey, String)>,
    /// `o[k] = literal;` statements, with their key.
    writes: Vec<(SiteKey, String)>,
    /// Keys written in any way.
    mutated: HashSet<String>,
    declined: bool,
}

impl Scan<'_> {
    fn on_object(&self, member: &MemberExpr) -> Option<Option<String>> {
        matches!(&*member.obj, Expr::Ident(i) if i.to_id() == *self.object)
            .then(|| static_member_key(&member.prop))
    }

    fn target_key(&self, target: &AssignTarget) -> Option<Option<String>> {
        match target {
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => self.on_object(member),
            _ => None,
        }
    }
}

impl Visit for Scan<'_> {
    fn visit_expr_stmt(&mut self, n: &ExprStmt) {
        if let Expr::Assign(assign) = &*n.expr {
            if let Some(key) = self.target_key(&assign.left) {
                match key {
                    Some(key) if assign.op == AssignOp::Assign && is_literal(&assign.right) => {
                        self.mutated.insert(key.clone());
                        self.writes.push((SiteKey::of(n.span), key));
                    }
                    Some(key) => {
                        self.mutated.insert(key);
                    }
                    None => self.declined = true,
                }
                assign.right.visit_with(self);
                return;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        match self.target_key(&n.left) {
            Some(Some(key)) => {
                self.mutated.insert(key);
            }
            Some(None) => self.declined = true,
            None => n.left.visit_with(self),
        }
        n.right.visit_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        if let Expr::Member(member) = &*n.arg {
            match self.on_object(member) {
                Some(Some(key)) => {
                    self.mutated.insert(key);
                    return;
                }
                Some(None) => {
                    self.declined = true;
                    return;
                }
                None => {}
            }
        }
        n.visit_children_with(self);
    }

    fn visit_unary_expr(&mut self, n: &UnaryExpr) {
        if n.op == UnaryOp::Delete {
            if let Expr::Member(member) = &*n.arg {
                if self.on_object(member).is_some() {
                    self.declined = true;
                    return;
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        match self.on_object(n) {
            Some(Some(key)) => self.reads.push((SiteKey::of(n.span), key)),
            Some(None) => self.declined = true,
            None => n.visit_children_with(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::find;
    use crate::{
        analysis::BindingIndex,
        syntax::{with_globals, SourceTree},
        Result,
    };

    #[test]
    fn test_reads_and_dead_writes() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "var o = { a: 1, 'b': 'x', decoy: 4, c: 0 }; \
                 switch (s) { case 1: f(o['a']); o['decoy'] = 9; o.c = 1; break; \
                 case 2: g(o.b, o.c); break; }",
            )?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            // `c` is read but also written, so it stays
            assert_eq!(found[0].reads.len(), 2);
            assert_eq!(found[0].dead_writes.len(), 1);
            Ok(())
        })
    }

    #[test]
    fn test_declines_dynamic_access() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "var o = { a: 1 }; switch (s) { case 1: f(o[k]); break; }",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_use_outside_switch() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "var o = { a: 1 }; f(o.a); switch (s) { case 1: g(o.a); break; }",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }
}
