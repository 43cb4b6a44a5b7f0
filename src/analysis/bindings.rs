//! Scope analysis: declared names, their use sites and their reassignments.
//!
//! [`BindingIndex::crawl`] is a pure function over the current tree. It is never patched
//! incrementally; after any structural edit the old index is dropped and a new one crawled.
//!
//! # Identity
//!
//! The tree is resolved on parse, so every identifier carries a syntax context and the pair
//! `(name, context)` ([`Id`]) is unique per binding. Two declarations of `x` in different
//! functions are different bindings even though they print the same.
//!
//! # Recorded facts
//!
//! ```text
//! Binding ──┬── declaration sites   (identifier ranges; `var x` may repeat)
//!           ├── references          (role, enclosing function, loop, switch case, test)
//!           └── constant violations (`x = ..`, `x += ..`, `x++`, destructuring targets)
//! ```
//!
//! Names that are read but never declared are globals and are kept apart
//! ([`BindingIndex::global_references`]).

use std::collections::HashMap;

use swc_core::{
    common::Spanned,
    ecma::{
        ast::{
            ArrowExpr, AssignExpr, AssignOp, AssignPatProp, AssignTarget, BreakStmt, CallExpr,
            Callee, CatchClause, ClassDecl, ClassExpr, CondExpr, ContinueStmt, DoWhileStmt, Expr,
            FnDecl, FnExpr, ForInStmt, ForOfStmt, ForStmt, Function, Id, Ident, IfStmt,
            KeyValuePatProp, LabeledStmt, MemberExpr, MemberProp, Pat, PrivateName, PropName,
            Script, SimpleAssignTarget, SuperProp, SuperPropExpr, SwitchCase, UpdateExpr,
            VarDecl, VarDeclKind, VarDeclarator, WhileStmt,
        },
        visit::{Visit, VisitWith},
    },
};

use crate::syntax::SiteKey;

/// How a name was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `function f() {}`
    Function,
    /// The name of a named function or class expression, visible only inside it.
    ExpressionName,
    /// `var`, `let` or `const`.
    Var(VarDeclKind),
    /// `class C {}`
    Class,
    /// A function or arrow parameter.
    Param,
    /// The parameter of a `catch` clause.
    CatchParam,
}

impl DeclarationKind {
    /// True if the declaration can be removed without touching a signature.
    #[must_use]
    pub fn is_removable(&self) -> bool {
        matches!(self, Self::Function | Self::Var(_) | Self::Class)
    }
}

/// Positional role of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    /// `name(..)`
    Callee,
    /// `f(.., name, ..)` at the given argument slot.
    Argument(usize),
    /// `name.prop` or `name[expr]`
    MemberObject,
    /// Any other read.
    Other,
}

/// Kinds of reassignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// `name = value`
    Assign,
    /// `name += value` and friends.
    CompoundAssign,
    /// `name++`, `--name`
    Update,
    /// A destructuring or `for (name in ..)` target.
    Pattern,
    /// `var name = value` repeating an earlier declaration.
    Redeclaration,
}

/// The function a site is nested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionFrame {
    /// Range of the function node.
    pub site: SiteKey,
    /// Name the function is bound to, if any: a declaration, a named expression, or the
    /// variable a function or arrow expression initialises.
    pub owner: Option<Id>,
    /// True for arrow functions.
    pub is_arrow: bool,
}

/// One read of a binding.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Range of the identifier.
    pub site: SiteKey,
    /// Positional role.
    pub role: ReferenceRole,
    /// The call or member expression that gives the role, for non-`Other` roles.
    pub context: Option<SiteKey>,
    /// Innermost enclosing function.
    pub function: Option<FunctionFrame>,
    /// Innermost enclosing loop.
    pub loop_site: Option<SiteKey>,
    /// True if the reference is nested in a `switch` case.
    pub in_switch_case: bool,
    /// Innermost conditional test (ternary or `if`) containing the reference.
    pub test_site: Option<SiteKey>,
}

impl Reference {
    /// The call this reference is the callee of.
    #[must_use]
    pub fn call_site(&self) -> Option<SiteKey> {
        match self.role {
            ReferenceRole::Callee => self.context,
            _ => None,
        }
    }
}

/// One reassignment of a binding.
#[derive(Debug, Clone)]
pub struct ConstantViolation {
    /// Range of the assignment, update or declarator.
    pub site: SiteKey,
    /// What kind of write this is.
    pub kind: ViolationKind,
    /// Innermost enclosing function.
    pub function: Option<FunctionFrame>,
    /// Innermost enclosing loop.
    pub loop_site: Option<SiteKey>,
}

/// A declared name with all of its use sites.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Name and syntax context.
    pub id: Id,
    /// How the name was first declared.
    pub kind: DeclarationKind,
    /// Ranges of every declaring identifier, first one first.
    pub declarations: Vec<SiteKey>,
    /// Function enclosing the first declaration.
    pub function: Option<FunctionFrame>,
    /// Loop enclosing the first declaration.
    pub loop_site: Option<SiteKey>,
    /// Reads, in traversal order.
    pub references: Vec<Reference>,
    /// Writes, in traversal order.
    pub violations: Vec<ConstantViolation>,
}

impl Binding {
    /// The declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.id.0
    }

    /// Range of the first declaring identifier.
    #[must_use]
    pub fn site(&self) -> SiteKey {
        self.declarations[0]
    }

    /// True if any reference remains.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        !self.references.is_empty()
    }

    /// Number of references.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// True if the name is never reassigned.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.violations.is_empty()
    }

    /// References that call the binding directly.
    pub fn calls(&self) -> impl Iterator<Item = &Reference> {
        self.references
            .iter()
            .filter(|r| r.role == ReferenceRole::Callee)
    }

    /// True if every reference is a direct call.
    #[must_use]
    pub fn only_called(&self) -> bool {
        self.references
            .iter()
            .all(|r| r.role == ReferenceRole::Callee)
    }
}

/// Every binding of a script, keyed by [`Id`].
#[derive(Debug, Default)]
pub struct BindingIndex {
    bindings: HashMap<Id, Binding>,
    order: Vec<Id>,
    globals: HashMap<String, Vec<Reference>>,
}

impl BindingIndex {
    /// Crawls `script` and records every binding.
    #[must_use]
    pub fn crawl(script: &Script) -> Self {
        let mut crawler = Crawler::default();
        script.visit_with(&mut crawler);
        crawler.finish()
    }

    /// Looks up a binding by identity.
    #[must_use]
    pub fn get(&self, id: &Id) -> Option<&Binding> {
        self.bindings.get(id)
    }

    /// Looks up the binding an identifier refers to.
    #[must_use]
    pub fn of(&self, ident: &Ident) -> Option<&Binding> {
        self.bindings.get(&ident.to_id())
    }

    /// Looks up a binding by the name and syntax context of its scope.
    #[must_use]
    pub fn lookup(
        &self,
        name: &str,
        ctxt: swc_core::common::SyntaxContext,
    ) -> Option<&Binding> {
        self.bindings.get(&(name.into(), ctxt))
    }

    /// Bindings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.order.iter().filter_map(|id| self.bindings.get(id))
    }

    /// Bindings named `name`, in declaration order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Binding> + 'a {
        self.iter().filter(move |b| b.name() == name)
    }

    /// True if any scope declares `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.named(name).next().is_some()
    }

    /// Reads of the undeclared name `name`.
    #[must_use]
    pub fn global_references(&self, name: &str) -> &[Reference] {
        self.globals.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if the script declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone, Copy)]
enum PatMode {
    Declare(DeclarationKind),
    Violate(SiteKey),
}

#[derive(Default)]
struct Crawler {
    bindings: HashMap<Id, Binding>,
    order: Vec<Id>,
    references: Vec<(Id, Reference)>,
    violations: Vec<(Id, ConstantViolation)>,
    functions: Vec<FunctionFrame>,
    loops: Vec<SiteKey>,
    tests: Vec<SiteKey>,
    switch_depth: usize,
    mode: Option<PatMode>,
    pending_owner: Option<Id>,
}

impl Crawler {
    fn finish(self) -> BindingIndex {
        let mut bindings = self.bindings;
        let mut globals: HashMap<String, Vec<Reference>> = HashMap::new();

        for (id, reference) in self.references {
            match bindings.get_mut(&id) {
                Some(binding) => binding.references.push(reference),
                None => globals.entry(id.0.to_string()).or_default().push(reference),
            }
        }
        for (id, violation) in self.violations {
            if let Some(binding) = bindings.get_mut(&id) {
                binding.violations.push(violation);
            }
        }

        BindingIndex {
            bindings,
            order: self.order,
            globals,
        }
    }

    /// Returns `true` if this declaration introduced the binding.
    fn declare(&mut self, ident: &Ident, kind: DeclarationKind) -> bool {
        let id = ident.to_id();
        let site = SiteKey::of(ident.span);
        if let Some(existing) = self.bindings.get_mut(&id) {
            existing.declarations.push(site);
            return false;
        }
        self.order.push(id.clone());
        self.bindings.insert(
            id.clone(),
            Binding {
                id,
                kind,
                declarations: vec![site],
                function: self.functions.last().cloned(),
                loop_site: self.loops.last().copied(),
                references: Vec::new(),
                violations: Vec::new(),
            },
        );
        true
    }

    fn reference(&mut self, ident: &Ident, role: ReferenceRole, context: Option<SiteKey>) {
        let reference = Reference {
            site: SiteKey::of(ident.span),
            role,
            context,
            function: self.functions.last().cloned(),
            loop_site: self.loops.last().copied(),
            in_switch_case: self.switch_depth > 0,
            test_site: self.tests.last().copied(),
        };
        self.references.push((ident.to_id(), reference));
    }

    fn violation(&mut self, ident: &Ident, site: SiteKey, kind: ViolationKind) {
        let violation = ConstantViolation {
            site,
            kind,
            function: self.functions.last().cloned(),
            loop_site: self.loops.last().copied(),
        };
        self.violations.push((ident.to_id(), violation));
    }

    fn bind_pattern_ident(&mut self, ident: &Ident) {
        match self.mode {
            Some(PatMode::Declare(kind)) => {
                self.declare(ident, kind);
            }
            Some(PatMode::Violate(site)) => self.violation(ident, site, ViolationKind::Pattern),
            None => self.reference(ident, ReferenceRole::Other, None),
        }
    }

    fn with_mode(&mut self, mode: Option<PatMode>, f: impl FnOnce(&mut Self)) {
        let saved = std::mem::replace(&mut self.mode, mode);
        f(self);
        self.mode = saved;
    }

    fn enter_function(&mut self, frame: FunctionFrame, f: impl FnOnce(&mut Self)) {
        let saved_tests = std::mem::take(&mut self.tests);
        self.functions.push(frame);
        f(self);
        self.functions.pop();
        self.tests = saved_tests;
    }

    fn in_loop(&mut self, site: SiteKey, f: impl FnOnce(&mut Self)) {
        self.loops.push(site);
        f(self);
        self.loops.pop();
    }

    fn declarator(&mut self, declarator: &VarDeclarator, kind: VarDeclKind) {
        let mut introduced = true;
        if let Pat::Ident(binding) = &declarator.name {
            introduced = self.declare(&binding.id, DeclarationKind::Var(kind));
        } else {
            self.with_mode(
                Some(PatMode::Declare(DeclarationKind::Var(kind))),
                |this| declarator.name.visit_with(this),
            );
        }

        let Some(init) = &declarator.init else {
            return;
        };
        if let Pat::Ident(binding) = &declarator.name {
            if !introduced {
                self.violation(
                    &binding.id,
                    SiteKey::of(declarator.span),
                    ViolationKind::Redeclaration,
                );
            }
            if matches!(&**init, Expr::Fn(_) | Expr::Arrow(_)) {
                self.pending_owner = Some(binding.id.to_id());
            }
        }
        self.with_mode(None, |this| init.visit_with(this));
        self.pending_owner = None;
    }
}

impl Visit for Crawler {
    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.declare(&n.ident, DeclarationKind::Function);
        self.pending_owner = Some(n.ident.to_id());
        n.function.visit_with(self);
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        let owner = n
            .ident
            .as_ref()
            .map(Ident::to_id)
            .or_else(|| self.pending_owner.take());
        if let Some(ident) = &n.ident {
            self.declare(ident, DeclarationKind::ExpressionName);
        }
        self.pending_owner = owner;
        n.function.visit_with(self);
    }

    fn visit_function(&mut self, n: &Function) {
        let frame = FunctionFrame {
            site: SiteKey::of(n.span),
            owner: self.pending_owner.take(),
            is_arrow: false,
        };
        self.enter_function(frame, |this| {
            this.with_mode(Some(PatMode::Declare(DeclarationKind::Param)), |this| {
                for param in &n.params {
                    param.pat.visit_with(this);
                }
            });
            this.with_mode(None, |this| n.body.visit_with(this));
        });
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        let frame = FunctionFrame {
            site: SiteKey::of(n.span),
            owner: self.pending_owner.take(),
            is_arrow: true,
        };
        self.enter_function(frame, |this| {
            this.with_mode(Some(PatMode::Declare(DeclarationKind::Param)), |this| {
                n.params.visit_with(this);
            });
            this.with_mode(None, |this| n.body.visit_with(this));
        });
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.declare(&n.ident, DeclarationKind::Class);
        n.class.visit_with(self);
    }

    fn visit_class_expr(&mut self, n: &ClassExpr) {
        if let Some(ident) = &n.ident {
            self.declare(ident, DeclarationKind::ExpressionName);
        }
        n.class.visit_with(self);
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        for declarator in &n.decls {
            self.declarator(declarator, n.kind);
        }
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        if let Some(param) = &n.param {
            self.with_mode(
                Some(PatMode::Declare(DeclarationKind::CatchParam)),
                |this| param.visit_with(this),
            );
        }
        n.body.visit_with(self);
    }

    fn visit_pat(&mut self, n: &Pat) {
        match n {
            Pat::Ident(binding) => self.bind_pattern_ident(&binding.id),
            Pat::Assign(assign) => {
                assign.left.visit_with(self);
                self.with_mode(None, |this| assign.right.visit_with(this));
            }
            Pat::Expr(expr) => self.with_mode(None, |this| expr.visit_with(this)),
            _ => n.visit_children_with(self),
        }
    }

    fn visit_assign_pat_prop(&mut self, n: &AssignPatProp) {
        let key: &Ident = &n.key;
        self.bind_pattern_ident(key);
        if let Some(value) = &n.value {
            self.with_mode(None, |this| value.visit_with(this));
        }
    }

    fn visit_key_value_pat_prop(&mut self, n: &KeyValuePatProp) {
        self.with_mode(None, |this| n.key.visit_with(this));
        n.value.visit_with(self);
    }

    fn visit_prop_name(&mut self, n: &PropName) {
        if let PropName::Computed(computed) = n {
            self.with_mode(None, |this| computed.expr.visit_with(this));
        }
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        self.with_mode(None, |this| {
            match &*n.obj {
                Expr::Ident(ident) => this.reference(
                    ident,
                    ReferenceRole::MemberObject,
                    Some(SiteKey::of(n.span)),
                ),
                obj => obj.visit_with(this),
            }
            if let MemberProp::Computed(computed) = &n.prop {
                computed.expr.visit_with(this);
            }
        });
    }

    fn visit_super_prop_expr(&mut self, n: &SuperPropExpr) {
        if let SuperProp::Computed(computed) = &n.prop {
            computed.expr.visit_with(self);
        }
    }

    fn visit_private_name(&mut self, _: &PrivateName) {}

    fn visit_call_expr(&mut self, n: &CallExpr) {
        let site = SiteKey::of(n.span);
        match &n.callee {
            Callee::Expr(callee) => match &**callee {
                Expr::Ident(ident) => self.reference(ident, ReferenceRole::Callee, Some(site)),
                other => other.visit_with(self),
            },
            other => other.visit_with(self),
        }
        for (index, arg) in n.args.iter().enumerate() {
            match (&arg.spread, &*arg.expr) {
                (None, Expr::Ident(ident)) => {
                    self.reference(ident, ReferenceRole::Argument(index), Some(site));
                }
                _ => arg.expr.visit_with(self),
            }
        }
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        let site = SiteKey::of(n.span);
        let kind = if n.op == AssignOp::Assign {
            ViolationKind::Assign
        } else {
            ViolationKind::CompoundAssign
        };
        match &n.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                self.violation(&binding.id, site, kind);
            }
            AssignTarget::Simple(target) => target.visit_with(self),
            AssignTarget::Pat(pat) => {
                self.with_mode(Some(PatMode::Violate(site)), |this| pat.visit_with(this));
            }
        }
        n.right.visit_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        match &*n.arg {
            Expr::Ident(ident) => {
                self.violation(ident, SiteKey::of(n.span), ViolationKind::Update);
            }
            other => other.visit_with(self),
        }
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.in_loop(SiteKey::of(n.span), |this| n.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        let site = SiteKey::of(n.span);
        self.in_loop(site, |this| {
            this.with_mode(Some(PatMode::Violate(site)), |this| n.left.visit_with(this));
            n.right.visit_with(this);
            n.body.visit_with(this);
        });
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        let site = SiteKey::of(n.span);
        self.in_loop(site, |this| {
            this.with_mode(Some(PatMode::Violate(site)), |this| n.left.visit_with(this));
            n.right.visit_with(this);
            n.body.visit_with(this);
        });
    }

    fn visit_while_stmt(&mut self, n: &WhileStmt) {
        self.in_loop(SiteKey::of(n.span), |this| n.visit_children_with(this));
    }

    fn visit_do_while_stmt(&mut self, n: &DoWhileStmt) {
        self.in_loop(SiteKey::of(n.span), |this| n.visit_children_with(this));
    }

    fn visit_switch_case(&mut self, n: &SwitchCase) {
        self.switch_depth += 1;
        n.visit_children_with(self);
        self.switch_depth -= 1;
    }

    fn visit_cond_expr(&mut self, n: &CondExpr) {
        self.tests.push(SiteKey::of(n.test.span()));
        n.test.visit_with(self);
        self.tests.pop();
        n.cons.visit_with(self);
        n.alt.visit_with(self);
    }

    fn visit_if_stmt(&mut self, n: &IfStmt) {
        self.tests.push(SiteKey::of(n.test.span()));
        n.test.visit_with(self);
        self.tests.pop();
        n.cons.visit_with(self);
        n.alt.visit_with(self);
    }

    fn visit_labeled_stmt(&mut self, n: &LabeledStmt) {
        n.body.visit_with(self);
    }

    fn visit_break_stmt(&mut self, _: &BreakStmt) {}

    fn visit_continue_stmt(&mut self, _: &ContinueStmt) {}

    fn visit_ident(&mut self, n: &Ident) {
        self.reference(n, ReferenceRole::Other, None);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::{BindingIndex, DeclarationKind, ReferenceRole, ViolationKind},
        syntax::{with_globals, SourceTree},
        Result,
    };

    fn crawl(source: &str) -> Result<BindingIndex> {
        with_globals(|| {
            let tree = SourceTree::parse(source)?;
            Ok(BindingIndex::crawl(&tree.script))
        })
    }

    #[test]
    fn test_roles() -> Result<()> {
        let index = crawl("function f(a) { return a; } var o = {}; f(o); o.x = f; o[f]();")?;

        let f = index.named("f").next().expect("f declared");
        assert_eq!(f.kind, DeclarationKind::Function);
        let roles: Vec<_> = f.references.iter().map(|r| r.role).collect();
        assert_eq!(
            roles,
            vec![ReferenceRole::Callee, ReferenceRole::Other, ReferenceRole::Other]
        );

        let o = index.named("o").next().expect("o declared");
        assert_eq!(o.references[0].role, ReferenceRole::Argument(0));
        assert_eq!(o.references[1].role, ReferenceRole::MemberObject);
        assert!(o.is_constant());
        Ok(())
    }

    #[test]
    fn test_member_and_key_names_are_not_references() -> Result<()> {
        let index = crawl("var x = 1; var o = { x: 2 }; o.x; label: for (;;) { break label; }")?;
        let x = index.named("x").next().expect("x declared");
        assert_eq!(x.reference_count(), 0);
        Ok(())
    }

    #[test]
    fn test_violations() -> Result<()> {
        let index = crawl("var a = 1; a = 2; a += 3; a++; [a] = [4]; var a = 5;")?;
        let a = index.named("a").next().expect("a declared");
        let kinds: Vec<_> = a.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::Assign,
                ViolationKind::CompoundAssign,
                ViolationKind::Update,
                ViolationKind::Pattern,
                ViolationKind::Redeclaration,
            ]
        );
        assert_eq!(a.declarations.len(), 2);
        Ok(())
    }

    #[test]
    fn test_shadowing_separates_bindings() -> Result<()> {
        let index = crawl("var v = 1; function g() { var v = 2; return v; } use(v);")?;
        let all: Vec<_> = index.named("v").collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].reference_count(), 1);
        assert_eq!(all[1].reference_count(), 1);
        assert!(all[1].function.is_some());
        assert_eq!(index.global_references("use").len(), 1);
        assert!(!index.declares("use"));
        Ok(())
    }

    #[test]
    fn test_context_tracking() -> Result<()> {
        let index = crawl(
            "var k = 0; var w = function () { return k; };\
             while (1) { switch (k) { case 1: use(k ? 1 : 2); } }",
        )?;
        let k = index.named("k").next().expect("k declared");
        let in_fn = &k.references[0];
        let owner = in_fn.function.as_ref().and_then(|f| f.owner.as_ref());
        assert_eq!(owner.map(|id| &*id.0), Some("w"));

        let in_case = &k.references[2];
        assert!(in_case.in_switch_case);
        assert!(in_case.test_site.is_some());
        assert!(in_case.loop_site.is_some());
        Ok(())
    }
}
