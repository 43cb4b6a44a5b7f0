//! Structural matchers for the constructs the obfuscator emits.
//!
//! Every template has a matcher module with a `find` function. Matchers are pure: they read the
//! tree and a freshly crawled [`BindingIndex`], and return owned match records describing what
//! they found by [`SiteKey`] and [`Id`]. A construct that does not have exactly the expected
//! shape is skipped, never guessed at. Names are never compared against fixed strings; shapes are
//! checked through node kinds, argument positions, binding roles and [`Fingerprint`]s.
//!
//! The passes in [`crate::deobfuscation::passes`] consume the matches; detection runs the same
//! matchers and only scores them.
//!
//! | Template | Matcher | Rewrite |
//! |---|---|---|
//! | anti-tooling decoy | [`anti_tooling`] | splice the call's arguments as statements |
//! | minified arrow | [`minified_arrow`] | replace wrapper calls by the wrapped function |
//! | duplicate literal | [`duplicate_literal`] | evaluate accessor calls in the sandbox |
//! | stack | [`stack`], [`function_length`] | abstract stack interpretation |
//! | string compression | [`string_compression`] | evaluate lookup calls in the sandbox |
//! | string concealing | [`string_concealing`] | evaluate getter calls, growing the closure |
//! | placeholder | [`placeholder`] | inline the literal at its single read |
//! | opaque predicate | [`opaque_predicate`] | evaluate the tests in the sandbox |
//! | global concealing | [`global_concealing`] | replace accessor calls by global names |
//! | flattening object | [`flattening_object`] | inline constant properties |
//!
//! [`Fingerprint`]: crate::analysis::Fingerprint

pub mod anti_tooling;
pub mod duplicate_literal;
pub mod flattening_object;
pub mod function_length;
pub mod global_concealing;
pub mod minified_arrow;
pub mod opaque_predicate;
pub mod placeholder;
pub mod stack;
pub mod string_compression;
pub mod string_concealing;

use std::collections::HashSet;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use swc_core::{
    common::{Spanned, DUMMY_SP},
    ecma::{
        ast::{
            AssignExpr, AssignTarget, BlockStmtOrExpr, Decl, Expr, FnDecl, Id, MemberExpr, Pat,
            Script, SimpleAssignTarget, Stmt, UnaryExpr, UnaryOp, UpdateExpr, VarDecl,
            VarDeclKind, VarDeclarator,
        },
        visit::{Visit, VisitWith},
    },
};

use crate::{analysis::BindingIndex, syntax::SiteKey};

/// The constructs the matchers recognise.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum TemplateKind {
    /// Empty function used as a call wrapper.
    AntiTooling,
    /// Helper faking a lambda's parameter count.
    MinifiedArrow,
    /// Literals hoisted into a factory array behind an accessor.
    DuplicateLiteral,
    /// Parameters virtualised onto an indexed stack.
    Stack,
    /// Compressed string table with a lookup function.
    StringCompression,
    /// Packed-integer string encoding with a realm probe.
    StringConcealing,
    /// Literal assigned once, overwritten once, read before the overwrite.
    Placeholder,
    /// Lazily built object whose properties are used as constant tests.
    OpaquePredicate,
    /// Globals read through a switch accessor.
    GlobalConcealing,
    /// Constant object used by flattened control flow.
    FlatteningObject,
}

impl TemplateKind {
    /// Confidence one match of this template contributes to detection.
    ///
    /// Templates with a distinctive fingerprint score high; templates whose shape also occurs in
    /// hand-written code score low.
    #[must_use]
    pub fn confidence(self) -> usize {
        match self {
            Self::MinifiedArrow
            | Self::StringCompression
            | Self::StringConcealing
            | Self::GlobalConcealing
            | Self::DuplicateLiteral => 50,
            Self::Stack | Self::OpaquePredicate | Self::FlatteningObject => 30,
            Self::AntiTooling => 20,
            Self::Placeholder => 10,
        }
    }
}

/// Common view of every match record.
pub trait TemplateMatch {
    /// The template matched.
    fn kind(&self) -> TemplateKind;

    /// Where the construct is anchored, usually its main declaration.
    fn site(&self) -> SiteKey;

    /// One-line description for logs and reports.
    fn describe(&self) -> String;
}

/// A named function: a declaration or a `var` initialised with a function or arrow.
pub struct Callable<'a> {
    /// The binding naming the function.
    pub id: Id,
    /// Range of the declaring identifier.
    pub name_site: SiteKey,
    /// Range of the function node.
    pub site: SiteKey,
    /// Declared parameters.
    pub params: Vec<&'a Pat>,
    /// Statement body; `None` for an expression-bodied arrow.
    pub body: Option<&'a [Stmt]>,
    /// True for an arrow function.
    pub is_arrow: bool,
    /// True if the declaration sits directly in the script body.
    pub top_level: bool,
    node: CallableNode<'a>,
}

enum CallableNode<'a> {
    Decl(&'a FnDecl),
    Var(&'a VarDeclarator),
}

impl Callable<'_> {
    /// The parameter at `index` if it is a plain identifier.
    #[must_use]
    pub fn param_id(&self, index: usize) -> Option<Id> {
        match self.params.get(index)? {
            Pat::Ident(binding) => Some(binding.id.to_id()),
            Pat::Assign(assign) => match &*assign.left {
                Pat::Ident(binding) => Some(binding.id.to_id()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The function as a standalone statement, for printing.
    #[must_use]
    pub fn to_stmt(&self) -> Stmt {
        match self.node {
            CallableNode::Decl(decl) => Stmt::Decl(Decl::Fn(decl.clone())),
            CallableNode::Var(declarator) => Stmt::Decl(Decl::Var(Box::new(VarDecl {
                span: DUMMY_SP,
                kind: VarDeclKind::Var,
                declare: false,
                decls: vec![declarator.clone()],
            }))),
        }
    }

    /// True if this is a function declaration statement.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        matches!(self.node, CallableNode::Decl(_))
    }
}

/// Calls `f` for every named function in the script, outermost first.
pub fn for_each_callable(script: &Script, f: impl FnMut(&Callable<'_>)) {
    let mut walker = CallableWalker { f, depth: 0 };
    script.visit_with(&mut walker);
}

struct CallableWalker<F> {
    f: F,
    depth: usize,
}

impl<F: FnMut(&Callable<'_>)> Visit for CallableWalker<F> {
    fn visit_fn_decl(&mut self, n: &FnDecl) {
        let callable = Callable {
            id: n.ident.to_id(),
            name_site: SiteKey::of(n.ident.span),
            site: SiteKey::of(n.function.span),
            params: n.function.params.iter().map(|p| &p.pat).collect(),
            body: n.function.body.as_ref().map(|b| b.stmts.as_slice()),
            is_arrow: false,
            top_level: self.depth == 0,
            node: CallableNode::Decl(n),
        };
        (self.f)(&callable);
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        if let (Pat::Ident(name), Some(init)) = (&n.name, &n.init) {
            let callable = match init.unwrap_parens() {
                Expr::Fn(fn_expr) => Some(Callable {
                    id: name.id.to_id(),
                    name_site: SiteKey::of(name.id.span),
                    site: SiteKey::of(fn_expr.function.span),
                    params: fn_expr.function.params.iter().map(|p| &p.pat).collect(),
                    body: fn_expr.function.body.as_ref().map(|b| b.stmts.as_slice()),
                    is_arrow: false,
                    top_level: self.depth == 0,
                    node: CallableNode::Var(n),
                }),
                Expr::Arrow(arrow) => Some(Callable {
                    id: name.id.to_id(),
                    name_site: SiteKey::of(name.id.span),
                    site: SiteKey::of(arrow.span),
                    params: arrow.params.iter().collect(),
                    body: match &*arrow.body {
                        BlockStmtOrExpr::BlockStmt(block) => Some(block.stmts.as_slice()),
                        BlockStmtOrExpr::Expr(_) => None,
                    },
                    is_arrow: true,
                    top_level: self.depth == 0,
                    node: CallableNode::Var(n),
                }),
                _ => None,
            };
            if let Some(callable) = callable {
                (self.f)(&callable);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_function(&mut self, n: &swc_core::ecma::ast::Function) {
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }

    fn visit_arrow_expr(&mut self, n: &swc_core::ecma::ast::ArrowExpr) {
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }
}

/// Finds the variable whose initialiser contains `site`, innermost first.
#[must_use]
pub fn enclosing_declarator(script: &Script, site: SiteKey) -> Option<Id> {
    struct Finder {
        site: SiteKey,
        found: Option<Id>,
    }
    impl Visit for Finder {
        fn visit_var_declarator(&mut self, n: &VarDeclarator) {
            if let (Pat::Ident(name), Some(init)) = (&n.name, &n.init) {
                if SiteKey::of(init.span()).contains(self.site) {
                    self.found = Some(name.id.to_id());
                }
            }
            n.visit_children_with(self);
        }
    }
    let mut finder = Finder { site, found: None };
    script.visit_with(&mut finder);
    finder.found
}

/// Functions (by owning name) that contain a reference to `id`, in first-use order.
#[must_use]
pub fn referencing_functions(bindings: &BindingIndex, id: &Id) -> Vec<Id> {
    let mut seen = HashSet::new();
    bindings
        .get(id)
        .into_iter()
        .flat_map(|binding| binding.references.iter())
        .filter_map(|reference| reference.function.as_ref()?.owner.clone())
        .filter(|owner| seen.insert(owner.clone()))
        .collect()
}

/// True if anything stores into the object held by `id`: an assignment, update or `delete`
/// whose target is a member chain rooted at `id` (`A[1] = x`, `A[0].k++`, `delete A[2]`).
#[must_use]
pub fn writes_through_member(script: &Script, id: &Id) -> bool {
    struct Finder<'a> {
        id: &'a Id,
        found: bool,
    }
    impl Finder<'_> {
        fn rooted(&self, member: &MemberExpr) -> bool {
            let mut obj = &*member.obj;
            loop {
                match obj.unwrap_parens() {
                    Expr::Member(inner) => obj = &inner.obj,
                    Expr::Ident(ident) => return ident.to_id() == *self.id,
                    _ => return false,
                }
            }
        }

        fn target(&self, expr: &Expr) -> bool {
            matches!(expr.unwrap_parens(), Expr::Member(member) if self.rooted(member))
        }
    }
    impl Visit for Finder<'_> {
        fn visit_assign_expr(&mut self, n: &AssignExpr) {
            if let AssignTarget::Simple(SimpleAssignTarget::Member(member)) = &n.left {
                self.found |= self.rooted(member);
            }
            n.visit_children_with(self);
        }

        fn visit_update_expr(&mut self, n: &UpdateExpr) {
            self.found |= self.target(&n.arg);
            n.visit_children_with(self);
        }

        fn visit_unary_expr(&mut self, n: &UnaryExpr) {
            if n.op == UnaryOp::Delete {
                self.found |= self.target(&n.arg);
            }
            n.visit_children_with(self);
        }
    }
    let mut finder = Finder { id, found: false };
    script.visit_with(&mut finder);
    finder.found
}

/// True if `stmts` contains a string literal with exactly `len` characters.
#[must_use]
pub fn contains_string_of_len(stmts: &[Stmt], len: usize) -> bool {
    struct Finder {
        len: usize,
        found: bool,
    }
    impl Visit for Finder {
        fn visit_str(&mut self, n: &swc_core::ecma::ast::Str) {
            if n.value.chars().count() == self.len {
                self.found = true;
            }
        }
    }
    let mut finder = Finder { len, found: false };
    stmts.visit_with(&mut finder);
    finder.found
}
