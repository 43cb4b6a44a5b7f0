//! Fixed-point resolution of parameters virtualised onto an indexed stack.
//!
//! # Stack shapes
//!
//! ```text
//! function f(...s) { s.length = 2; s[2] = s[0]; return s[2] + s[1]; }   // rest parameter
//! function g() { var s = []; s[0] = arguments[0]; return s[0]; }       // local array
//! ```
//!
//! # Steps
//!
//! The body is cut into steps: each top-level statement, with a top-level comma sequence split
//! into its elements. A step of the form `s[k] = rhs` or `s.length = N` is a tracked write; any
//! other write to the stack, wherever it occurs, poisons its slot. Steps are interpreted in order
//! over a [`StackCache`], and each read is judged against the cache state at its step.
//!
//! A stack is declined outright when it escapes: used as a plain value, indexed by a
//! non-literal, called as a method receiver, deleted from, destructured into, or read through
//! `.length`. Direct `eval` and `with` decline every stack of the function.

use std::collections::{HashMap, HashSet};

use swc_core::{
    common::{util::take::Take, Mark},
    ecma::{
        ast::{
            ArrowExpr, AssignExpr, AssignOp, AssignTarget, BlockStmtOrExpr, CallExpr, Callee, Class,
            Decl, Expr, FnDecl, FnExpr, Function, GetterProp, Id, Ident, MemberExpr, MemberProp,
            OptChainBase, OptChainExpr, Param, Pat, SeqExpr, SetterProp, SimpleAssignTarget, Stmt,
            UnaryExpr, UnaryOp, UpdateExpr, VarDeclarator, WithStmt,
        },
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};

use crate::{
    analysis::{index_value, is_literal, is_pure, static_member_key, BindingIndex},
    deobfuscation::stack::{StackCache, StackCell},
    syntax::{build, edit::ExprReplacer, SiteKey},
};

/// How the stack is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackShape {
    /// The trailing `...s` parameter; unwritten slots hold arguments.
    RestParameter,
    /// A top-level `var s = []` of the body; the declaration sits at the given site.
    LocalArray(SiteKey),
}

/// What one interpretation round did to one stack.
#[derive(Debug, Clone)]
pub struct StackReport {
    /// The function owning the stack.
    pub function: SiteKey,
    /// Name the function is bound to, if any.
    pub owner: Option<Id>,
    /// The stack binding.
    pub stack: Id,
    /// How the stack is bound.
    pub shape: StackShape,
    /// Declared length: the first literal `.length` assignment, else the length hint.
    pub length: Option<usize>,
    /// Read sites that were rewritten.
    pub resolved: Vec<SiteKey>,
    /// Tracked writes dropped because nothing reads their slot any more.
    pub dropped_writes: usize,
    /// True if the stack had no reads left and was removed with its writes.
    pub removed: bool,
    /// Why the stack was left alone, if it was.
    pub declined: Option<&'static str>,
}

impl StackReport {
    /// True if the round changed the tree.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.resolved.is_empty() || self.dropped_writes > 0 || self.removed
    }
}

/// One interpretation round over every function of a tree.
///
/// Run it with `tree.script.visit_mut_with(&mut interpreter)`, then collect
/// [`StackInterpreter::into_reports`]. Inner functions are interpreted before the functions
/// enclosing them.
pub struct StackInterpreter<'a> {
    bindings: &'a BindingIndex,
    lengths: &'a HashMap<Id, usize>,
    unresolved: Mark,
    pending_owner: Option<Id>,
    reports: Vec<StackReport>,
}

impl<'a> StackInterpreter<'a> {
    /// Creates an interpreter.
    ///
    /// # Arguments
    ///
    /// * `bindings` - Index crawled from the tree about to be interpreted.
    /// * `lengths` - Length hints keyed by the function they were recorded for.
    /// * `unresolved` - Mark of undeclared names; identifies the real `arguments`.
    #[must_use]
    pub fn new(
        bindings: &'a BindingIndex,
        lengths: &'a HashMap<Id, usize>,
        unresolved: Mark,
    ) -> Self {
        Self {
            bindings,
            lengths,
            unresolved,
            pending_owner: None,
            reports: Vec::new(),
        }
    }

    /// Reports of every stack seen, in the order they were interpreted.
    #[must_use]
    pub fn into_reports(self) -> Vec<StackReport> {
        self.reports
    }

    fn interpret(&mut self, mut function: FunctionView<'_>, owner: Option<Id>) {
        let mut stacks = Vec::new();
        if let Some(id) = function.params.rest_ident() {
            stacks.push((id, StackShape::RestParameter));
        }
        for stmt in function.body.iter() {
            if let Some((id, site)) = local_array(stmt) {
                stacks.push((id, StackShape::LocalArray(site)));
            }
        }
        if stacks.is_empty() {
            return;
        }

        let arguments_stable = !function.is_arrow
            && function
                .params
                .simple_idents()
                .map(|ids| {
                    ids.iter()
                        .all(|id| self.bindings.get(id).map_or(true, |b| b.is_constant()))
                })
                .unwrap_or(false);

        for (stack, shape) in stacks {
            let hint = owner.as_ref().and_then(|o| self.lengths.get(o)).copied();
            let mut frame = StackFrame {
                stack: &stack,
                shape,
                unresolved: self.unresolved,
                arguments_stable,
            };
            let mut report = StackReport {
                function: function.site,
                owner: owner.clone(),
                stack: stack.clone(),
                shape,
                length: hint,
                resolved: Vec::new(),
                dropped_writes: 0,
                removed: false,
                declined: None,
            };
            frame.run(&mut *function.body, &mut report);
            if report.removed && shape == StackShape::RestParameter {
                function.params.pop_rest();
            }
            self.reports.push(report);
        }
    }
}

impl VisitMut for StackInterpreter<'_> {
    fn visit_mut_fn_decl(&mut self, n: &mut FnDecl) {
        self.pending_owner = Some(n.ident.to_id());
        n.function.visit_mut_with(self);
    }

    fn visit_mut_fn_expr(&mut self, n: &mut FnExpr) {
        if let Some(ident) = &n.ident {
            self.pending_owner = Some(ident.to_id());
        }
        n.function.visit_mut_with(self);
    }

    fn visit_mut_var_declarator(&mut self, n: &mut VarDeclarator) {
        if let (Pat::Ident(name), Some(init)) = (&n.name, &n.init) {
            if matches!(&**init, Expr::Fn(FnExpr { ident: None, .. }) | Expr::Arrow(_)) {
                self.pending_owner = Some(name.id.to_id());
            }
        }
        n.visit_mut_children_with(self);
    }

    fn visit_mut_function(&mut self, n: &mut Function) {
        let owner = self.pending_owner.take();
        n.visit_mut_children_with(self);
        let site = SiteKey::of(n.span);
        if let Some(body) = &mut n.body {
            let view = FunctionView {
                site,
                params: Params::Function(&mut n.params),
                body: &mut body.stmts,
                is_arrow: false,
            };
            self.interpret(view, owner);
        }
    }

    fn visit_mut_arrow_expr(&mut self, n: &mut ArrowExpr) {
        let owner = self.pending_owner.take();
        n.visit_mut_children_with(self);
        let site = SiteKey::of(n.span);
        if let BlockStmtOrExpr::BlockStmt(body) = &mut *n.body {
            let view = FunctionView {
                site,
                params: Params::Arrow(&mut n.params),
                body: &mut body.stmts,
                is_arrow: true,
            };
            self.interpret(view, owner);
        }
    }
}

struct FunctionView<'f> {
    site: SiteKey,
    params: Params<'f>,
    body: &'f mut Vec<Stmt>,
    is_arrow: bool,
}

enum Params<'f> {
    Function(&'f mut Vec<Param>),
    Arrow(&'f mut Vec<Pat>),
}

impl Params<'_> {
    fn pats(&self) -> Vec<&Pat> {
        match self {
            Params::Function(params) => params.iter().map(|p| &p.pat).collect(),
            Params::Arrow(params) => params.iter().collect(),
        }
    }

    fn rest_ident(&self) -> Option<Id> {
        match self.pats().last()? {
            Pat::Rest(rest) => match &*rest.arg {
                Pat::Ident(binding) => Some(binding.id.to_id()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Ids of the parameters before the rest parameter, if all of them are plain names.
    fn simple_idents(&self) -> Option<Vec<Id>> {
        self.pats()
            .into_iter()
            .filter(|pat| !pat.is_rest())
            .map(|pat| match pat {
                Pat::Ident(binding) => Some(binding.id.to_id()),
                _ => None,
            })
            .collect()
    }

    fn pop_rest(&mut self) {
        match self {
            Params::Function(params) => {
                if params.last().is_some_and(|p| p.pat.is_rest()) {
                    params.pop();
                }
            }
            Params::Arrow(params) => {
                if params.last().is_some_and(Pat::is_rest) {
                    params.pop();
                }
            }
        }
    }
}

/// `var s = [];` as a single declarator.
fn local_array(stmt: &Stmt) -> Option<(Id, SiteKey)> {
    let Stmt::Decl(Decl::Var(var)) = stmt else {
        return None;
    };
    let [decl] = var.decls.as_slice() else {
        return None;
    };
    let Pat::Ident(name) = &decl.name else {
        return None;
    };
    match decl.init.as_deref() {
        Some(Expr::Array(array)) if array.elems.is_empty() => {
            Some((name.id.to_id(), SiteKey::of(name.id.span)))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepAction {
    Write(usize),
    Length(usize),
    Other,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    stmt: usize,
    elem: Option<usize>,
    action: StepAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Nesting {
    Body,
    FunctionExpr,
    FunctionDecl,
}

#[derive(Debug, Clone, Copy)]
struct SlotRead {
    site: SiteKey,
    slot: usize,
    step: usize,
    nesting: Nesting,
}

struct StackFrame<'s> {
    stack: &'s Id,
    shape: StackShape,
    unresolved: Mark,
    arguments_stable: bool,
}

impl StackFrame<'_> {
    fn run(&mut self, body: &mut Vec<Stmt>, report: &mut StackReport) {
        let steps = self.steps(body);
        let scan = self.scan(body, &steps);
        if let Some(reason) = scan.declined {
            report.declined = Some(reason);
            return;
        }
        if let Some(length) = steps.iter().find_map(|s| match s.action {
            StepAction::Length(n) => Some(n),
            _ => None,
        }) {
            report.length = Some(length);
        }

        let replacements = self.simulate(body, &steps, &scan);
        if !replacements.is_empty() {
            let mut replacer = ExprReplacer::new();
            for (site, expr) in replacements {
                report.resolved.push(site);
                replacer.insert(site, expr);
            }
            report.resolved.sort();
            replacer.apply_to(body);
        }

        let steps = self.steps(body);
        let rescan = self.scan(body, &steps);
        if rescan.declined.is_some() {
            return;
        }
        let read_slots: HashSet<usize> = rescan.reads.iter().map(|r| r.slot).collect();
        let dead = |action: StepAction| match action {
            StepAction::Write(slot) => !read_slots.contains(&slot),
            StepAction::Length(_) => read_slots.is_empty(),
            StepAction::Other => false,
        };
        let tracked = steps.iter().any(|s| s.action != StepAction::Other);
        report.dropped_writes = steps.iter().filter(|s| dead(s.action)).count();
        if report.dropped_writes > 0 {
            self.strip_writes(body, &dead);
        }
        if read_slots.is_empty() && rescan.poisoned.is_empty() && (tracked || report.changed()) {
            body.retain(|stmt| !self.declares_stack(stmt));
            report.removed = true;
        }
    }

    fn is_stack(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(ident) if ident.to_id() == *self.stack)
    }

    fn is_arguments(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Ident(ident)
            if &*ident.sym == "arguments" && ident.span.ctxt.outer() == self.unresolved)
    }

    fn steps(&self, body: &[Stmt]) -> Vec<Step> {
        let mut steps = Vec::new();
        for (i, stmt) in body.iter().enumerate() {
            match stmt {
                Stmt::Expr(expr_stmt) => match &*expr_stmt.expr {
                    Expr::Seq(SeqExpr { exprs, .. }) => {
                        for (j, elem) in exprs.iter().enumerate() {
                            steps.push(Step {
                                stmt: i,
                                elem: Some(j),
                                action: self.action(elem),
                            });
                        }
                    }
                    other => steps.push(Step {
                        stmt: i,
                        elem: None,
                        action: self.action(other),
                    }),
                },
                _ => steps.push(Step {
                    stmt: i,
                    elem: None,
                    action: StepAction::Other,
                }),
            }
        }
        steps
    }

    fn action(&self, expr: &Expr) -> StepAction {
        let Some((member, right)) = self.stack_assignment(expr) else {
            return StepAction::Other;
        };
        if let Some(slot) = slot_of(&member.prop) {
            return StepAction::Write(slot);
        }
        match static_member_key(&member.prop).as_deref() {
            Some("length") => index_value(right).map_or(StepAction::Other, StepAction::Length),
            _ => StepAction::Other,
        }
    }

    /// `s[..] = right` as the whole expression.
    fn stack_assignment<'e>(&self, expr: &'e Expr) -> Option<(&'e MemberExpr, &'e Expr)> {
        let Expr::Assign(AssignExpr {
            op: AssignOp::Assign,
            left: AssignTarget::Simple(SimpleAssignTarget::Member(member)),
            right,
            ..
        }) = expr
        else {
            return None;
        };
        self.is_stack(&member.obj).then_some((member, &**right))
    }

    fn scan(&mut self, body: &[Stmt], steps: &[Step]) -> Scan {
        let mut scanner = Scanner {
            frame: self,
            step: 0,
            nesting: Nesting::Body,
            scan: Scan::default(),
        };
        for (n, step) in steps.iter().enumerate() {
            scanner.step = n;
            let node = step_expr(body, step);
            match (step.action, node) {
                (StepAction::Write(_), Some(expr)) => {
                    if let Some((_, right)) = self.stack_assignment(expr) {
                        right.visit_with(&mut scanner);
                    }
                }
                (StepAction::Length(_), _) => {}
                (_, Some(expr)) => expr.visit_with(&mut scanner),
                (_, None) => body[step.stmt].visit_with(&mut scanner),
            }
        }

        let mut scan = scanner.scan;
        if let StackShape::LocalArray(_) = self.shape {
            let declared_at = scan.declared_at.unwrap_or(usize::MAX);
            let used_before = steps.iter().enumerate().any(|(n, s)| {
                n < declared_at && !matches!(s.action, StepAction::Other)
            }) || scan.reads.iter().any(|r| r.step < declared_at);
            if used_before {
                scan.declined.get_or_insert("used before its declaration");
            }
        }
        if scan.arguments_written {
            self.arguments_stable = false;
        }
        scan
    }

    fn simulate(&self, body: &[Stmt], steps: &[Step], scan: &Scan) -> Vec<(SiteKey, Box<Expr>)> {
        let mut cache = match self.shape {
            StackShape::RestParameter => StackCache::for_rest_parameter(scan.poisoned.clone()),
            StackShape::LocalArray(_) => StackCache::for_local_array(scan.poisoned.clone()),
        };
        let mut reads: HashMap<usize, Vec<&SlotRead>> = HashMap::new();
        for read in &scan.reads {
            reads.entry(read.step).or_default().push(read);
        }

        let mut replacements = Vec::new();
        for (n, step) in steps.iter().enumerate() {
            for read in reads.get(&n).into_iter().flatten() {
                if read.site.is_synthetic() {
                    continue;
                }
                if let Some(expr) = self.rewrite(read, &cache, steps) {
                    replacements.push((read.site, expr));
                }
            }
            match step.action {
                StepAction::Write(slot) => {
                    let cell = step_expr(body, step)
                        .and_then(|expr| self.stack_assignment(expr))
                        .map_or(StackCell::Invalid, |(_, right)| self.classify(right, &cache));
                    cache.write(slot, cell);
                }
                StepAction::Length(length) => cache.truncate(length),
                StepAction::Other => {}
            }
        }
        replacements
    }

    /// Value of a tracked write's right-hand side.
    fn classify(&self, rhs: &Expr, cache: &StackCache) -> StackCell {
        let rhs = rhs.unwrap_parens();
        if is_literal(rhs) {
            return StackCell::literal(build::detached(rhs));
        }
        let Expr::Member(member) = rhs else {
            return StackCell::Invalid;
        };
        if self.is_stack(&member.obj) {
            return slot_of(&member.prop).map_or(StackCell::Invalid, |slot| cache.resolve(slot));
        }
        if let Some(element) = decoy_element(member) {
            return StackCell::literal(build::detached(element));
        }
        if self.arguments_stable && self.is_arguments(&member.obj) && slot_of(&member.prop).is_some()
        {
            return StackCell::Value {
                expr: build::detached(rhs),
                uses_arguments: true,
            };
        }
        StackCell::Invalid
    }

    fn rewrite(&self, read: &SlotRead, cache: &StackCache, steps: &[Step]) -> Option<Box<Expr>> {
        match (read.nesting, cache.get(read.slot)) {
            (Nesting::Body, StackCell::Value { expr, .. }) => Some(build::detached(&expr)),
            (Nesting::Body, StackCell::Ref(target)) if target != read.slot => {
                let stack = Expr::Ident(build::ident(self.stack));
                Some(Box::new(build::index_member(stack, target)))
            }
            (
                Nesting::FunctionExpr,
                StackCell::Value {
                    expr,
                    uses_arguments: false,
                },
            ) if self.settled(read, steps) => Some(build::detached(&expr)),
            _ => None,
        }
    }

    /// True if the slot cannot change once the read's step has run.
    fn settled(&self, read: &SlotRead, steps: &[Step]) -> bool {
        steps[read.step..].iter().all(|step| match step.action {
            StepAction::Write(slot) => slot != read.slot,
            StepAction::Length(length) => length > read.slot,
            StepAction::Other => true,
        })
    }

    /// Drops the tracked writes `dead` selects, keeping right-hand sides with effects.
    fn strip_writes(&self, body: &mut Vec<Stmt>, dead: &impl Fn(StepAction) -> bool) {
        let old = std::mem::take(body);
        for stmt in old {
            let Stmt::Expr(mut expr_stmt) = stmt else {
                body.push(stmt);
                continue;
            };
            let kept = match *expr_stmt.expr.take() {
                Expr::Seq(seq) => {
                    let mut exprs: Vec<Box<Expr>> = seq
                        .exprs
                        .into_iter()
                        .filter_map(|e| self.strip_write(e, dead))
                        .collect();
                    match exprs.len() {
                        0 => None,
                        1 => exprs.pop(),
                        _ => Some(Box::new(Expr::Seq(SeqExpr {
                            span: seq.span,
                            exprs,
                        }))),
                    }
                }
                other => self.strip_write(Box::new(other), dead),
            };
            if let Some(expr) = kept {
                expr_stmt.expr = expr;
                body.push(Stmt::Expr(expr_stmt));
            }
        }
    }

    /// The statement-level remainder of `expr` once a dead write is dropped.
    fn strip_write(
        &self,
        expr: Box<Expr>,
        dead: &impl Fn(StepAction) -> bool,
    ) -> Option<Box<Expr>> {
        if !dead(self.action(&expr)) {
            return Some(expr);
        }
        match *expr {
            Expr::Assign(assign) => (!self.is_droppable(&assign.right)).then_some(assign.right),
            other => Some(Box::new(other)),
        }
    }

    /// True if evaluating `rhs` has no effect worth keeping.
    fn is_droppable(&self, rhs: &Expr) -> bool {
        if is_pure(rhs) {
            return true;
        }
        match rhs.unwrap_parens() {
            Expr::Member(member) => {
                ((self.is_arguments(&member.obj) || self.is_stack(&member.obj))
                    && slot_of(&member.prop).is_some())
                    || decoy_element(member).is_some()
            }
            _ => false,
        }
    }

    fn declares_stack(&self, stmt: &Stmt) -> bool {
        match self.shape {
            StackShape::LocalArray(site) => local_array(stmt).is_some_and(|(_, s)| s == site),
            StackShape::RestParameter => false,
        }
    }
}

fn step_expr<'b>(body: &'b [Stmt], step: &Step) -> Option<&'b Expr> {
    let Stmt::Expr(expr_stmt) = &body[step.stmt] else {
        return None;
    };
    match (step.elem, &*expr_stmt.expr) {
        (Some(j), Expr::Seq(seq)) => seq.exprs.get(j).map(|e| &**e),
        (None, expr) => Some(expr),
        _ => None,
    }
}

fn slot_of(prop: &MemberProp) -> Option<usize> {
    match prop {
        MemberProp::Computed(computed) => index_value(&computed.expr),
        _ => None,
    }
}

/// The element of `[lit][0]`.
fn decoy_element(member: &MemberExpr) -> Option<&Expr> {
    let Expr::Array(array) = &*member.obj else {
        return None;
    };
    let [Some(element)] = array.elems.as_slice() else {
        return None;
    };
    (element.spread.is_none() && is_literal(&element.expr) && slot_of(&member.prop) == Some(0))
        .then_some(&*element.expr)
}

#[derive(Default)]
struct Scan {
    reads: Vec<SlotRead>,
    poisoned: HashSet<usize>,
    declined: Option<&'static str>,
    declared_at: Option<usize>,
    arguments_written: bool,
}

struct Scanner<'f, 's> {
    frame: &'f StackFrame<'s>,
    step: usize,
    nesting: Nesting,
    scan: Scan,
}

impl Scanner<'_, '_> {
    fn decline(&mut self, reason: &'static str) {
        self.scan.declined.get_or_insert(reason);
    }

    fn nested(&mut self, nesting: Nesting, f: impl FnOnce(&mut Self)) {
        let saved = self.nesting;
        self.nesting = self.nesting.max(nesting);
        f(self);
        self.nesting = saved;
    }

    /// Records a write to `member` that is not a tracked step.
    fn untracked_write(&mut self, member: &MemberExpr) {
        match slot_of(&member.prop) {
            Some(slot) => {
                self.scan.poisoned.insert(slot);
            }
            None => self.decline("written through a non-literal index"),
        }
        if let MemberProp::Computed(computed) = &member.prop {
            computed.visit_with(self);
        }
    }
}

impl Visit for Scanner<'_, '_> {
    fn visit_ident(&mut self, n: &Ident) {
        if n.to_id() == *self.frame.stack {
            self.decline("escapes as a value");
        }
    }

    fn visit_member_expr(&mut self, n: &MemberExpr) {
        if !self.frame.is_stack(&n.obj) {
            n.visit_children_with(self);
            return;
        }
        match slot_of(&n.prop) {
            Some(slot) => self.scan.reads.push(SlotRead {
                site: SiteKey::of(n.span),
                slot,
                step: self.step,
                nesting: self.nesting,
            }),
            None => self.decline("read through a non-literal index"),
        }
        if let MemberProp::Computed(computed) = &n.prop {
            computed.visit_with(self);
        }
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        match &n.left {
            AssignTarget::Simple(SimpleAssignTarget::Member(member))
                if self.frame.is_stack(&member.obj) =>
            {
                self.untracked_write(member);
                n.right.visit_with(self);
                return;
            }
            AssignTarget::Simple(SimpleAssignTarget::Member(member))
                if self.frame.is_arguments(&member.obj) =>
            {
                self.scan.arguments_written = true;
            }
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding))
                if &*binding.id.sym == "arguments" =>
            {
                self.scan.arguments_written = true;
            }
            _ => {}
        }
        n.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        if let Expr::Member(member) = &*n.arg {
            if self.frame.is_stack(&member.obj) {
                self.untracked_write(member);
                return;
            }
            if self.frame.is_arguments(&member.obj) {
                self.scan.arguments_written = true;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_unary_expr(&mut self, n: &UnaryExpr) {
        if n.op == UnaryOp::Delete {
            if let Expr::Member(member) = &*n.arg {
                if self.frame.is_stack(&member.obj) {
                    self.decline("slot deleted");
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if let Callee::Expr(callee) = &n.callee {
            match &**callee {
                Expr::Member(member) if self.frame.is_stack(&member.obj) => {
                    self.decline("slot called as a method");
                }
                Expr::Ident(ident) if &*ident.sym == "eval" => self.decline("direct eval"),
                _ => {}
            }
        }
        n.visit_children_with(self);
    }

    fn visit_opt_chain_expr(&mut self, n: &OptChainExpr) {
        if let OptChainBase::Member(member) = &*n.base {
            if self.frame.is_stack(&member.obj) {
                self.decline("optional access");
            }
        }
        n.visit_children_with(self);
    }

    fn visit_pat(&mut self, n: &Pat) {
        if let Pat::Expr(expr) = n {
            if let Expr::Member(member) = &**expr {
                if self.frame.is_stack(&member.obj) {
                    self.decline("destructured into");
                }
            }
        }
        n.visit_children_with(self);
    }

    fn visit_with_stmt(&mut self, n: &WithStmt) {
        self.decline("with statement");
        n.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        if let (Pat::Ident(name), StackShape::LocalArray(site)) = (&n.name, self.frame.shape) {
            if SiteKey::of(name.id.span) == site {
                if self.nesting == Nesting::Body {
                    self.scan.declared_at.get_or_insert(self.step);
                }
                n.init.visit_with(self);
                return;
            }
        }
        n.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.nested(Nesting::FunctionDecl, |s| n.visit_children_with(s));
    }

    fn visit_function(&mut self, n: &Function) {
        self.nested(Nesting::FunctionExpr, |s| n.visit_children_with(s));
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.nested(Nesting::FunctionExpr, |s| n.visit_children_with(s));
    }

    fn visit_getter_prop(&mut self, n: &GetterProp) {
        self.nested(Nesting::FunctionExpr, |s| n.visit_children_with(s));
    }

    fn visit_setter_prop(&mut self, n: &SetterProp) {
        self.nested(Nesting::FunctionExpr, |s| n.visit_children_with(s));
    }

    fn visit_class(&mut self, n: &Class) {
        self.nested(Nesting::FunctionExpr, |s| n.visit_children_with(s));
    }
}
