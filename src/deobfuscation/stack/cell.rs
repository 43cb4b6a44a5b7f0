//! Abstract cells and the per-function slot cache.

use std::collections::{BTreeMap, HashSet};

use swc_core::ecma::ast::Expr;

/// Abstract value of one stack slot.
#[derive(Debug, Clone, PartialEq)]
pub enum StackCell {
    /// The slot still holds the caller's argument.
    Param,
    /// The slot holds a known expression.
    ///
    /// `uses_arguments` marks values copied from `arguments[k]`; those are only valid inside the
    /// function that owns the stack.
    Value {
        /// Expression to substitute for reads.
        expr: Box<Expr>,
        /// True if `expr` reads `arguments`.
        uses_arguments: bool,
    },
    /// The slot holds whatever the `Param` slot at the given index holds.
    Ref(usize),
    /// Nothing is known.
    Invalid,
}

impl StackCell {
    /// A value cell for a literal.
    #[must_use]
    pub fn literal(expr: Box<Expr>) -> Self {
        Self::Value {
            expr,
            uses_arguments: false,
        }
    }

    /// True for [`StackCell::Value`] and [`StackCell::Ref`], the cells whose reads are rewritten.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Value { .. } | Self::Ref(_))
    }
}

/// Slot map of one stack during one interpretation round.
///
/// Absent slots read as the initial cell ([`StackCell::Param`] for a rest parameter,
/// [`StackCell::Invalid`] for a local array) unless a `.length` assignment truncated them, after
/// which they read as `undefined`. Poisoned slots are written somewhere the interpreter does not
/// follow; they stay [`StackCell::Invalid`] whatever is written to them.
#[derive(Debug, Clone)]
pub struct StackCache {
    cells: BTreeMap<usize, StackCell>,
    initial: StackCell,
    undefined_from: Option<usize>,
    poisoned: HashSet<usize>,
}

impl StackCache {
    /// A cache for a stack bound to a rest parameter.
    #[must_use]
    pub fn for_rest_parameter(poisoned: HashSet<usize>) -> Self {
        Self {
            cells: BTreeMap::new(),
            initial: StackCell::Param,
            undefined_from: None,
            poisoned,
        }
    }

    /// A cache for a stack bound to a local `[]`.
    #[must_use]
    pub fn for_local_array(poisoned: HashSet<usize>) -> Self {
        Self {
            cells: BTreeMap::new(),
            initial: StackCell::Invalid,
            undefined_from: None,
            poisoned,
        }
    }

    /// Current cell of `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> StackCell {
        if self.poisoned.contains(&slot) {
            return StackCell::Invalid;
        }
        if let Some(cell) = self.cells.get(&slot) {
            return cell.clone();
        }
        match self.undefined_from {
            Some(from) if slot >= from => {
                StackCell::literal(Box::new(crate::syntax::build::undefined()))
            }
            _ => self.initial.clone(),
        }
    }

    /// Resolves a read of `slot` for use as the value of another slot.
    ///
    /// Values resolve to themselves, a `Param` slot to a reference to it, and references are
    /// followed (they always end at a `Param` slot).
    #[must_use]
    pub fn resolve(&self, slot: usize) -> StackCell {
        match self.get(slot) {
            StackCell::Param => StackCell::Ref(slot),
            StackCell::Ref(target) => match self.get(target) {
                StackCell::Param => StackCell::Ref(target),
                _ => StackCell::Invalid,
            },
            other => other,
        }
    }

    /// Stores `cell` in `slot`.
    ///
    /// Every reference to `slot` is invalidated first, since its target changes. A reference of
    /// a slot to itself is stored as [`StackCell::Invalid`], which keeps chains acyclic.
    pub fn write(&mut self, slot: usize, cell: StackCell) {
        self.invalidate_refs(|target| target == slot);
        let cell = match cell {
            StackCell::Ref(target) if target == slot => StackCell::Invalid,
            other => other,
        };
        self.cells.insert(slot, cell);
    }

    /// Applies `stack.length = length`.
    pub fn truncate(&mut self, length: usize) {
        self.cells.retain(|&slot, _| slot < length);
        self.invalidate_refs(|target| target >= length);
        self.undefined_from = Some(self.undefined_from.map_or(length, |from| from.min(length)));
    }

    fn invalidate_refs(&mut self, hit: impl Fn(usize) -> bool) {
        for cell in self.cells.values_mut() {
            if matches!(cell, StackCell::Ref(target) if hit(*target)) {
                *cell = StackCell::Invalid;
            }
        }
    }
}
