use swc_core::ecma::ast::{Id, Stmt};

use crate::{analysis::DeclarationSite, syntax::SourceTree, Result};

/// The declarations a fragment needs to run standalone.
///
/// Entries are unique per binding and only ever added. The prelude is printed in ascending
/// original position regardless of insertion order, so a helper discovered late by a retry still
/// runs before the code that uses it.
#[derive(Debug, Clone, Default)]
pub struct DependencyClosure {
    entries: Vec<DeclarationSite>,
}

impl DependencyClosure {
    /// Creates an empty closure.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration.
    ///
    /// # Returns
    ///
    /// `false` if a declaration of the same binding is already present; the closure is
    /// unchanged in that case.
    pub fn insert(&mut self, site: DeclarationSite) -> bool {
        if self.contains(&site.id) {
            return false;
        }
        let at = self
            .entries
            .partition_point(|entry| entry.position.offset() <= site.position.offset());
        self.entries.insert(at, site);
        true
    }

    /// True if `id` is already part of the closure.
    #[must_use]
    pub fn contains(&self, id: &Id) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    /// True if some binding called `name` is part of the closure.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| &*entry.id.0 == name)
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings in prelude order.
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.entries.iter().map(|entry| &entry.id)
    }

    /// Prints the declarations in ascending original position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Codegen`] if printing fails.
    pub fn prelude(&self, tree: &SourceTree) -> Result<String> {
        let stmts: Vec<Stmt> = self.entries.iter().map(|entry| entry.stmt.clone()).collect();
        tree.print_stmts(&stmts)
    }
}
