//! Duplicate literals hoisted into a factory array.
//!
//! ```text
//! var A;
//! function F() { return ["a", "b", 3]; }
//! A = F();
//! function get(i) { return A[i]; }
//! use(get(1));
//! ```
//!
//! The factory takes no parameters, its first statement returns an array literal, and it is
//! referenced exactly once: as the initialiser or assigned value of the array binding. The array
//! is only ever indexed, never written through, and every function reading it is an accessor.
//! Accessors must never be reassigned.

use swc_core::ecma::ast::{Expr, Id, ReturnStmt, Stmt};

use crate::{
    analysis::{BindingIndex, ReferenceRole, ViolationKind},
    deobfuscation::templates::{
        for_each_callable, referencing_functions, writes_through_member, TemplateKind,
        TemplateMatch,
    },
    syntax::{locate, SiteKey, SourceTree},
};

/// A factory, the array it fills, and the accessors over it.
#[derive(Debug, Clone)]
pub struct DuplicateLiteralMatch {
    /// The zero-parameter factory.
    pub factory: Id,
    /// The binding holding the array.
    pub array: Id,
    /// The `A = F()` assignment, when the array is not initialised in its declaration.
    pub assignment: Option<SiteKey>,
    /// Functions that read the array, in first-use order.
    pub accessors: Vec<Id>,
    /// Range of the factory.
    pub site: SiteKey,
}

impl TemplateMatch for DuplicateLiteralMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::DuplicateLiteral
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!(
            "literal array '{}' from '{}' behind {} accessor(s)",
            self.array.0,
            self.factory.0,
            self.accessors.len()
        )
    }
}

/// Finds factory/array pairs.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<DuplicateLiteralMatch> {
    let mut factories = Vec::new();
    for_each_callable(&tree.script, |callable| {
        let returns_array = matches!(
            callable.body,
            Some([Stmt::Return(ReturnStmt { arg: Some(arg), .. }), ..])
                if matches!(arg.unwrap_parens(), Expr::Array(_))
        );
        if callable.is_declaration() && callable.params.is_empty() && returns_array {
            factories.push((callable.id.clone(), callable.site));
        }
    });

    factories
        .into_iter()
        .filter_map(|(factory, site)| {
            let binding = bindings.get(&factory).filter(|b| b.is_constant())?;
            let [reference] = binding.references.as_slice() else {
                return None;
            };
            let call = reference.call_site()?;
            let (array, assignment) = array_binding(tree, bindings, call)?;
            if !only_indexed(bindings, &array) || writes_through_member(&tree.script, &array) {
                return None;
            }
            let accessors = referencing_functions(bindings, &array)
                .into_iter()
                .filter(|accessor| *accessor != factory)
                .collect::<Vec<_>>();
            let constant = |id: &Id| bindings.get(id).is_some_and(|b| b.is_constant());
            if accessors.is_empty() || !accessors.iter().all(constant) {
                return None;
            }
            Some(DuplicateLiteralMatch {
                factory,
                array,
                assignment,
                accessors,
                site,
            })
        })
        .collect()
}

/// The binding receiving the factory call at `call`.
fn array_binding(
    tree: &SourceTree,
    bindings: &BindingIndex,
    call: SiteKey,
) -> Option<(Id, Option<SiteKey>)> {
    if let Some(array) = locate(&tree.script, call)?.declarator {
        return bindings
            .get(&array)
            .is_some_and(|b| b.is_constant())
            .then_some((array, None));
    }
    bindings.iter().find_map(|binding| {
        let [assignment] = binding.violations.as_slice() else {
            return None;
        };
        if assignment.kind != ViolationKind::Assign || !assignment.site.contains(call) {
            return None;
        }
        only_indexed(bindings, &binding.id).then(|| (binding.id.clone(), Some(assignment.site)))
    })
}

/// Every read of `array` indexes it.
fn only_indexed(bindings: &BindingIndex, array: &Id) -> bool {
    bindings.get(array).is_some_and(|binding| {
        binding
            .references
            .iter()
            .all(|r| r.role == ReferenceRole::MemberObject)
    })
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
    fn test_declarator_form() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function arr(){ return ['a','b','c']; } var A = arr(); \
                 function get(i){ return A[i]; } use(get(1));",
            )?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            assert_eq!(&*found[0].array.0, "A");
            assert!(found[0].assignment.is_none());
            assert_eq!(found[0].accessors.len(), 1);
            Ok(())
        })
    }

    #[test]
    fn test_assignment_form() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "var A; function arr(){ return [1, 2]; } A = arr(); \
                 var get = (i) => A[i - 1]; use(get(2));",
            )?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            assert!(found[0].assignment.is_some());
            assert_eq!(&*found[0].accessors[0].0, "get");
            Ok(())
        })
    }

    #[test]
    fn test_declines_shared_factory() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function arr(){ return [1]; } var A = arr(); var B = arr(); \
                 function get(i){ return A[i] + B[i]; }",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_element_writes() -> Result<()> {
        with_globals(|| {
            for write in ["A[1] = 'z';", "A[0]++;", "delete A[2];", "A = [];"] {
                let tree = SourceTree::parse(&format!(
                    "function arr(){{ return ['a','b','c']; }} var A = arr(); \
                     function get(i){{ return A[i]; }} {write} use(get(1));"
                ))?;
                assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty(), "{write}");
            }
            Ok(())
        })
    }

    #[test]
    fn test_declines_escaping_array() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function arr(){ return ['a']; } var A = arr(); \
                 function get(i){ return A[i]; } mutate(A); use(get(0));",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_accessor() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function arr(){ return ['a']; } var A = arr(); \
                 function get(i){ return A[i]; } get = other; use(get(0));",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());

            let tree = SourceTree::parse(
                "function arr(){ return ['a']; } arr = other; var A = arr(); \
                 function get(i){ return A[i]; } use(get(0));",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }
}
