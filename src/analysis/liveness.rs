//! Removing declarations that nothing reads any more.

use log::debug;

use swc_core::ecma::ast::Id;

use crate::{
    analysis::{BindingIndex, ViolationKind},
    syntax::{
        edit::{AssignmentUnwrapper, DeclRemover},
        SourceTree,
    },
};

/// Removes the declaration of `id` if it is provably unused.
///
/// The index is crawled afresh; removal is refused while any reference remains, when a write
/// other than a plain `=` exists, or when the binding is a parameter. Plain assignments to the
/// name are rewritten to their right-hand side first so side effects survive.
///
/// # Arguments
///
/// * `tree` - The tree to edit in place.
/// * `id` - The binding to remove.
///
/// # Returns
///
/// `true` if the declaration was removed.
pub fn try_safe_delete(tree: &mut SourceTree, id: &Id) -> bool {
    let index = BindingIndex::crawl(&tree.script);
    let Some(binding) = index.get(id) else {
        return false;
    };
    if binding.is_referenced() || !binding.kind.is_removable() {
        return false;
    }
    if binding
        .violations
        .iter()
        .any(|v| !matches!(v.kind, ViolationKind::Assign | ViolationKind::Redeclaration))
    {
        return false;
    }

    let assigns: Vec<_> = binding
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::Assign)
        .map(|v| v.site)
        .collect();
    AssignmentUnwrapper::new(assigns).apply(&mut tree.script);

    let mut remover = DeclRemover::new();
    for site in &binding.declarations {
        remover.insert(*site);
    }
    let removed = remover.apply(&mut tree.script);
    if removed > 0 {
        debug!("removed dead declaration '{}'", binding.name());
    }
    removed > 0
}

/// Removes every dead binding in `ids`, repeating while removals free further names.
///
/// # Returns
///
/// The number of declarations removed.
pub fn try_safe_delete_all(tree: &mut SourceTree, ids: &[Id]) -> usize {
    let mut pending: Vec<&Id> = ids.iter().collect();
    let mut removed = 0;
    loop {
        let before = pending.len();
        pending.retain(|id| {
            if try_safe_delete(tree, id) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if pending.is_empty() || pending.len() == before {
            return removed;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::{try_safe_delete, try_safe_delete_all, BindingIndex},
        syntax::{with_globals, SourceTree},
        Result,
    };

    fn id_of(tree: &SourceTree, name: &str) -> swc_core::ecma::ast::Id {
        let index = BindingIndex::crawl(&tree.script);
        let id = index.named(name).next().expect("declared").id.clone();
        id
    }

    #[test]
    fn test_referenced_binding_is_kept() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("var a = 1; use(a);")?;
            let a = id_of(&tree, "a");
            assert!(!try_safe_delete(&mut tree, &a));
            assert!(tree.generate()?.contains("var a"));
            Ok(())
        })
    }

    #[test]
    fn test_assignment_effects_survive() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("var a; a = 1; a = f();")?;
            let a = id_of(&tree, "a");
            assert!(try_safe_delete(&mut tree, &a));
            let out = tree.generate()?;
            assert!(!out.contains("var a"));
            assert!(!out.contains("a ="));
            assert!(out.contains("f()"));
            Ok(())
        })
    }

    #[test]
    fn test_update_blocks_removal() -> Result<()> {
        with_globals(|| {
            let mut tree = SourceTree::parse("var n = 0; n++;")?;
            let n = id_of(&tree, "n");
            assert!(!try_safe_delete(&mut tree, &n));
            Ok(())
        })
    }

    #[test]
    fn test_cascade() -> Result<()> {
        with_globals(|| {
            let mut tree =
                SourceTree::parse("function inner() {} function outer() { return inner(); }")?;
            let ids = vec![id_of(&tree, "inner"), id_of(&tree, "outer")];
            assert_eq!(try_safe_delete_all(&mut tree, &ids), 2);
            assert_eq!(tree.generate()?.trim(), "");
            Ok(())
        })
    }
}
