//! Text↔tree conversion and the generic tree utilities the passes are built on.
//!
//! This module wraps the `swc` toolchain behind the small contracts the deobfuscation core
//! consumes:
//!
//! | Contract | Provided by |
//! |---|---|
//! | `parse(text) -> Tree \| ParseError` | [`SourceTree::parse`] |
//! | `generate(Tree) -> text` | [`SourceTree::generate`] |
//! | `fold(subtree)` | [`ConstantFolder::fold`] |
//! | `prune(subtree)` | [`BranchPruner::prune`] |
//!
//! Besides the collaborators it provides [`SiteKey`] (stable node identity by source range),
//! [`locate`] to find expressions again by site, the in-place editors in [`edit`], and node
//! constructors in [`build`].
//!
//! # Globals
//!
//! `swc` keeps hygiene data in a scoped thread-local. Everything that parses, resolves or
//! rewrites a tree must run inside [`with_globals`]; the engine entry points do this for their
//! callers.

pub mod build;
pub mod edit;
mod find;
mod simplify;
mod site;
mod tree;

pub use find::{locate, locate_all, Located};
pub use simplify::{BranchPruner, ConstantFolder};
pub use site::SiteKey;
pub use tree::SourceTree;

use swc_core::common::{Globals, GLOBALS};

/// Runs `f` with a fresh set of `swc` hygiene globals installed.
pub fn with_globals<R>(f: impl FnOnce() -> R) -> R {
    GLOBALS.set(&Globals::new(), f)
}
