//! Pass trait for the deobfuscation pipeline.
//!
//! Every stage of the pipeline, from the template rewrites to constant folding, implements
//! [`Pass`]. Passes do not declare their own order; the [`crate::deobfuscation::PassScheduler`]
//! runs them in the fixed sequence described there.

use crate::{
    deobfuscation::{config::PassId, context::PassContext},
    syntax::SourceTree,
    Result,
};

/// A rewrite over the whole program tree.
///
/// # Contract
///
/// - A pass that finds nothing to do returns `Ok(false)` and leaves the tree untouched.
/// - Binding facts are only trusted when crawled after the pass's last edit.
/// - A failed sandbox evaluation is terminal for its site only; it is recorded on
///   `ctx.events` and never propagated as an error.
/// - Errors are reserved for conditions that abort the run (a generated snippet that cannot be
///   reparsed, a sandbox worker that cannot start).
pub trait Pass {
    /// Identifier used for configuration and reports.
    fn id(&self) -> PassId;

    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str {
        self.id().name()
    }

    /// Run the pass once over the tree.
    ///
    /// Returns `true` if any changes were made, `false` otherwise. Events should be recorded
    /// directly to `ctx.events`.
    ///
    /// # Arguments
    ///
    /// * `tree` - The program tree to transform in place.
    /// * `ctx` - The per-run context.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot continue.
    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
