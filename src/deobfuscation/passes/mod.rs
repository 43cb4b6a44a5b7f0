//! The pipeline passes.
//!
//! Every template of [`crate::deobfuscation::templates`] has a pass that applies the rewrite
//! its matches license. Constant folding and branch pruning are passes too, so the scheduler
//! treats every stage alike.
//!
//! # Pipeline
//!
//! The [`PassScheduler`](crate::deobfuscation::PassScheduler) runs the passes in this order:
//!
//! | # | Pass | Needs sandbox |
//! |---|------|---------------|
//! | 1 | [`AntiToolingPass`] | no |
//! | 2 | [`MinifiedArrowPass`] | no |
//! | 3 | [`DuplicateLiteralPass`] | yes |
//! | 4 | [`FunctionLengthPass`] | no |
//! | 5 | [`StackPass`] | no |
//! | 6 | [`StringCompressionPass`] | yes |
//! | 7 | [`StringConcealingPass`] | yes |
//! | 8 | [`PlaceholderPass`] | no |
//! | 9 | [`ConstantFoldingPass`] | no |
//! | 10 | [`StackPass`] | no |
//! | 11 | [`OpaquePredicatesPass`] | yes |
//! | 12 | [`ConstantFoldingPass`] | no |
//! | 13 | [`BranchPruningPass`] | no |
//! | 14 | [`GlobalConcealingPass`] | no |
//! | 15 | [`FlatteningObjectPass`] | no |
//! | 16 | [`ConstantFoldingPass`] | no |
//!
//! The function-length and stack passes together form the stack stage: the first records
//! length hints, the second interprets.
//!
//! # Conventions
//!
//! A pass crawls a fresh [`BindingIndex`](crate::analysis::BindingIndex), runs its matcher,
//! applies the rewrites through the site-keyed editors and finally offers the template's
//! runtime to [`try_safe_delete`](crate::analysis::try_safe_delete). Every rewrite is
//! recorded as an event; a site the sandbox could not evaluate is recorded as a warning and
//! left as it was.

mod anti_tooling;
mod duplicate_literal;
mod flattening_object;
mod function_length;
mod global_concealing;
mod minified_arrow;
mod opaque_predicates;
mod placeholder;
mod simplify;
mod stack;
mod string_compression;
mod string_concealing;
pub(crate) mod utils;

pub use anti_tooling::AntiToolingPass;
pub use duplicate_literal::DuplicateLiteralPass;
pub use flattening_object::FlatteningObjectPass;
pub use function_length::FunctionLengthPass;
pub use global_concealing::GlobalConcealingPass;
pub use minified_arrow::MinifiedArrowPass;
pub use opaque_predicates::OpaquePredicatesPass;
pub use placeholder::PlaceholderPass;
pub use simplify::{BranchPruningPass, ConstantFoldingPass};
pub use stack::StackPass;
pub use string_compression::StringCompressionPass;
pub use string_concealing::StringConcealingPass;
