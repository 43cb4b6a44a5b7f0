//! Sandboxed evaluation of extracted fragments.
//!
//! Some values cannot be computed by rewriting alone: a decoder's output depends on a loop over
//! character codes, an opaque predicate on lazily initialised object state. The oracle runs those
//! fragments for real, in a JavaScript engine that has no access to anything but the text it is
//! given.
//!
//! # Protocol
//!
//! 1. The caller collects the declarations the fragment needs into a [`DependencyClosure`].
//! 2. [`Sandbox::evaluate`] prints the closure in original source order as a prelude, then
//!    evaluates prelude and target in one fresh engine context on a worker thread.
//! 3. The result is an [`OracleOutcome`]: a marshalled [`SandboxValue`], a
//!    [`OracleOutcome::MissingName`] the caller may resolve by growing the closure, or a fatal
//!    [`OracleError`] that leaves the site untouched.
//!
//! Contexts are never reused, so mutable decoy state from one site cannot leak into another.
//! Every evaluation is bounded by engine runtime limits and a wall-clock timeout.
//!
//! # Examples
//!
//! ```rust,no_run
//! use deconfuser::oracle::{OracleConfig, OracleOutcome, Sandbox};
//!
//! let sandbox = Sandbox::new(OracleConfig::default());
//! match sandbox.evaluate_source("var base = 1;", "base + 2")? {
//!     OracleOutcome::Value(value) => println!("{value}"),
//!     OracleOutcome::MissingName(name) => println!("needs {name}"),
//!     OracleOutcome::Fatal(error) => println!("failed: {error}"),
//! }
//! # Ok::<(), deconfuser::Error>(())
//! ```

mod closure;
mod sandbox;
mod value;

use std::time::Duration;

pub use closure::DependencyClosure;
pub use sandbox::{OracleError, OracleOutcome, Sandbox};
pub use value::SandboxValue;

/// Resource bounds applied to every evaluation.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Wall-clock limit per evaluation.
    pub timeout: Duration,
    /// Maximum iterations of any single loop.
    pub loop_iteration_limit: u64,
    /// Maximum call depth.
    pub recursion_limit: usize,
    /// Maximum size of the engine's value stack.
    pub stack_size_limit: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            loop_iteration_limit: 1_000_000,
            recursion_limit: 512,
            stack_size_limit: 1024 * 1024,
        }
    }
}
