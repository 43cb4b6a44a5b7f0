// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # deconfuser
//!
//! A structural deobfuscator for scripts protected by js-confuser.
//!
//! The obfuscator works by injecting a fixed set of templates into a script: decoy wrappers,
//! string decoders, virtualised parameter stacks, opaque predicates, global accessors and the
//! like. `deconfuser` recognises each template by its shape, never by its (randomised) names,
//! and reverses it on a single mutable syntax tree. Values that can only be computed by running
//! the obfuscator's own runtime are evaluated in an isolated JavaScript engine.
//!
//! ## Features
//!
//! - **Structural matching** - templates are identified by node kinds, argument positions,
//!   binding roles and code fingerprints
//! - **Sandboxed evaluation** - decoders run in a fresh `boa` context per site, bounded by
//!   runtime limits and a wall-clock timeout
//! - **Abstract stack interpretation** - virtualised parameters are resolved back to their
//!   values
//! - **Liveness-aware cleanup** - template runtimes are deleted once nothing references them
//! - **Event log** - every rewrite is recorded with its source offset
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let clean = deconfuser::deobfuscate("/* obfuscated script */")?;
//! println!("{clean}");
//! # Ok::<(), deconfuser::Error>(())
//! ```
//!
//! ### Using the Engine
//!
//! ```rust,no_run
//! use deconfuser::prelude::*;
//!
//! let mut engine = DeobfuscationEngine::new(EngineConfig::static_only());
//! let (clean, result) = engine.process_file("obfuscated.js")?;
//!
//! println!("{}", result.detection.summary());
//! println!("{}", result.summary());
//! # Ok::<(), deconfuser::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`syntax`] - parsing, printing, folding and in-place editing of the tree
//! - [`analysis`] - bindings, liveness, fingerprints and purity predicates
//! - [`oracle`] - the sandboxed evaluation protocol
//! - [`deobfuscation`] - templates, passes, the stack interpreter and the engine
//! - [`prelude`] - convenient re-exports
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Only conditions that abort a
//! run are errors; a template that does not match, or a site the sandbox cannot evaluate, is
//! skipped and reported through the event log.
//!
//! ```rust,no_run
//! use deconfuser::Error;
//!
//! match deconfuser::deobfuscate("var = ;") {
//!     Ok(text) => println!("{text}"),
//!     Err(Error::Parse { message, offset }) => println!("parse error at {offset}: {message}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use deconfuser::prelude::*;
///
/// let mut engine = DeobfuscationEngine::default();
/// let (clean, _) = engine.process_source("var a = 1;")?;
/// # Ok::<(), deconfuser::Error>(())
/// ```
pub mod prelude;

pub mod analysis;
pub mod deobfuscation;
pub mod oracle;
pub mod syntax;

/// `deconfuser` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `deconfuser` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Deobfuscates `source` with the default configuration.
///
/// Convenience wrapper around [`deobfuscation::DeobfuscationEngine::process_source`] that
/// discards the run's report.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the script cannot be parsed, or an error from code generation.
pub fn deobfuscate(source: &str) -> Result<String> {
    let mut engine = deobfuscation::DeobfuscationEngine::default();
    engine.process_source(source).map(|(text, _)| text)
}
