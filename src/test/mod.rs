//! Helpers shared by the unit tests.

use crate::{
    deobfuscation::{EngineConfig, Pass, PassContext},
    syntax::{with_globals, SourceTree},
    Result,
};

/// Parses and regenerates `source`, giving the printing that pass output is compared against.
pub fn normalize(source: &str) -> Result<String> {
    with_globals(|| SourceTree::parse(source)?.generate())
}

/// Output of a single pass run.
pub struct PassRun {
    /// Regenerated source.
    pub output: String,
    /// What the pass returned.
    pub changed: bool,
    /// The context after the run, with its events and hints.
    pub ctx: PassContext,
}

/// Runs `pass` once over `source` with a default configuration.
pub fn run_pass(pass: &dyn Pass, source: &str) -> Result<PassRun> {
    run_pass_in(pass, source, PassContext::new(EngineConfig::default()))
}

/// Runs `pass` once over `source` with a prepared context.
pub fn run_pass_in(pass: &dyn Pass, source: &str, mut ctx: PassContext) -> Result<PassRun> {
    with_globals(|| {
        let mut tree = SourceTree::parse(source)?;
        let changed = pass.run(&mut tree, &mut ctx)?;
        Ok(PassRun {
            output: tree.generate()?,
            changed,
            ctx,
        })
    })
}
