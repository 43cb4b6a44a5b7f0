//! Concealed string decoding.
//!
//! The concealing runtime is spread over many declarations: a realm probe, helpers derived from
//! the realm, a bridge turning character codes into strings, one or more decoders, and getters
//! that cache decoded entries of a backing array:
//!
//! ```text
//! function realm() { try { ... .constructor.name ... } catch (e) {} }
//! var G = realm() || {};
//! function decode(s) { var alphabet = "<91 characters>"; ... }
//! var data = ["...", "..."];
//! var cache = {};
//! function get(i) { ... cache[i] = decode(data[i]) ... }
//! log(get(0));
//! ```
//!
//! # Algorithm
//!
//! 1. Seed a [`DependencyClosure`] with the realm, its helpers, the bridge and the decoders.
//! 2. For every getter call with literal arguments, evaluate
//!    `(function () { <getters> return <call>; })()` after the closure.
//! 3. A [`OracleOutcome::MissingName`] names a backing array or cache the matcher did not
//!    see. Its declaration is added to the closure and the site is retried. The closure only
//!    grows, and is shared by the sites that follow, so the loop ends after at most one retry
//!    per free name.
//! 4. Any other failure, or a missing name with no declaration, leaves the site untouched.
//! 5. Delete the runtime and every grown declaration once nothing reads them.

use log::debug;
use swc_core::ecma::ast::Id;

use crate::{
    analysis::{find_declaration_by_name, try_safe_delete_all, BindingIndex},
    deobfuscation::{
        config::PassId,
        context::PassContext,
        events::{truncate_string, EventKind},
        pass::Pass,
        passes::utils::{closure_of, is_literal_call, record_removals},
        templates::string_concealing::{self, StringConcealingMatch},
    },
    oracle::{DependencyClosure, OracleError, OracleOutcome},
    syntax::{edit::ExprReplacer, locate_all, SiteKey, SourceTree},
    Result,
};

/// Decodes strings hidden behind the concealing runtime.
pub struct StringConcealingPass;

impl Default for StringConcealingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl StringConcealingPass {
    /// Creates a new string-concealing pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluates one call, growing `closure` on missing names.
    ///
    /// # Returns
    ///
    /// The final outcome; a `MissingName` that cannot be resolved is turned into
    /// [`OracleError::UndefinedReference`].
    fn resolve(
        &self,
        tree: &SourceTree,
        ctx: &PassContext,
        closure: &mut DependencyClosure,
        site: SiteKey,
        target: &str,
    ) -> Result<OracleOutcome> {
        for _ in 0..=ctx.config.concealing_max_retries {
            let outcome = ctx.sandbox.evaluate(closure, tree, target)?;
            let OracleOutcome::MissingName(name) = outcome else {
                return Ok(outcome);
            };
            let Some(declaration) = find_declaration_by_name(&tree.script, &name) else {
                return Ok(OracleOutcome::Fatal(OracleError::UndefinedReference(name)));
            };
            if !closure.insert(declaration) {
                return Ok(OracleOutcome::Fatal(OracleError::UndefinedReference(name)));
            }
            ctx.changed(
                EventKind::ClosureGrown,
                self.name(),
                site,
                format!("added '{name}' to the closure ({} declarations)", closure.len()),
            );
        }
        Ok(OracleOutcome::Fatal(OracleError::Thrown(format!(
            "closure still incomplete after {} retries",
            ctx.config.concealing_max_retries
        ))))
    }

    fn getters_source(tree: &SourceTree, found: &StringConcealingMatch) -> Result<Option<String>> {
        let Some(getters) = closure_of(&tree.script, &found.getters) else {
            return Ok(None);
        };
        getters.prelude(tree).map(Some)
    }
}

impl Pass for StringConcealingPass {
    fn id(&self) -> PassId {
        PassId::StringConcealing
    }

    fn description(&self) -> &'static str {
        "Decodes strings hidden behind the concealing runtime"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let runtimes = string_concealing::find(tree, &bindings);

        let mut changed = false;
        for found in runtimes {
            let base: Vec<&Id> = std::iter::once(&found.realm)
                .chain(&found.helpers)
                .chain(&found.bridge)
                .chain(&found.decoders)
                .collect();
            let (Some(mut closure), Some(getters)) = (
                closure_of(&tree.script, base),
                Self::getters_source(tree, &found)?,
            ) else {
                debug!("{}: runtime has no standalone declarations", self.name());
                continue;
            };

            let located = locate_all(&tree.script, found.calls.iter().copied());
            let mut replacer = ExprReplacer::new();
            for site in &found.calls {
                let Some(call) = located.get(site).filter(|f| is_literal_call(&f.expr)) else {
                    continue;
                };
                let call = tree.print_expr(&call.expr)?;
                let target = format!("(function () {{\n{getters}return {call}}})()");
                let outcome = self.resolve(tree, ctx, &mut closure, *site, &target)?;
                let Some(value) = ctx.accept(self.name(), *site, outcome) else {
                    continue;
                };
                ctx.changed(
                    EventKind::StringDecoded,
                    self.name(),
                    *site,
                    format!("decoded {}", truncate_string(&value.to_string(), 60)),
                );
                replacer.insert(*site, value.to_expr(tree)?);
            }
            changed |= replacer.apply(&mut tree.script) > 0;

            let mut runtime = found.runtime();
            let grown: Vec<Id> = closure
                .ids()
                .filter(|id| !runtime.contains(id))
                .cloned()
                .collect();
            runtime.extend(grown);
            let removed = try_safe_delete_all(tree, &runtime);
            record_removals(ctx, self.name(), found.site, removed, "concealing runtime");
            changed |= removed > 0;
        }
        Ok(changed)
    }
}
