//! Compressed string table decoding.
//!
//! ```text
//! function decompress(s) { ... }
//! var table = decompress("...").split("|");          use("abc", "efh");
//! function str(i) { return table[i]; }        ==>
//! use(str(0), str(1));
//! ```
//!
//! # Algorithm
//!
//! 1. Find the decoder, its table and the lookups with [`string_compression::find`].
//! 2. Seed a [`DependencyClosure`](crate::oracle::DependencyClosure) with the three
//!    declarations.
//! 3. Evaluate every lookup call whose arguments are literals in a fresh sandbox and
//!    substitute the value. Any failure leaves that call as it is.
//! 4. Delete the lookups, the table and the decoder once nothing reads them.

use log::debug;

use crate::{
    analysis::{try_safe_delete_all, BindingIndex},
    deobfuscation::{
        config::PassId,
        context::PassContext,
        events::{truncate_string, EventKind},
        pass::Pass,
        passes::utils::{closure_of, is_literal_call, record_removals},
        templates::string_compression,
    },
    syntax::{edit::ExprReplacer, locate_all, SourceTree},
    Result,
};

/// Decodes strings from the compressed string table.
pub struct StringCompressionPass;

impl Default for StringCompressionPass {
    fn default() -> Self {
        Self::new()
    }
}

impl StringCompressionPass {
    /// Creates a new string-compression pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for StringCompressionPass {
    fn id(&self) -> PassId {
        PassId::StringCompression
    }

    fn description(&self) -> &'static str {
        "Decodes strings from the compressed string table"
    }

    fn run(&self, tree: &mut SourceTree, ctx: &mut PassContext) -> Result<bool> {
        let bindings = BindingIndex::crawl(&tree.script);
        let tables = string_compression::find(tree, &bindings);

        let mut changed = false;
        for table in tables {
            let runtime: Vec<_> = table
                .lookups
                .iter()
                .chain([&table.table, &table.decoder])
                .cloned()
                .collect();
            let Some(closure) = closure_of(&tree.script, &runtime) else {
                debug!("{}: '{}' has no standalone declaration", self.name(), table.table.0);
                continue;
            };

            let located = locate_all(&tree.script, table.calls.iter().copied());
            let mut replacer = ExprReplacer::new();
            for site in &table.calls {
                let Some(found) = located.get(site).filter(|f| is_literal_call(&f.expr)) else {
                    continue;
                };
                let target = tree.print_expr(&found.expr)?;
                let outcome = ctx.sandbox.evaluate(&closure, tree, &target)?;
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

            let removed = try_safe_delete_all(tree, &runtime);
            record_removals(ctx, self.name(), table.site, removed, "string table");
            changed |= removed > 0;
        }
        Ok(changed)
    }
}
