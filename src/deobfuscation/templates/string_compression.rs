//! The compressed string table.
//!
//! ```text
//! function decompress(s) { var p = s.split(""); for (...) { ... p[i].charCodeAt(0) ... } }
//! var table = decompress("...").split("|");
//! function str(i) { return table[i]; }
//! use(str(3));
//! ```
//!
//! The decoder is recognised by [`DECODER`]; the table is the variable whose initialiser calls
//! the decoder; lookups are one-parameter functions that read the table. None of them may be
//! reassigned.

use swc_core::ecma::ast::Id;

use crate::{
    analysis::{Binding, BindingIndex, Fingerprint},
    deobfuscation::templates::{
        enclosing_declarator, for_each_callable, referencing_functions, TemplateKind,
        TemplateMatch,
    },
    syntax::{SiteKey, SourceTree},
};

/// Decoder body: splits its input, loops, walks character codes.
pub const DECODER: Fingerprint = Fingerprint::new(&["split(", "for", "charCodeAt("]);

/// A decoder, the table it fills and the lookups over the table.
#[derive(Debug, Clone)]
pub struct StringCompressionMatch {
    /// The decoding function.
    pub decoder: Id,
    /// The decoded table.
    pub table: Id,
    /// One-parameter functions reading the table.
    pub lookups: Vec<Id>,
    /// Calls of the lookups.
    pub calls: Vec<SiteKey>,
    /// Range of the decoder.
    pub site: SiteKey,
}

impl TemplateMatch for StringCompressionMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::StringCompression
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!(
            "compressed table '{}' ({} lookup calls)",
            self.table.0,
            self.calls.len()
        )
    }
}

/// Finds compressed string tables.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<StringCompressionMatch> {
    let mut decoders = Vec::new();
    let mut single_param = Vec::new();
    for_each_callable(&tree.script, |callable| {
        if callable.params.len() == 1 {
            single_param.push(callable.id.clone());
        }
        let printed = tree.print_stmt(&callable.to_stmt()).unwrap_or_default();
        if DECODER.matches(&printed) {
            decoders.push((callable.id.clone(), callable.site));
        }
    });

    let mut found = Vec::new();
    for (decoder, site) in decoders {
        let Some(binding) = bindings.get(&decoder).filter(|b| b.is_constant()) else {
            continue;
        };
        let tables = binding
            .calls()
            .filter(|r| r.function.is_none())
            .filter_map(|r| enclosing_declarator(&tree.script, r.call_site()?))
            .filter(|table| bindings.get(table).is_some_and(|b| b.is_constant()));
        for table in tables {
            let lookups: Vec<&Binding> = referencing_functions(bindings, &table)
                .into_iter()
                .filter(|f| single_param.contains(f))
                .filter_map(|f| bindings.get(&f))
                .collect();
            if !lookups.iter().all(|b| b.is_constant()) {
                continue;
            }
            let calls: Vec<SiteKey> = lookups
                .iter()
                .flat_map(|b| b.calls().filter_map(|r| r.call_site()))
                .collect();
            let lookups: Vec<Id> = lookups.iter().map(|b| b.id.clone()).collect();
            if !calls.is_empty() {
                found.push(StringCompressionMatch {
                    decoder: decoder.clone(),
                    table,
                    lookups,
                    calls,
                    site,
                });
            }
        }
    }
    found
}

#[cfg(test)]
pub(crate) mod tests {
    use super::find;
    use crate::{
        analysis::BindingIndex,
        syntax::{with_globals, SourceTree},
        Result,
    };

    pub(crate) const SOURCE: &str = "\
        function decode(s){ var parts = s.split(''); var out = ''; \
          for (var i = 0; i < parts.length; i++) { out += String.fromCharCode(parts[i].charCodeAt(0) - 1); } \
          return out; } \
        var table = decode('bcd}fgi').split('|'); \
        function str(i){ return table[i]; } \
        use(str(0), str(1));";

    #[test]
    fn test_finds_table() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(SOURCE)?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            assert_eq!(&*found[0].table.0, "table");
            assert_eq!(found[0].lookups.len(), 1);
            assert_eq!(found[0].calls.len(), 2);
            Ok(())
        })
    }

    #[test]
    fn test_declines_without_fingerprint() -> Result<()> {
        with_globals(|| {
            let tree = SourceTree::parse(
                "function decode(s){ return s.split(''); } var table = decode('a|b'); \
                 function str(i){ return table[i]; } str(0);",
            )?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_functions() -> Result<()> {
        with_globals(|| {
            for reassignment in ["decode = other;", "str = other;", "table = other;"] {
                let tree = SourceTree::parse(&format!("{SOURCE} {reassignment}"))?;
                let found = find(&tree, &BindingIndex::crawl(&tree.script));
                assert!(found.is_empty(), "{reassignment}");
            }
            Ok(())
        })
    }
}
