//! Concealed strings: packed-integer encoding with a realm-probing global lookup.
//!
//! ```text
//! function realm() { ... try { ...("").constructor.name... } catch (e) {} ... }
//! var G = realm() || {};
//! var TD = G["TextDecoder"];
//! function bridge(bytes) { ... new TD().decode(...) ... }
//! function decode(s) { var alphabet = "<91 characters>"; ... return bridge(bytes); }
//! function get(i) { ... cache[i] = decode(data[i]) ... }
//! use(get(4));
//! ```
//!
//! Parts are found in dependency order:
//!
//! 1. the realm factory, by [`REALM_PROBE`];
//! 2. helpers: top-level variables initialised from the realm or from another helper;
//! 3. the bridge: named functions reading a helper;
//! 4. decoders: functions containing a string literal of [`ALPHABET_LEN`] characters;
//! 5. getters: named functions calling a decoder.
//!
//! A runtime with any reassigned part is declined. Caches and data arrays the getters use are
//! not part of the match; they surface as missing names when a call is evaluated and are added
//! then.

use std::collections::HashSet;

use swc_core::ecma::ast::Id;

use crate::{
    analysis::{BindingIndex, Fingerprint},
    deobfuscation::templates::{
        contains_string_of_len, enclosing_declarator, for_each_callable, referencing_functions,
        TemplateKind, TemplateMatch,
    },
    syntax::{SiteKey, SourceTree},
};

/// Realm factory: reads `constructor` then `name` inside a `try`.
pub const REALM_PROBE: Fingerprint = Fingerprint::new(&["try", "constructor", "name", "catch"]);

/// Length of the decoder alphabet.
pub const ALPHABET_LEN: usize = 91;

/// The concealing runtime and the getters built on it.
#[derive(Debug, Clone)]
pub struct StringConcealingMatch {
    /// The realm factory.
    pub realm: Id,
    /// Variables derived from the realm, in discovery order.
    pub helpers: Vec<Id>,
    /// Functions turning decoded bytes into strings.
    pub bridge: Vec<Id>,
    /// Alphabet decoders.
    pub decoders: Vec<Id>,
    /// Functions calling a decoder; their calls are the sites to resolve.
    pub getters: Vec<Id>,
    /// Calls of the getters.
    pub calls: Vec<SiteKey>,
    /// Range of the realm factory.
    pub site: SiteKey,
}

impl StringConcealingMatch {
    /// Every binding of the runtime, getters first, realm last.
    #[must_use]
    pub fn runtime(&self) -> Vec<Id> {
        self.getters
            .iter()
            .chain(&self.decoders)
            .chain(&self.bridge)
            .chain(self.helpers.iter().rev())
            .chain(std::iter::once(&self.realm))
            .cloned()
            .collect()
    }
}

impl TemplateMatch for StringConcealingMatch {
    fn kind(&self) -> TemplateKind {
        TemplateKind::StringConcealing
    }

    fn site(&self) -> SiteKey {
        self.site
    }

    fn describe(&self) -> String {
        format!(
            "string concealing: {} decoder(s), {} getter(s), {} call(s)",
            self.decoders.len(),
            self.getters.len(),
            self.calls.len()
        )
    }
}

/// Finds the concealing runtime.
#[must_use]
pub fn find(tree: &SourceTree, bindings: &BindingIndex) -> Vec<StringConcealingMatch> {
    let mut realms = Vec::new();
    let mut decoders = Vec::new();
    for_each_callable(&tree.script, |callable| {
        let Some(body) = callable.body else {
            return;
        };
        if contains_string_of_len(body, ALPHABET_LEN) {
            decoders.push(callable.id.clone());
        } else if callable.top_level && callable.params.is_empty() {
            let printed = tree.print_stmt(&callable.to_stmt()).unwrap_or_default();
            if REALM_PROBE.matches(&printed) {
                realms.push((callable.id.clone(), callable.site));
            }
        }
    });
    if decoders.is_empty() {
        return Vec::new();
    }

    realms
        .into_iter()
        .filter_map(|(realm, site)| {
            let helpers = derived_helpers(tree, bindings, &realm);
            let mut runtime: HashSet<Id> = decoders.iter().cloned().collect();
            runtime.insert(realm.clone());

            let bridge = unique(
                helpers
                    .iter()
                    .flat_map(|helper| referencing_functions(bindings, helper))
                    .filter(|f| !runtime.contains(f)),
            );
            runtime.extend(bridge.iter().cloned());

            let getters = unique(
                decoders
                    .iter()
                    .flat_map(|decoder| referencing_functions(bindings, decoder))
                    .filter(|f| !runtime.contains(f)),
            );
            let calls: Vec<SiteKey> = getters
                .iter()
                .filter_map(|getter| bindings.get(getter))
                .flat_map(|b| b.calls().filter_map(|r| r.call_site()))
                .collect();
            if calls.is_empty() {
                return None;
            }
            let found = StringConcealingMatch {
                realm,
                helpers,
                bridge,
                decoders: decoders.clone(),
                getters,
                calls,
                site,
            };
            found
                .runtime()
                .iter()
                .all(|id| bindings.get(id).is_some_and(|b| b.is_constant()))
                .then_some(found)
        })
        .collect()
}

fn unique(ids: impl Iterator<Item = Id>) -> Vec<Id> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.clone())).collect()
}

/// Top-level variables initialised from `realm`, directly or through another such variable.
fn derived_helpers(tree: &SourceTree, bindings: &BindingIndex, realm: &Id) -> Vec<Id> {
    let mut helpers: Vec<Id> = Vec::new();
    let mut frontier = vec![realm.clone()];
    while let Some(source) = frontier.pop() {
        let Some(binding) = bindings.get(&source) else {
            continue;
        };
        for reference in binding.references.iter().filter(|r| r.function.is_none()) {
            let Some(helper) = enclosing_declarator(&tree.script, reference.site) else {
                continue;
            };
            if helper != *realm && !helpers.contains(&helper) {
                helpers.push(helper.clone());
                frontier.push(helper);
            }
        }
    }
    helpers
}

#[cfg(test)]
pub(crate) mod tests {
    use super::find;
    use crate::{
        analysis::BindingIndex,
        syntax::{with_globals, SourceTree},
        Result,
    };

    /// A small concealing runtime: the "alphabet" shifts character codes by one.
    pub(crate) const RUNTIME: &str = r#"
        function realm() {
            var found;
            try { found = ("")["constructor"]["name"]; } catch (e) {}
            return found ? { "String": String } : {};
        }
        var G = realm() || {};
        var S = G["String"];
        function bridge(codes) { return S["fromCharCode"].apply(null, codes); }
        function decode(s) {
            var alphabet = "0123456789012345678901234567890123456789012345678901234567890123456789012345678901234567890";
            var codes = [];
            for (var i = 0; i < s.length; i++) { codes.push(s.charCodeAt(i) + 1 + alphabet.length * 0); }
            return bridge(codes);
        }
        var data = ["gdkkn", "vnqkc"];
        var cache = {};
        function get(i) {
            if (typeof cache[i] === "undefined") { cache[i] = decode(data[i]); }
            return cache[i];
        }
    "#;

    #[test]
    fn test_finds_runtime() -> Result<()> {
        with_globals(|| {
            let source = format!("{RUNTIME} log(get(0) + ' ' + get(1));");
            let tree = SourceTree::parse(&source)?;
            let found = find(&tree, &BindingIndex::crawl(&tree.script));
            assert_eq!(found.len(), 1);
            let found = &found[0];
            assert_eq!(&*found.realm.0, "realm");
            assert_eq!(found.helpers.len(), 2);
            assert_eq!(found.bridge.len(), 1);
            assert_eq!(found.decoders.len(), 1);
            assert_eq!(&*found.getters[0].0, "get");
            assert_eq!(found.calls.len(), 2);
            Ok(())
        })
    }

    #[test]
    fn test_declines_without_alphabet() -> Result<()> {
        with_globals(|| {
            let source = RUNTIME.replace("0123456789012345678901234567890123456789", "");
            let tree = SourceTree::parse(&format!("{source} get(0);"))?;
            assert!(find(&tree, &BindingIndex::crawl(&tree.script)).is_empty());
            Ok(())
        })
    }

    #[test]
    fn test_declines_reassigned_runtime() -> Result<()> {
        with_globals(|| {
            for reassignment in ["get = other;", "decode = other;", "bridge = other;", "S = other;"]
            {
                let source = format!("{RUNTIME} {reassignment} log(get(0));");
                let tree = SourceTree::parse(&source)?;
                let found = find(&tree, &BindingIndex::crawl(&tree.script));
                assert!(found.is_empty(), "{reassignment}");
            }
            Ok(())
        })
    }
}
