//! End-to-end pipeline tests.
//!
//! Every test feeds a small protected script through the full default pipeline and compares the
//! regenerated output against a normalised expectation. Normalising through the same parser and
//! printer keeps the comparison independent of whitespace and of how literals were quoted in
//! the input.

use deconfuser::{
    deobfuscate,
    deobfuscation::{DeobfuscationEngine, EngineConfig, EventKind, PassId, TemplateKind},
    syntax::{with_globals, SourceTree},
    Error, Result,
};
use pretty_assertions::assert_eq;

fn normalize(source: &str) -> Result<String> {
    with_globals(|| SourceTree::parse(source)?.generate())
}

const FUNCTION_LENGTH_HELPER: &str = "function h(fn, n) {\
    Object.defineProperty(fn, 'length', { value: n, configurable: true });\
    return fn;\
}";

const ARROW_WRAPPER: &str = "function w(fn, len = 0) {\
    var f = function () { return fn(...arguments); };\
    return Object.defineProperty(f, 'length', { value: len, configurable: true });\
}";

const GLOBAL_ACCESSOR: &str = "\
    function realm(){ return this; } \
    var G = realm() || {}; \
    function global(key){ switch (key) { case 4021: return G['console']; case 877: return G['Math']; } }";

const COMPRESSED_TABLE: &str = "\
    function decode(s){ var parts = s.split(''); var out = ''; \
      for (var i = 0; i < parts.length; i++) { out += String.fromCharCode(parts[i].charCodeAt(0) - 1); } \
      return out; } \
    var table = decode('bcd}fgi').split('|'); \
    function str(i){ return table[i]; } \
    use(str(0), str(1));";

const CONCEALING_RUNTIME: &str = r#"
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
fn test_anti_tooling_decoy_is_spliced() -> Result<()> {
    let output = deobfuscate("function f(){} f(log(1), log(2));")?;
    assert_eq!(output, normalize("log(1); log(2);")?);
    Ok(())
}

#[test]
fn test_duplicate_literals_are_inlined() -> Result<()> {
    let output = deobfuscate(
        "function arr(){ return ['a','b','c']; } var A = arr(); \
         function get(i){ return A[i]; } use(get(1), get(1));",
    )?;
    assert_eq!(output, normalize(r#"use("b", "b");"#)?);
    Ok(())
}

#[test]
fn test_local_array_stack_is_resolved() -> Result<()> {
    let output =
        deobfuscate("function f(){var s=[]; s[0]=arguments[0]; s[1]=5; return s[0]+s[1]}")?;
    assert_eq!(output, normalize("function f(){ return arguments[0] + 5; }")?);
    Ok(())
}

#[test]
fn test_placeholder_is_inlined() -> Result<()> {
    let output = deobfuscate("var x='secret'; use(x); x='other';")?;
    assert_eq!(output, normalize("use('secret');")?);
    Ok(())
}

#[test]
fn test_opaque_predicate_is_pruned() -> Result<()> {
    let output = deobfuscate(
        "var P = (function(){ var o = {}; o.n = 7; return o; })(); \
         if (P.n > 3) { taken(); } else { skipped(); }",
    )?;
    assert!(output.contains("taken()"), "{output}");
    assert!(!output.contains("skipped()"), "{output}");
    assert!(!output.contains("P.n"), "{output}");
    Ok(())
}

#[test]
fn test_rest_stack_uses_length_hint() -> Result<()> {
    let source = format!(
        "{FUNCTION_LENGTH_HELPER} function f(...s){{ s[2] = 4; return s[0] + s[2]; }} h(f, 1);"
    );
    let output = deobfuscate(&source)?;
    assert_eq!(output, normalize("function f(...s){ return s[0] + 4; }")?);
    Ok(())
}

#[test]
fn test_minified_arrow_wrapper_is_removed() -> Result<()> {
    let source = format!("{ARROW_WRAPPER} var add = w((a, b) => a + b, 2); add(1, 2);");
    let output = deobfuscate(&source)?;
    assert_eq!(output, normalize("var add = (a, b) => a + b; add(1, 2);")?);
    Ok(())
}

#[test]
fn test_concealed_globals_are_restored() -> Result<()> {
    let source = format!("{GLOBAL_ACCESSOR} global(4021).log(global(877).max(1, 2));");
    let output = deobfuscate(&source)?;
    assert_eq!(output, normalize("console.log(Math.max(1, 2));")?);
    Ok(())
}

#[test]
fn test_flattening_object_is_inlined() -> Result<()> {
    let output = deobfuscate(
        "var o = { a: 1, 'b': 'x', decoy: 4 }; \
         switch (s) { case 1: f(o['a']); o['decoy'] = 9; break; case 2: g(o.b); break; }",
    )?;
    assert_eq!(
        output,
        normalize("switch (s) { case 1: f(1); break; case 2: g('x'); break; }")?
    );
    Ok(())
}

#[test]
fn test_compressed_strings_are_decoded() -> Result<()> {
    let output = deobfuscate(COMPRESSED_TABLE)?;
    assert_eq!(output, normalize(r#"use("abc", "efh");"#)?);
    Ok(())
}

#[test]
fn test_concealed_strings_are_decoded_and_folded() -> Result<()> {
    let mut engine = DeobfuscationEngine::new(EngineConfig::default());
    let (output, result) =
        engine.process_source(&format!("{CONCEALING_RUNTIME} log(get(0) + ' ' + get(1));"))?;

    assert!(output.contains("hello world"), "{output}");
    assert!(!output.contains("function decode"), "{output}");
    assert!(!output.contains("get("), "{output}");
    assert!(result.detection.has(TemplateKind::StringConcealing));
    assert_eq!(result.events.count_kind(EventKind::StringDecoded), 2);
    Ok(())
}

#[test]
fn test_static_only_leaves_oracle_templates() -> Result<()> {
    let mut engine = DeobfuscationEngine::new(EngineConfig::static_only());
    let (output, result) = engine.process_source(COMPRESSED_TABLE)?;

    assert!(output.contains("str(0)"), "{output}");
    assert!(output.contains("function decode"), "{output}");
    assert!(result.detection.has(TemplateKind::StringCompression));
    assert_eq!(result.events.count_kind(EventKind::StringDecoded), 0);
    Ok(())
}

#[test]
fn test_disabled_pass_is_skipped() -> Result<()> {
    let config = EngineConfig::default().without(PassId::AntiTooling);
    let mut engine = DeobfuscationEngine::new(config);
    let source = "function f(){} f(log(1), log(2));";
    let (output, result) = engine.process_source(source)?;

    assert_eq!(output, normalize(source)?);
    assert!(!result.changed());
    assert!(result.detection.get(TemplateKind::AntiTooling).is_some());
    Ok(())
}

#[test]
fn test_clean_script_is_unchanged() -> Result<()> {
    let source = "function add(a, b) { return a + b; } console.log(add(x, y));";
    let mut engine = DeobfuscationEngine::default();
    let (output, result) = engine.process_source(source)?;

    assert_eq!(output, normalize(source)?);
    assert!(!result.detection.detected());
    assert_eq!(result.events.transformation_count(), 0);
    Ok(())
}

#[test]
fn test_unparsable_input_fails() {
    let result = deobfuscate("var = ;");
    assert!(matches!(result, Err(Error::Parse { .. })), "{result:?}");
}

#[test]
fn test_combined_templates() -> Result<()> {
    let source = format!(
        "{GLOBAL_ACCESSOR} function decoy(){{}} \
         function arr(){{ return ['ok', 'no']; }} var A = arr(); \
         function pick(i){{ return A[i]; }} \
         decoy(global(4021).log(pick(0)));"
    );
    let output = deobfuscate(&source)?;
    assert_eq!(output, normalize(r#"console.log("ok");"#)?);
    Ok(())
}
