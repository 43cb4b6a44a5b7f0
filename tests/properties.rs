//! Pipeline-wide properties checked over families of generated inputs.
//!
//! - a second run over deobfuscated output changes nothing
//! - a deleted declaration leaves no binding behind, and referenced bindings are never deleted
//! - dependency closures only grow and always print in source order
//! - stack rewriting preserves what a function returns
//! - every template rewrite preserves what a function returns, and so does declining one

use deconfuser::{
    analysis::{find_declaration_by_name, try_safe_delete, BindingIndex},
    deobfuscate,
    oracle::{DependencyClosure, OracleConfig, Sandbox, SandboxValue},
    syntax::{with_globals, SourceTree},
    Result,
};
use pretty_assertions::assert_eq;

const SAMPLES: &[&str] = &[
    "function f(){} f(log(1), log(2));",
    "var x='secret'; use(x); x='other';",
    "function f(){var s=[]; s[0]=arguments[0]; s[1]=5; return s[0]+s[1]}",
    "function arr(){ return ['a','b','c']; } var A = arr(); \
     function get(i){ return A[i]; } use(get(1), get(2));",
    "var o = { a: 1, b: 'x' }; switch (s) { case 1: f(o.a); break; case 2: g(o.b); break; }",
    "var P = (function(){ var o = {}; o.n = 7; return o; })(); var a = P.n > 3 ? 1 : 2;",
    "if (1 + 1 === 2) { yes(); } else { no(); }",
];

#[test]
fn test_pipeline_is_idempotent() -> Result<()> {
    for source in SAMPLES {
        let once = deobfuscate(source)?;
        let twice = deobfuscate(&once)?;
        assert_eq!(once, twice, "second run changed the output of {source}");
    }
    Ok(())
}

fn delete_named(source: &str, name: &str) -> Result<(bool, String, bool)> {
    with_globals(|| {
        let mut tree = SourceTree::parse(source)?;
        let Some(id) = BindingIndex::crawl(&tree.script)
            .named(name)
            .next()
            .map(|b| b.id.clone())
        else {
            return Ok((false, tree.generate()?, false));
        };
        let removed = try_safe_delete(&mut tree, &id);
        let still_bound = BindingIndex::crawl(&tree.script).get(&id).is_some();
        Ok((removed, tree.generate()?, still_bound))
    })
}

#[test]
fn test_deleted_binding_is_gone() -> Result<()> {
    let cases = [
        ("var dead = 1; use(2);", "dead"),
        ("var dead = 1; dead = 3; use(2);", "dead"),
        ("function dead(){ return 1; } use(2);", "dead"),
        ("var a = 1, dead = 2, b = 3; use(a, b);", "dead"),
    ];
    for (source, name) in cases {
        let (removed, output, still_bound) = delete_named(source, name)?;
        assert!(removed, "{source}");
        assert!(!still_bound, "{source}");
        assert!(!output.contains(name), "{output}");
    }
    Ok(())
}

#[test]
fn test_live_binding_is_kept() -> Result<()> {
    let cases = [
        ("var a = 1; use(a);", "a"),
        ("function f(){} f();", "f"),
        ("function f(p){ return 1; } f();", "p"),
        ("var a = 1; a += 2;", "a"),
    ];
    for (source, name) in cases {
        let (removed, output, _) = delete_named(source, name)?;
        assert!(!removed, "{source}");
        assert_eq!(output, with_globals(|| SourceTree::parse(source)?.generate())?);
    }
    Ok(())
}

#[test]
fn test_closure_only_grows() -> Result<()> {
    with_globals(|| {
        let tree = SourceTree::parse(
            "var a = 1; function b(){ return a + 1; } var c = b(); var d = c * 2;",
        )?;
        let mut closure = DependencyClosure::new();
        let mut last = 0;
        for name in ["d", "b", "d", "a", "c", "a"] {
            let site = find_declaration_by_name(&tree.script, name).expect(name);
            let inserted = closure.insert(site);
            assert!(closure.len() >= last);
            assert_eq!(inserted, closure.len() > last, "{name}");
            last = closure.len();
        }

        let order: Vec<String> = closure.ids().map(|id| id.0.to_string()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);

        let sandbox = Sandbox::new(OracleConfig::default());
        let value = sandbox.evaluate(&closure, &tree, "d")?.into_value();
        assert_eq!(value.ok(), Some(SandboxValue::Number(4.0)));
        Ok(())
    })
}

/// Deterministic pseudo-random source for the generated functions.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) % bound as u64) as usize
    }
}

/// A function over a local array of `slots` entries, mixing literal writes, argument reads
/// and writes that copy another slot.
fn local_array_function(slots: usize, rng: &mut Lcg) -> String {
    let mut body = String::from("var s = [];");
    for slot in 0..slots {
        let value = match rng.next(3) {
            0 => format!("{}", rng.next(50)),
            1 => format!("arguments[{}]", rng.next(3)),
            _ if slot > 0 => format!("s[{}] + {}", rng.next(slot), rng.next(9)),
            _ => "1".to_string(),
        };
        body.push_str(&format!(" s[{slot}] = {value};"));
    }
    let reads: Vec<String> = (0..slots).map(|_| format!("s[{}]", rng.next(slots))).collect();
    format!("function f(){{ {body} return {}; }}", reads.join(" + "))
}

/// A function whose rest parameter holds the three arguments and `extra` pushed slots.
fn rest_stack_function(extra: usize, rng: &mut Lcg) -> String {
    let mut body = String::new();
    for offset in 0..extra {
        let slot = 3 + offset;
        let value = match rng.next(2) {
            0 => format!("{}", rng.next(50)),
            _ => format!("s[{}] * {}", rng.next(slot), 1 + rng.next(4)),
        };
        body.push_str(&format!(" s[{slot}] = {value};"));
    }
    let reads: Vec<String> = (0..=extra)
        .map(|_| format!("s[{}]", rng.next(3 + extra)))
        .collect();
    format!("function f(...s){{ {body} return {}; }}", reads.join(" + "))
}

fn assert_same_result(source: &str) -> Result<()> {
    let rewritten = deobfuscate(source)?;
    let sandbox = Sandbox::new(OracleConfig::default());
    let call = "f(3, 11, 19)";

    let before = sandbox.evaluate_source(source, call)?.into_value();
    let after = sandbox.evaluate_source(&rewritten, call)?.into_value();
    assert!(before.is_ok(), "{source}: {before:?}");
    assert_eq!(before.ok(), after.ok(), "{source}\n=>\n{rewritten}");
    Ok(())
}

#[test]
fn test_local_array_stack_is_sound() -> Result<()> {
    let mut rng = Lcg(0x5eed);
    for slots in 1..=6 {
        for _ in 0..4 {
            assert_same_result(&local_array_function(slots, &mut rng))?;
        }
    }
    Ok(())
}

/// `slots` literal values behind a local array, each later slot either a fresh literal or a
/// copy of an earlier one.
fn literal_stack_function(slots: usize, rng: &mut Lcg) -> String {
    let mut body = String::from("var s = [];");
    for slot in 0..slots {
        let value = if slot > 0 && rng.next(2) == 0 {
            format!("s[{}]", rng.next(slot))
        } else {
            format!("{}", rng.next(100))
        };
        body.push_str(&format!(" s[{slot}] = {value};"));
    }
    let reads: Vec<String> = (0..slots).map(|slot| format!("s[{slot}]")).collect();
    format!("function f(){{ {body} return [{}]; }}", reads.join(", "))
}

#[test]
fn test_literal_stack_leaves_no_indexed_access() -> Result<()> {
    let mut rng = Lcg(0xbee);
    for slots in 1..=8 {
        let source = literal_stack_function(slots, &mut rng);
        let rewritten = deobfuscate(&source)?;
        assert!(!rewritten.contains("s["), "{source}\n=>\n{rewritten}");
        assert_same_result(&source)?;
    }
    Ok(())
}

#[test]
fn test_rest_stack_is_sound() -> Result<()> {
    let mut rng = Lcg(0xace);
    for extra in 1..=5 {
        for _ in 0..4 {
            assert_same_result(&rest_stack_function(extra, &mut rng))?;
        }
    }
    Ok(())
}

const REALM: &str = "function realm(){ return this; } var G = realm() || {}; \
    function global(key){ switch (key) { case 877: return G['Math']; case 12: return G['String']; } }";

#[test]
fn test_template_rewrites_are_sound() -> Result<()> {
    let anti_tooling = "function d(){} function f(a, b, c){ var out = []; \
        d(out.push(a), out.push(b)); var v = d(out.push(c)); return out.join(',') + typeof v; }";
    let duplicate_literal = "function arr(){ return ['a', 'b', 'c']; } var A = arr(); \
        function get(i){ return A[i]; } function f(a){ return get(1) + get(0) + get(2) + a; }";
    let placeholder = "function f(a){ var x = 'sec'; var r = x + a; x = 'other'; return r; }";
    let global_concealing = format!(
        "{REALM} function f(a, b, c){{ \
         return global(12).fromCharCode(65 + global(877).max(a, b, c)); }}"
    );

    for source in [anti_tooling, duplicate_literal, placeholder, &global_concealing] {
        let rewritten = deobfuscate(source)?;
        assert_ne!(rewritten, with_globals(|| SourceTree::parse(source)?.generate())?);
        assert_same_result(source)?;
    }
    Ok(())
}

#[test]
fn test_declined_templates_are_sound() -> Result<()> {
    let cases = [
        // the decoy is replaced before use
        "function d(){} function double(x){ return x * 2; } d = double; \
         function f(a){ return d(a) + 1; }",
        // the literal array is written through
        "function arr(){ return ['a', 'b']; } var A = arr(); A[1] = 'z'; \
         function get(i){ return A[i]; } function f(){ return get(1); }",
        // the placeholder is read again after its overwrite
        "function f(a){ var x = 1, t = 0; for (var i = 0; i < 2; i++) { t += x; x = a; } return t; }",
    ];
    for source in cases {
        assert_same_result(source)?;
    }

    let reassigned_accessor = format!(
        "{REALM} global = function(){{ return {{ max: function(){{ return -1; }} }}; }}; \
         function f(a, b, c){{ return global(877).max(a, b, c); }}"
    );
    assert_same_result(&reassigned_accessor)?;
    Ok(())
}

#[test]
fn test_lone_decoy_bodies_are_sound() -> Result<()> {
    let source = "function d(){} function f(a, b, c){ var out = 0; \
        if (a > 0) d(out += a, out += b); else d(out -= 1); \
        for (var i = 0; i < 2; i++) d(out += c); \
        while (out < 0) d(out += 1, out *= 2); return out; }";
    let rewritten = deobfuscate(source)?;
    assert!(!rewritten.contains("d("), "{rewritten}");
    assert_same_result(source)
}

