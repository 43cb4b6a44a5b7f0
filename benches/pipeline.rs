extern crate deconfuser;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use deconfuser::{
    deobfuscation::{DeobfuscationEngine, EngineConfig},
    syntax::{with_globals, SourceTree},
};
use std::hint::black_box;

/// A script carrying several statically removable templates, repeated to a useful size.
fn sample_script(copies: usize) -> String {
    let mut source = String::new();
    for i in 0..copies {
        source.push_str(&format!(
            "function decoy{i}(){{}} \
             function arr{i}(){{ return ['a{i}', 'b{i}', 'c{i}']; }} var A{i} = arr{i}(); \
             function get{i}(n){{ return A{i}[n]; }} \
             function stack{i}(){{ var s = []; s[0] = arguments[0]; s[1] = {i}; return s[0] + s[1]; }} \
             var o{i} = {{ k: {i}, v: 'x' }}; \
             switch (sel) {{ case {i}: decoy{i}(use(get{i}(1), o{i}.k)); break; }} \
             var p{i} = 'tmp'; use(p{i}); p{i} = 0; \
             use(1 + {i}, 'a' + 'b');\n"
        ));
    }
    source
}

/// Parse and regenerate only, as a baseline for the pipeline numbers.
fn bench_roundtrip(c: &mut Criterion) {
    let source = sample_script(50);

    let mut group = c.benchmark_group("syntax");
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("parse_generate", |b| {
        b.iter(|| {
            with_globals(|| {
                let mut tree = SourceTree::parse(black_box(&source)).unwrap();
                black_box(tree.generate().unwrap())
            })
        });
    });
    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let source = sample_script(50);
    let engine = DeobfuscationEngine::new(EngineConfig::default());

    let mut group = c.benchmark_group("detection");
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("detect", |b| {
        b.iter(|| black_box(engine.detect(black_box(&source)).unwrap()));
    });
    group.finish();
}

/// Full pipeline without the sandbox, so timings reflect the static passes.
fn bench_static_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    for copies in [10, 50] {
        let source = sample_script(copies);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(format!("static_only_{copies}"), |b| {
            b.iter(|| {
                let mut engine = DeobfuscationEngine::new(EngineConfig::static_only());
                black_box(engine.process_source(black_box(&source)).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_roundtrip, bench_detection, bench_static_pipeline);
criterion_main!(benches);
