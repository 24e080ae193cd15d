use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wasm_mill::{emit_binary, parse_binary, parse_text, Diagnostics, Module};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("encode empty", |b| {
        let empty = Module::new();

        b.iter(|| {
            let mut bytes = Vec::new();

            emit_binary(&empty, &mut bytes).expect("An error occurred emitting the module.");
            black_box(bytes.len())
        })
    });

    c.bench_function("encode arithmetic", |b| {
        let module = arithmetic_module();

        b.iter(|| {
            let mut bytes = Vec::new();

            emit_binary(&module, &mut bytes).expect("An error occurred emitting the module.");
            black_box(bytes.len())
        })
    });

    c.bench_function("decode arithmetic", |b| {
        let module = arithmetic_module();
        let mut bytes = Vec::new();

        emit_binary(&module, &mut bytes).expect("An error occurred emitting the module.");

        b.iter(|| {
            let mut diagnostics = Diagnostics::new();
            let decoded = parse_binary(&bytes, &mut diagnostics);

            assert!(!diagnostics.has_errors());
            black_box(decoded.functions().len())
        })
    });
}

/// A module exercising every section the encoder prefixes with a size.
fn arithmetic_module() -> Module {
    let mut diagnostics = Diagnostics::new();
    let module = parse_text(
        r#"(module
             (import "env" "report" (func $report (param i32)))
             (memory (export "memory") 1 2)
             (table 4 funcref)
             (global $counter (mut i32) (i32.const 0))
             (func $step (param i32) (result i32)
               local.get 0
               i32.const 1
               i32.add)
             (func $run (export "run") (param i32) (result i32)
               (local i32)
               (local.set 1 (call $step (local.get 0)))
               (global.set $counter (i32.add (global.get $counter) (i32.const 1)))
               (call $report (local.get 1))
               local.get 1)
             (elem (i32.const 0) func $step $run)
             (data (i32.const 16) "benchmark"))"#,
        &mut diagnostics,
    );

    assert!(!diagnostics.has_errors(), "{}", diagnostics);
    module
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
