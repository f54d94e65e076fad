// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use kestrel_codegen::ast::build::*;
use kestrel_codegen::ast::{BinaryOperator, Program, Statement, VariableKind};
use kestrel_codegen::{CompileOptions, compile};

/// A function with a capturing loop, a switch and a try/finally.
fn workload_function(n: usize) -> Statement {
    let name = format!("f{}", n);
    function_decl(
        &name,
        &["a", "b"],
        vec![
            let_("acc", Some(num(0.0))),
            let_("fs", Some(array(vec![]))),
            for_decl(
                VariableKind::Let,
                "i",
                num(0.0),
                Some(binary(BinaryOperator::LessThan, id("i"), id("a"))),
                Some(post_inc(id("i"))),
                block(vec![
                    expr(assign(index(id("fs"), id("i")), arrow(&[], id("i")))),
                    switch(
                        id("i"),
                        vec![
                            case(num(0.0), vec![expr(assign(id("acc"), num(1.0))), brk(None)]),
                            case(num(1.0), vec![expr(assign(id("acc"), id("b")))]),
                            default_case(vec![expr(assign(
                                id("acc"),
                                binary(BinaryOperator::Add, id("acc"), id("i")),
                            ))]),
                        ],
                    ),
                ]),
            ),
            try_(
                vec![expr(call(member(id("console"), "log"), vec![id("acc"), string("done")]))],
                Some((Some("e"), vec![throw(id("e"))])),
                Some(vec![expr(assign(id("acc"), object(vec![("x", num(1.0)), ("y", num(2.0))])))]),
            ),
            ret(Some(id("acc"))),
        ],
    )
}

fn workload(functions: usize) -> Program {
    script((0..functions).map(workload_function).collect())
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for functions in [1, 16, 256] {
        let program = workload(functions);
        group.bench_with_input(BenchmarkId::new("sequential", functions), &program, |b, program| {
            let options = CompileOptions {
                parallel: false,
                ..CompileOptions::default()
            };
            b.iter(|| compile(black_box(program), options.clone()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("parallel", functions), &program, |b, program| {
            let options = CompileOptions {
                parallel: true,
                ..CompileOptions::default()
            };
            b.iter(|| compile(black_box(program), options.clone()).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
