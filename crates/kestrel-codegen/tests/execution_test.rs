// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Execution Integration Tests
//!
//! Compiles small programs and runs the bytecode on the reference
//! interpreter in `common`, checking observable behavior rather than
//! instruction shapes.

mod common;

use common::{Vm, display, run, run_to_completion};
use kestrel_codegen::ast::build::*;
use kestrel_codegen::ast::{BinaryOperator, Expression, Program, Statement, VariableKind};
use kestrel_codegen::{CompileOptions, Opcode, Operand, compile};

fn print(args: Vec<Expression>) -> Statement {
    expr(call(id("print"), args))
}

fn add(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::Add, left, right)
}

fn strict_eq(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::StrictEqual, left, right)
}

fn less(left: Expression, right: Expression) -> Expression {
    binary(BinaryOperator::LessThan, left, right)
}

fn counting_loop(name: &str, limit: f64, body: Vec<Statement>) -> Statement {
    for_decl(
        VariableKind::Let,
        name,
        num(0.0),
        Some(less(id(name), num(limit))),
        Some(post_inc(id(name))),
        block(body),
    )
}

fn output(program: &Program) -> Vec<String> {
    match run(program) {
        Ok(lines) => lines,
        Err(exception) => panic!("uncaught exception: {}", exception),
    }
}

// ============================================================================
// Bindings and scopes
// ============================================================================

#[test]
fn test_loop_closures_capture_each_iteration() {
    let program = script(vec![
        let_("fs", Some(array(vec![]))),
        counting_loop("i", 3.0, vec![expr(assign(index(id("fs"), id("i")), arrow(&[], id("i"))))]),
        print(vec![
            call(index(id("fs"), num(0.0)), vec![]),
            call(index(id("fs"), num(1.0)), vec![]),
            call(index(id("fs"), num(2.0)), vec![]),
        ]),
    ]);
    assert_eq!(output(&program), vec!["0 1 2"]);
}

#[test]
fn test_var_loop_closures_share_one_binding() {
    let program = script(vec![
        let_("fs", Some(array(vec![]))),
        for_decl(
            VariableKind::Var,
            "i",
            num(0.0),
            Some(less(id("i"), num(2.0))),
            Some(post_inc(id("i"))),
            block(vec![expr(assign(index(id("fs"), id("i")), arrow(&[], id("i"))))]),
        ),
        print(vec![call(index(id("fs"), num(0.0)), vec![]), call(index(id("fs"), num(1.0)), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["2 2"]);
}

#[test]
fn test_closures_reach_across_levels() {
    let program = script(vec![
        function_decl(
            "outer",
            &[],
            vec![
                let_("a", Some(string("a"))),
                function_decl(
                    "mid",
                    &[],
                    vec![
                        let_("b", Some(string("b"))),
                        function_decl("inner", &[], vec![ret(Some(add(id("a"), id("b"))))]),
                        ret(Some(call(id("inner"), vec![]))),
                    ],
                ),
                ret(Some(call(id("mid"), vec![]))),
            ],
        ),
        print(vec![call(id("outer"), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["ab"]);
}

#[test]
fn test_read_before_initialization_throws() {
    let program = script(vec![
        function_decl("f", &[], vec![print(vec![id("y")]), let_("y", Some(num(1.0)))]),
        expr(call(id("f"), vec![])),
    ]);
    let error = run(&program).unwrap_err();
    assert!(error.starts_with("ReferenceError"), "got {}", error);
}

#[test]
fn test_closure_read_before_initialization_throws() {
    let program = script(vec![
        function_decl(
            "f",
            &[],
            vec![
                let_("g", Some(arrow(&[], id("v")))),
                let_("r", Some(call(id("g"), vec![]))),
                let_("v", Some(num(1.0))),
                ret(Some(id("r"))),
            ],
        ),
        expr(call(id("f"), vec![])),
    ]);
    assert_eq!(run(&program).unwrap_err(), "ReferenceError: v");
}

#[test]
fn test_dead_zone_fails_once_per_read() {
    let program = script(vec![
        function_decl(
            "f",
            &[],
            vec![
                counting_loop(
                    "i",
                    3.0,
                    vec![try_(vec![print(vec![id("y")])], Some((Some("e"), vec![print(vec![id("e")])])), None)],
                ),
                let_("y", Some(num(1.0))),
                print(vec![id("y")]),
            ],
        ),
        expr(call(id("f"), vec![])),
    ]);
    assert_eq!(
        output(&program),
        vec!["ReferenceError: y", "ReferenceError: y", "ReferenceError: y", "1"]
    );

    let compiled = compile(&program, CompileOptions::default()).unwrap();
    let f = compiled.function("f").unwrap();
    let checks: Vec<_> = f
        .instructions
        .iter()
        .filter(|i| i.opcode() == Opcode::ThrowUndefinedIfHole)
        .collect();
    assert_eq!(checks.len(), 1);
    let [Operand::Str(name)] = checks[0].operands() else {
        panic!("unexpected operands {:?}", checks[0].operands());
    };
    assert_eq!(compiled.string(*name), Some("y"));
}

#[test]
fn test_const_assignment_throws_type_error() {
    let program = script(vec![
        function_decl("f", &[], vec![const_("k", num(1.0)), expr(assign(id("k"), num(2.0)))]),
        expr(call(id("f"), vec![])),
    ]);
    let error = run(&program).unwrap_err();
    assert!(error.starts_with("TypeError"), "got {}", error);
}

#[test]
fn test_hoisted_function_callable_before_declaration() {
    let program = script(vec![
        print(vec![call(id("later"), vec![])]),
        function_decl("later", &[], vec![ret(Some(string("hoisted")))]),
    ]);
    assert_eq!(output(&program), vec!["hoisted"]);
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_switch_default_in_the_middle() {
    let program = script(vec![
        function_decl(
            "pick",
            &["x"],
            vec![
                let_("out", Some(string(""))),
                switch(
                    id("x"),
                    vec![
                        case(num(1.0), vec![expr(assign(id("out"), add(id("out"), string("a"))))]),
                        default_case(vec![expr(assign(id("out"), add(id("out"), string("d"))))]),
                        case(
                            num(2.0),
                            vec![expr(assign(id("out"), add(id("out"), string("b")))), brk(None)],
                        ),
                        case(num(3.0), vec![expr(assign(id("out"), add(id("out"), string("c"))))]),
                    ],
                ),
                ret(Some(id("out"))),
            ],
        ),
        print(vec![
            call(id("pick"), vec![num(1.0)]),
            call(id("pick"), vec![num(2.0)]),
            call(id("pick"), vec![num(3.0)]),
            call(id("pick"), vec![num(9.0)]),
        ]),
    ]);
    assert_eq!(output(&program), vec!["adb b c db"]);
}

#[test]
fn test_labeled_continue_resumes_outer_loop() {
    let program = script(vec![labeled(
        "outer",
        counting_loop(
            "i",
            3.0,
            vec![counting_loop(
                "j",
                3.0,
                vec![
                    if_(strict_eq(id("j"), num(1.0)), cont(Some("outer")), None),
                    print(vec![id("i"), id("j")]),
                ],
            )],
        ),
    )]);
    assert_eq!(output(&program), vec!["0 0", "1 0", "2 0"]);
}

#[test]
fn test_for_in_visits_keys() {
    let program = script(vec![for_in(
        VariableKind::Const,
        "k",
        object(vec![("a", num(1.0)), ("b", num(2.0))]),
        print(vec![id("k")]),
    )]);
    assert_eq!(output(&program), vec!["a", "b"]);
}

#[test]
fn test_for_of_closes_iterator_on_break_only() {
    let early = script(vec![for_of(
        VariableKind::Const,
        "v",
        array(vec![num(1.0), num(2.0), num(3.0)]),
        block(vec![if_(strict_eq(id("v"), num(2.0)), brk(None), None), print(vec![id("v")])]),
    )]);
    let compiled = compile(&early, CompileOptions::default()).unwrap();
    let mut vm = Vm::new(&compiled);
    vm.run().unwrap();
    assert_eq!(vm.output, vec!["1"]);
    assert_eq!(vm.closed_iterators, 1);

    let exhausted = script(vec![for_of(
        VariableKind::Const,
        "v",
        array(vec![num(1.0), num(2.0)]),
        print(vec![id("v")]),
    )]);
    let compiled = compile(&exhausted, CompileOptions::default()).unwrap();
    let mut vm = Vm::new(&compiled);
    vm.run().unwrap();
    assert_eq!(vm.output, vec!["1", "2"]);
    assert_eq!(vm.closed_iterators, 0);
}

// ============================================================================
// Exceptions
// ============================================================================

#[test]
fn test_finally_runs_once_on_break() {
    let program = script(vec![
        while_(
            boolean(true),
            block(vec![try_(
                vec![print(vec![string("body")]), brk(None)],
                None,
                Some(vec![print(vec![string("finally")])]),
            )]),
        ),
        print(vec![string("after")]),
    ]);
    assert_eq!(output(&program), vec!["body", "finally", "after"]);
}

#[test]
fn test_failing_iterator_close_skips_exited_finally() {
    let program = script(vec![for_of(
        VariableKind::Const,
        "v",
        array(vec![num(1.0), num(2.0)]),
        block(vec![try_(vec![brk(None)], None, Some(vec![print(vec![string("finally")])]))]),
    )]);
    let compiled = compile(&program, CompileOptions::default()).unwrap();
    let mut vm = Vm::new(&compiled);
    vm.failing_close = true;
    let exception = vm.run().unwrap_err();
    assert_eq!(display(&exception), "TypeError: iterator close failed");
    assert_eq!(vm.output, vec!["finally"]);
    assert_eq!(vm.closed_iterators, 1);
}

#[test]
fn test_finally_runs_once_on_throw() {
    let program = script(vec![try_(
        vec![try_(
            vec![throw(string("boom"))],
            None,
            Some(vec![print(vec![string("finally")])]),
        )],
        Some((Some("e"), vec![print(vec![id("e")])])),
        None,
    )]);
    assert_eq!(output(&program), vec!["finally", "boom"]);
}

#[test]
fn test_finally_runs_once_on_normal_completion() {
    let program = script(vec![try_(
        vec![print(vec![string("body")])],
        Some((Some("e"), vec![print(vec![string("unreachable")])])),
        Some(vec![print(vec![string("finally")])]),
    )]);
    assert_eq!(output(&program), vec!["body", "finally"]);
}

#[test]
fn test_uncaught_throw_still_runs_finally() {
    let program = script(vec![try_(
        vec![throw(string("boom"))],
        None,
        Some(vec![print(vec![string("finally")])]),
    )]);
    let (lines, error) = run_to_completion(&program);
    assert_eq!(lines, vec!["finally"]);
    assert_eq!(error.as_deref(), Some("boom"));
}

#[test]
fn test_return_in_finally_wins() {
    let program = script(vec![
        function_decl(
            "f",
            &[],
            vec![try_(vec![ret(Some(num(1.0)))], None, Some(vec![ret(Some(num(2.0)))]))],
        ),
        function_decl(
            "g",
            &[],
            vec![try_(
                vec![ret(Some(num(1.0)))],
                None,
                Some(vec![print(vec![string("cleanup")])]),
            )],
        ),
        print(vec![call(id("f"), vec![]), call(id("g"), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["cleanup", "2 1"]);
}

#[test]
fn test_nested_finally_blocks_run_innermost_first() {
    let program = script(vec![
        function_decl(
            "f",
            &[],
            vec![try_(
                vec![try_(
                    vec![ret(Some(string("r")))],
                    None,
                    Some(vec![print(vec![string("inner")])]),
                )],
                None,
                Some(vec![print(vec![string("outer")])]),
            )],
        ),
        print(vec![call(id("f"), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["inner", "outer", "r"]);
}

#[test]
fn test_exception_crosses_call_boundary() {
    let program = script(vec![
        function_decl("thrower", &[], vec![throw(string("x"))]),
        try_(
            vec![expr(call(id("thrower"), vec![]))],
            Some((Some("e"), vec![print(vec![add(string("caught "), id("e"))])])),
            None,
        ),
    ]);
    assert_eq!(output(&program), vec!["caught x"]);
}

#[test]
fn test_handler_sees_environment_of_try_statement() {
    let program = script(vec![
        function_decl(
            "f",
            &[],
            vec![
                let_("x", Some(string("outer"))),
                let_("g", Some(arrow(&[], id("x")))),
                try_(
                    vec![block(vec![
                        let_("y", Some(num(1.0))),
                        let_("h", Some(arrow(&[], id("y")))),
                        throw(string("e")),
                    ])],
                    Some((Some("e"), vec![ret(Some(add(id("x"), id("e"))))])),
                    None,
                ),
            ],
        ),
        print(vec![call(id("f"), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["outere"]);
}

// ============================================================================
// Objects and classes
// ============================================================================

#[test]
fn test_class_methods_reach_instances() {
    let this_n = || member(Expression::This, "n");
    let program = script(vec![
        class_decl(
            "Counter",
            Some(function(Some("Counter"), &["start"], vec![expr(assign(this_n(), id("start")))])),
            vec![(
                "inc",
                function(
                    None,
                    &[],
                    vec![expr(assign(this_n(), add(this_n(), num(1.0)))), ret(Some(this_n()))],
                ),
            )],
        ),
        let_("c", Some(new(id("Counter"), vec![num(5.0)]))),
        expr(call(member(id("c"), "inc"), vec![])),
        print(vec![call(member(id("c"), "inc"), vec![])]),
    ]);
    assert_eq!(output(&program), vec!["7"]);
}

#[test]
fn test_literal_buffers_initialize_values() {
    let program = script(vec![
        let_("o", Some(object(vec![("a", num(1.0)), ("b", string("two"))]))),
        let_("xs", Some(array(vec![num(3.0), num(4.0)]))),
        print(vec![member(id("o"), "b"), index(id("xs"), num(1.0)), member(id("xs"), "length")]),
    ]);
    assert_eq!(output(&program), vec!["two 4 2"]);
}
