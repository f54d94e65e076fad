// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-program compilation.
//!
//! A [`CompilationSession`] owns everything shared by the functions of one
//! program: the scope tree, the options, the string and literal tables and
//! the queue of functions still to be lowered. Lowering the top level
//! queues the functions it defines; each of those queues its own nested
//! functions, and so on until the queue drains.
//!
//! Functions are lowered in waves. With the `parallel` feature and the
//! `parallel` option both on, the functions of a wave run on the rayon
//! pool; each one owns its builder, so only the two tables are contended.

use crossbeam::queue::SegQueue;
use tracing::{debug, info, instrument, warn};

use super::codegen::compile_function;
use super::literals::{LiteralBuffer, LiteralTable, StringTable};
use super::scope::{ScopeTree, analyze};
use crate::ast::{Class, Function, Program};
use crate::bytecode::{CompiledFunction, FunctionId, LiteralId, StringId};
use crate::config::CompileOptions;
use crate::error::{CompileError, CompileFailure, Diagnostic, InternalError, Result};

/// The syntax a pending function is lowered from.
#[derive(Debug, Clone, Copy)]
pub enum FunctionSource<'a> {
    /// The top level of the program
    Program(&'a Program),
    /// A declared function, function expression, arrow, method or
    /// constructor
    Function(&'a Function),
    /// The constructor of a class that declares none
    ImplicitConstructor(&'a Class),
}

/// A function waiting to be lowered.
#[derive(Debug, Clone)]
pub struct PendingFunction<'a> {
    /// Pre-order number of the function
    pub id: FunctionId,
    /// What to lower
    pub source: FunctionSource<'a>,
    /// Labels of the statements around its definition, which a jump inside
    /// it may name but not reach
    pub outer_labels: Vec<String>,
}

/// The output of a successful compilation.
#[derive(Debug)]
pub struct CompiledProgram {
    /// Every function, indexed by [`FunctionId`]; function 0 is the top level
    pub functions: Vec<CompiledFunction>,
    /// Interned strings, indexed by [`StringId`]
    pub strings: Vec<String>,
    /// Literal buffers, indexed by [`LiteralId`]
    pub literals: Vec<LiteralBuffer>,
}

impl CompiledProgram {
    /// The top-level function.
    pub fn main(&self) -> &CompiledFunction {
        &self.functions[0]
    }

    /// Looks up a function by name; the first in pre-order wins.
    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The text of an interned string.
    pub fn string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index()).map(String::as_str)
    }

    /// A literal buffer.
    pub fn literal(&self, id: LiteralId) -> Option<&LiteralBuffer> {
        self.literals.get(id.index())
    }
}

impl std::fmt::Display for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for function in &self.functions {
            writeln!(f, "{}", function)?;
        }
        if !self.strings.is_empty() {
            writeln!(f, "strings:")?;
            for (i, s) in self.strings.iter().enumerate() {
                writeln!(f, "  {} {:?}", StringId::new(i), s)?;
            }
        }
        if !self.literals.is_empty() {
            writeln!(f, "literals:")?;
            for (i, buffer) in self.literals.iter().enumerate() {
                writeln!(f, "  {} {}", LiteralId::new(i), buffer)?;
            }
        }
        Ok(())
    }
}

/// State shared by every function compilation of one program.
pub struct CompilationSession<'a> {
    program: &'a Program,
    tree: ScopeTree,
    options: CompileOptions,
    strings: StringTable,
    literals: LiteralTable,
    pending: SegQueue<PendingFunction<'a>>,
}

impl<'a> CompilationSession<'a> {
    /// Analyzes `program` and prepares a session for it.
    pub fn new(program: &'a Program, options: CompileOptions) -> std::result::Result<Self, CompileFailure> {
        let tree = analyze(program, &options)?;
        Ok(Self {
            program,
            tree,
            options,
            strings: StringTable::new(),
            literals: LiteralTable::new(),
            pending: SegQueue::new(),
        })
    }

    /// The analyzed scopes of the program.
    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    /// The options in effect.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Interns a string.
    pub fn intern(&self, value: &str) -> StringId {
        self.strings.intern(value)
    }

    /// Adds a literal buffer.
    pub fn add_literal(&self, buffer: LiteralBuffer) -> LiteralId {
        self.literals.add(buffer)
    }

    /// Queues a function for lowering.
    pub fn enqueue(&self, pending: PendingFunction<'a>) {
        self.pending.push(pending);
    }

    /// Lowers every function of the program.
    ///
    /// A function with a diagnostic is discarded together with the
    /// functions nested in it; the others are still lowered so that all
    /// diagnostics are reported at once, ordered by function. An internal
    /// error stops the session immediately.
    #[instrument(skip(self), fields(functions = self.tree.function_count()))]
    pub fn run(self) -> std::result::Result<CompiledProgram, CompileFailure> {
        let count = self.tree.function_count();
        let mut functions: Vec<Option<CompiledFunction>> = (0..count).map(|_| None).collect();
        let mut diagnostics: Vec<(FunctionId, Diagnostic)> = Vec::new();

        self.enqueue(PendingFunction {
            id: FunctionId::new(0),
            source: FunctionSource::Program(self.program),
            outer_labels: Vec::new(),
        });

        let mut waves = 0;
        loop {
            let mut wave = Vec::with_capacity(self.pending.len());
            while let Some(pending) = self.pending.pop() {
                wave.push(pending);
            }
            if wave.is_empty() {
                break;
            }
            waves += 1;
            debug!(wave = waves, functions = wave.len(), "lowering wave");

            for (id, result) in self.compile_wave(wave) {
                match result {
                    Ok((function, nested)) => {
                        let Some(slot) = functions.get_mut(id.index()) else {
                            return Err(CompileFailure::Internal(InternalError::UnknownFunction { id }));
                        };
                        *slot = Some(function);
                        for pending in nested {
                            self.enqueue(pending);
                        }
                    }
                    Err(CompileError::Internal(error)) => return Err(CompileFailure::Internal(error)),
                    Err(CompileError::Diagnostic(diagnostic) | CompileError::ResourceLimit(diagnostic)) => {
                        warn!(function = %id, code = diagnostic.code as u32, "function discarded: {}", diagnostic);
                        diagnostics.push((id, diagnostic));
                    }
                }
            }
        }

        if !diagnostics.is_empty() {
            diagnostics.sort_by_key(|(id, _)| *id);
            return Err(CompileFailure::Diagnostics(
                diagnostics.into_iter().map(|(_, d)| d).collect(),
            ));
        }

        let functions = functions
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.ok_or(InternalError::UnknownFunction { id: FunctionId::new(i) }))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CompileFailure::Internal)?;

        info!(
            functions = functions.len(),
            strings = self.strings.len(),
            literals = self.literals.len(),
            waves,
            "compilation finished"
        );
        Ok(CompiledProgram {
            functions,
            strings: self.strings.into_vec(),
            literals: self.literals.into_vec(),
        })
    }

    #[cfg(feature = "parallel")]
    fn compile_wave(&self, wave: Vec<PendingFunction<'a>>) -> Vec<(FunctionId, WaveResult<'a>)> {
        use rayon::prelude::*;

        if self.options.parallel && wave.len() > 1 {
            wave.into_par_iter()
                .map(|pending| (pending.id, compile_function(self, pending)))
                .collect()
        } else {
            self.compile_sequential(wave)
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn compile_wave(&self, wave: Vec<PendingFunction<'a>>) -> Vec<(FunctionId, WaveResult<'a>)> {
        self.compile_sequential(wave)
    }

    fn compile_sequential(&self, wave: Vec<PendingFunction<'a>>) -> Vec<(FunctionId, WaveResult<'a>)> {
        wave.into_iter()
            .map(|pending| (pending.id, compile_function(self, pending)))
            .collect()
    }
}

type WaveResult<'a> = Result<(CompiledFunction, Vec<PendingFunction<'a>>)>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::ast::build::*;
    use crate::error::DiagnosticCode;
    use kestrel_macros::{assert_contains, assert_err, assert_ok, assert_some};

    fn compile(program: &Program) -> std::result::Result<CompiledProgram, CompileFailure> {
        CompilationSession::new(program, CompileOptions::default())?.run()
    }

    #[test]
    fn test_functions_indexed_in_preorder() {
        let program = script(vec![
            function_decl("outer", &[], vec![function_decl("inner", &[], vec![])]),
            function_decl("second", &[], vec![]),
        ]);
        let compiled = assert_ok!(compile(&program));
        let names: Vec<&str> = compiled.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["func_main_0", "outer", "inner", "second"]);
        for (i, function) in compiled.functions.iter().enumerate() {
            assert_eq!(function.id, FunctionId::new(i));
        }
    }

    #[test]
    fn test_failed_function_keeps_siblings_reporting() {
        let program = script(vec![
            function_decl("a", &[], vec![brk(None)]),
            function_decl("b", &[], vec![cont(None)]),
        ]);
        let failure = assert_err!(compile(&program));
        let diagnostics = failure.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code, DiagnosticCode::BreakOutsideIterationOrSwitch);
        assert_eq!(diagnostics[0].function.as_deref(), Some("a"));
        assert_eq!(diagnostics[1].code, DiagnosticCode::ContinueOutsideIteration);
        assert_eq!(diagnostics[1].function.as_deref(), Some("b"));
    }

    #[test]
    fn test_nested_functions_of_failed_function_are_dropped() {
        let program = script(vec![function_decl(
            "a",
            &[],
            vec![
                function_decl("inner", &[], vec![cont(None)]),
                brk(None),
            ],
        )]);
        let failure = assert_err!(compile(&program));
        let codes: Vec<_> = failure.diagnostics().iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![DiagnosticCode::BreakOutsideIterationOrSwitch]);
    }

    #[test]
    fn test_strings_shared_across_functions() {
        let program = script(vec![
            expr(assign(id("x"), string("shared"))),
            function_decl("f", &[], vec![expr(assign(id("y"), string("shared")))]),
        ]);
        let compiled = assert_ok!(compile(&program));
        let shared = compiled.strings.iter().filter(|s| *s == "shared").count();
        assert_eq!(shared, 1);
        assert_some!(compiled.function("f"));
    }

    #[test]
    fn test_parallel_matches_sequential_shape() {
        let body = |n: &str| {
            function_decl(
                n,
                &["p"],
                vec![let_("t", Some(binary(BinaryOperator::Add, id("p"), num(1.0))))],
            )
        };
        let program = script(vec![body("a"), body("b"), body("c")]);
        let sequential = assert_ok!(compile(&program));
        let options = CompileOptions {
            parallel: true,
            ..CompileOptions::default()
        };
        let parallel = assert_ok!(CompilationSession::new(&program, options).and_then(|s| s.run()));
        assert_eq!(sequential.functions.len(), parallel.functions.len());
        for (a, b) in sequential.functions.iter().zip(&parallel.functions) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.instructions.len(), b.instructions.len());
            assert_eq!(a.register_count, b.register_count);
        }
    }

    #[test]
    fn test_program_listing() {
        let compiled = assert_ok!(compile(&script(vec![expr(assign(id("x"), string("hi")))])));
        let listing = compiled.to_string();
        assert_contains!(listing, "fn0 func_main_0");
        assert_contains!(listing, "trystglobalbyname str");
        assert_contains!(listing, "\"hi\"");
    }
}
