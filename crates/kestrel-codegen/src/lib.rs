// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # kestrel-codegen
//!
//! Bytecode generation for a register-based JavaScript virtual machine.
//!
//! ## Overview
//!
//! The crate takes a parsed, validated syntax tree and lowers it to
//! accumulator-style bytecode:
//! - Scope analysis decides where each binding lives
//! - Every function is lowered to its own instruction stream
//! - Try statements get catch tables and inlined `finally` copies
//! - Strings and constant literals go to session-wide tables
//!
//! Parsing, type checking and execution happen elsewhere.
//!
//! ## Quick Start
//!
//! ```rust
//! use kestrel_codegen::ast::build::*;
//! use kestrel_codegen::{CompileOptions, compile};
//!
//! let program = script(vec![let_("x", Some(num(1.0))), expr(call(id("print"), vec![id("x")]))]);
//! let compiled = compile(&program, CompileOptions::default()).unwrap();
//! assert_eq!(compiled.main().name, "func_main_0");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;

pub use bytecode::{CompiledFunction, Instruction, Opcode, Operand};
pub use compiler::{CompilationSession, CompiledProgram, LiteralBuffer, LiteralValue};
pub use config::CompileOptions;
pub use error::{CompileError, CompileFailure, Diagnostic, DiagnosticCode, InternalError};

/// Compiles a whole program.
///
/// Returns every function in pre-order together with the string and
/// literal tables, or all diagnostics found.
pub fn compile(program: &ast::Program, options: CompileOptions) -> Result<CompiledProgram, CompileFailure> {
    CompilationSession::new(program, options)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_empty_program_returns_undefined() {
        let compiled = compile(&script(vec![]), CompileOptions::default()).unwrap();
        let main = compiled.main();
        assert_eq!(compiled.functions.len(), 1);
        let opcodes: Vec<Opcode> = main.instructions.iter().map(Instruction::opcode).collect();
        assert_eq!(opcodes, vec![Opcode::ReturnUndefined]);
    }

    #[test]
    fn test_diagnostics_are_reported() {
        let failure = compile(&script(vec![brk(None)]), CompileOptions::default()).unwrap_err();
        assert_eq!(failure.diagnostics()[0].code, DiagnosticCode::BreakOutsideIterationOrSwitch);
    }
}
