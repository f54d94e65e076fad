// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bytecode compiler.
//!
//! Lowers a syntax tree to register-machine bytecode, one function at a
//! time.
//!
//! # Module Structure
//!
//! - `scope`: Scope tree, binding storage and name resolution
//! - `regalloc`: Virtual register allocation
//! - `catch_table`: Protected ranges of try statements
//! - `builder`: Per-function instruction emission
//! - `codegen`: Lowering of statements and expressions
//! - `literals`: Session-wide string and literal tables
//! - `session`: The whole-program driver and pending-function queue

pub mod builder;
pub mod catch_table;
mod codegen;
pub mod literals;
pub mod regalloc;
pub mod scope;
pub mod session;

pub use builder::BytecodeBuilder;
pub use literals::{LiteralBuffer, LiteralValue};
pub use scope::{ScopeTree, analyze};
pub use session::{CompilationSession, CompiledProgram, FunctionSource, PendingFunction};
