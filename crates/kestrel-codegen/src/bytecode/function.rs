// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Finalized function records handed to the serializer.

use super::instruction::Instruction;
use super::operand::{FunctionId, Label, VReg};
use crate::ast::Span;

/// A resolved catch-table entry. Offsets are instruction indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchEntry {
    /// First protected instruction
    pub start: u32,
    /// One past the last protected instruction
    pub end: u32,
    /// Handler entry
    pub handler: u32,
    /// Try-nesting depth at creation, 1 for the outermost try
    pub depth: u32,
}

impl CatchEntry {
    /// Whether the entry protects the instruction at `offset`.
    pub fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A register holding a user-named local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Source name
    pub name: String,
    /// Register holding it
    pub reg: VReg,
}

/// One compiled function.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    /// Identity within the program
    pub id: FunctionId,
    /// Name used in diagnostics and listings
    pub name: String,
    /// The instruction stream
    pub instructions: Vec<Instruction>,
    /// Offset of every label, indexed by label
    pub label_offsets: Vec<u32>,
    /// Total register count
    pub register_count: u32,
    /// Declared parameter count
    pub param_count: u32,
    /// Catch table, innermost first
    pub catch_table: Vec<CatchEntry>,
    /// Source position per instruction; empty when debug info is off
    pub positions: Vec<Span>,
    /// Registers of user-named locals
    pub locals: Vec<LocalVariable>,
    /// Slot count of the function-level environment, 0 when it has none
    pub env_slots: u32,
}

impl CompiledFunction {
    /// Offset of a label.
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.label_offsets.get(label.index()).copied()
    }

    /// Offset a jump instruction transfers to.
    pub fn jump_target(&self, index: usize) -> Option<u32> {
        self.instructions
            .get(index)
            .and_then(Instruction::target)
            .and_then(|label| self.label_offset(label))
    }

    /// Source position of an instruction.
    pub fn position(&self, index: usize) -> Option<Span> {
        self.positions.get(index).copied()
    }

    /// Handler that catches an exception raised at `offset`, innermost first.
    pub fn handler_for(&self, offset: u32) -> Option<&CatchEntry> {
        self.catch_table.iter().find(|entry| entry.covers(offset))
    }
}

impl std::fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "function {} {} (params {}, registers {})",
            self.id, self.name, self.param_count, self.register_count
        )?;
        for (i, insn) in self.instructions.iter().enumerate() {
            write!(f, "  {:04}  {}", i, insn)?;
            if let Some(target) = self.jump_target(i) {
                write!(f, "  ; -> {:04}", target)?;
            }
            writeln!(f)?;
        }
        if !self.catch_table.is_empty() {
            writeln!(f, "  catch table:")?;
            for entry in &self.catch_table {
                writeln!(
                    f,
                    "    [{:04}, {:04}) -> {:04} depth {}",
                    entry.start, entry.end, entry.handler, entry.depth
                )?;
            }
        }
        Ok(())
    }
}
