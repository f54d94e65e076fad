// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bytecode definitions: operands, opcodes, instructions and the
//! finalized per-function format.

mod function;
mod instruction;
mod opcode;
mod operand;

pub use function::{CatchEntry, CompiledFunction, LocalVariable};
pub use instruction::Instruction;
pub use opcode::Opcode;
pub use operand::{
    FunctionId, ImmWidth, Label, LiteralId, Operand, OperandKind, StringId, VReg, fits_narrow,
    fits_wide,
};
