// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instructions and their format checks.

use super::opcode::Opcode;
use super::operand::{Label, Operand, VReg, fits_narrow, fits_wide};
use crate::error::{InternalError, Result};

/// A single instruction: an opcode and operands matching its format.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    opcode: Opcode,
    operands: Vec<Operand>,
}

impl Instruction {
    /// Creates an instruction, checking operands against the opcode's format.
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Result<Self> {
        let format = opcode.format();
        let matches = format.len() == operands.len()
            && format.iter().zip(&operands).all(|(kind, op)| kind.accepts(op));
        if !matches {
            return Err(InternalError::OperandMismatch {
                opcode: opcode.mnemonic(),
                expected: join(format),
                found: join(&operands),
            }
            .into());
        }
        Ok(Self { opcode, operands })
    }

    /// Creates an instruction with no operands.
    pub fn simple(opcode: Opcode) -> Result<Self> {
        Self::new(opcode, Vec::new())
    }

    /// Creates an instruction with one register operand.
    pub fn with_reg(opcode: Opcode, reg: VReg) -> Result<Self> {
        Self::new(opcode, vec![Operand::Reg(reg)])
    }

    /// Creates a jump instruction.
    pub fn jump(opcode: Opcode, target: Label) -> Result<Self> {
        Self::new(opcode, vec![Operand::Label(target)])
    }

    /// Picks the narrow or wide member of an opcode family for `values`.
    ///
    /// Returns `None` when even the wide form cannot hold them.
    pub fn select_width(narrow: Opcode, values: &[u32]) -> Option<Opcode> {
        if fits_narrow(values) {
            Some(narrow)
        } else if fits_wide(values) {
            narrow.wide()
        } else {
            None
        }
    }

    /// The opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The operands, in format order.
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// The jump target, for jump instructions.
    pub fn target(&self) -> Option<Label> {
        if self.opcode.is_jump() {
            self.operands.first().and_then(Operand::as_label)
        } else {
            None
        }
    }

    /// Registers read or written by this instruction, excluding implicit
    /// ranges of call instructions.
    pub fn registers(&self) -> impl Iterator<Item = VReg> + '_ {
        self.operands.iter().filter_map(Operand::as_reg)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        Ok(())
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use kestrel_macros::assert_matches;

    #[test]
    fn test_format_enforced() {
        let ok = Instruction::new(Opcode::Mov, vec![
            Operand::Reg(VReg::new(0)),
            Operand::Reg(VReg::new(1)),
        ]);
        assert!(ok.is_ok());

        let wrong_kind = Instruction::new(Opcode::Lda, vec![Operand::Imm(1)]);
        assert_matches!(
            wrong_kind,
            Err(CompileError::Internal(InternalError::OperandMismatch { opcode: "lda", .. }))
        );

        let wrong_arity = Instruction::simple(Opcode::Sta);
        assert!(wrong_arity.is_err());
    }

    #[test]
    fn test_immediate_width_enforced() {
        assert!(Instruction::new(Opcode::NewLexEnv, vec![Operand::Imm(255)]).is_ok());
        assert!(Instruction::new(Opcode::NewLexEnv, vec![Operand::Imm(256)]).is_err());
        assert!(Instruction::new(Opcode::WideNewLexEnv, vec![Operand::Imm(256)]).is_ok());
    }

    #[test]
    fn test_select_width() {
        assert_eq!(
            Instruction::select_width(Opcode::CallRange, &[3]),
            Some(Opcode::CallRange)
        );
        assert_eq!(
            Instruction::select_width(Opcode::CallRange, &[300]),
            Some(Opcode::WideCallRange)
        );
        assert_eq!(
            Instruction::select_width(Opcode::LdLexVar, &[0, 70000]),
            None
        );
    }

    #[test]
    fn test_display_and_target() {
        let jmp = Instruction::jump(Opcode::Jeqz, Label::new(4)).unwrap();
        assert_eq!(jmp.to_string(), "jeqz L4");
        assert_eq!(jmp.target(), Some(Label::new(4)));
        let lex = Instruction::new(Opcode::LdLexVar, vec![Operand::Imm(1), Operand::Imm(2)]).unwrap();
        assert_eq!(lex.to_string(), "ldlexvar 1, 2");
        assert_eq!(lex.target(), None);
    }
}
