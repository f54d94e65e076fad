// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operands: registers, immediates, labels and table references.

use kestrel_macros::index_newtype;

index_newtype! {
    /// A numbered slot in a function's register file.
    pub struct VReg(u32) => "v";
}

index_newtype! {
    /// A program point inside one function.
    ///
    /// Labels are arena handles owned by the function's builder: copies
    /// refer to the same eventual placement, and the offset lives in the
    /// builder's side table until finalize.
    pub struct Label(u32) => "L";
}

index_newtype! {
    /// An entry in the session string table.
    pub struct StringId(u32) => "str";
}

index_newtype! {
    /// An entry in the session literal-buffer table.
    pub struct LiteralId(u32) => "lit";
}

index_newtype! {
    /// A compiled function in the program.
    pub struct FunctionId(u32) => "fn";
}

/// Bit-width class of an immediate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmWidth {
    /// Unsigned 8 bit
    Imm8,
    /// Unsigned 16 bit
    Imm16,
    /// Signed 32 bit
    Imm32,
}

impl ImmWidth {
    /// Whether a value is representable in this width.
    pub const fn fits(self, value: i64) -> bool {
        match self {
            ImmWidth::Imm8 => value >= 0 && value <= u8::MAX as i64,
            ImmWidth::Imm16 => value >= 0 && value <= u16::MAX as i64,
            ImmWidth::Imm32 => value >= i32::MIN as i64 && value <= i32::MAX as i64,
        }
    }
}

/// Whether every value fits the narrow (8-bit) encoding of an opcode family.
///
/// This is the single narrow/wide decision used by the builder: a pure
/// function of the values, never of builder state.
pub fn fits_narrow(values: &[u32]) -> bool {
    values.iter().all(|&v| ImmWidth::Imm8.fits(v as i64))
}

/// Whether every value fits the wide (16-bit) encoding of an opcode family.
pub fn fits_wide(values: &[u32]) -> bool {
    values.iter().all(|&v| ImmWidth::Imm16.fits(v as i64))
}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// A virtual register
    Reg(VReg),
    /// An integer immediate
    Imm(i64),
    /// A double immediate
    Num(f64),
    /// A jump target
    Label(Label),
    /// A string-table reference
    Str(StringId),
    /// A literal-buffer reference
    Literal(LiteralId),
    /// A function reference
    Func(FunctionId),
}

impl Operand {
    /// Returns the register if this is a register operand.
    pub fn as_reg(&self) -> Option<VReg> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    /// Returns the label if this is a label operand.
    pub fn as_label(&self) -> Option<Label> {
        match self {
            Operand::Label(l) => Some(*l),
            _ => None,
        }
    }

    /// Returns the integer if this is an immediate operand.
    pub fn as_imm(&self) -> Option<i64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string id if this is a string operand.
    pub fn as_str(&self) -> Option<StringId> {
        match self {
            Operand::Str(s) => Some(*s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Imm(v) => write!(f, "{}", v),
            Operand::Num(n) => write!(f, "{:?}", n),
            Operand::Label(l) => write!(f, "{}", l),
            Operand::Str(s) => write!(f, "{}", s),
            Operand::Literal(l) => write!(f, "{}", l),
            Operand::Func(id) => write!(f, "{}", id),
        }
    }
}

/// The kind of operand an opcode declares at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// A virtual register
    Reg,
    /// Unsigned 8-bit immediate
    Imm8,
    /// Unsigned 16-bit immediate
    Imm16,
    /// Signed 32-bit immediate
    Imm32,
    /// Double immediate
    F64,
    /// Jump target
    Label,
    /// String-table reference
    Str,
    /// Literal-buffer reference
    Literal,
    /// Function reference
    Func,
}

impl OperandKind {
    /// Whether an operand is acceptable at a position of this kind.
    pub fn accepts(self, operand: &Operand) -> bool {
        match (self, operand) {
            (OperandKind::Reg, Operand::Reg(_)) => true,
            (OperandKind::Imm8, Operand::Imm(v)) => ImmWidth::Imm8.fits(*v),
            (OperandKind::Imm16, Operand::Imm(v)) => ImmWidth::Imm16.fits(*v),
            (OperandKind::Imm32, Operand::Imm(v)) => ImmWidth::Imm32.fits(*v),
            (OperandKind::F64, Operand::Num(_)) => true,
            (OperandKind::Label, Operand::Label(_)) => true,
            (OperandKind::Str, Operand::Str(_)) => true,
            (OperandKind::Literal, Operand::Literal(_)) => true,
            (OperandKind::Func, Operand::Func(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OperandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperandKind::Reg => "reg",
            OperandKind::Imm8 => "imm8",
            OperandKind::Imm16 => "imm16",
            OperandKind::Imm32 => "imm32",
            OperandKind::F64 => "f64",
            OperandKind::Label => "label",
            OperandKind::Str => "string",
            OperandKind::Literal => "literal",
            OperandKind::Func => "function",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_ranges() {
        assert!(ImmWidth::Imm8.fits(255));
        assert!(!ImmWidth::Imm8.fits(256));
        assert!(!ImmWidth::Imm8.fits(-1));
        assert!(ImmWidth::Imm16.fits(65535));
        assert!(!ImmWidth::Imm16.fits(65536));
        assert!(ImmWidth::Imm32.fits(-5));
        assert!(!ImmWidth::Imm32.fits(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn test_narrow_threshold_is_per_value() {
        assert!(fits_narrow(&[0, 255]));
        assert!(!fits_narrow(&[3, 256]));
        assert!(fits_wide(&[256, 65535]));
        assert!(!fits_wide(&[65536]));
    }

    #[test]
    fn test_kind_acceptance() {
        assert!(OperandKind::Reg.accepts(&Operand::Reg(VReg::new(3))));
        assert!(!OperandKind::Reg.accepts(&Operand::Imm(3)));
        assert!(OperandKind::Imm8.accepts(&Operand::Imm(200)));
        assert!(!OperandKind::Imm8.accepts(&Operand::Imm(300)));
        assert!(OperandKind::Label.accepts(&Operand::Label(Label::new(0))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Operand::Reg(VReg::new(4)).to_string(), "v4");
        assert_eq!(Operand::Label(Label::new(2)).to_string(), "L2");
        assert_eq!(Operand::Str(StringId::new(9)).to_string(), "str9");
        assert_eq!(Operand::Num(1.5).to_string(), "1.5");
    }
}
