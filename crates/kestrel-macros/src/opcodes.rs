// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instruction table macro.

/// Define an opcode enum together with its mnemonic and operand format.
///
/// Every entry names the variant, its textual mnemonic and the ordered list
/// of operand kinds it takes. The kinds are variants of the enum named after
/// the colon, so the table can be checked against operands at construction.
///
/// # Example
///
/// ```
/// use kestrel_macros::opcodes;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Kind { Reg, Imm }
///
/// opcodes! {
///     pub enum Op: Kind {
///         /// Do nothing.
///         Nop = "nop" [],
///         /// Load a small integer.
///         Ldai = "ldai" [Imm],
///         /// Move between registers.
///         Mov = "mov" [Reg, Reg],
///     }
/// }
///
/// assert_eq!(Op::Mov.mnemonic(), "mov");
/// assert_eq!(Op::Mov.format(), &[Kind::Reg, Kind::Reg]);
/// assert!(Op::Nop.format().is_empty());
/// assert_eq!(Op::all().len(), 3);
/// ```
#[macro_export]
macro_rules! opcodes {
    (
        $vis:vis enum $name:ident : $kind:ident {
            $(
                $(#[$vmeta:meta])*
                $opcode:ident = $mnemonic:literal [$($format:ident),* $(,)?]
            ),+ $(,)?
        }
    ) => {
        /// Operation codes for the register VM.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $opcode
            ),+
        }

        impl $name {
            /// Returns the textual mnemonic used in disassembly.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$opcode => $mnemonic,)+
                }
            }

            /// Returns the operand kinds this opcode takes, in order.
            pub fn format(self) -> &'static [$kind] {
                match self {
                    $(Self::$opcode => &[$($kind::$format),*],)+
                }
            }

            /// Returns every opcode in declaration order.
            pub fn all() -> &'static [Self] {
                &[$(Self::$opcode),+]
            }
        }
    };
}
