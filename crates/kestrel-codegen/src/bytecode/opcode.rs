// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The instruction set.
//!
//! The VM is accumulator based: most instructions read and write one
//! implicit accumulator and name at most a few explicit registers. Binary
//! operators take their left operand from a register and their right operand
//! from the accumulator. Families with a `wide.` form differ only in the
//! width of their immediates.

use kestrel_macros::opcodes;

use super::operand::OperandKind;

opcodes! {
    pub enum Opcode: OperandKind {
        /// Do nothing.
        Nop = "nop" [],

        // ---- accumulator loads ----
        /// acc = undefined
        LdUndefined = "ldundefined" [],
        /// acc = null
        LdNull = "ldnull" [],
        /// acc = true
        LdTrue = "ldtrue" [],
        /// acc = false
        LdFalse = "ldfalse" [],
        /// acc = the dead-zone hole
        LdHole = "ldhole" [],
        /// acc = this
        LdThis = "ldthis" [],
        /// acc = the running closure
        LdFunction = "ldfunction" [],
        /// acc = integer immediate
        Ldai = "ldai" [Imm32],
        /// acc = double immediate
        Fldai = "fldai" [F64],
        /// acc = string
        LdaStr = "lda.str" [Str],
        /// acc = BigInt parsed from the decimal string
        LdBigInt = "ldbigint" [Str],
        /// acc = register
        Lda = "lda" [Reg],
        /// register = acc
        Sta = "sta" [Reg],
        /// dst = src
        Mov = "mov" [Reg, Reg],

        // ---- binary operators: acc = reg <op> acc ----
        /// Addition
        Add2 = "add2" [Reg],
        /// Subtraction
        Sub2 = "sub2" [Reg],
        /// Multiplication
        Mul2 = "mul2" [Reg],
        /// Division
        Div2 = "div2" [Reg],
        /// Remainder
        Mod2 = "mod2" [Reg],
        /// Exponentiation
        Exp = "exp" [Reg],
        /// Left shift
        Shl2 = "shl2" [Reg],
        /// Unsigned right shift
        Shr2 = "shr2" [Reg],
        /// Signed right shift
        Ashr2 = "ashr2" [Reg],
        /// Bitwise and
        And2 = "and2" [Reg],
        /// Bitwise or
        Or2 = "or2" [Reg],
        /// Bitwise xor
        Xor2 = "xor2" [Reg],
        /// Loose equality
        Eq = "eq" [Reg],
        /// Loose inequality
        NotEq = "noteq" [Reg],
        /// Strict equality
        StrictEq = "stricteq" [Reg],
        /// Strict inequality
        StrictNotEq = "strictnoteq" [Reg],
        /// Less than
        Less = "less" [Reg],
        /// Less than or equal
        LessEq = "lesseq" [Reg],
        /// Greater than
        Greater = "greater" [Reg],
        /// Greater than or equal
        GreaterEq = "greatereq" [Reg],
        /// `reg in acc`
        IsIn = "isin" [Reg],
        /// `reg instanceof acc`
        InstanceOf = "instanceof" [Reg],

        // ---- unary operators on acc ----
        /// Numeric negation
        Neg = "neg" [],
        /// Bitwise not
        Not = "not" [],
        /// Add one
        Inc = "inc" [],
        /// Subtract one
        Dec = "dec" [],
        /// typeof
        TypeOf = "typeof" [],
        /// ToNumber
        ToNumber = "tonumber" [],
        /// ToNumeric
        ToNumeric = "tonumeric" [],
        /// acc = ToBoolean(acc)
        IsTrue = "istrue" [],
        /// acc = !ToBoolean(acc)
        IsFalse = "isfalse" [],

        // ---- jumps ----
        /// Unconditional jump
        Jmp = "jmp" [Label],
        /// Jump when acc is false
        Jeqz = "jeqz" [Label],
        /// Jump when acc is true
        Jnez = "jnez" [Label],
        /// Jump when acc is strictly undefined
        JstrictEqUndefined = "jstricteq.undefined" [Label],

        // ---- objects and arrays ----
        /// acc = {}
        CreateEmptyObject = "createemptyobject" [],
        /// acc = []
        CreateEmptyArray = "createemptyarray" [],
        /// acc = array initialized from a literal buffer
        CreateArrayWithBuffer = "createarraywithbuffer" [Literal],
        /// acc = object initialized from a literal buffer
        CreateObjectWithBuffer = "createobjectwithbuffer" [Literal],
        /// acc = new RegExp(pattern, flags bitmask)
        CreateRegExpWithLiteral = "createregexpwithliteral" [Str, Imm8],
        /// acc = obj.name
        LdObjByName = "ldobjbyname" [Str, Reg],
        /// obj.name = acc
        StObjByName = "stobjbyname" [Str, Reg],
        /// acc = obj[acc]
        LdObjByValue = "ldobjbyvalue" [Reg],
        /// obj[key] = acc
        StObjByValue = "stobjbyvalue" [Reg, Reg],
        /// Define own property obj.name = acc
        StOwnByName = "stownbyname" [Str, Reg],
        /// Define own property obj[key] = acc
        StOwnByValue = "stownbyvalue" [Reg, Reg],
        /// Define own element obj[index] = acc
        StOwnByIndex = "stownbyindex" [Reg, Imm32],
        /// acc = delete obj[acc]
        DelObjProp = "delobjprop" [Reg],

        // ---- globals ----
        /// acc = global binding, ReferenceError when missing
        TryLdGlobalByName = "tryldglobalbyname" [Str],
        /// global binding = acc, ReferenceError when missing
        TryStGlobalByName = "trystglobalbyname" [Str],
        /// acc = global object property, undefined when missing
        LdGlobalVar = "ldglobalvar" [Str],
        /// global object property = acc
        StGlobalVar = "stglobalvar" [Str],
        /// Initialize a const in the global lexical record
        StConstToGlobalRecord = "stconsttoglobalrecord" [Str],
        /// Initialize a let or class in the global lexical record
        StToGlobalRecord = "sttoglobalrecord" [Str],

        // ---- lexical environments ----
        /// Push an environment with N hole-initialized slots
        NewLexEnv = "newlexenv" [Imm8],
        /// Wide form of `newlexenv`
        WideNewLexEnv = "wide.newlexenv" [Imm16],
        /// Pop the innermost environment
        PopLexEnv = "poplexenv" [],
        /// acc = env[level].slot
        LdLexVar = "ldlexvar" [Imm8, Imm8],
        /// Wide form of `ldlexvar`
        WideLdLexVar = "wide.ldlexvar" [Imm16, Imm16],
        /// env[level].slot = acc
        StLexVar = "stlexvar" [Imm8, Imm8],
        /// Wide form of `stlexvar`
        WideStLexVar = "wide.stlexvar" [Imm16, Imm16],
        /// reg = current environment
        SaveLexEnv = "savelexenv" [Reg],
        /// current environment = reg
        RestoreLexEnv = "restorelexenv" [Reg],
        /// ReferenceError naming the binding when acc is the hole
        ThrowUndefinedIfHole = "throw.undefinedifholewithname" [Str],
        /// TypeError for assignment to the named constant
        ThrowConstAssignment = "throw.constassignment" [Str],

        // ---- calls ----
        /// acc = acc(args in [first, first + count))
        CallRange = "callrange" [Imm8, Reg],
        /// Wide form of `callrange`
        WideCallRange = "wide.callrange" [Imm16, Reg],
        /// acc = acc.call(first, args in [first + 1, first + 1 + count))
        CallThisRange = "callthisrange" [Imm8, Reg],
        /// Wide form of `callthisrange`
        WideCallThisRange = "wide.callthisrange" [Imm16, Reg],
        /// acc = new first(args in [first + 1, first + 1 + count))
        NewObjRange = "newobjrange" [Imm8, Reg],
        /// Wide form of `newobjrange`
        WideNewObjRange = "wide.newobjrange" [Imm16, Reg],

        // ---- functions and classes ----
        /// acc = closure over the current environment
        DefineFunc = "definefunc" [Func],
        /// acc = class constructor closure with a fresh prototype
        DefineClass = "defineclass" [Func],

        // ---- completion ----
        /// Return acc
        Return = "return" [],
        /// Return undefined
        ReturnUndefined = "returnundefined" [],
        /// Throw acc
        Throw = "throw" [],
        /// Debugger breakpoint
        Debugger = "debugger" [],

        // ---- iteration ----
        /// acc = for-in key iterator over acc
        GetPropIterator = "getpropiterator" [],
        /// acc = next key from the iterator in reg, undefined when exhausted
        GetNextPropName = "getnextpropname" [Reg],
        /// acc = iterator of acc
        GetIterator = "getiterator" [],
        /// acc = next result object from the iterator in reg
        IteratorNext = "iteratornext" [Reg],
        /// Call `return` on the iterator in reg, if it has one
        CloseIterator = "closeiterator" [Reg],
    }
}

impl Opcode {
    /// Whether control may fall through to the next instruction.
    pub fn falls_through(self) -> bool {
        !matches!(
            self,
            Opcode::Jmp | Opcode::Return | Opcode::ReturnUndefined | Opcode::Throw
        )
    }

    /// Whether the instruction carries a jump target.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::Jeqz | Opcode::Jnez | Opcode::JstrictEqUndefined
        )
    }

    /// The wide sibling of a narrow opcode, if the family has one.
    pub fn wide(self) -> Option<Opcode> {
        Some(match self {
            Opcode::NewLexEnv => Opcode::WideNewLexEnv,
            Opcode::LdLexVar => Opcode::WideLdLexVar,
            Opcode::StLexVar => Opcode::WideStLexVar,
            Opcode::CallRange => Opcode::WideCallRange,
            Opcode::CallThisRange => Opcode::WideCallThisRange,
            Opcode::NewObjRange => Opcode::WideNewObjRange,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics_are_unique() {
        let mut seen = rustc_hash::FxHashSet::default();
        for op in Opcode::all() {
            assert!(seen.insert(op.mnemonic()), "duplicate mnemonic {}", op);
        }
    }

    #[test]
    fn test_wide_forms_share_arity() {
        for op in Opcode::all() {
            if let Some(wide) = op.wide() {
                assert_eq!(op.format().len(), wide.format().len(), "{}", op);
                assert!(wide.mnemonic().starts_with("wide."));
            }
        }
    }

    #[test]
    fn test_jump_formats_take_labels() {
        for op in Opcode::all().iter().filter(|op| op.is_jump()) {
            assert_eq!(op.format(), &[OperandKind::Label]);
        }
    }
}
