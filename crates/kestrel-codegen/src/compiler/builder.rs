// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-function bytecode builder.
//!
//! One builder exists per function compilation. It owns the instruction
//! stream, the register allocator, the label side table, the catch tables
//! under construction and the debug records. Every emitting method appends
//! a fixed, small sequence of instructions; values flow through the
//! accumulator and explicit registers exactly as the VM executes them.

use tracing::trace;

use super::catch_table::{CatchTable, CatchTableId, LabelPair};
use super::regalloc::RegisterAllocator;
use crate::ast::Span;
use crate::bytecode::{
    CatchEntry, CompiledFunction, FunctionId, Instruction, Label, LiteralId, LocalVariable,
    Opcode, Operand, StringId, VReg,
};
use crate::config::CompileOptions;
use crate::error::{Diagnostic, DiagnosticCode, InternalError, Result};

/// Builds the instruction stream of one function.
#[derive(Debug)]
pub struct BytecodeBuilder {
    id: FunctionId,
    name: String,
    span: Span,
    instructions: Vec<Instruction>,
    positions: Vec<Span>,
    current_span: Span,
    /// Offset per label; `None` until placed
    labels: Vec<Option<u32>>,
    regs: RegisterAllocator,
    catch_tables: Vec<CatchTable>,
    locals: Vec<LocalVariable>,
    param_count: u32,
    debug_info: bool,
    max_registers: u32,
    max_lexical_slots: u32,
}

impl BytecodeBuilder {
    /// Creates a builder for the function `id` named `name`.
    pub fn new(id: FunctionId, name: impl Into<String>, span: Span, options: &CompileOptions) -> Self {
        Self {
            id,
            name: name.into(),
            span,
            instructions: Vec::new(),
            positions: Vec::new(),
            current_span: span,
            labels: Vec::new(),
            regs: RegisterAllocator::new(),
            catch_tables: Vec::new(),
            locals: Vec::new(),
            param_count: 0,
            debug_info: options.debug_info,
            max_registers: options.max_registers,
            max_lexical_slots: options.max_lexical_slots,
        }
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function's id.
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Tags subsequent instructions with `span`.
    pub fn set_span(&mut self, span: Span) {
        self.current_span = span;
    }

    /// The span subsequent instructions are tagged with.
    pub fn span(&self) -> Span {
        self.current_span
    }

    /// Number of instructions emitted so far.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The instructions emitted so far.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        self.positions.push(self.current_span);
        index
    }

    fn op(&mut self, opcode: Opcode, operands: Vec<Operand>) -> Result<usize> {
        let instruction = Instruction::new(opcode, operands)?;
        Ok(self.emit(instruction))
    }

    fn simple(&mut self, opcode: Opcode) -> Result<()> {
        self.op(opcode, Vec::new())?;
        Ok(())
    }

    /// Replaces an already emitted instruction.
    ///
    /// Used for instructions whose operands are only known once the rest of
    /// the function has been lowered.
    pub fn patch(&mut self, index: usize, instruction: Instruction) -> Result<()> {
        let len = self.instructions.len();
        match self.instructions.get_mut(index) {
            Some(slot) => {
                *slot = instruction;
                Ok(())
            }
            None => Err(InternalError::PatchOutOfRange { index, len }.into()),
        }
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Creates an unplaced label.
    pub fn new_label(&mut self) -> Label {
        let label = Label::new(self.labels.len());
        self.labels.push(None);
        label
    }

    /// Places a label at the next instruction.
    pub fn place_label(&mut self, label: Label) -> Result<()> {
        let offset = self.instructions.len() as u32;
        let Some(slot) = self.labels.get_mut(label.index()) else {
            return Err(InternalError::UnknownLabel { label }.into());
        };
        if slot.is_some() {
            return Err(InternalError::LabelPlacedTwice { label }.into());
        }
        *slot = Some(offset);
        trace!(function = %self.name, %label, offset, "place label");
        Ok(())
    }

    /// Whether a label has been placed.
    pub fn is_placed(&self, label: Label) -> bool {
        matches!(self.labels.get(label.index()), Some(Some(_)))
    }

    // ========================================================================
    // Registers
    // ========================================================================

    /// Checks out a temporary.
    pub fn acquire(&mut self) -> VReg {
        self.regs.acquire()
    }

    /// Checks out `count` consecutive temporaries and returns the first.
    pub fn acquire_range(&mut self, count: u32) -> VReg {
        self.regs.acquire_range(count)
    }

    /// Returns temporaries to the pool.
    pub fn release(&mut self, regs: &[VReg]) -> Result<()> {
        self.regs.release(regs)?;
        Ok(())
    }

    /// Number of temporaries currently checked out.
    pub fn live_temps(&self) -> usize {
        self.regs.live_count()
    }

    /// Allocates the register of the next declared parameter.
    pub fn declare_param(&mut self, name: &str) -> VReg {
        self.param_count += 1;
        self.declare_local(name)
    }

    /// Allocates a register for a user-named local.
    pub fn declare_local(&mut self, name: &str) -> VReg {
        let reg = self.regs.acquire_local();
        self.locals.push(LocalVariable {
            name: name.to_string(),
            reg,
        });
        reg
    }

    /// Allocates an unnamed register for the lifetime of the function.
    pub fn allocate_hidden(&mut self) -> VReg {
        self.regs.acquire_local()
    }

    // ========================================================================
    // Accumulator loads and stores
    // ========================================================================

    /// acc = undefined
    pub fn load_undefined(&mut self) -> Result<()> {
        self.simple(Opcode::LdUndefined)
    }

    /// acc = null
    pub fn load_null(&mut self) -> Result<()> {
        self.simple(Opcode::LdNull)
    }

    /// acc = true / false
    pub fn load_bool(&mut self, value: bool) -> Result<()> {
        self.simple(if value { Opcode::LdTrue } else { Opcode::LdFalse })
    }

    /// acc = the dead-zone hole
    pub fn load_hole(&mut self) -> Result<()> {
        self.simple(Opcode::LdHole)
    }

    /// acc = this
    pub fn load_this(&mut self) -> Result<()> {
        self.simple(Opcode::LdThis)
    }

    /// acc = the running closure
    pub fn load_function(&mut self) -> Result<()> {
        self.simple(Opcode::LdFunction)
    }

    /// acc = a small integer
    pub fn load_int(&mut self, value: i32) -> Result<()> {
        self.op(Opcode::Ldai, vec![Operand::Imm(value.into())])?;
        Ok(())
    }

    /// acc = a number, as an integer immediate when exactly representable.
    pub fn load_number(&mut self, value: f64) -> Result<()> {
        let integral = value.fract() == 0.0
            && value >= f64::from(i32::MIN)
            && value <= f64::from(i32::MAX)
            && !(value == 0.0 && value.is_sign_negative());
        if integral {
            self.load_int(value as i32)
        } else {
            self.op(Opcode::Fldai, vec![Operand::Num(value)])?;
            Ok(())
        }
    }

    /// acc = an interned string
    pub fn load_string(&mut self, id: StringId) -> Result<()> {
        self.op(Opcode::LdaStr, vec![Operand::Str(id)])?;
        Ok(())
    }

    /// acc = a BigInt from its canonical decimal string
    pub fn load_bigint(&mut self, id: StringId) -> Result<()> {
        self.op(Opcode::LdBigInt, vec![Operand::Str(id)])?;
        Ok(())
    }

    /// acc = reg
    pub fn load(&mut self, reg: VReg) -> Result<()> {
        self.op(Opcode::Lda, vec![Operand::Reg(reg)])?;
        Ok(())
    }

    /// reg = acc
    pub fn store(&mut self, reg: VReg) -> Result<()> {
        self.op(Opcode::Sta, vec![Operand::Reg(reg)])?;
        Ok(())
    }

    /// dst = src
    pub fn mov(&mut self, dst: VReg, src: VReg) -> Result<()> {
        if dst != src {
            self.op(Opcode::Mov, vec![Operand::Reg(dst), Operand::Reg(src)])?;
        }
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// acc = lhs <op> acc
    pub fn binary(&mut self, opcode: Opcode, lhs: VReg) -> Result<()> {
        self.op(opcode, vec![Operand::Reg(lhs)])?;
        Ok(())
    }

    /// acc = <op> acc
    pub fn unary(&mut self, opcode: Opcode) -> Result<()> {
        self.simple(opcode)
    }

    // ========================================================================
    // Branches
    // ========================================================================

    /// Jumps unconditionally.
    pub fn jump(&mut self, target: Label) -> Result<()> {
        self.emit(Instruction::jump(Opcode::Jmp, target)?);
        Ok(())
    }

    /// Jumps when acc is falsy.
    pub fn jump_if_false(&mut self, target: Label) -> Result<()> {
        self.simple(Opcode::IsTrue)?;
        self.emit(Instruction::jump(Opcode::Jeqz, target)?);
        Ok(())
    }

    /// Jumps when acc is truthy.
    pub fn jump_if_true(&mut self, target: Label) -> Result<()> {
        self.simple(Opcode::IsTrue)?;
        self.emit(Instruction::jump(Opcode::Jnez, target)?);
        Ok(())
    }

    /// Jumps when acc is already a boolean `false`.
    pub fn jump_if_boolean_false(&mut self, target: Label) -> Result<()> {
        self.emit(Instruction::jump(Opcode::Jeqz, target)?);
        Ok(())
    }

    /// Jumps when acc is already a boolean `true`.
    pub fn jump_if_boolean_true(&mut self, target: Label) -> Result<()> {
        self.emit(Instruction::jump(Opcode::Jnez, target)?);
        Ok(())
    }

    /// Jumps when acc is strictly undefined.
    pub fn jump_if_undefined(&mut self, target: Label) -> Result<()> {
        self.emit(Instruction::jump(Opcode::JstrictEqUndefined, target)?);
        Ok(())
    }

    // ========================================================================
    // Lexical environments
    // ========================================================================

    /// Pushes an environment with `slots` slots and returns its index.
    pub fn new_lex_env(&mut self, slots: u32) -> Result<usize> {
        let instruction = self.lex_env_instruction(slots)?;
        Ok(self.emit(instruction))
    }

    /// The `newlexenv` instruction for `slots` slots, in the right width.
    pub fn lex_env_instruction(&self, slots: u32) -> Result<Instruction> {
        self.check_slots(slots)?;
        let opcode = self.select(Opcode::NewLexEnv, &[slots], DiagnosticCode::TooManyLexicalSlots)?;
        Instruction::new(opcode, vec![Operand::Imm(slots.into())])
    }

    /// Pops the innermost environment.
    pub fn pop_lex_env(&mut self) -> Result<()> {
        self.simple(Opcode::PopLexEnv)
    }

    /// acc = env[level].slot
    pub fn load_lex_var(&mut self, level: u32, slot: u32) -> Result<()> {
        let opcode = self.select(Opcode::LdLexVar, &[level, slot], DiagnosticCode::TooManyLexicalSlots)?;
        self.op(opcode, vec![Operand::Imm(level.into()), Operand::Imm(slot.into())])?;
        Ok(())
    }

    /// env[level].slot = acc
    pub fn store_lex_var(&mut self, level: u32, slot: u32) -> Result<()> {
        let opcode = self.select(Opcode::StLexVar, &[level, slot], DiagnosticCode::TooManyLexicalSlots)?;
        self.op(opcode, vec![Operand::Imm(level.into()), Operand::Imm(slot.into())])?;
        Ok(())
    }

    /// reg = current environment
    pub fn save_lex_env(&mut self, reg: VReg) -> Result<()> {
        self.op(Opcode::SaveLexEnv, vec![Operand::Reg(reg)])?;
        Ok(())
    }

    /// current environment = reg
    pub fn restore_lex_env(&mut self, reg: VReg) -> Result<()> {
        self.op(Opcode::RestoreLexEnv, vec![Operand::Reg(reg)])?;
        Ok(())
    }

    /// Throws a ReferenceError naming `name` if acc is the hole.
    pub fn throw_if_hole(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::ThrowUndefinedIfHole, vec![Operand::Str(name)])?;
        Ok(())
    }

    /// Throws a TypeError for assignment to the constant `name`.
    pub fn throw_const_assignment(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::ThrowConstAssignment, vec![Operand::Str(name)])?;
        Ok(())
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// acc = global binding, throwing when it does not exist
    pub fn try_load_global(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::TryLdGlobalByName, vec![Operand::Str(name)])?;
        Ok(())
    }

    /// global binding = acc, throwing when it does not exist
    pub fn try_store_global(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::TryStGlobalByName, vec![Operand::Str(name)])?;
        Ok(())
    }

    /// acc = global object property
    pub fn load_global_var(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::LdGlobalVar, vec![Operand::Str(name)])?;
        Ok(())
    }

    /// global object property = acc
    pub fn store_global_var(&mut self, name: StringId) -> Result<()> {
        self.op(Opcode::StGlobalVar, vec![Operand::Str(name)])?;
        Ok(())
    }

    /// Initializes a global lexical-record entry.
    pub fn store_global_record(&mut self, name: StringId, is_const: bool) -> Result<()> {
        let opcode = if is_const {
            Opcode::StConstToGlobalRecord
        } else {
            Opcode::StToGlobalRecord
        };
        self.op(opcode, vec![Operand::Str(name)])?;
        Ok(())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// acc = {}
    pub fn create_empty_object(&mut self) -> Result<()> {
        self.simple(Opcode::CreateEmptyObject)
    }

    /// acc = []
    pub fn create_empty_array(&mut self) -> Result<()> {
        self.simple(Opcode::CreateEmptyArray)
    }

    /// acc = array from a literal buffer
    pub fn create_array_with_buffer(&mut self, buffer: LiteralId) -> Result<()> {
        self.op(Opcode::CreateArrayWithBuffer, vec![Operand::Literal(buffer)])?;
        Ok(())
    }

    /// acc = object from a literal buffer
    pub fn create_object_with_buffer(&mut self, buffer: LiteralId) -> Result<()> {
        self.op(Opcode::CreateObjectWithBuffer, vec![Operand::Literal(buffer)])?;
        Ok(())
    }

    /// acc = regular expression
    pub fn create_regexp(&mut self, pattern: StringId, flags: u8) -> Result<()> {
        self.op(
            Opcode::CreateRegExpWithLiteral,
            vec![Operand::Str(pattern), Operand::Imm(flags.into())],
        )?;
        Ok(())
    }

    /// acc = obj.name
    pub fn load_property(&mut self, obj: VReg, name: StringId) -> Result<()> {
        self.op(Opcode::LdObjByName, vec![Operand::Str(name), Operand::Reg(obj)])?;
        Ok(())
    }

    /// obj.name = acc
    pub fn store_property(&mut self, obj: VReg, name: StringId) -> Result<()> {
        self.op(Opcode::StObjByName, vec![Operand::Str(name), Operand::Reg(obj)])?;
        Ok(())
    }

    /// acc = obj[acc]
    pub fn load_element(&mut self, obj: VReg) -> Result<()> {
        self.op(Opcode::LdObjByValue, vec![Operand::Reg(obj)])?;
        Ok(())
    }

    /// obj[key] = acc
    pub fn store_element(&mut self, obj: VReg, key: VReg) -> Result<()> {
        self.op(Opcode::StObjByValue, vec![Operand::Reg(obj), Operand::Reg(key)])?;
        Ok(())
    }

    /// Defines own property obj.name = acc
    pub fn define_property(&mut self, obj: VReg, name: StringId) -> Result<()> {
        self.op(Opcode::StOwnByName, vec![Operand::Str(name), Operand::Reg(obj)])?;
        Ok(())
    }

    /// Defines own property obj[key] = acc
    pub fn define_element(&mut self, obj: VReg, key: VReg) -> Result<()> {
        self.op(Opcode::StOwnByValue, vec![Operand::Reg(obj), Operand::Reg(key)])?;
        Ok(())
    }

    /// Defines own element obj[index] = acc
    pub fn define_index(&mut self, obj: VReg, index: u32) -> Result<()> {
        self.op(Opcode::StOwnByIndex, vec![Operand::Reg(obj), Operand::Imm(index.into())])?;
        Ok(())
    }

    /// acc = delete obj[acc]
    pub fn delete_property(&mut self, obj: VReg) -> Result<()> {
        self.op(Opcode::DelObjProp, vec![Operand::Reg(obj)])?;
        Ok(())
    }

    // ========================================================================
    // Calls and functions
    // ========================================================================

    /// acc = acc(args), arguments in `argc` registers starting at `first`.
    pub fn call(&mut self, argc: u32, first: VReg) -> Result<()> {
        self.range_op(Opcode::CallRange, argc, first)
    }

    /// acc = acc.call(this, args); `this_reg` is followed by `argc` arguments.
    pub fn call_this(&mut self, argc: u32, this_reg: VReg) -> Result<()> {
        self.range_op(Opcode::CallThisRange, argc, this_reg)
    }

    /// acc = new ctor(args); `ctor` is followed by `argc` arguments.
    pub fn new_object(&mut self, argc: u32, ctor: VReg) -> Result<()> {
        self.range_op(Opcode::NewObjRange, argc, ctor)
    }

    fn range_op(&mut self, narrow: Opcode, argc: u32, first: VReg) -> Result<()> {
        let opcode = self.select(narrow, &[argc], DiagnosticCode::TooManyRegisters)?;
        self.op(opcode, vec![Operand::Imm(argc.into()), Operand::Reg(first)])?;
        Ok(())
    }

    /// acc = closure of function `id`
    pub fn define_function(&mut self, id: FunctionId) -> Result<()> {
        self.op(Opcode::DefineFunc, vec![Operand::Func(id)])?;
        Ok(())
    }

    /// acc = class whose constructor is function `id`
    pub fn define_class(&mut self, id: FunctionId) -> Result<()> {
        self.op(Opcode::DefineClass, vec![Operand::Func(id)])?;
        Ok(())
    }

    /// Returns acc.
    pub fn return_value(&mut self) -> Result<()> {
        self.simple(Opcode::Return)
    }

    /// Returns undefined.
    pub fn return_undefined(&mut self) -> Result<()> {
        self.simple(Opcode::ReturnUndefined)
    }

    /// Throws acc.
    pub fn throw(&mut self) -> Result<()> {
        self.simple(Opcode::Throw)
    }

    /// Debugger breakpoint.
    pub fn debugger(&mut self) -> Result<()> {
        self.simple(Opcode::Debugger)
    }

    /// Emits a placeholder to be patched later and returns its index.
    pub fn placeholder(&mut self) -> Result<usize> {
        self.op(Opcode::Nop, Vec::new())
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// acc = for-in key iterator of acc
    pub fn get_prop_iterator(&mut self) -> Result<()> {
        self.simple(Opcode::GetPropIterator)
    }

    /// acc = next key or undefined
    pub fn get_next_prop_name(&mut self, iterator: VReg) -> Result<()> {
        self.op(Opcode::GetNextPropName, vec![Operand::Reg(iterator)])?;
        Ok(())
    }

    /// acc = iterator of acc
    pub fn get_iterator(&mut self) -> Result<()> {
        self.simple(Opcode::GetIterator)
    }

    /// acc = next iterator result
    pub fn iterator_next(&mut self, iterator: VReg) -> Result<()> {
        self.op(Opcode::IteratorNext, vec![Operand::Reg(iterator)])?;
        Ok(())
    }

    /// Closes an iterator on abrupt exit.
    pub fn close_iterator(&mut self, iterator: VReg) -> Result<()> {
        self.op(Opcode::CloseIterator, vec![Operand::Reg(iterator)])?;
        Ok(())
    }

    // ========================================================================
    // Catch tables
    // ========================================================================

    /// Starts a catch table protecting `range` with `handler`.
    pub fn create_catch_table(&mut self, handler: Label, depth: u32, range: LabelPair) -> CatchTableId {
        let id = CatchTableId::new(self.catch_tables.len());
        self.catch_tables.push(CatchTable::new(handler, depth, range));
        id
    }

    /// Removes an inlined region from a catch table's open range.
    pub fn split_catch_range(&mut self, table: CatchTableId, inlined: LabelPair) {
        if let Some(table) = self.catch_tables.get_mut(table.index()) {
            trace!(function = %self.name, begin = %inlined.begin, end = %inlined.end, "split catch range");
            table.split(inlined);
        }
    }

    /// The catch tables created so far.
    pub fn catch_tables(&self) -> &[CatchTable] {
        &self.catch_tables
    }

    // ========================================================================
    // Finalize
    // ========================================================================

    /// Validates the function and produces its finalized record.
    ///
    /// `env_slots` is the slot count of the function-level environment.
    pub fn finalize(self, env_slots: u32) -> Result<CompiledFunction> {
        let mut label_offsets = Vec::with_capacity(self.labels.len());
        for (index, offset) in self.labels.iter().enumerate() {
            match offset {
                Some(offset) => label_offsets.push(*offset),
                None => {
                    return Err(InternalError::UnplacedLabel {
                        label: Label::new(index),
                    }
                    .into());
                }
            }
        }

        if self.regs.live_count() != 0 {
            return Err(InternalError::TempLeak {
                live: self.regs.live_count(),
            }
            .into());
        }

        let register_count = self.regs.high_water();
        if register_count > self.max_registers {
            return Err(Diagnostic::new(
                DiagnosticCode::TooManyRegisters,
                self.span,
                vec![register_count.to_string(), self.max_registers.to_string()],
            )
            .in_function(&self.name)
            .into());
        }
        let referenced = self.instructions.iter().map(register_extent).max().unwrap_or(0);
        if referenced > register_count {
            return Err(InternalError::RegisterCountMismatch {
                declared: register_count,
                high_water: referenced,
            }
            .into());
        }

        let mut catch_table = Vec::new();
        for table in &self.catch_tables {
            let handler = label_offsets[table.handler().index()];
            for range in table.ranges() {
                let start = label_offsets[range.begin.index()];
                let end = label_offsets[range.end.index()];
                if start < end {
                    catch_table.push(CatchEntry {
                        start,
                        end,
                        handler,
                        depth: table.depth(),
                    });
                }
            }
        }
        // Stable, so equal depths keep creation order.
        catch_table.sort_by(|a, b| b.depth.cmp(&a.depth));

        let positions = if self.debug_info { self.positions } else { Vec::new() };

        Ok(CompiledFunction {
            id: self.id,
            name: self.name,
            instructions: self.instructions,
            label_offsets,
            register_count,
            param_count: self.param_count,
            catch_table,
            positions,
            locals: self.locals,
            env_slots,
        })
    }

    fn check_slots(&self, slots: u32) -> Result<()> {
        if slots > self.max_lexical_slots {
            return Err(Diagnostic::new(
                DiagnosticCode::TooManyLexicalSlots,
                self.current_span,
                vec![slots.to_string(), self.max_lexical_slots.to_string()],
            )
            .in_function(&self.name)
            .into());
        }
        Ok(())
    }

    fn select(&self, narrow: Opcode, values: &[u32], limit: DiagnosticCode) -> Result<Opcode> {
        match Instruction::select_width(narrow, values) {
            Some(opcode) => Ok(opcode),
            None => {
                let largest = values.iter().copied().max().unwrap_or(0);
                Err(Diagnostic::new(
                    limit,
                    self.current_span,
                    vec![largest.to_string(), u16::MAX.to_string()],
                )
                .in_function(&self.name)
                .into())
            }
        }
    }
}

/// One past the highest register an instruction touches, counting the
/// implicit argument ranges of calls.
fn register_extent(instruction: &Instruction) -> u32 {
    let range = match instruction.opcode() {
        Opcode::CallRange | Opcode::WideCallRange => Some(0),
        Opcode::CallThisRange | Opcode::WideCallThisRange | Opcode::NewObjRange | Opcode::WideNewObjRange => {
            Some(1)
        }
        _ => None,
    };
    match (range, instruction.operands()) {
        // An empty range names no register at all.
        (Some(extra), [Operand::Imm(count), Operand::Reg(first)]) => match *count as u32 + extra {
            0 => 0,
            len => first.raw() + len,
        },
        _ => instruction.registers().map(|r| r.raw() + 1).max().unwrap_or(0),
    }
}
