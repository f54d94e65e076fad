// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Code generation from AST to bytecode.
//!
//! A [`FunctionCompiler`] lowers exactly one function: the top level of the
//! program, a function or arrow, or an implicit class constructor. Nested
//! functions are not lowered inline; they are emitted as `definefunc`
//! and handed back to the session as pending work.
//!
//! # Module Structure
//!
//! - `statements`: statement lowering, including loops, switch and try
//! - `expressions`: expression lowering
//! - `control`: label targets, try contexts and the unwinding that
//!   `break`, `continue` and `return` perform on their way out

mod control;
mod expressions;
mod statements;


use kestrel_macros::{bail, ensure};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use self::control::ControlStack;
use super::builder::BytecodeBuilder;
use super::scope::analysis::THIS_BINDING;
use super::scope::{DeclarationKind, Resolution, ScopeId, ScopeKind, ScopeTree, Storage, VariableId};
use super::session::{CompilationSession, FunctionSource, PendingFunction};
use crate::ast::*;
use crate::bytecode::{CompiledFunction, FunctionId, VReg};
use crate::error::{CompileError, Diagnostic, DiagnosticCode, InternalError, Result};

/// Lowers one pending function.
///
/// Returns the finalized function and the nested functions it defines, in
/// the order they were first defined.
pub(crate) fn compile_function<'a>(
    session: &CompilationSession<'a>,
    pending: PendingFunction<'a>,
) -> Result<(CompiledFunction, Vec<PendingFunction<'a>>)> {
    let tree = session.tree();
    let name = tree.function_name(pending.id).to_string();
    let options = session.options();

    let (span, scope, in_function) = match pending.source {
        FunctionSource::Program(program) => (Span::default(), tree.scope_of(program.id)?, false),
        FunctionSource::Function(function) => (function.span, tree.scope_of(function.id)?, true),
        FunctionSource::ImplicitConstructor(class) => (class.span, tree.root(), true),
    };

    let mut compiler = FunctionCompiler {
        session,
        tree,
        builder: BytecodeBuilder::new(pending.id, name.as_str(), span, options),
        scope,
        registers: FxHashMap::default(),
        initialized: FxHashSet::default(),
        control: ControlStack::default(),
        env_depth: 0,
        env_pushes: 0,
        nested: Vec::new(),
        outer_labels: pending.outer_labels,
        in_function,
    };

    let env_slots = match pending.source {
        FunctionSource::Program(program) => {
            compiler.compile_program(program)?;
            tree.scope(scope).env_slots
        }
        FunctionSource::Function(function) => {
            compiler.compile_function_body(function)?;
            tree.scope(scope).env_slots
        }
        FunctionSource::ImplicitConstructor(_) => {
            compiler.builder.return_undefined()?;
            0
        }
    };

    compiler.control.ensure_empty()?;
    let FunctionCompiler { builder, nested, .. } = compiler;
    let function = builder.finalize(env_slots)?;
    debug!(
        function = %name,
        instructions = function.instructions.len(),
        registers = function.register_count,
        nested = nested.len(),
        "lowered function"
    );
    Ok((function, nested))
}

/// Lowers the body of a single function.
pub(crate) struct FunctionCompiler<'s, 'a> {
    session: &'s CompilationSession<'a>,
    tree: &'s ScopeTree,
    builder: BytecodeBuilder,
    /// The scope the code being emitted runs in
    scope: ScopeId,
    /// Registers of register-stored bindings, allocated on first scope entry
    registers: FxHashMap<VariableId, VReg>,
    /// Lexical bindings whose declaration has been lowered in the current
    /// scope instance
    initialized: FxHashSet<VariableId>,
    control: ControlStack<'a>,
    /// Lexical environments pushed by this function at the current point
    env_depth: u32,
    /// Total environment pushes emitted so far
    env_pushes: u32,
    nested: Vec<PendingFunction<'a>>,
    /// Labels of the statements enclosing this function's definition
    outer_labels: Vec<String>,
    in_function: bool,
}

impl<'s, 'a> FunctionCompiler<'s, 'a> {
    // ========================================================================
    // Entry points
    // ========================================================================

    fn compile_program(&mut self, program: &'a Program) -> Result<()> {
        self.open_scope(self.scope)?;
        self.hoist_functions(&program.body)?;
        self.compile_statements(&program.body)?;
        self.builder.return_undefined()
    }

    fn compile_function_body(&mut self, function: &'a Function) -> Result<()> {
        for param in &function.params {
            let reg = self.builder.declare_param(&param.name);
            if let Some(var) = self.tree.lookup_local(self.scope, &param.name) {
                self.registers.entry(var).or_insert(reg);
            }
        }
        self.open_scope(self.scope)?;
        match &function.body {
            FunctionBody::Block(body) => {
                self.hoist_functions(body)?;
                self.compile_statements(body)?;
                self.builder.return_undefined()
            }
            FunctionBody::Expression(body) => {
                self.compile_expression(body)?;
                self.builder.return_value()
            }
        }
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Enters a nested scope and returns the scope to restore on exit.
    fn enter_scope(&mut self, node: NodeId) -> Result<ScopeId> {
        let scope = self.tree.scope_of(node)?;
        let parent = std::mem::replace(&mut self.scope, scope);
        self.open_scope(scope)?;
        Ok(parent)
    }

    /// Leaves the current scope, popping its environment.
    fn exit_scope(&mut self, parent: ScopeId) -> Result<()> {
        if self.tree.scope(self.scope).needs_env {
            self.pop_env()?;
        }
        self.scope = parent;
        Ok(())
    }

    /// Emits the entry sequence of `scope`: its environment and the initial
    /// values of its bindings.
    fn open_scope(&mut self, scope: ScopeId) -> Result<()> {
        let data = self.tree.scope(scope);
        if data.needs_env {
            self.builder.new_lex_env(data.env_slots)?;
            self.env_depth += 1;
            self.env_pushes += 1;
        }

        for &var in &data.variables {
            self.initialized.remove(&var);
            let variable = self.tree.variable(var);
            match variable.storage {
                Storage::Register if variable.kind == DeclarationKind::This => {}
                Storage::Register => {
                    let reg = self.register_for(var);
                    match variable.kind {
                        DeclarationKind::Let | DeclarationKind::Const | DeclarationKind::Class => {
                            self.builder.load_hole()?;
                            self.builder.store(reg)?;
                        }
                        DeclarationKind::FunctionName => {
                            self.builder.load_function()?;
                            self.builder.store(reg)?;
                        }
                        _ => {}
                    }
                }
                Storage::Lexical { slot } => {
                    match variable.kind {
                        DeclarationKind::Parameter => {
                            let reg = self.register_of(var)?;
                            self.builder.load(reg)?;
                        }
                        DeclarationKind::This => self.builder.load_this()?,
                        DeclarationKind::FunctionName => self.builder.load_function()?,
                        DeclarationKind::Var => self.builder.load_undefined()?,
                        _ => continue,
                    }
                    self.builder.store_lex_var(0, slot)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn pop_env(&mut self) -> Result<()> {
        ensure!(self.env_depth > 0, InternalError::EnvironmentUnderflow);
        self.builder.pop_lex_env()?;
        self.env_depth -= 1;
        Ok(())
    }

    /// Emits environment pops from `from` down to `to` without changing the
    /// tracked depth.
    fn emit_env_pops(&mut self, from: u32, to: u32) -> Result<()> {
        ensure!(to <= from, InternalError::EnvironmentUnderflow);
        for _ in to..from {
            self.builder.pop_lex_env()?;
        }
        Ok(())
    }

    fn register_for(&mut self, var: VariableId) -> VReg {
        if let Some(&reg) = self.registers.get(&var) {
            return reg;
        }
        let reg = self.builder.declare_local(&self.tree.variable(var).name);
        self.registers.insert(var, reg);
        reg
    }

    fn register_of(&self, var: VariableId) -> Result<VReg> {
        self.registers.get(&var).copied().ok_or_else(|| {
            InternalError::UnallocatedVariable {
                name: self.tree.variable(var).name.clone(),
            }
            .into()
        })
    }

    // ========================================================================
    // Hoisting
    // ========================================================================

    /// Defines the function declarations of a statement list before any of
    /// its statements run.
    fn hoist_functions(&mut self, statements: &'a [Statement]) -> Result<()> {
        for statement in statements {
            if let Statement::FunctionDeclaration(function) = statement {
                let Some(name) = &function.name else { continue };
                self.builder.set_span(function.span);
                self.define_function(function)?;
                let Some(var) = self.tree.lookup(&name.name, self.scope) else {
                    bail!(InternalError::UnallocatedVariable {
                        name: name.name.clone(),
                    });
                };
                self.initialize_binding(var)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Whether a read of `var` from the current point must check the dead
    /// zone.
    fn needs_hole_check(&self, var: VariableId) -> bool {
        let variable = self.tree.variable(var);
        if !variable.kind.is_lexical() {
            return false;
        }
        match variable.storage {
            Storage::Register | Storage::Lexical { .. } => {
                !self.initialized.contains(&var)
                    || self.tree.scope(variable.scope).kind == ScopeKind::Switch
            }
            _ => false,
        }
    }

    /// Stores acc into a binding as its declaration's initialization.
    fn initialize_binding(&mut self, var: VariableId) -> Result<()> {
        let variable = self.tree.variable(var);
        match variable.storage {
            Storage::Register | Storage::Unassigned => {
                let reg = self.register_of(var)?;
                self.builder.store(reg)?;
            }
            Storage::Lexical { slot } => {
                let level = self.tree.env_distance(self.scope, variable.scope);
                self.builder.store_lex_var(level, slot)?;
            }
            Storage::GlobalVar => {
                let name = self.session.intern(&variable.name);
                self.builder.store_global_var(name)?;
            }
            Storage::GlobalLexical => {
                let name = self.session.intern(&variable.name);
                self.builder
                    .store_global_record(name, variable.kind == DeclarationKind::Const)?;
            }
        }
        self.initialized.insert(var);
        Ok(())
    }

    /// Loads the binding `name` visible from the current scope into acc.
    fn load_identifier(&mut self, name: &str, for_typeof: bool) -> Result<()> {
        match self.tree.resolve(name, self.scope) {
            Resolution::Register(var) => {
                if self.tree.variable(var).kind == DeclarationKind::This {
                    return self.builder.load_this();
                }
                let reg = self.register_of(var)?;
                self.builder.load(reg)?;
                self.check_hole(var)
            }
            Resolution::Lexical { variable, level, slot } => {
                self.builder.load_lex_var(level, slot)?;
                self.check_hole(variable)
            }
            Resolution::Global { lexical, .. } => {
                let id = self.session.intern(name);
                if lexical {
                    self.builder.try_load_global(id)
                } else {
                    self.builder.load_global_var(id)
                }
            }
            Resolution::Dynamic => {
                let id = self.session.intern(name);
                if for_typeof {
                    self.builder.load_global_var(id)
                } else {
                    self.builder.try_load_global(id)
                }
            }
        }
    }

    fn check_hole(&mut self, var: VariableId) -> Result<()> {
        if self.needs_hole_check(var) {
            let name = self.session.intern(&self.tree.variable(var).name);
            self.builder.throw_if_hole(name)?;
        }
        Ok(())
    }

    /// Loads `this` into acc.
    fn load_this(&mut self) -> Result<()> {
        match self.tree.resolve(THIS_BINDING, self.scope) {
            Resolution::Lexical { level, slot, .. } => self.builder.load_lex_var(level, slot),
            _ => self.builder.load_this(),
        }
    }

    /// Assigns acc to the binding `name`; acc is left unchanged.
    fn store_identifier(&mut self, name: &str) -> Result<()> {
        let resolution = self.tree.resolve(name, self.scope);
        let var = match resolution {
            Resolution::Register(var)
            | Resolution::Lexical { variable: var, .. }
            | Resolution::Global { variable: var, .. } => Some(var),
            Resolution::Dynamic => None,
        };

        if let Some(var) = var {
            match self.tree.variable(var).kind {
                DeclarationKind::Const => {
                    let id = self.session.intern(name);
                    return self.builder.throw_const_assignment(id);
                }
                // Assignments to a function expression's own name are ignored.
                DeclarationKind::FunctionName => return Ok(()),
                _ => {}
            }
            if self.needs_hole_check(var) {
                let value = self.builder.acquire();
                self.builder.store(value)?;
                self.load_identifier(name, false)?;
                self.builder.load(value)?;
                self.builder.release(&[value])?;
            }
        }

        match resolution {
            Resolution::Register(var) => {
                let reg = self.register_of(var)?;
                self.builder.store(reg)
            }
            Resolution::Lexical { level, slot, .. } => self.builder.store_lex_var(level, slot),
            Resolution::Global { lexical: false, .. } => {
                let id = self.session.intern(name);
                self.builder.store_global_var(id)
            }
            Resolution::Global { lexical: true, .. } | Resolution::Dynamic => {
                let id = self.session.intern(name);
                self.builder.try_store_global(id)
            }
        }
    }

    // ========================================================================
    // Nested functions
    // ========================================================================

    /// Emits `definefunc` for a nested function and queues it.
    fn define_function(&mut self, function: &'a Function) -> Result<()> {
        let id = self.tree.function_id(function.id)?;
        self.builder.define_function(id)?;
        self.enqueue(id, FunctionSource::Function(function));
        Ok(())
    }

    fn enqueue(&mut self, id: FunctionId, source: FunctionSource<'a>) {
        if self.nested.iter().any(|pending| pending.id == id) {
            return;
        }
        let outer_labels = self.visible_labels();
        self.nested.push(PendingFunction {
            id,
            source,
            outer_labels,
        });
    }

    fn visible_labels(&self) -> Vec<String> {
        let mut labels = self.outer_labels.clone();
        for target in &self.control.targets {
            labels.extend(target.labels.iter().cloned());
        }
        labels
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn diagnostic(&self, code: DiagnosticCode, span: Span, args: Vec<String>) -> CompileError {
        Diagnostic::new(code, span, args)
            .in_function(self.builder.name())
            .into()
    }

    /// Releases a contiguous register range.
    fn release_range(&mut self, first: VReg, count: u32) -> Result<()> {
        let regs: Vec<VReg> = (0..count)
            .map(|i| VReg::from(first.raw() + i))
            .collect();
        self.builder.release(&regs)
    }
}
