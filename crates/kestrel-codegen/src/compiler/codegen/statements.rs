// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Statement lowering.
//!
//! | Statement | Key Operations | Notes |
//! |-----------|----------------|-------|
//! | `var/let/const` | `sta`, `stlexvar`, `stglobalvar` | `let` without initializer stores `undefined` |
//! | `if/else` | `istrue`, `jeqz`, `jmp` | |
//! | `while` | `jeqz`, `jmp` (back) | Test before body |
//! | `do-while` | `jnez` (back) | Test after body |
//! | `for` | `newlexenv`, `poplexenv` | Fresh environment per iteration when captured |
//! | `for-in` | `getpropiterator`, `getnextpropname` | Exhausted on `undefined` |
//! | `for-of` | `getiterator`, `iteratornext` | `closeiterator` on early exit |
//! | `switch` | `stricteq`, `jnez` | All tests first, then bodies |
//! | `try` | catch tables | `finally` is copied onto every exit path |
//! | `return/break/continue` | `jmp`, `return` | See `control` |
//!
//! ## For Loop
//!
//! ```text
//!   [enter loop scope]
//!   [init]
//! loop_start:
//!   [test]
//!   jeqz -> exit
//!   [body]
//! continue:
//!   [copy captured bindings into a fresh environment]
//!   [update]
//!   jmp -> loop_start
//! exit:
//!   [leave loop scope]
//! break:
//! ```
//!
//! ## Try/Finally
//!
//! ```text
//! begin:
//!   [body]
//! end:
//!   [finally]
//!   jmp -> done
//! handler:
//!   sta exc
//!   [finally]
//!   lda exc
//!   throw
//! done:
//! ```

use super::FunctionCompiler;
use super::control::TargetKind;
use crate::ast::*;
use crate::bytecode::{Instruction, Label, Opcode, VReg};
use crate::compiler::catch_table::LabelPair;
use crate::compiler::scope::{ScopeId, VariableId};
use crate::error::{DiagnosticCode, InternalError, Result};

impl<'s, 'a> FunctionCompiler<'s, 'a> {
    pub(super) fn compile_statements(&mut self, statements: &'a [Statement]) -> Result<()> {
        for statement in statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    pub(super) fn compile_statement(&mut self, statement: &'a Statement) -> Result<()> {
        self.builder.set_span(statement.span());
        match statement {
            Statement::VariableDeclaration(declaration) => self.compile_variable_declaration(declaration),
            // Hoisted to the start of the enclosing statement list.
            Statement::FunctionDeclaration(_) => Ok(()),
            Statement::ClassDeclaration(class) => {
                self.compile_class(class)?;
                match &class.name {
                    Some(name) => {
                        let var = self.declared(&name.name)?;
                        self.initialize_binding(var)
                    }
                    None => Ok(()),
                }
            }
            Statement::Expression(s) => self.compile_expression(&s.expression),
            Statement::Block(block) => self.compile_block(block),
            Statement::If(s) => self.compile_if(s),
            Statement::Switch(s) => self.compile_switch(s, Vec::new()),
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_) => self.compile_loop(statement, Vec::new()),
            Statement::Return(s) => self.compile_return(s),
            Statement::Break(s) => self.compile_break(s.label.as_ref(), s.span),
            Statement::Continue(s) => self.compile_continue(s.label.as_ref(), s.span),
            Statement::Throw(s) => {
                self.compile_expression(&s.argument)?;
                self.builder.throw()
            }
            Statement::Try(s) => self.compile_try(s),
            Statement::Labeled(s) => self.compile_labeled(s),
            Statement::Debugger(_) => self.builder.debugger(),
            Statement::Empty(_) => Ok(()),
        }
    }

    /// The binding `name` refers to from the current scope.
    fn declared(&self, name: &str) -> Result<VariableId> {
        self.tree.lookup(name, self.scope).ok_or_else(|| {
            InternalError::UnallocatedVariable {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn compile_variable_declaration(&mut self, declaration: &'a VariableDeclaration) -> Result<()> {
        for declarator in &declaration.declarations {
            let var = self.declared(&declarator.id.name)?;
            match &declarator.init {
                Some(init) => self.compile_expression(init)?,
                None if declaration.kind == VariableKind::Var => continue,
                None => self.builder.load_undefined()?,
            }
            self.initialize_binding(var)?;
        }
        Ok(())
    }

    pub(super) fn compile_block(&mut self, block: &'a BlockStatement) -> Result<()> {
        let parent = self.enter_scope(block.id)?;
        self.hoist_functions(&block.body)?;
        self.compile_statements(&block.body)?;
        self.exit_scope(parent)
    }

    fn compile_if(&mut self, s: &'a IfStatement) -> Result<()> {
        let else_label = self.builder.new_label();
        self.compile_expression(&s.test)?;
        self.builder.jump_if_false(else_label)?;
        self.compile_statement(&s.consequent)?;
        match &s.alternate {
            Some(alternate) => {
                let end = self.builder.new_label();
                self.builder.jump(end)?;
                self.builder.place_label(else_label)?;
                self.compile_statement(alternate)?;
                self.builder.place_label(end)
            }
            None => self.builder.place_label(else_label),
        }
    }

    fn compile_return(&mut self, s: &'a ReturnStatement) -> Result<()> {
        if !self.in_function {
            return Err(self.diagnostic(DiagnosticCode::ReturnOutsideFunction, s.span, Vec::new()));
        }
        match &s.argument {
            Some(argument) => self.compile_expression(argument)?,
            None => self.builder.load_undefined()?,
        }
        self.compile_return_value()
    }

    // ========================================================================
    // Labels
    // ========================================================================

    fn compile_labeled(&mut self, s: &'a LabeledStatement) -> Result<()> {
        let mut labels: Vec<String> = Vec::new();
        let mut current = s;
        let body = loop {
            let name = &current.label.name;
            let live = self.control.targets.iter().any(|t| t.labels.contains(name));
            if live || labels.contains(name) {
                return Err(self.diagnostic(
                    DiagnosticCode::DuplicateLabel,
                    current.label.span,
                    vec![name.clone()],
                ));
            }
            labels.push(name.clone());
            match current.body.as_ref() {
                Statement::Labeled(inner) => current = inner,
                other => break other,
            }
        };

        self.builder.set_span(body.span());
        match body {
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_) => self.compile_loop(body, labels),
            Statement::Switch(switch) => self.compile_switch(switch, labels),
            other => {
                let end = self.builder.new_label();
                self.push_target(TargetKind::Labeled, labels, end, None);
                self.compile_statement(other)?;
                self.pop_target()?;
                self.builder.place_label(end)
            }
        }
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn compile_loop(&mut self, statement: &'a Statement, labels: Vec<String>) -> Result<()> {
        match statement {
            Statement::While(s) => self.compile_while(s, labels),
            Statement::DoWhile(s) => self.compile_do_while(s, labels),
            Statement::For(s) => self.compile_for(s, labels),
            Statement::ForIn(s) => self.compile_for_in(s, labels),
            Statement::ForOf(s) => self.compile_for_of(s, labels),
            other => self.compile_statement(other),
        }
    }

    fn compile_while(&mut self, s: &'a WhileStatement, labels: Vec<String>) -> Result<()> {
        let start = self.builder.new_label();
        let end = self.builder.new_label();

        self.builder.place_label(start)?;
        self.compile_expression(&s.test)?;
        self.builder.jump_if_false(end)?;

        self.push_target(TargetKind::Loop, labels, end, Some(start));
        self.compile_statement(&s.body)?;
        self.pop_target()?;

        self.builder.jump(start)?;
        self.builder.place_label(end)
    }

    fn compile_do_while(&mut self, s: &'a DoWhileStatement, labels: Vec<String>) -> Result<()> {
        let start = self.builder.new_label();
        let test = self.builder.new_label();
        let end = self.builder.new_label();

        self.builder.place_label(start)?;
        self.push_target(TargetKind::Loop, labels, end, Some(test));
        self.compile_statement(&s.body)?;
        self.pop_target()?;

        self.builder.place_label(test)?;
        self.builder.set_span(s.span);
        self.compile_expression(&s.test)?;
        self.builder.jump_if_true(start)?;
        self.builder.place_label(end)
    }

    fn compile_for(&mut self, s: &'a ForStatement, labels: Vec<String>) -> Result<()> {
        let outer_depth = self.env_depth;
        let parent = self.enter_scope(s.id)?;
        let loop_scope = self.scope;

        let loop_start = self.builder.new_label();
        let update = self.builder.new_label();
        let exit = self.builder.new_label();
        let end = self.builder.new_label();

        match &s.init {
            Some(ForInit::Declaration(declaration)) => self.compile_variable_declaration(declaration)?,
            Some(ForInit::Expression(init)) => self.compile_expression(init)?,
            None => {}
        }

        self.builder.place_label(loop_start)?;
        if let Some(test) = &s.test {
            self.compile_expression(test)?;
            self.builder.jump_if_false(exit)?;
        }

        self.push_target(TargetKind::Loop, labels, end, Some(update));
        self.current_target()?.env_depth = outer_depth;
        self.compile_statement(&s.body)?;
        self.pop_target()?;

        self.builder.place_label(update)?;
        self.builder.set_span(s.span);
        self.copy_iteration_env(loop_scope)?;
        if let Some(update) = &s.update {
            self.compile_expression(update)?;
        }
        self.builder.jump(loop_start)?;

        self.builder.place_label(exit)?;
        self.exit_scope(parent)?;
        self.builder.place_label(end)
    }

    /// Replaces the loop environment with a fresh one holding the current
    /// values, so closures created by one iteration keep that iteration's
    /// bindings.
    fn copy_iteration_env(&mut self, loop_scope: ScopeId) -> Result<()> {
        let scope = self.tree.scope(loop_scope);
        if !scope.needs_env {
            return Ok(());
        }
        let slots = scope.env_slots;
        let bindings: Vec<(u32, VReg)> = self
            .tree
            .env_bindings(loop_scope)
            .map(|(_, slot)| (slot, self.builder.acquire()))
            .collect();

        for &(slot, value) in &bindings {
            self.builder.load_lex_var(0, slot)?;
            self.builder.store(value)?;
        }
        self.builder.pop_lex_env()?;
        self.builder.new_lex_env(slots)?;
        self.env_pushes += 1;
        for &(slot, value) in &bindings {
            self.builder.load(value)?;
            self.builder.store_lex_var(0, slot)?;
        }

        let regs: Vec<VReg> = bindings.iter().map(|&(_, reg)| reg).collect();
        self.builder.release(&regs)
    }

    fn compile_for_in(&mut self, s: &'a ForInStatement, labels: Vec<String>) -> Result<()> {
        self.compile_expression(&s.right)?;
        self.builder.get_prop_iterator()?;
        let iterator = self.builder.acquire();
        self.builder.store(iterator)?;

        let loop_start = self.builder.new_label();
        let next = self.builder.new_label();
        let end = self.builder.new_label();

        self.builder.place_label(loop_start)?;
        self.builder.get_next_prop_name(iterator)?;
        self.builder.jump_if_undefined(end)?;
        let key = self.builder.acquire();
        self.builder.store(key)?;

        self.compile_iteration(s, labels, key, end, next, None)?;

        self.builder.jump(loop_start)?;
        self.builder.place_label(end)?;
        self.builder.release(&[iterator])
    }

    fn compile_for_of(&mut self, s: &'a ForInStatement, labels: Vec<String>) -> Result<()> {
        self.compile_expression(&s.right)?;
        self.builder.get_iterator()?;
        let iterator = self.builder.acquire();
        self.builder.store(iterator)?;

        let loop_start = self.builder.new_label();
        let next = self.builder.new_label();
        let end = self.builder.new_label();

        self.builder.place_label(loop_start)?;
        self.builder.iterator_next(iterator)?;
        let result = self.builder.acquire();
        self.builder.store(result)?;
        let done = self.session.intern("done");
        self.builder.load_property(result, done)?;
        self.builder.jump_if_true(end)?;
        let value = self.session.intern("value");
        self.builder.load_property(result, value)?;
        self.builder.store(result)?;

        self.compile_iteration(s, labels, result, end, next, Some(iterator))?;

        self.builder.jump(loop_start)?;
        self.builder.place_label(end)?;
        self.builder.release(&[iterator])
    }

    /// One iteration of a for-in or for-of: binds `value` (released here)
    /// in a fresh loop scope and runs the body.
    fn compile_iteration(
        &mut self,
        s: &'a ForInStatement,
        labels: Vec<String>,
        value: VReg,
        end: Label,
        next: Label,
        iterator: Option<VReg>,
    ) -> Result<()> {
        let outer_depth = self.env_depth;
        let parent = self.enter_scope(s.id)?;

        self.builder.load(value)?;
        self.builder.release(&[value])?;
        match &s.left {
            ForInLeft::Declaration(_, name) => {
                let var = self.declared(&name.name)?;
                self.initialize_binding(var)?;
            }
            ForInLeft::Expression(target) => self.assign_acc_to(target, s.span)?,
        }

        self.push_target(TargetKind::Loop, labels, end, Some(next));
        let target = self.current_target()?;
        target.env_depth = outer_depth;
        target.iterator = iterator;
        self.compile_statement(&s.body)?;
        self.pop_target()?;

        self.builder.place_label(next)?;
        self.exit_scope(parent)
    }

    // ========================================================================
    // Switch
    // ========================================================================

    fn compile_switch(&mut self, s: &'a SwitchStatement, labels: Vec<String>) -> Result<()> {
        self.compile_expression(&s.discriminant)?;
        let discriminant = self.builder.acquire();
        self.builder.store(discriminant)?;

        let outer_depth = self.env_depth;
        let parent = self.enter_scope(s.id)?;
        for case in &s.cases {
            self.hoist_functions(&case.consequent)?;
        }

        let case_labels: Vec<_> = s.cases.iter().map(|_| self.builder.new_label()).collect();
        let body_end = self.builder.new_label();
        let end = self.builder.new_label();

        let mut default = None;
        for (case, &label) in s.cases.iter().zip(&case_labels) {
            match &case.test {
                Some(test) => {
                    self.builder.set_span(case.span);
                    self.compile_expression(test)?;
                    self.builder.binary(Opcode::StrictEq, discriminant)?;
                    self.builder.jump_if_boolean_true(label)?;
                }
                None => default = Some(label),
            }
        }
        self.builder.jump(default.unwrap_or(body_end))?;
        self.builder.release(&[discriminant])?;

        self.push_target(TargetKind::Switch, labels, end, None);
        self.current_target()?.env_depth = outer_depth;
        for (case, &label) in s.cases.iter().zip(&case_labels) {
            self.builder.place_label(label)?;
            self.compile_statements(&case.consequent)?;
        }
        self.pop_target()?;

        self.builder.place_label(body_end)?;
        self.exit_scope(parent)?;
        self.builder.place_label(end)
    }

    // ========================================================================
    // Try
    // ========================================================================

    fn compile_try(&mut self, s: &'a TryStatement) -> Result<()> {
        match (&s.handler, &s.finalizer) {
            (Some(handler), None) => self.compile_try_catch(|c| c.compile_block(&s.block), handler),
            (None, Some(finalizer)) => self.compile_try_finally(|c| c.compile_block(&s.block), finalizer),
            (Some(handler), Some(finalizer)) => self.compile_try_finally(
                |c| c.compile_try_catch(|c| c.compile_block(&s.block), handler),
                finalizer,
            ),
            (None, None) => self.compile_block(&s.block),
        }
    }

    /// Opens a protected region; returns the env save slot and register.
    fn begin_protected(&mut self) -> Result<(usize, VReg, u32)> {
        let save = self.builder.placeholder()?;
        let env = self.builder.acquire();
        Ok((save, env, self.env_pushes))
    }

    /// Restores the environment of the try statement at its handler when
    /// the protected region may have pushed environments.
    fn restore_at_handler(&mut self, save: usize, env: VReg, pushes: u32) -> Result<()> {
        if self.env_pushes != pushes {
            self.builder
                .patch(save, Instruction::with_reg(Opcode::SaveLexEnv, env)?)?;
            self.builder.restore_lex_env(env)?;
        }
        Ok(())
    }

    fn compile_try_catch(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<()>,
        handler: &'a CatchClause,
    ) -> Result<()> {
        let (save, env, pushes) = self.begin_protected()?;
        let begin = self.builder.new_label();
        let end = self.builder.new_label();
        let catch = self.builder.new_label();
        let done = self.builder.new_label();

        self.builder.place_label(begin)?;
        let depth = self.next_try_depth();
        let table = self
            .builder
            .create_catch_table(catch, depth, LabelPair::new(begin, end));
        self.push_try(None, table);
        body(self)?;
        self.pop_try()?;
        self.builder.place_label(end)?;
        self.builder.jump(done)?;

        self.builder.place_label(catch)?;
        self.restore_at_handler(save, env, pushes)?;
        let exception = self.builder.acquire();
        self.builder.store(exception)?;

        let parent = self.enter_scope(handler.id)?;
        self.hoist_functions(&handler.body.body)?;
        if let Some(param) = &handler.param {
            self.builder.load(exception)?;
            let var = self.declared(&param.name)?;
            self.initialize_binding(var)?;
        }
        self.builder.release(&[exception])?;
        self.compile_statements(&handler.body.body)?;
        self.exit_scope(parent)?;

        self.builder.place_label(done)?;
        self.builder.release(&[env])
    }

    fn compile_try_finally(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<()>,
        finalizer: &'a BlockStatement,
    ) -> Result<()> {
        let (save, env, pushes) = self.begin_protected()?;
        let begin = self.builder.new_label();
        let end = self.builder.new_label();
        let handler = self.builder.new_label();
        let done = self.builder.new_label();

        self.builder.place_label(begin)?;
        let depth = self.next_try_depth();
        let table = self
            .builder
            .create_catch_table(handler, depth, LabelPair::new(begin, end));
        self.push_try(Some(finalizer), table);
        body(self)?;
        self.pop_try()?;
        self.builder.place_label(end)?;

        self.compile_block(finalizer)?;
        self.builder.jump(done)?;

        self.builder.place_label(handler)?;
        self.restore_at_handler(save, env, pushes)?;
        let exception = self.builder.acquire();
        self.builder.store(exception)?;
        self.compile_block(finalizer)?;
        self.builder.load(exception)?;
        self.builder.release(&[exception])?;
        self.builder.throw()?;

        self.builder.place_label(done)?;
        self.builder.release(&[env])
    }
}
