// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scope analysis over a whole program.
//!
//! Runs before any function is lowered, in three steps:
//!
//! 1. **Declare**: builds the scope tree, declares every binding (hoisting
//!    `var`s), numbers functions in pre-order and reports duplicate
//!    declarations and duplicate `default` clauses.
//! 2. **Reference**: resolves every identifier and marks bindings that a
//!    nested function captures, which makes their scope need a lexical
//!    environment.
//! 3. **Storage**: assigns environment slots to captured bindings and
//!    registers to the rest.
//!
//! The lowering walks the tree in the same order, so every scope the
//! lowering enters was created here.

use tracing::debug;

use super::{DeclarationKind, ScopeId, ScopeKind, ScopeTree};
use crate::ast::*;
use crate::config::CompileOptions;
use crate::error::{CompileFailure, Diagnostic, DiagnosticCode, InternalError};

/// Name of the top-level function.
pub const MAIN_FUNCTION: &str = "func_main_0";

/// Name of the hidden binding that holds a function's receiver.
pub const THIS_BINDING: &str = "this";

/// Name given to functions without one.
pub const ANONYMOUS: &str = "<anonymous>";

/// Analyzes a program and returns its scope tree.
///
/// Any declaration diagnostic fails the whole program; diagnostics are
/// reported in traversal order.
pub fn analyze(program: &Program, options: &CompileOptions) -> Result<ScopeTree, CompileFailure> {
    let mut tree = ScopeTree::new();

    let mut declare = Analyzer::new(&mut tree, Pass::Declare);
    declare.program(program).map_err(CompileFailure::Internal)?;
    let diagnostics = declare.diagnostics;
    if !diagnostics.is_empty() {
        return Err(CompileFailure::Diagnostics(diagnostics));
    }

    let mut reference = Analyzer::new(&mut tree, Pass::Reference);
    reference.program(program).map_err(CompileFailure::Internal)?;

    tree.assign_storage(options.strict_global_let);
    debug!(
        scopes = tree.len(),
        functions = tree.function_count(),
        "scope analysis complete"
    );
    Ok(tree)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Declare,
    Reference,
}

type Walk = Result<(), InternalError>;

struct Analyzer<'t> {
    tree: &'t mut ScopeTree,
    pass: Pass,
    scope: ScopeId,
    function_name: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Analyzer<'t> {
    fn new(tree: &'t mut ScopeTree, pass: Pass) -> Self {
        Self {
            tree,
            pass,
            scope: ScopeId::new(0),
            function_name: MAIN_FUNCTION.to_string(),
            diagnostics: Vec::new(),
        }
    }

    fn enter(&mut self, node: NodeId, kind: ScopeKind) -> Result<ScopeId, InternalError> {
        let parent = self.scope;
        self.scope = match self.pass {
            Pass::Declare => self.tree.new_scope(kind, Some(parent), node),
            Pass::Reference => self.tree.scope_of(node)?,
        };
        Ok(parent)
    }

    fn declare(&mut self, name: &Identifier, kind: DeclarationKind) {
        if self.pass != Pass::Declare {
            return;
        }
        if let Err(diagnostic) = self.tree.declare(self.scope, &name.name, kind, name.span) {
            self.diagnostics.push(diagnostic.in_function(&self.function_name));
        }
    }

    fn reference(&mut self, name: &str, write: bool) {
        if self.pass != Pass::Reference {
            return;
        }
        if let Some(id) = self.tree.lookup(name, self.scope) {
            self.tree.record_reference(id, self.scope, write);
        }
    }

    // ========================================================================
    // Program and functions
    // ========================================================================

    fn program(&mut self, program: &Program) -> Walk {
        let kind = match program.kind {
            ProgramKind::Script => ScopeKind::Global,
            ProgramKind::Module => ScopeKind::Module,
        };
        self.scope = match self.pass {
            Pass::Declare => {
                self.tree.register_function(program.id, MAIN_FUNCTION);
                self.tree.new_scope(kind, None, program.id)
            }
            Pass::Reference => self.tree.scope_of(program.id)?,
        };
        self.statements(&program.body)
    }

    fn function(&mut self, function: &Function, name_hint: Option<&str>, expression: bool) -> Walk {
        let name = function
            .name
            .as_ref()
            .map(|n| n.name.as_str())
            .or(name_hint)
            .unwrap_or(ANONYMOUS)
            .to_string();
        if self.pass == Pass::Declare {
            self.tree.register_function(function.id, name.clone());
        }
        let saved_name = std::mem::replace(&mut self.function_name, name);
        let parent = self.enter(function.id, ScopeKind::Function)?;

        if !function.is_arrow {
            self.declare(&Identifier { name: THIS_BINDING.to_string(), span: function.span }, DeclarationKind::This);
        }
        for param in &function.params {
            self.declare(param, DeclarationKind::Parameter);
        }
        match &function.body {
            FunctionBody::Block(body) => self.statements(body)?,
            FunctionBody::Expression(body) => self.expression(body)?,
        }
        if expression {
            if let Some(own) = &function.name {
                self.declare(own, DeclarationKind::FunctionName);
            }
        }

        self.scope = parent;
        self.function_name = saved_name;
        Ok(())
    }

    fn class(&mut self, class: &Class) -> Walk {
        let name = class.name.as_ref().map(|n| n.name.as_str());
        match &class.constructor {
            Some(constructor) => self.function(constructor, name, false)?,
            None => {
                if self.pass == Pass::Declare {
                    self.tree.register_function(class.id, name.unwrap_or(ANONYMOUS));
                }
            }
        }
        for method in &class.methods {
            self.function(&method.function, Some(&method.key), false)?;
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statements(&mut self, statements: &[Statement]) -> Walk {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn block(&mut self, block: &BlockStatement) -> Walk {
        let parent = self.enter(block.id, ScopeKind::Block)?;
        self.statements(&block.body)?;
        self.scope = parent;
        Ok(())
    }

    fn variable_declaration(&mut self, declaration: &VariableDeclaration) -> Walk {
        let kind = declaration_kind(declaration.kind);
        for declarator in &declaration.declarations {
            self.declare(&declarator.id, kind);
            if let Some(init) = &declarator.init {
                self.named_expression(init, &declarator.id.name)?;
            }
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Walk {
        match statement {
            Statement::VariableDeclaration(declaration) => self.variable_declaration(declaration),
            Statement::FunctionDeclaration(function) => {
                if let Some(name) = &function.name {
                    self.declare(name, DeclarationKind::Function);
                }
                self.function(function, None, false)
            }
            Statement::ClassDeclaration(class) => {
                if let Some(name) = &class.name {
                    self.declare(name, DeclarationKind::Class);
                }
                self.class(class)
            }
            Statement::Expression(s) => self.expression(&s.expression),
            Statement::Block(block) => self.block(block),
            Statement::If(s) => {
                self.expression(&s.test)?;
                self.substatement(&s.consequent)?;
                if let Some(alternate) = &s.alternate {
                    self.substatement(alternate)?;
                }
                Ok(())
            }
            Statement::Switch(s) => self.switch(s),
            Statement::While(s) => {
                self.expression(&s.test)?;
                self.substatement(&s.body)
            }
            Statement::DoWhile(s) => {
                self.substatement(&s.body)?;
                self.expression(&s.test)
            }
            Statement::For(s) => {
                let parent = self.enter(s.id, ScopeKind::Loop)?;
                match &s.init {
                    Some(ForInit::Declaration(declaration)) => self.variable_declaration(declaration)?,
                    Some(ForInit::Expression(e)) => self.expression(e)?,
                    None => {}
                }
                if let Some(test) = &s.test {
                    self.expression(test)?;
                }
                if let Some(update) = &s.update {
                    self.expression(update)?;
                }
                self.substatement(&s.body)?;
                self.scope = parent;
                Ok(())
            }
            Statement::ForIn(s) | Statement::ForOf(s) => {
                // The iterated object is evaluated outside the loop scope.
                self.expression(&s.right)?;
                let parent = self.enter(s.id, ScopeKind::Loop)?;
                match &s.left {
                    ForInLeft::Declaration(kind, name) => {
                        self.declare(name, declaration_kind(*kind));
                        self.reference(&name.name, true);
                    }
                    ForInLeft::Expression(target) => self.target(target, false)?,
                }
                self.substatement(&s.body)?;
                self.scope = parent;
                Ok(())
            }
            Statement::Return(s) => match &s.argument {
                Some(argument) => self.expression(argument),
                None => Ok(()),
            },
            Statement::Throw(s) => self.expression(&s.argument),
            Statement::Try(s) => {
                self.block(&s.block)?;
                if let Some(handler) = &s.handler {
                    let parent = self.enter(handler.id, ScopeKind::Catch)?;
                    if let Some(param) = &handler.param {
                        self.declare(param, DeclarationKind::CatchParam);
                    }
                    self.statements(&handler.body.body)?;
                    self.scope = parent;
                }
                if let Some(finalizer) = &s.finalizer {
                    self.block(finalizer)?;
                }
                Ok(())
            }
            Statement::Labeled(s) => self.substatement(&s.body),
            Statement::Break(_) | Statement::Continue(_) | Statement::Debugger(_) | Statement::Empty(_) => Ok(()),
        }
    }

    /// A statement in a position that takes a single statement rather
    /// than a list, where a function declaration has nowhere to hoist to.
    fn substatement(&mut self, statement: &Statement) -> Walk {
        if let Statement::FunctionDeclaration(function) = statement {
            if self.pass == Pass::Declare {
                let span = function.name.as_ref().map_or(function.span, |name| name.span);
                self.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::FunctionDeclarationNotInBlock, span, Vec::new())
                        .in_function(&self.function_name),
                );
            }
        }
        self.statement(statement)
    }

    fn switch(&mut self, switch: &SwitchStatement) -> Walk {
        self.expression(&switch.discriminant)?;
        let parent = self.enter(switch.id, ScopeKind::Switch)?;
        let mut seen_default = false;
        for case in &switch.cases {
            match &case.test {
                Some(test) => self.expression(test)?,
                None if seen_default => {
                    if self.pass == Pass::Declare {
                        self.diagnostics.push(
                            Diagnostic::new(DiagnosticCode::DuplicateDefaultClause, case.span, Vec::new())
                                .in_function(&self.function_name),
                        );
                    }
                }
                None => seen_default = true,
            }
            self.statements(&case.consequent)?;
        }
        self.scope = parent;
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn named_expression(&mut self, expression: &Expression, name: &str) -> Walk {
        match expression {
            Expression::Function(function) => self.function(function, Some(name), true),
            _ => self.expression(expression),
        }
    }

    fn target(&mut self, target: &Expression, read: bool) -> Walk {
        match target {
            Expression::Identifier(id) => {
                if read {
                    self.reference(&id.name, false);
                }
                self.reference(&id.name, true);
                Ok(())
            }
            other => self.expression(other),
        }
    }

    fn expression(&mut self, expression: &Expression) -> Walk {
        match expression {
            Expression::Literal(_) => Ok(()),
            Expression::Identifier(id) => {
                self.reference(&id.name, false);
                Ok(())
            }
            Expression::This => {
                self.reference(THIS_BINDING, false);
                Ok(())
            }
            Expression::Array(array) => {
                for element in array.elements.iter().flatten() {
                    self.expression(element)?;
                }
                Ok(())
            }
            Expression::Object(object) => {
                for property in &object.properties {
                    match &property.key {
                        PropertyKey::Named(name) => self.named_expression(&property.value, name)?,
                        PropertyKey::Computed(key) => {
                            self.expression(key)?;
                            self.expression(&property.value)?;
                        }
                    }
                }
                Ok(())
            }
            Expression::Binary(e) => {
                self.expression(&e.left)?;
                self.expression(&e.right)
            }
            Expression::Logical(e) => {
                self.expression(&e.left)?;
                self.expression(&e.right)
            }
            Expression::Unary(e) => self.expression(&e.argument),
            Expression::Assignment(e) => {
                self.target(&e.left, e.operator != AssignmentOperator::Assign)?;
                match e.left.as_ref() {
                    Expression::Identifier(id) => self.named_expression(&e.right, &id.name),
                    _ => self.expression(&e.right),
                }
            }
            Expression::Update(e) => self.target(&e.argument, true),
            Expression::Call(call) | Expression::New(call) => {
                self.expression(&call.callee)?;
                for argument in &call.arguments {
                    self.expression(argument)?;
                }
                Ok(())
            }
            Expression::Member(member) => {
                self.expression(&member.object)?;
                match &member.property {
                    MemberProperty::Identifier(_) => Ok(()),
                    MemberProperty::Expression(key) => self.expression(key),
                }
            }
            Expression::Conditional(e) => {
                self.expression(&e.test)?;
                self.expression(&e.consequent)?;
                self.expression(&e.alternate)
            }
            Expression::Function(function) => self.function(function, None, true),
            Expression::Class(class) => self.class(class),
            Expression::Sequence(expressions) => {
                for e in expressions {
                    self.expression(e)?;
                }
                Ok(())
            }
        }
    }
}

fn declaration_kind(kind: VariableKind) -> DeclarationKind {
    match kind {
        VariableKind::Var => DeclarationKind::Var,
        VariableKind::Let => DeclarationKind::Let,
        VariableKind::Const => DeclarationKind::Const,
    }
}
