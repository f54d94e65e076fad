// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Expression lowering.
//!
//! Every expression leaves its value in the accumulator. Intermediate
//! values live in temporaries that are released before the expression
//! completes, so an expression statement never leaks registers.
//!
//! ## Binary Operators
//!
//! ```text
//! a - b
//!
//! Bytecode:
//!   [a]
//!   sta t0
//!   [b]
//!   sub2 t0        ; acc = t0 - acc
//! ```
//!
//! ## Method Calls
//!
//! ```text
//! o.m(x)
//!
//! Bytecode:
//!   [o]
//!   sta t0         ; this
//!   ldobjbyname "m", t0
//!   sta t2
//!   [x]
//!   sta t1
//!   lda t2
//!   callthisrange 1, t0
//! ```

use super::FunctionCompiler;
use crate::ast::*;
use crate::bytecode::{Opcode, StringId, VReg};
use crate::compiler::literals::{LiteralBuffer, LiteralValue, canonical_bigint, regexp_flags};
use crate::compiler::session::FunctionSource;
use crate::error::{DiagnosticCode, Result};

/// An assignable location whose object and key have been evaluated.
#[derive(Debug, Clone, Copy)]
enum Reference<'a> {
    Identifier(&'a str),
    Named { object: VReg, name: StringId },
    Keyed { object: VReg, key: VReg },
}

impl<'s, 'a> FunctionCompiler<'s, 'a> {
    pub(super) fn compile_expression(&mut self, expression: &'a Expression) -> Result<()> {
        match expression {
            Expression::Literal(literal) => self.compile_literal(literal),
            Expression::Identifier(id) => self.load_identifier(&id.name, false),
            Expression::This => self.load_this(),
            Expression::Array(array) => self.compile_array(array),
            Expression::Object(object) => self.compile_object(object),
            Expression::Binary(e) => {
                self.compile_expression(&e.left)?;
                let lhs = self.builder.acquire();
                self.builder.store(lhs)?;
                self.compile_expression(&e.right)?;
                self.builder.binary(binary_opcode(e.operator), lhs)?;
                self.builder.release(&[lhs])
            }
            Expression::Logical(e) => self.compile_logical(e),
            Expression::Unary(e) => self.compile_unary(e),
            Expression::Assignment(e) => self.compile_assignment(e),
            Expression::Call(call) => self.compile_call(call),
            Expression::New(call) => self.compile_new(call),
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                let object = self.builder.acquire();
                self.builder.store(object)?;
                match &member.property {
                    MemberProperty::Identifier(name) => {
                        let name = self.session.intern(name);
                        self.builder.load_property(object, name)?;
                    }
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        self.builder.load_element(object)?;
                    }
                }
                self.builder.release(&[object])
            }
            Expression::Conditional(e) => {
                let alternate = self.builder.new_label();
                let end = self.builder.new_label();
                self.compile_expression(&e.test)?;
                self.builder.jump_if_false(alternate)?;
                self.compile_expression(&e.consequent)?;
                self.builder.jump(end)?;
                self.builder.place_label(alternate)?;
                self.compile_expression(&e.alternate)?;
                self.builder.place_label(end)
            }
            Expression::Function(function) => self.define_function(function),
            Expression::Class(class) => self.compile_class(class),
            Expression::Update(e) => self.compile_update(e),
            Expression::Sequence(expressions) => {
                for expression in expressions {
                    self.compile_expression(expression)?;
                }
                Ok(())
            }
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn compile_literal(&mut self, literal: &Literal) -> Result<()> {
        match literal {
            Literal::Number(n) => self.builder.load_number(*n),
            Literal::String(s) => {
                let id = self.session.intern(s);
                self.builder.load_string(id)
            }
            Literal::Boolean(b) => self.builder.load_bool(*b),
            Literal::Null => self.builder.load_null(),
            Literal::Undefined => self.builder.load_undefined(),
            Literal::BigInt(digits) => {
                let canonical = canonical_bigint(digits).unwrap_or_else(|| digits.clone());
                let id = self.session.intern(&canonical);
                self.builder.load_bigint(id)
            }
            Literal::RegExp { pattern, flags } => {
                let id = self.session.intern(pattern);
                self.builder.create_regexp(id, regexp_flags(flags))
            }
        }
    }

    /// The buffer value of a constant literal expression.
    fn constant(&self, expression: &Expression) -> Option<LiteralValue> {
        let Expression::Literal(literal) = expression else {
            return None;
        };
        Some(match literal {
            Literal::Number(n) => LiteralValue::Number(*n),
            Literal::String(s) => LiteralValue::String(self.session.intern(s)),
            Literal::Boolean(b) => LiteralValue::Boolean(*b),
            Literal::Null => LiteralValue::Null,
            Literal::Undefined => LiteralValue::Undefined,
            Literal::BigInt(_) | Literal::RegExp { .. } => return None,
        })
    }

    fn compile_array(&mut self, array: &'a ArrayExpression) -> Result<()> {
        let constants: Option<Vec<LiteralValue>> = array
            .elements
            .iter()
            .map(|element| element.as_ref().and_then(|e| self.constant(e)))
            .collect();
        if let Some(values) = constants.filter(|v| !v.is_empty()) {
            let buffer = self.session.add_literal(LiteralBuffer::Array(values));
            return self.builder.create_array_with_buffer(buffer);
        }

        self.builder.create_empty_array()?;
        let target = self.builder.acquire();
        self.builder.store(target)?;
        for (index, element) in array.elements.iter().enumerate() {
            if let Some(element) = element {
                self.compile_expression(element)?;
                self.builder.define_index(target, index as u32)?;
            }
        }
        // A trailing hole still counts towards the length.
        if matches!(array.elements.last(), Some(None)) {
            let length = self.session.intern("length");
            self.builder.load_number(array.elements.len() as f64)?;
            self.builder.store_property(target, length)?;
        }
        self.builder.load(target)?;
        self.builder.release(&[target])
    }

    fn compile_object(&mut self, object: &'a ObjectExpression) -> Result<()> {
        let mut entries: Vec<(StringId, LiteralValue)> = Vec::new();
        let all_constant = object.properties.iter().all(|property| match &property.key {
            PropertyKey::Named(key) => match self.constant(&property.value) {
                Some(value) => {
                    let key = self.session.intern(key);
                    if entries.iter().any(|(k, _)| *k == key) {
                        return false;
                    }
                    entries.push((key, value));
                    true
                }
                None => false,
            },
            PropertyKey::Computed(_) => false,
        });
        if all_constant && !entries.is_empty() {
            let buffer = self.session.add_literal(LiteralBuffer::Object(entries));
            return self.builder.create_object_with_buffer(buffer);
        }

        self.builder.create_empty_object()?;
        let target = self.builder.acquire();
        self.builder.store(target)?;
        for property in &object.properties {
            match &property.key {
                PropertyKey::Named(key) => {
                    self.compile_expression(&property.value)?;
                    let key = self.session.intern(key);
                    self.builder.define_property(target, key)?;
                }
                PropertyKey::Computed(key) => {
                    self.compile_expression(key)?;
                    let key_reg = self.builder.acquire();
                    self.builder.store(key_reg)?;
                    self.compile_expression(&property.value)?;
                    self.builder.define_element(target, key_reg)?;
                    self.builder.release(&[key_reg])?;
                }
            }
        }
        self.builder.load(target)?;
        self.builder.release(&[target])
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_logical(&mut self, e: &'a LogicalExpression) -> Result<()> {
        let end = self.builder.new_label();
        let value = self.builder.acquire();

        self.compile_expression(&e.left)?;
        self.builder.store(value)?;
        match e.operator {
            LogicalOperator::And => self.builder.jump_if_false(end)?,
            LogicalOperator::Or => self.builder.jump_if_true(end)?,
            LogicalOperator::NullishCoalescing => {
                let right = self.builder.new_label();
                self.builder.jump_if_undefined(right)?;
                self.builder.load_null()?;
                self.builder.binary(Opcode::StrictEq, value)?;
                self.builder.jump_if_boolean_false(end)?;
                self.builder.place_label(right)?;
            }
        }
        self.compile_expression(&e.right)?;
        self.builder.store(value)?;

        self.builder.place_label(end)?;
        self.builder.load(value)?;
        self.builder.release(&[value])
    }

    fn compile_unary(&mut self, e: &'a UnaryExpression) -> Result<()> {
        let opcode = match e.operator {
            UnaryOperator::Minus => Opcode::Neg,
            UnaryOperator::Plus => Opcode::ToNumber,
            UnaryOperator::LogicalNot => Opcode::IsFalse,
            UnaryOperator::BitwiseNot => Opcode::Not,
            UnaryOperator::Typeof => {
                match e.argument.as_ref() {
                    Expression::Identifier(id) => self.load_identifier(&id.name, true)?,
                    other => self.compile_expression(other)?,
                }
                return self.builder.unary(Opcode::TypeOf);
            }
            UnaryOperator::Void => {
                self.compile_expression(&e.argument)?;
                return self.builder.load_undefined();
            }
            UnaryOperator::Delete => return self.compile_delete(&e.argument),
        };
        self.compile_expression(&e.argument)?;
        self.builder.unary(opcode)
    }

    fn compile_delete(&mut self, argument: &'a Expression) -> Result<()> {
        match argument {
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                let object = self.builder.acquire();
                self.builder.store(object)?;
                match &member.property {
                    MemberProperty::Identifier(name) => {
                        let name = self.session.intern(name);
                        self.builder.load_string(name)?;
                    }
                    MemberProperty::Expression(key) => self.compile_expression(key)?,
                }
                self.builder.delete_property(object)?;
                self.builder.release(&[object])
            }
            Expression::Identifier(_) => self.builder.load_bool(true),
            other => {
                self.compile_expression(other)?;
                self.builder.load_bool(true)
            }
        }
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Evaluates the object and key parts of an assignment target.
    fn prepare_reference(&mut self, target: &'a Expression) -> Result<Reference<'a>> {
        match target {
            Expression::Identifier(id) => Ok(Reference::Identifier(&id.name)),
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                let object = self.builder.acquire();
                self.builder.store(object)?;
                match &member.property {
                    MemberProperty::Identifier(name) => Ok(Reference::Named {
                        object,
                        name: self.session.intern(name),
                    }),
                    MemberProperty::Expression(key) => {
                        self.compile_expression(key)?;
                        let key_reg = self.builder.acquire();
                        self.builder.store(key_reg)?;
                        Ok(Reference::Keyed { object, key: key_reg })
                    }
                }
            }
            _ => Err(self.diagnostic(
                DiagnosticCode::InvalidAssignmentTarget,
                self.builder.span(),
                Vec::new(),
            )),
        }
    }

    fn load_reference(&mut self, reference: Reference<'a>) -> Result<()> {
        match reference {
            Reference::Identifier(name) => self.load_identifier(name, false),
            Reference::Named { object, name } => self.builder.load_property(object, name),
            Reference::Keyed { object, key } => {
                self.builder.load(key)?;
                self.builder.load_element(object)
            }
        }
    }

    /// Stores acc into the reference; acc is left unchanged.
    fn store_reference(&mut self, reference: Reference<'a>) -> Result<()> {
        match reference {
            Reference::Identifier(name) => self.store_identifier(name),
            Reference::Named { object, name } => self.builder.store_property(object, name),
            Reference::Keyed { object, key } => self.builder.store_element(object, key),
        }
    }

    fn release_reference(&mut self, reference: Reference<'a>) -> Result<()> {
        match reference {
            Reference::Identifier(_) => Ok(()),
            Reference::Named { object, .. } => self.builder.release(&[object]),
            Reference::Keyed { object, key } => self.builder.release(&[object, key]),
        }
    }

    /// Assigns acc to `target`, as the left side of a for-in or for-of.
    pub(super) fn assign_acc_to(&mut self, target: &'a Expression, span: Span) -> Result<()> {
        self.builder.set_span(span);
        if let Expression::Identifier(id) = target {
            return self.store_identifier(&id.name);
        }
        let value = self.builder.acquire();
        self.builder.store(value)?;
        let reference = self.prepare_reference(target)?;
        self.builder.load(value)?;
        self.store_reference(reference)?;
        self.release_reference(reference)?;
        self.builder.release(&[value])
    }

    fn compile_assignment(&mut self, e: &'a AssignmentExpression) -> Result<()> {
        let reference = self.prepare_reference(&e.left)?;
        match e.operator.binary_operator() {
            None => self.compile_expression(&e.right)?,
            Some(operator) => {
                self.load_reference(reference)?;
                let current = self.builder.acquire();
                self.builder.store(current)?;
                self.compile_expression(&e.right)?;
                self.builder.binary(binary_opcode(operator), current)?;
                self.builder.release(&[current])?;
            }
        }
        self.store_reference(reference)?;
        self.release_reference(reference)
    }

    fn compile_update(&mut self, e: &'a UpdateExpression) -> Result<()> {
        let opcode = match e.operator {
            UpdateOperator::Increment => Opcode::Inc,
            UpdateOperator::Decrement => Opcode::Dec,
        };
        let reference = self.prepare_reference(&e.argument)?;
        self.load_reference(reference)?;
        if e.prefix {
            self.builder.unary(opcode)?;
            self.store_reference(reference)?;
        } else {
            self.builder.unary(Opcode::ToNumeric)?;
            let old = self.builder.acquire();
            self.builder.store(old)?;
            self.builder.unary(opcode)?;
            self.store_reference(reference)?;
            self.builder.load(old)?;
            self.builder.release(&[old])?;
        }
        self.release_reference(reference)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Evaluates arguments into consecutive registers starting at `first`.
    fn compile_arguments(&mut self, arguments: &'a [Expression], first: u32) -> Result<()> {
        for (i, argument) in arguments.iter().enumerate() {
            self.compile_expression(argument)?;
            self.builder.store(VReg::from(first + i as u32))?;
        }
        Ok(())
    }

    fn compile_call(&mut self, call: &'a CallExpression) -> Result<()> {
        self.builder.set_span(call.span);
        let argc = call.arguments.len() as u32;

        if let Expression::Member(member) = call.callee.as_ref() {
            let range = self.builder.acquire_range(argc + 1);
            self.compile_expression(&member.object)?;
            self.builder.store(range)?;
            match &member.property {
                MemberProperty::Identifier(name) => {
                    let name = self.session.intern(name);
                    self.builder.load_property(range, name)?;
                }
                MemberProperty::Expression(key) => {
                    self.compile_expression(key)?;
                    self.builder.load_element(range)?;
                }
            }
            let callee = self.builder.acquire();
            self.builder.store(callee)?;
            self.compile_arguments(&call.arguments, range.raw() + 1)?;
            self.builder.load(callee)?;
            self.builder.set_span(call.span);
            self.builder.call_this(argc, range)?;
            self.builder.release(&[callee])?;
            return self.release_range(range, argc + 1);
        }

        self.compile_expression(&call.callee)?;
        let callee = self.builder.acquire();
        self.builder.store(callee)?;
        let range = self.builder.acquire_range(argc);
        self.compile_arguments(&call.arguments, range.raw())?;
        self.builder.load(callee)?;
        self.builder.set_span(call.span);
        self.builder.call(argc, range)?;
        self.release_range(range, argc)?;
        self.builder.release(&[callee])
    }

    fn compile_new(&mut self, call: &'a CallExpression) -> Result<()> {
        self.builder.set_span(call.span);
        let argc = call.arguments.len() as u32;
        let range = self.builder.acquire_range(argc + 1);
        self.compile_expression(&call.callee)?;
        self.builder.store(range)?;
        self.compile_arguments(&call.arguments, range.raw() + 1)?;
        self.builder.set_span(call.span);
        self.builder.new_object(argc, range)?;
        self.release_range(range, argc + 1)
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Lowers a class to its constructor closure in acc.
    pub(super) fn compile_class(&mut self, class: &'a Class) -> Result<()> {
        let id = match &class.constructor {
            Some(constructor) => {
                let id = self.tree.function_id(constructor.id)?;
                self.enqueue(id, FunctionSource::Function(constructor));
                id
            }
            None => {
                let id = self.tree.function_id(class.id)?;
                self.enqueue(id, FunctionSource::ImplicitConstructor(class));
                id
            }
        };
        self.builder.define_class(id)?;
        if class.methods.is_empty() {
            return Ok(());
        }

        let constructor = self.builder.acquire();
        self.builder.store(constructor)?;
        let prototype = self.builder.acquire();
        let name = self.session.intern("prototype");
        self.builder.load_property(constructor, name)?;
        self.builder.store(prototype)?;

        for method in &class.methods {
            self.define_function(&method.function)?;
            let key = self.session.intern(&method.key);
            let home = if method.is_static { constructor } else { prototype };
            self.builder.define_property(home, key)?;
        }

        self.builder.load(constructor)?;
        self.builder.release(&[constructor, prototype])
    }
}

fn binary_opcode(operator: BinaryOperator) -> Opcode {
    match operator {
        BinaryOperator::Add => Opcode::Add2,
        BinaryOperator::Subtract => Opcode::Sub2,
        BinaryOperator::Multiply => Opcode::Mul2,
        BinaryOperator::Divide => Opcode::Div2,
        BinaryOperator::Modulo => Opcode::Mod2,
        BinaryOperator::Exponent => Opcode::Exp,
        BinaryOperator::Equal => Opcode::Eq,
        BinaryOperator::NotEqual => Opcode::NotEq,
        BinaryOperator::StrictEqual => Opcode::StrictEq,
        BinaryOperator::StrictNotEqual => Opcode::StrictNotEq,
        BinaryOperator::LessThan => Opcode::Less,
        BinaryOperator::LessThanEqual => Opcode::LessEq,
        BinaryOperator::GreaterThan => Opcode::Greater,
        BinaryOperator::GreaterThanEqual => Opcode::GreaterEq,
        BinaryOperator::BitwiseAnd => Opcode::And2,
        BinaryOperator::BitwiseOr => Opcode::Or2,
        BinaryOperator::BitwiseXor => Opcode::Xor2,
        BinaryOperator::LeftShift => Opcode::Shl2,
        BinaryOperator::RightShift => Opcode::Ashr2,
        BinaryOperator::UnsignedRightShift => Opcode::Shr2,
        BinaryOperator::In => Opcode::IsIn,
        BinaryOperator::InstanceOf => Opcode::InstanceOf,
    }
}
