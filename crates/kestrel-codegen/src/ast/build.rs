// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terse constructors for syntax trees.
//!
//! Front-ends that build trees programmatically and the test suites use
//! these instead of spelling out every struct. Scoped nodes get fresh
//! [`NodeId`]s and every position is [`Span::default`] unless set with
//! [`at`].

use super::*;

/// Sets the source position of a statement.
pub fn at(mut stmt: Statement, line: u32, column: u32) -> Statement {
    *stmt.span_mut() = Span::new(line, column);
    stmt
}

/// A script program.
pub fn script(body: Vec<Statement>) -> Program {
    Program {
        id: NodeId::fresh(),
        kind: ProgramKind::Script,
        body,
    }
}

/// A module program.
pub fn module(body: Vec<Statement>) -> Program {
    Program {
        id: NodeId::fresh(),
        kind: ProgramKind::Module,
        body,
    }
}

/// An identifier node.
pub fn ident(name: &str) -> Identifier {
    Identifier {
        name: name.to_string(),
        span: Span::default(),
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// An identifier reference.
pub fn id(name: &str) -> Expression {
    Expression::Identifier(ident(name))
}

/// A number literal.
pub fn num(value: f64) -> Expression {
    Expression::Literal(Literal::Number(value))
}

/// A string literal.
pub fn string(value: &str) -> Expression {
    Expression::Literal(Literal::String(value.to_string()))
}

/// A boolean literal.
pub fn boolean(value: bool) -> Expression {
    Expression::Literal(Literal::Boolean(value))
}

/// The null literal.
pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

/// The undefined literal.
pub fn undefined() -> Expression {
    Expression::Literal(Literal::Undefined)
}

/// An array literal without holes.
pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(ArrayExpression {
        elements: elements.into_iter().map(Some).collect(),
    })
}

/// An object literal with named keys.
pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    Expression::Object(ObjectExpression {
        properties: properties
            .into_iter()
            .map(|(key, value)| Property {
                key: PropertyKey::Named(key.to_string()),
                value,
            })
            .collect(),
    })
}

/// A binary expression.
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// A logical expression.
pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
    Expression::Logical(LogicalExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// A unary expression.
pub fn unary(operator: UnaryOperator, argument: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        operator,
        argument: Box::new(argument),
    })
}

/// A plain assignment.
pub fn assign(target: Expression, value: Expression) -> Expression {
    compound(AssignmentOperator::Assign, target, value)
}

/// An assignment with an explicit operator.
pub fn compound(operator: AssignmentOperator, target: Expression, value: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(target),
        right: Box::new(value),
    })
}

/// A postfix `x++`.
pub fn post_inc(target: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator: UpdateOperator::Increment,
        argument: Box::new(target),
        prefix: false,
    })
}

/// A prefix `++x` or `--x`.
pub fn pre_update(operator: UpdateOperator, target: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        argument: Box::new(target),
        prefix: true,
    })
}

/// A call expression.
pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
        span: Span::default(),
    })
}

/// A new expression.
pub fn new(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::New(CallExpression {
        callee: Box::new(callee),
        arguments,
        span: Span::default(),
    })
}

/// A dotted member access.
pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(name.to_string()),
    })
}

/// A computed member access.
pub fn index(object: Expression, key: Expression) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Expression(Box::new(key)),
    })
}

/// A conditional expression.
pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

/// A function node with a statement body.
pub fn function(name: Option<&str>, params: &[&str], body: Vec<Statement>) -> Function {
    Function {
        id: NodeId::fresh(),
        name: name.map(ident),
        params: params.iter().map(|p| ident(p)).collect(),
        body: FunctionBody::Block(body),
        is_arrow: false,
        span: Span::default(),
    }
}

/// A function expression.
pub fn function_expr(name: Option<&str>, params: &[&str], body: Vec<Statement>) -> Expression {
    Expression::Function(function(name, params, body))
}

/// An arrow function with a concise body.
pub fn arrow(params: &[&str], body: Expression) -> Expression {
    Expression::Function(Function {
        id: NodeId::fresh(),
        name: None,
        params: params.iter().map(|p| ident(p)).collect(),
        body: FunctionBody::Expression(Box::new(body)),
        is_arrow: true,
        span: Span::default(),
    })
}

// ============================================================================
// Statements
// ============================================================================

/// An expression statement.
pub fn expr(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        span: Span::default(),
    })
}

/// A single-binding declaration.
pub fn declare(kind: VariableKind, name: &str, init: Option<Expression>) -> Statement {
    Statement::VariableDeclaration(declaration(kind, name, init))
}

fn declaration(kind: VariableKind, name: &str, init: Option<Expression>) -> VariableDeclaration {
    VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id: ident(name),
            init,
        }],
        span: Span::default(),
    }
}

/// `var name = init`.
pub fn var(name: &str, init: Option<Expression>) -> Statement {
    declare(VariableKind::Var, name, init)
}

/// `let name = init`.
pub fn let_(name: &str, init: Option<Expression>) -> Statement {
    declare(VariableKind::Let, name, init)
}

/// `const name = init`.
pub fn const_(name: &str, init: Expression) -> Statement {
    declare(VariableKind::Const, name, Some(init))
}

/// A function declaration.
pub fn function_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    Statement::FunctionDeclaration(function(Some(name), params, body))
}

/// A class declaration with methods given as `(key, function)` pairs.
pub fn class_decl(name: &str, constructor: Option<Function>, methods: Vec<(&str, Function)>) -> Statement {
    Statement::ClassDeclaration(Class {
        id: NodeId::fresh(),
        name: Some(ident(name)),
        constructor,
        methods: methods
            .into_iter()
            .map(|(key, function)| Method {
                key: key.to_string(),
                function,
                is_static: false,
            })
            .collect(),
        span: Span::default(),
    })
}

/// The block node itself.
pub fn block_node(body: Vec<Statement>) -> BlockStatement {
    BlockStatement {
        id: NodeId::fresh(),
        body,
        span: Span::default(),
    }
}

/// A block statement.
pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(block_node(body))
}

/// An if statement.
pub fn if_(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: alternate.map(Box::new),
        span: Span::default(),
    })
}

/// A while loop.
pub fn while_(test: Expression, body: Statement) -> Statement {
    Statement::While(WhileStatement {
        test,
        body: Box::new(body),
        span: Span::default(),
    })
}

/// A do-while loop.
pub fn do_while(body: Statement, test: Expression) -> Statement {
    Statement::DoWhile(DoWhileStatement {
        body: Box::new(body),
        test,
        span: Span::default(),
    })
}

/// A for loop with an arbitrary initializer.
pub fn for_(
    init: Option<ForInit>,
    test: Option<Expression>,
    update: Option<Expression>,
    body: Statement,
) -> Statement {
    Statement::For(ForStatement {
        id: NodeId::fresh(),
        init,
        test,
        update,
        body: Box::new(body),
        span: Span::default(),
    })
}

/// A for loop whose head declares one binding.
pub fn for_decl(
    kind: VariableKind,
    name: &str,
    init: Expression,
    test: Option<Expression>,
    update: Option<Expression>,
    body: Statement,
) -> Statement {
    for_(
        Some(ForInit::Declaration(declaration(kind, name, Some(init)))),
        test,
        update,
        body,
    )
}

/// A for-in loop declaring one binding.
pub fn for_in(kind: VariableKind, name: &str, right: Expression, body: Statement) -> Statement {
    Statement::ForIn(ForInStatement {
        id: NodeId::fresh(),
        left: ForInLeft::Declaration(kind, ident(name)),
        right,
        body: Box::new(body),
        span: Span::default(),
    })
}

/// A for-of loop declaring one binding.
pub fn for_of(kind: VariableKind, name: &str, right: Expression, body: Statement) -> Statement {
    Statement::ForOf(ForInStatement {
        id: NodeId::fresh(),
        left: ForInLeft::Declaration(kind, ident(name)),
        right,
        body: Box::new(body),
        span: Span::default(),
    })
}

/// A switch statement.
pub fn switch(discriminant: Expression, cases: Vec<SwitchCase>) -> Statement {
    Statement::Switch(SwitchStatement {
        id: NodeId::fresh(),
        discriminant,
        cases,
        span: Span::default(),
    })
}

/// A `case test:` clause.
pub fn case(test: Expression, consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: Some(test),
        consequent,
        span: Span::default(),
    }
}

/// A `default:` clause.
pub fn default_case(consequent: Vec<Statement>) -> SwitchCase {
    SwitchCase {
        test: None,
        consequent,
        span: Span::default(),
    }
}

/// A return statement.
pub fn ret(argument: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        argument,
        span: Span::default(),
    })
}

/// A break statement.
pub fn brk(label: Option<&str>) -> Statement {
    Statement::Break(JumpStatement {
        label: label.map(ident),
        span: Span::default(),
    })
}

/// A continue statement.
pub fn cont(label: Option<&str>) -> Statement {
    Statement::Continue(JumpStatement {
        label: label.map(ident),
        span: Span::default(),
    })
}

/// A throw statement.
pub fn throw(argument: Expression) -> Statement {
    Statement::Throw(ThrowStatement {
        argument,
        span: Span::default(),
    })
}

/// A try statement. The catch clause is `(parameter, body)`.
pub fn try_(
    block: Vec<Statement>,
    handler: Option<(Option<&str>, Vec<Statement>)>,
    finalizer: Option<Vec<Statement>>,
) -> Statement {
    Statement::Try(TryStatement {
        block: block_node(block),
        handler: handler.map(|(param, body)| CatchClause {
            id: NodeId::fresh(),
            param: param.map(ident),
            body: block_node(body),
        }),
        finalizer: finalizer.map(block_node),
        span: Span::default(),
    })
}

/// A labeled statement.
pub fn labeled(label: &str, body: Statement) -> Statement {
    Statement::Labeled(LabeledStatement {
        label: ident(label),
        body: Box::new(body),
        span: Span::default(),
    })
}
