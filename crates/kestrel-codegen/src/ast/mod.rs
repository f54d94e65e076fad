// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Syntax tree consumed by the code generator.
//!
//! These structures are ESTree-shaped. The front-end hands over a tree whose
//! statements and identifiers carry source positions and whose scoped nodes
//! (programs, functions, blocks, loops with heads, switches and catch
//! clauses) carry a [`NodeId`] so scope analysis can attach a scope to them.

pub mod build;

use std::sync::atomic::{AtomicU32, Ordering};

use kestrel_macros::index_newtype;

index_newtype! {
    /// Identity of a scoped syntax node.
    pub struct NodeId(u32) => "#";
}

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    /// Allocates a node id that is unique for the lifetime of the process.
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// 1-based line (0 when unknown)
    pub line: u32,
    /// 1-based column (0 when unknown)
    pub column: u32,
    /// Byte offset into the source
    pub offset: u32,
}

impl Span {
    /// Creates a span at a line and column.
    pub const fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Whether a program is a classic script or a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramKind {
    /// Top-level bindings live on the global object or global lexical record
    #[default]
    Script,
    /// Top-level bindings are module locals
    Module,
}

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Scope identity of the top level
    pub id: NodeId,
    /// Script or module
    pub kind: ProgramKind,
    /// The statements in the program
    pub body: Vec<Statement>,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
    /// Where the identifier appears
    pub span: Span,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Function declaration
    FunctionDeclaration(Function),
    /// Class declaration
    ClassDeclaration(Class),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// Switch statement
    Switch(SwitchStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// For-in statement
    ForIn(ForInStatement),
    /// For-of statement
    ForOf(ForInStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Break statement, optionally labeled
    Break(JumpStatement),
    /// Continue statement, optionally labeled
    Continue(JumpStatement),
    /// Throw statement
    Throw(ThrowStatement),
    /// Try statement
    Try(TryStatement),
    /// Labeled statement
    Labeled(LabeledStatement),
    /// Debugger statement
    Debugger(Span),
    /// Empty statement (;)
    Empty(Span),
}

impl Statement {
    /// Returns the source position of this statement.
    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration(s) => s.span,
            Statement::FunctionDeclaration(f) => f.span,
            Statement::ClassDeclaration(c) => c.span,
            Statement::Expression(s) => s.span,
            Statement::Block(s) => s.span,
            Statement::If(s) => s.span,
            Statement::Switch(s) => s.span,
            Statement::While(s) => s.span,
            Statement::DoWhile(s) => s.span,
            Statement::For(s) => s.span,
            Statement::ForIn(s) | Statement::ForOf(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::Break(s) | Statement::Continue(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Labeled(s) => s.span,
            Statement::Debugger(span) | Statement::Empty(span) => *span,
        }
    }

    /// Returns a mutable reference to the source position of this statement.
    pub fn span_mut(&mut self) -> &mut Span {
        match self {
            Statement::VariableDeclaration(s) => &mut s.span,
            Statement::FunctionDeclaration(f) => &mut f.span,
            Statement::ClassDeclaration(c) => &mut c.span,
            Statement::Expression(s) => &mut s.span,
            Statement::Block(s) => &mut s.span,
            Statement::If(s) => &mut s.span,
            Statement::Switch(s) => &mut s.span,
            Statement::While(s) => &mut s.span,
            Statement::DoWhile(s) => &mut s.span,
            Statement::For(s) => &mut s.span,
            Statement::ForIn(s) | Statement::ForOf(s) => &mut s.span,
            Statement::Return(s) => &mut s.span,
            Statement::Break(s) | Statement::Continue(s) => &mut s.span,
            Statement::Throw(s) => &mut s.span,
            Statement::Try(s) => &mut s.span,
            Statement::Labeled(s) => &mut s.span,
            Statement::Debugger(span) | Statement::Empty(span) => span,
        }
    }
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
    /// Source position
    pub span: Span,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// The identifier being declared
    pub id: Identifier,
    /// Optional initializer expression
    pub init: Option<Expression>,
}

/// A function of any syntactic form.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Scope identity
    pub id: NodeId,
    /// The function name, if any
    pub name: Option<Identifier>,
    /// The parameters
    pub params: Vec<Identifier>,
    /// The function body
    pub body: FunctionBody,
    /// Arrow functions do not bind their own `this`
    pub is_arrow: bool,
    /// Source position
    pub span: Span,
}

/// Function body.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// Statement list body
    Block(Vec<Statement>),
    /// Concise arrow body
    Expression(Box<Expression>),
}

/// A class without heritage.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    /// Identity of the implicit constructor when none is declared
    pub id: NodeId,
    /// The class name, if any
    pub name: Option<Identifier>,
    /// The constructor, if declared
    pub constructor: Option<Function>,
    /// Methods in source order
    pub methods: Vec<Method>,
    /// Source position
    pub span: Span,
}

/// A class method.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// The property name
    pub key: String,
    /// The method body
    pub function: Function,
    /// Whether the method lives on the constructor
    pub is_static: bool,
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
    /// Source position
    pub span: Span,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    /// Scope identity
    pub id: NodeId,
    /// The statements in the block
    pub body: Vec<Statement>,
    /// Source position
    pub span: Span,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The condition
    pub test: Expression,
    /// The then branch
    pub consequent: Box<Statement>,
    /// The optional else branch
    pub alternate: Option<Box<Statement>>,
    /// Source position
    pub span: Span,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
    /// Source position
    pub span: Span,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The condition
    pub test: Expression,
    /// Source position
    pub span: Span,
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// Scope identity of the loop head
    pub id: NodeId,
    /// The initializer
    pub init: Option<ForInit>,
    /// The condition
    pub test: Option<Expression>,
    /// The update expression
    pub update: Option<Expression>,
    /// The loop body
    pub body: Box<Statement>,
    /// Source position
    pub span: Span,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// A for-in or for-of statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForInStatement {
    /// Scope identity of the loop head
    pub id: NodeId,
    /// The left-hand side
    pub left: ForInLeft,
    /// The object or iterable
    pub right: Expression,
    /// The loop body
    pub body: Box<Statement>,
    /// Source position
    pub span: Span,
}

/// Left-hand side of for-in/for-of.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInLeft {
    /// A single declared binding
    Declaration(VariableKind, Identifier),
    /// Expression (identifier or member)
    Expression(Expression),
}

/// A switch statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    /// Scope identity of the case block
    pub id: NodeId,
    /// The discriminant expression
    pub discriminant: Expression,
    /// The case clauses
    pub cases: Vec<SwitchCase>,
    /// Source position
    pub span: Span,
}

/// A switch case clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// The test expression (None for default)
    pub test: Option<Expression>,
    /// The consequent statements
    pub consequent: Vec<Statement>,
    /// Source position
    pub span: Span,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    /// The return value
    pub argument: Option<Expression>,
    /// Source position
    pub span: Span,
}

/// A break or continue statement.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpStatement {
    /// The target label, if any
    pub label: Option<Identifier>,
    /// Source position
    pub span: Span,
}

/// A throw statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStatement {
    /// The thrown expression
    pub argument: Expression,
    /// Source position
    pub span: Span,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    /// The try block
    pub block: BlockStatement,
    /// The catch clause
    pub handler: Option<CatchClause>,
    /// The finally block
    pub finalizer: Option<BlockStatement>,
    /// Source position
    pub span: Span,
}

/// A catch clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Scope identity of the parameter scope
    pub id: NodeId,
    /// The error parameter
    pub param: Option<Identifier>,
    /// The catch body
    pub body: BlockStatement,
}

/// A labeled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    /// The label identifier
    pub label: Identifier,
    /// The labeled body
    pub body: Box<Statement>,
    /// Source position
    pub span: Span,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(Identifier),
    /// this keyword
    This,
    /// Array literal
    Array(ArrayExpression),
    /// Object literal
    Object(ObjectExpression),
    /// Binary expression
    Binary(BinaryExpression),
    /// Logical expression (&&, ||, ??)
    Logical(LogicalExpression),
    /// Unary expression
    Unary(UnaryExpression),
    /// Assignment expression
    Assignment(AssignmentExpression),
    /// Call expression
    Call(CallExpression),
    /// Member access expression
    Member(MemberExpression),
    /// Conditional (ternary) expression
    Conditional(ConditionalExpression),
    /// Function or arrow expression
    Function(Function),
    /// Class expression
    Class(Box<Class>),
    /// new expression
    New(CallExpression),
    /// Update expression (++/--)
    Update(UpdateExpression),
    /// Sequence expression (comma operator)
    Sequence(Vec<Expression>),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null literal
    Null,
    /// undefined literal
    Undefined,
    /// BigInt literal, decimal or 0x/0o/0b digits without the `n` suffix
    BigInt(String),
    /// Regular expression literal
    RegExp {
        /// The pattern source
        pattern: String,
        /// The flags
        flags: String,
    },
}

/// An array expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpression {
    /// The elements (None represents a hole)
    pub elements: Vec<Option<Expression>>,
}

/// An object expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectExpression {
    /// The properties
    pub properties: Vec<Property>,
}

/// An object property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// The property key
    pub key: PropertyKey,
    /// The property value
    pub value: Expression,
}

/// A property key.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    /// Identifier or string key
    Named(String),
    /// Computed key
    Computed(Box<Expression>),
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Exponent,
    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    // Bitwise
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    // Other
    In,
    InstanceOf,
}

/// A short-circuiting expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpression {
    /// The operator
    pub operator: LogicalOperator,
    /// The left operand
    pub left: Box<Expression>,
    /// The right operand
    pub right: Box<Expression>,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    NullishCoalescing,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// The left-hand side
    pub left: Box<Expression>,
    /// The right-hand side
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum AssignmentOperator {
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    ExponentAssign,
    LeftShiftAssign,
    RightShiftAssign,
    UnsignedRightShiftAssign,
    BitwiseAndAssign,
    BitwiseOrAssign,
    BitwiseXorAssign,
}

impl AssignmentOperator {
    /// Returns the binary operator a compound assignment applies.
    pub fn binary_operator(self) -> Option<BinaryOperator> {
        Some(match self {
            AssignmentOperator::Assign => return None,
            AssignmentOperator::AddAssign => BinaryOperator::Add,
            AssignmentOperator::SubtractAssign => BinaryOperator::Subtract,
            AssignmentOperator::MultiplyAssign => BinaryOperator::Multiply,
            AssignmentOperator::DivideAssign => BinaryOperator::Divide,
            AssignmentOperator::ModuloAssign => BinaryOperator::Modulo,
            AssignmentOperator::ExponentAssign => BinaryOperator::Exponent,
            AssignmentOperator::LeftShiftAssign => BinaryOperator::LeftShift,
            AssignmentOperator::RightShiftAssign => BinaryOperator::RightShift,
            AssignmentOperator::UnsignedRightShiftAssign => BinaryOperator::UnsignedRightShift,
            AssignmentOperator::BitwiseAndAssign => BinaryOperator::BitwiseAnd,
            AssignmentOperator::BitwiseOrAssign => BinaryOperator::BitwiseOr,
            AssignmentOperator::BitwiseXorAssign => BinaryOperator::BitwiseXor,
        })
    }
}

/// A call or new expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The function being called
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
    /// Source position
    pub span: Span,
}

/// A member access expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

/// Member property.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// Dotted property name
    Identifier(String),
    /// Computed property expression
    Expression(Box<Expression>),
}

/// A conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    /// The condition
    pub test: Box<Expression>,
    /// The consequent (if true)
    pub consequent: Box<Expression>,
    /// The alternate (if false)
    pub alternate: Box<Expression>,
}

/// An update expression (++/--)
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// The operand
    pub argument: Box<Expression>,
    /// Whether prefix (++x) or postfix (x++)
    pub prefix: bool,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}
