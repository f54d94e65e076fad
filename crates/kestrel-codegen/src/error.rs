// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for code generation.
//!
//! Three kinds of failure exist. Source diagnostics are caused by the input
//! program and abort the function being lowered. Resource limits are
//! reported the same way but signal that the target VM cannot represent the
//! function. Internal errors are compiler bugs and abort the whole session.

use kestrel_macros::int_enum;
use thiserror::Error;

use crate::ast::{NodeId, Span};
use crate::bytecode::{FunctionId, Label, VReg};

int_enum! {
    /// Numeric diagnostic codes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum DiagnosticCode: u32 {
        /// `continue` outside any loop
        ContinueOutsideIteration = 1104,
        /// `break` outside any loop or switch
        BreakOutsideIterationOrSwitch = 1105,
        /// A jump that would leave the current function
        JumpAcrossFunctionBoundary = 1107,
        /// `return` at the top level of a script or module
        ReturnOutsideFunction = 1108,
        /// Second `default` in one switch
        DuplicateDefaultClause = 1113,
        /// A label reused by a nested labeled statement
        DuplicateLabel = 1114,
        /// `continue L` where `L` labels a non-loop
        ContinueTargetNotIteration = 1115,
        /// `break L` where no enclosing statement is labeled `L`
        BreakTargetNotFound = 1116,
        /// Conflicting declarations of one name in one scope
        DuplicateIdentifier = 2300,
        /// Assignment to something that is not a variable or property
        InvalidAssignmentTarget = 2364,
        /// A function declaration as the body of `if`, a loop or a label
        FunctionDeclarationNotInBlock = 19000,
        /// Register file exceeds the VM limit
        TooManyRegisters = 30001,
        /// Lexical environment exceeds the VM limit
        TooManyLexicalSlots = 30002,
    }
}

impl DiagnosticCode {
    /// Message template; `{N}` is replaced by the N-th argument.
    pub fn template(self) -> &'static str {
        match self {
            DiagnosticCode::ContinueOutsideIteration => {
                "A 'continue' statement can only be used within an enclosing iteration statement."
            }
            DiagnosticCode::BreakOutsideIterationOrSwitch => {
                "A 'break' statement can only be used within an enclosing iteration or switch statement."
            }
            DiagnosticCode::JumpAcrossFunctionBoundary => "Jump target cannot cross function boundary.",
            DiagnosticCode::ReturnOutsideFunction => {
                "A 'return' statement can only be used within a function body."
            }
            DiagnosticCode::DuplicateDefaultClause => {
                "A 'default' clause cannot appear more than once in a 'switch' statement."
            }
            DiagnosticCode::DuplicateLabel => "Duplicate label '{0}'.",
            DiagnosticCode::ContinueTargetNotIteration => {
                "A 'continue' statement can only jump to a label of an enclosing iteration statement."
            }
            DiagnosticCode::BreakTargetNotFound => {
                "A 'break' statement can only jump to a label of an enclosing statement."
            }
            DiagnosticCode::DuplicateIdentifier => "Duplicate identifier '{0}'.",
            DiagnosticCode::InvalidAssignmentTarget => {
                "The left-hand side of an assignment expression must be a variable or a property access."
            }
            DiagnosticCode::FunctionDeclarationNotInBlock => {
                "In strict mode code, functions can only be declared at top level or inside a block."
            }
            DiagnosticCode::TooManyRegisters => "Function needs {0} registers but at most {1} are available.",
            DiagnosticCode::TooManyLexicalSlots => {
                "Lexical environment needs {0} slots but at most {1} are available."
            }
        }
    }

    /// Whether this code reports a VM resource limit.
    pub fn is_resource_limit(self) -> bool {
        matches!(
            self,
            DiagnosticCode::TooManyRegisters | DiagnosticCode::TooManyLexicalSlots
        )
    }
}

/// A user-facing diagnostic: position, code and message arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the problem was found
    pub span: Span,
    /// What went wrong
    pub code: DiagnosticCode,
    /// Substitutions for the message template
    pub args: Vec<String>,
    /// Name of the function being compiled, filled in by the driver
    pub function: Option<String>,
}

impl Diagnostic {
    /// Creates a diagnostic without a function attribution.
    pub fn new(code: DiagnosticCode, span: Span, args: Vec<String>) -> Self {
        Self {
            span,
            code,
            args,
            function: None,
        }
    }

    /// Attributes the diagnostic to a function unless already attributed.
    pub fn in_function(mut self, name: &str) -> Self {
        if self.function.is_none() {
            self.function = Some(name.to_string());
        }
        self
    }

    /// Renders the message with its arguments substituted.
    pub fn message(&self) -> String {
        let mut message = self.code.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error[{}] at {}", self.code as u32, self.span)?;
        if let Some(function) = &self.function {
            write!(f, " in `{}`", function)?;
        }
        write!(f, ": {}", self.message())
    }
}

/// Compiler invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    /// A label was created but never placed
    #[error("label {label} was never placed")]
    UnplacedLabel {
        /// The label
        label: Label,
    },
    /// A label was placed a second time
    #[error("label {label} placed twice")]
    LabelPlacedTwice {
        /// The label
        label: Label,
    },
    /// A label handle from another function
    #[error("label {label} does not belong to this function")]
    UnknownLabel {
        /// The label
        label: Label,
    },
    /// Operands do not match the opcode's declared format
    #[error("`{opcode}` expects operands [{expected}], got [{found}]")]
    OperandMismatch {
        /// Mnemonic of the opcode
        opcode: &'static str,
        /// The declared format
        expected: String,
        /// The operands supplied
        found: String,
    },
    /// A register released that was not checked out
    #[error("register {reg} released while not checked out")]
    ReleaseUnallocated {
        /// The register
        reg: VReg,
    },
    /// Temporaries still checked out when the function was finalized
    #[error("{live} temporary registers still checked out at finalize")]
    TempLeak {
        /// Number of live temporaries
        live: usize,
    },
    /// Declared register count disagrees with the allocator
    #[error("declared register count {declared} differs from high-water mark {high_water}")]
    RegisterCountMismatch {
        /// The count written to the function record
        declared: u32,
        /// The allocator's high-water mark
        high_water: u32,
    },
    /// A scoped node without an analyzed scope
    #[error("no scope recorded for node {node}")]
    MissingScope {
        /// The node
        node: NodeId,
    },
    /// A register-stored binding read before its scope was entered
    #[error("variable `{name}` has no register in this function")]
    UnallocatedVariable {
        /// The binding's name
        name: String,
    },
    /// A function id with no pending or compiled function
    #[error("function {id} is unknown to this session")]
    UnknownFunction {
        /// The id
        id: FunctionId,
    },
    /// Instruction patch outside the emitted stream
    #[error("cannot patch instruction {index}: stream has {len} instructions")]
    PatchOutOfRange {
        /// The index
        index: usize,
        /// Stream length
        len: usize,
    },
    /// More environment pops than pushes
    #[error("lexical environment depth underflow")]
    EnvironmentUnderflow,
    /// A control-flow context stack was left unbalanced
    #[error("unbalanced {what} stack")]
    UnbalancedContext {
        /// Which stack
        what: &'static str,
    },
}

/// Errors produced while compiling one function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A source diagnostic
    #[error("{0}")]
    Diagnostic(Diagnostic),
    /// A VM resource limit was exceeded
    #[error("{0}")]
    ResourceLimit(Diagnostic),
    /// A compiler bug
    #[error("internal compiler error: {0}")]
    Internal(#[from] InternalError),
}

impl CompileError {
    /// Returns the diagnostic, if this is not an internal error.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CompileError::Diagnostic(d) | CompileError::ResourceLimit(d) => Some(d),
            CompileError::Internal(_) => None,
        }
    }

    /// Returns the diagnostic code, if this is not an internal error.
    pub fn code(&self) -> Option<DiagnosticCode> {
        self.diagnostic().map(|d| d.code)
    }

    /// Attributes a diagnostic to a function.
    pub fn in_function(self, name: &str) -> Self {
        match self {
            CompileError::Diagnostic(d) => CompileError::Diagnostic(d.in_function(name)),
            CompileError::ResourceLimit(d) => CompileError::ResourceLimit(d.in_function(name)),
            internal => internal,
        }
    }
}

impl From<Diagnostic> for CompileError {
    fn from(diagnostic: Diagnostic) -> Self {
        if diagnostic.code.is_resource_limit() {
            CompileError::ResourceLimit(diagnostic)
        } else {
            CompileError::Diagnostic(diagnostic)
        }
    }
}

/// Result type for per-function compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Why a whole compilation session failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileFailure {
    /// One or more functions were rejected; diagnostics in traversal order
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    /// A compiler bug aborted the session
    #[error("internal compiler error: {0}")]
    Internal(InternalError),
}

impl CompileFailure {
    /// Returns the diagnostics, or an empty slice for internal failures.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileFailure::Diagnostics(d) => d,
            CompileFailure::Internal(_) => &[],
        }
    }
}
