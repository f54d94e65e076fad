// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lexical scopes and variable resolution.
//!
//! The scope tree is an arena: scopes and variables are addressed by
//! [`ScopeId`] and [`VariableId`], and every scoped syntax node maps to its
//! scope through its [`NodeId`]. The tree is built once per program by
//! [`analysis::analyze`] and then shared read-only by every function
//! compilation.
//!
//! # Storage
//!
//! A binding lives in one of three places:
//!
//! - a virtual register of the function that declares it, when nothing
//!   outside that function refers to it;
//! - a slot of its scope's lexical environment, when a nested function
//!   captures it;
//! - the global object or global lexical record, for the top level of a
//!   script.
//!
//! Names that resolve to no declaration fall back to a dynamic lookup by
//! name at runtime.

pub mod analysis;

use kestrel_macros::index_newtype;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{NodeId, Span};
use crate::bytecode::FunctionId;
use crate::error::{Diagnostic, DiagnosticCode, InternalError};

pub use analysis::analyze;

index_newtype! {
    /// Handle of a scope in a [`ScopeTree`].
    pub struct ScopeId(u32) => "scope";
}

index_newtype! {
    /// Handle of a variable in a [`ScopeTree`].
    pub struct VariableId(u32) => "var";
}

/// What introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Top level of a script
    Global,
    /// Top level of a module
    Module,
    /// A function body and its parameters
    Function,
    /// A block statement
    Block,
    /// The head of a `for`, `for-in` or `for-of`
    Loop,
    /// The case block of a `switch`
    Switch,
    /// A catch clause and its parameter
    Catch,
}

impl ScopeKind {
    /// Whether `var` declarations hoist to this scope.
    pub fn is_function_like(self) -> bool {
        matches!(self, ScopeKind::Global | ScopeKind::Module | ScopeKind::Function)
    }
}

/// How a binding was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
    /// A function declaration
    Function,
    /// A class declaration
    Class,
    /// A formal parameter
    Parameter,
    /// The parameter of a catch clause
    CatchParam,
    /// The receiver of a non-arrow function
    This,
    /// The own name of a named function expression
    FunctionName,
}

impl DeclarationKind {
    /// Whether the binding has a dead zone before its declaration runs.
    pub fn is_lexical(self) -> bool {
        matches!(
            self,
            DeclarationKind::Let | DeclarationKind::Const | DeclarationKind::Class
        )
    }
}

/// Where a binding's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Not yet assigned
    Unassigned,
    /// A register of the declaring function
    Register,
    /// A slot of the declaring scope's lexical environment
    Lexical {
        /// Slot index
        slot: u32,
    },
    /// A property of the global object
    GlobalVar,
    /// An entry of the global lexical record
    GlobalLexical,
}

/// A named binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// The binding name
    pub name: String,
    /// How it was declared
    pub kind: DeclarationKind,
    /// The declaring scope
    pub scope: ScopeId,
    /// The declaration site
    pub span: Span,
    /// Where the value lives; assigned once by the storage pass
    pub storage: Storage,
    /// Referenced from a function other than the declaring one
    pub captured: bool,
    /// Assigned after its declaration
    pub mutated: bool,
}

/// A node in the scope tree.
#[derive(Debug, Clone)]
pub struct Scope {
    /// What introduced the scope
    pub kind: ScopeKind,
    /// The enclosing scope; `None` only for the root
    pub parent: Option<ScopeId>,
    /// Nested scopes in creation order
    pub children: Vec<ScopeId>,
    /// The syntax node that introduced it
    pub node: NodeId,
    /// The nearest function-like scope, possibly itself
    pub function: ScopeId,
    /// Declared variables in declaration order
    pub variables: Vec<VariableId>,
    /// Whether entering the scope creates a lexical environment
    pub needs_env: bool,
    /// Slot count of that environment
    pub env_slots: u32,
    names: FxHashMap<String, VariableId>,
    /// Names of `var`s hoisted through this scope to an outer one
    hoisted_through: FxHashSet<String>,
}

/// How an identifier reference is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Held in a register of the current function
    Register(VariableId),
    /// Held in an environment slot, `level` environments out
    Lexical {
        /// The binding
        variable: VariableId,
        /// Environments to skip from the current one
        level: u32,
        /// Slot within that environment
        slot: u32,
    },
    /// A script top-level binding
    Global {
        /// The binding
        variable: VariableId,
        /// Held in the global lexical record rather than the global object
        lexical: bool,
    },
    /// No declaration is visible; looked up by name at runtime
    Dynamic,
}

/// The arena of scopes and variables for one program.
#[derive(Debug, Clone, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    by_node: FxHashMap<NodeId, ScopeId>,
    functions: FxHashMap<NodeId, FunctionId>,
    function_names: Vec<String>,
}

impl ScopeTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root scope.
    pub fn root(&self) -> ScopeId {
        ScopeId::new(0)
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the tree has no scopes.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns a scope.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// Returns a variable.
    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = (VariableId, &Variable)> + '_ {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, v)| (VariableId::new(i), v))
    }

    /// The scope introduced by a syntax node.
    pub fn scope_of(&self, node: NodeId) -> Result<ScopeId, InternalError> {
        self.by_node
            .get(&node)
            .copied()
            .ok_or(InternalError::MissingScope { node })
    }

    /// Adds a scope under `parent`.
    pub fn new_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, node: NodeId) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        let function = match parent {
            Some(parent) if !kind.is_function_like() => self.scope(parent).function,
            _ => id,
        };
        self.scopes.push(Scope {
            kind,
            parent,
            children: Vec::new(),
            node,
            function,
            variables: Vec::new(),
            needs_env: false,
            env_slots: 0,
            names: FxHashMap::default(),
            hoisted_through: FxHashSet::default(),
        });
        if let Some(parent) = parent {
            self.scopes[parent.index()].children.push(id);
        }
        self.by_node.insert(node, id);
        id
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Assigns the next function id to a function-introducing node.
    pub fn register_function(&mut self, node: NodeId, name: impl Into<String>) -> FunctionId {
        let id = FunctionId::new(self.function_names.len());
        self.function_names.push(name.into());
        self.functions.insert(node, id);
        id
    }

    /// The function id assigned to a node.
    pub fn function_id(&self, node: NodeId) -> Result<FunctionId, InternalError> {
        self.functions
            .get(&node)
            .copied()
            .ok_or(InternalError::MissingScope { node })
    }

    /// The display name of a function.
    pub fn function_name(&self, id: FunctionId) -> &str {
        self.function_names
            .get(id.index())
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    /// Number of functions, including the top level.
    pub fn function_count(&self) -> usize {
        self.function_names.len()
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declares `name` in `scope`.
    ///
    /// `var` declarations hoist to the nearest function-like scope. A
    /// redeclaration that is compatible with the existing binding returns
    /// the existing variable.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: DeclarationKind,
        span: Span,
    ) -> Result<VariableId, Diagnostic> {
        let duplicate = || Diagnostic::new(DiagnosticCode::DuplicateIdentifier, span, vec![name.to_string()]);

        match kind {
            DeclarationKind::Var => {
                let target = self.scope(scope).function;
                let mut current = scope;
                loop {
                    if let Some(existing) = self.lookup_local(current, name) {
                        if self.conflicts_with_var(existing) {
                            return Err(duplicate());
                        }
                    }
                    if current == target {
                        break;
                    }
                    self.scopes[current.index()].hoisted_through.insert(name.to_string());
                    match self.scope(current).parent {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                match self.lookup_local(target, name) {
                    Some(existing) => Ok(existing),
                    None => Ok(self.push_variable(target, name, kind, span)),
                }
            }
            DeclarationKind::Function if self.scope(scope).kind.is_function_like() => {
                match self.lookup_local(scope, name) {
                    Some(existing) => match self.variable(existing).kind {
                        DeclarationKind::Var | DeclarationKind::Function | DeclarationKind::Parameter => {
                            self.variables[existing.index()].kind = DeclarationKind::Function;
                            Ok(existing)
                        }
                        _ => Err(duplicate()),
                    },
                    None => Ok(self.push_variable(scope, name, kind, span)),
                }
            }
            DeclarationKind::Function
            | DeclarationKind::Let
            | DeclarationKind::Const
            | DeclarationKind::Class
            | DeclarationKind::Parameter => {
                if self.lookup_local(scope, name).is_some()
                    || self.scope(scope).hoisted_through.contains(name)
                {
                    return Err(duplicate());
                }
                Ok(self.push_variable(scope, name, kind, span))
            }
            DeclarationKind::CatchParam | DeclarationKind::This | DeclarationKind::FunctionName => {
                match self.lookup_local(scope, name) {
                    Some(existing) => Ok(existing),
                    None => Ok(self.push_variable(scope, name, kind, span)),
                }
            }
        }
    }

    fn conflicts_with_var(&self, existing: VariableId) -> bool {
        let variable = self.variable(existing);
        match variable.kind {
            DeclarationKind::Let | DeclarationKind::Const | DeclarationKind::Class => true,
            DeclarationKind::Function => !self.scope(variable.scope).kind.is_function_like(),
            _ => false,
        }
    }

    fn push_variable(&mut self, scope: ScopeId, name: &str, kind: DeclarationKind, span: Span) -> VariableId {
        let id = VariableId::new(self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            kind,
            scope,
            span,
            storage: Storage::Unassigned,
            captured: false,
            mutated: false,
        });
        let scope = &mut self.scopes[scope.index()];
        scope.variables.push(id);
        scope.names.insert(name.to_string(), id);
        id
    }

    /// Finds `name` declared directly in `scope`.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Finds the declaration `name` refers to from `from`.
    pub fn lookup(&self, name: &str, from: ScopeId) -> Option<VariableId> {
        let mut current = Some(from);
        while let Some(scope) = current {
            if let Some(id) = self.lookup_local(scope, name) {
                return Some(id);
            }
            current = self.scope(scope).parent;
        }
        None
    }

    /// Resolves a reference to `name` made from `from`.
    pub fn resolve(&self, name: &str, from: ScopeId) -> Resolution {
        let Some(id) = self.lookup(name, from) else {
            return Resolution::Dynamic;
        };
        let variable = self.variable(id);
        match variable.storage {
            Storage::Lexical { slot } => Resolution::Lexical {
                variable: id,
                level: self.env_distance(from, variable.scope),
                slot,
            },
            Storage::GlobalVar => Resolution::Global {
                variable: id,
                lexical: false,
            },
            Storage::GlobalLexical => Resolution::Global {
                variable: id,
                lexical: true,
            },
            Storage::Register | Storage::Unassigned => Resolution::Register(id),
        }
    }

    /// Number of environment-bearing scopes from `from` (inclusive) up to
    /// `to` (exclusive).
    pub fn env_distance(&self, from: ScopeId, to: ScopeId) -> u32 {
        let mut level = 0;
        let mut current = Some(from);
        while let Some(scope) = current {
            if scope == to {
                break;
            }
            if self.scope(scope).needs_env {
                level += 1;
            }
            current = self.scope(scope).parent;
        }
        level
    }

    /// Whether `scope` lies in a different function than `other`.
    pub fn crosses_function(&self, scope: ScopeId, other: ScopeId) -> bool {
        self.scope(scope).function != self.scope(other).function
    }

    // ========================================================================
    // Analysis results
    // ========================================================================

    /// Records a reference to `id` from `from`.
    pub fn record_reference(&mut self, id: VariableId, from: ScopeId, write: bool) {
        let declaring = self.variable(id).scope;
        if write {
            self.variables[id.index()].mutated = true;
        }
        if self.crosses_function(from, declaring) {
            self.variables[id.index()].captured = true;
            if self.scope(declaring).kind != ScopeKind::Global {
                self.scopes[declaring.index()].needs_env = true;
            }
        }
    }

    /// Assigns storage to every variable.
    ///
    /// Captured bindings take environment slots in declaration order;
    /// script top-level bindings go to the global object, or to the global
    /// lexical record for lexical declarations when `global_lexical` is set.
    pub fn assign_storage(&mut self, global_lexical: bool) {
        for index in 0..self.variables.len() {
            let (scope, kind, captured) = {
                let v = &self.variables[index];
                (v.scope, v.kind, v.captured)
            };
            let storage = if self.scope(scope).kind == ScopeKind::Global {
                if kind.is_lexical() && global_lexical {
                    Storage::GlobalLexical
                } else {
                    Storage::GlobalVar
                }
            } else if captured {
                let scope = &mut self.scopes[scope.index()];
                let slot = scope.env_slots;
                scope.env_slots += 1;
                scope.needs_env = true;
                Storage::Lexical { slot }
            } else {
                Storage::Register
            };
            self.variables[index].storage = storage;
        }
    }

    /// The captured variables of a scope with their slots.
    pub fn env_bindings(&self, scope: ScopeId) -> impl Iterator<Item = (VariableId, u32)> + '_ {
        self.scope(scope).variables.iter().filter_map(|&id| match self.variable(id).storage {
            Storage::Lexical { slot } => Some((id, slot)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_macros::{assert_err, assert_matches};

    fn tree_with_function() -> (ScopeTree, ScopeId, ScopeId) {
        let mut tree = ScopeTree::new();
        let root = tree.new_scope(ScopeKind::Module, None, NodeId::fresh());
        let function = tree.new_scope(ScopeKind::Function, Some(root), NodeId::fresh());
        (tree, root, function)
    }

    #[test]
    fn test_let_conflicts_in_same_scope() {
        let (mut tree, _, f) = tree_with_function();
        tree.declare(f, "x", DeclarationKind::Let, Span::default()).unwrap();
        let err = assert_err!(tree.declare(f, "x", DeclarationKind::Let, Span::new(2, 1)));
        assert_eq!(err.code, DiagnosticCode::DuplicateIdentifier);
        assert_eq!(err.args, vec!["x".to_string()]);
    }

    #[test]
    fn test_var_redeclaration_is_shared() {
        let (mut tree, _, f) = tree_with_function();
        let a = tree.declare(f, "x", DeclarationKind::Var, Span::default()).unwrap();
        let b = tree.declare(f, "x", DeclarationKind::Var, Span::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let (mut tree, _, f) = tree_with_function();
        let block = tree.new_scope(ScopeKind::Block, Some(f), NodeId::fresh());
        let x = tree.declare(block, "x", DeclarationKind::Var, Span::default()).unwrap();
        assert_eq!(tree.variable(x).scope, f);
        assert_eq!(tree.lookup("x", block), Some(x));
    }

    #[test]
    fn test_var_through_let_conflicts() {
        let (mut tree, _, f) = tree_with_function();
        let block = tree.new_scope(ScopeKind::Block, Some(f), NodeId::fresh());
        let inner = tree.new_scope(ScopeKind::Block, Some(block), NodeId::fresh());
        tree.declare(block, "x", DeclarationKind::Let, Span::default()).unwrap();
        assert!(tree.declare(inner, "x", DeclarationKind::Var, Span::default()).is_err());

        // and in the other order
        let other = tree.new_scope(ScopeKind::Block, Some(f), NodeId::fresh());
        tree.declare(other, "y", DeclarationKind::Var, Span::default()).unwrap();
        assert!(tree.declare(other, "y", DeclarationKind::Let, Span::default()).is_err());
    }

    #[test]
    fn test_var_may_share_catch_param_name() {
        let (mut tree, _, f) = tree_with_function();
        let catch = tree.new_scope(ScopeKind::Catch, Some(f), NodeId::fresh());
        let e = tree.declare(catch, "e", DeclarationKind::CatchParam, Span::default()).unwrap();
        let var = tree.declare(catch, "e", DeclarationKind::Var, Span::default()).unwrap();
        assert_ne!(e, var);
        assert_eq!(tree.lookup("e", catch), Some(e));
    }

    #[test]
    fn test_param_and_let_conflict() {
        let (mut tree, _, f) = tree_with_function();
        tree.declare(f, "a", DeclarationKind::Parameter, Span::default()).unwrap();
        assert!(tree.declare(f, "a", DeclarationKind::Let, Span::default()).is_err());
        assert!(tree.declare(f, "a", DeclarationKind::Var, Span::default()).is_ok());
    }

    #[test]
    fn test_capture_marks_env_and_distance() {
        let (mut tree, _, outer) = tree_with_function();
        let block = tree.new_scope(ScopeKind::Block, Some(outer), NodeId::fresh());
        let inner = tree.new_scope(ScopeKind::Function, Some(block), NodeId::fresh());
        let x = tree.declare(outer, "x", DeclarationKind::Let, Span::default()).unwrap();
        let y = tree.declare(block, "y", DeclarationKind::Let, Span::default()).unwrap();
        tree.record_reference(x, inner, false);
        tree.record_reference(y, inner, false);
        tree.assign_storage(true);

        assert!(tree.scope(outer).needs_env);
        assert!(tree.scope(block).needs_env);
        assert!(!tree.scope(inner).needs_env);
        assert_eq!(
            tree.resolve("x", inner),
            Resolution::Lexical {
                variable: x,
                level: 1,
                slot: 0
            }
        );
        assert_matches!(tree.resolve("y", inner), Resolution::Lexical { level: 0, .. });
    }

    #[test]
    fn test_uncaptured_binding_stays_in_register() {
        let (mut tree, _, f) = tree_with_function();
        let x = tree.declare(f, "x", DeclarationKind::Let, Span::default()).unwrap();
        tree.record_reference(x, f, true);
        tree.assign_storage(true);
        assert_eq!(tree.variable(x).storage, Storage::Register);
        assert!(tree.variable(x).mutated);
        assert!(!tree.scope(f).needs_env);
    }

    #[test]
    fn test_script_top_level_storage() {
        let mut tree = ScopeTree::new();
        let root = tree.new_scope(ScopeKind::Global, None, NodeId::fresh());
        let f = tree.new_scope(ScopeKind::Function, Some(root), NodeId::fresh());
        let v = tree.declare(root, "v", DeclarationKind::Var, Span::default()).unwrap();
        let l = tree.declare(root, "l", DeclarationKind::Let, Span::default()).unwrap();
        tree.record_reference(l, f, false);
        tree.assign_storage(true);
        assert_eq!(tree.variable(v).storage, Storage::GlobalVar);
        assert_eq!(tree.variable(l).storage, Storage::GlobalLexical);
        assert!(!tree.scope(root).needs_env);
        assert_eq!(tree.resolve("missing", f), Resolution::Dynamic);
    }

    #[test]
    fn test_missing_scope_is_internal() {
        let tree = ScopeTree::new();
        let node = NodeId::fresh();
        assert_eq!(tree.scope_of(node), Err(InternalError::MissingScope { node }));
    }
}
