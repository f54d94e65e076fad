// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Jump targets and abrupt completion.
//!
//! Two stacks describe the statements enclosing the current point: the
//! [`LabelTarget`]s that `break` and `continue` can name, and the
//! [`TryContext`]s whose `finally` blocks must run when control leaves
//! them. A jump out of a try block runs every crossed finalizer inline, in
//! innermost-first order, and carves the unwind code out of the catch
//! ranges of the tries it has already left.

use kestrel_macros::{bail, ensure};

use super::FunctionCompiler;
use crate::ast::{BlockStatement, Identifier, Span};
use crate::bytecode::{Label, VReg};
use crate::compiler::catch_table::{CatchTableId, LabelPair};
use crate::compiler::scope::ScopeId;
use crate::error::{DiagnosticCode, InternalError, Result};

/// What a jump target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TargetKind {
    /// An iteration statement; accepts `break` and `continue`
    Loop,
    /// A switch; accepts unlabeled and labeled `break`
    Switch,
    /// Any other labeled statement; accepts labeled `break` only
    Labeled,
}

/// A statement that `break` or `continue` can leave.
#[derive(Debug, Clone)]
pub(super) struct LabelTarget {
    pub kind: TargetKind,
    pub labels: Vec<String>,
    pub break_label: Label,
    pub continue_label: Option<Label>,
    /// Environment depth at the break label
    pub env_depth: u32,
    /// Environment depth at the continue label
    pub continue_env_depth: u32,
    /// Try contexts live when the target was pushed
    pub try_depth: usize,
    /// Iterator to close when a `for-of` is left early
    pub iterator: Option<VReg>,
}

/// An enclosing try statement.
#[derive(Debug, Clone)]
pub(super) struct TryContext<'a> {
    pub finalizer: Option<&'a BlockStatement>,
    pub catch_table: CatchTableId,
    /// Environment depth at the try statement
    pub env_depth: u32,
    /// Targets live when the try was pushed
    pub target_depth: usize,
    /// Scope of the try statement
    pub scope: ScopeId,
}

/// Both control stacks of one function.
#[derive(Debug, Default)]
pub(super) struct ControlStack<'a> {
    pub targets: Vec<LabelTarget>,
    pub tries: Vec<TryContext<'a>>,
}

impl ControlStack<'_> {
    /// Fails unless every pushed context has been popped.
    pub fn ensure_empty(&self) -> Result<()> {
        ensure!(
            self.targets.is_empty(),
            InternalError::UnbalancedContext { what: "label target" }
        );
        ensure!(
            self.tries.is_empty(),
            InternalError::UnbalancedContext { what: "try context" }
        );
        Ok(())
    }
}

/// Where an abrupt completion leaves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Exit {
    /// Past the end of the target at this index
    Break(usize),
    /// To the continue label of the loop at this index
    Continue(usize),
    /// Out of the function
    Return,
}

impl<'s, 'a> FunctionCompiler<'s, 'a> {
    // ========================================================================
    // Context stacks
    // ========================================================================

    /// Pushes a jump target whose labels are placed by the caller.
    pub(super) fn push_target(
        &mut self,
        kind: TargetKind,
        labels: Vec<String>,
        break_label: Label,
        continue_label: Option<Label>,
    ) {
        self.control.targets.push(LabelTarget {
            kind,
            labels,
            break_label,
            continue_label,
            env_depth: self.env_depth,
            continue_env_depth: self.env_depth,
            try_depth: self.control.tries.len(),
            iterator: None,
        });
    }

    /// Pops the innermost jump target.
    pub(super) fn pop_target(&mut self) -> Result<LabelTarget> {
        self.control
            .targets
            .pop()
            .ok_or_else(|| InternalError::UnbalancedContext { what: "label target" }.into())
    }

    /// The innermost jump target.
    pub(super) fn current_target(&mut self) -> Result<&mut LabelTarget> {
        self.control
            .targets
            .last_mut()
            .ok_or_else(|| InternalError::UnbalancedContext { what: "label target" }.into())
    }

    pub(super) fn push_try(&mut self, finalizer: Option<&'a BlockStatement>, catch_table: CatchTableId) {
        self.control.tries.push(TryContext {
            finalizer,
            catch_table,
            env_depth: self.env_depth,
            target_depth: self.control.targets.len(),
            scope: self.scope,
        });
    }

    pub(super) fn pop_try(&mut self) -> Result<TryContext<'a>> {
        self.control
            .tries
            .pop()
            .ok_or_else(|| InternalError::UnbalancedContext { what: "try context" }.into())
    }

    /// Catch-table depth of the next try statement.
    pub(super) fn next_try_depth(&self) -> u32 {
        self.control.tries.len() as u32 + 1
    }

    // ========================================================================
    // Target lookup
    // ========================================================================

    /// Finds the target of a `break`.
    pub(super) fn break_target(&self, label: Option<&Identifier>, span: Span) -> Result<usize> {
        let targets = &self.control.targets;
        match label {
            None => targets
                .iter()
                .rposition(|t| matches!(t.kind, TargetKind::Loop | TargetKind::Switch))
                .ok_or_else(|| self.diagnostic(DiagnosticCode::BreakOutsideIterationOrSwitch, span, Vec::new())),
            Some(label) => self
                .labeled_target(&label.name)
                .ok_or_else(|| self.missing_label(label, DiagnosticCode::BreakTargetNotFound)),
        }
    }

    /// Finds the target of a `continue`.
    pub(super) fn continue_target(&self, label: Option<&Identifier>, span: Span) -> Result<usize> {
        let targets = &self.control.targets;
        match label {
            None => targets
                .iter()
                .rposition(|t| t.kind == TargetKind::Loop)
                .ok_or_else(|| self.diagnostic(DiagnosticCode::ContinueOutsideIteration, span, Vec::new())),
            Some(label) => {
                let index = self
                    .labeled_target(&label.name)
                    .ok_or_else(|| self.missing_label(label, DiagnosticCode::ContinueTargetNotIteration))?;
                if targets[index].kind != TargetKind::Loop {
                    return Err(self.diagnostic(
                        DiagnosticCode::ContinueTargetNotIteration,
                        label.span,
                        Vec::new(),
                    ));
                }
                Ok(index)
            }
        }
    }

    fn labeled_target(&self, name: &str) -> Option<usize> {
        self.control
            .targets
            .iter()
            .rposition(|t| t.labels.iter().any(|l| l == name))
    }

    fn missing_label(&self, label: &Identifier, code: DiagnosticCode) -> crate::error::CompileError {
        if self.outer_labels.iter().any(|l| *l == label.name) {
            self.diagnostic(DiagnosticCode::JumpAcrossFunctionBoundary, label.span, Vec::new())
        } else {
            self.diagnostic(code, label.span, Vec::new())
        }
    }

    /// Whether leaving to `exit` has to run any code on the way out.
    pub(super) fn exit_needs_cleanup(&self, exit: Exit) -> bool {
        let (try_floor, target_floor) = self.exit_floors(exit);
        self.control.tries[try_floor..].iter().any(|t| t.finalizer.is_some())
            || self.control.targets[target_floor..].iter().any(|t| t.iterator.is_some())
    }

    /// First try index and first target index that `exit` leaves.
    fn exit_floors(&self, exit: Exit) -> (usize, usize) {
        let targets = &self.control.targets;
        match exit {
            Exit::Break(index) => (targets[index].try_depth, index),
            Exit::Continue(index) => (targets[index].try_depth, index + 1),
            Exit::Return => (0, 0),
        }
    }

    // ========================================================================
    // Unwinding
    // ========================================================================

    /// Emits everything that must run between the current point and `exit`:
    /// crossed finalizers, iterator closes and environment pops.
    ///
    /// Emits no jump; the caller jumps or returns afterwards. Every try that
    /// is left stops protecting the code from the point where it is left up
    /// to the end of the unwind sequence, so a throw from a later finalizer
    /// or iterator close never reaches a handler already exited.
    pub(super) fn unwind(&mut self, exit: Exit) -> Result<()> {
        let (try_floor, target_floor) = self.exit_floors(exit);
        let mut runtime_depth = self.env_depth;
        let mut left: Vec<(CatchTableId, Label)> = Vec::new();

        let mut next_try = self.control.tries.len();
        let mut next_target = self.control.targets.len();
        while next_try > try_floor || next_target > target_floor {
            let try_is_inner = next_try > try_floor
                && (next_target <= target_floor
                    || self.control.tries[next_try - 1].target_depth >= next_target);
            if try_is_inner {
                next_try -= 1;
                let exited = self.builder.new_label();
                self.builder.place_label(exited)?;
                left.push((self.control.tries[next_try].catch_table, exited));
                if self.control.tries[next_try].finalizer.is_some() {
                    self.inline_finally(next_try, &mut runtime_depth)?;
                }
            } else {
                next_target -= 1;
                if let Some(iterator) = self.control.targets[next_target].iterator {
                    self.builder.close_iterator(iterator)?;
                }
            }
        }

        let target_depth = match exit {
            Exit::Break(index) => Some(self.control.targets[index].env_depth),
            Exit::Continue(index) => Some(self.control.targets[index].continue_env_depth),
            Exit::Return => None,
        };
        if let Some(target_depth) = target_depth {
            self.emit_env_pops(runtime_depth, target_depth)?;
        }

        if !left.is_empty() {
            let end = self.builder.new_label();
            self.builder.place_label(end)?;
            for (table, begin) in left {
                self.builder.split_catch_range(table, LabelPair::new(begin, end));
            }
        }
        Ok(())
    }

    /// Lowers a copy of the finalizer of try `index` at the current point.
    ///
    /// The copy runs with the context stacks and scope of the try statement
    /// itself, so a jump inside it only sees what encloses the try.
    fn inline_finally(&mut self, index: usize, runtime_depth: &mut u32) -> Result<()> {
        let context = self.control.tries[index].clone();
        let Some(finalizer) = context.finalizer else {
            return Ok(());
        };

        self.emit_env_pops(*runtime_depth, context.env_depth)?;
        *runtime_depth = context.env_depth;

        let saved_tries = self.control.tries.split_off(index);
        let saved_targets = self.control.targets.split_off(context.target_depth);
        let saved_env = std::mem::replace(&mut self.env_depth, context.env_depth);
        let saved_scope = std::mem::replace(&mut self.scope, context.scope);

        let result = self.compile_block(finalizer);

        self.scope = saved_scope;
        self.env_depth = saved_env;
        self.control.targets.extend(saved_targets);
        self.control.tries.extend(saved_tries);
        result
    }

    // ========================================================================
    // Jumps
    // ========================================================================

    pub(super) fn compile_break(&mut self, label: Option<&Identifier>, span: Span) -> Result<()> {
        let index = self.break_target(label, span)?;
        self.unwind(Exit::Break(index))?;
        let target = self.control.targets[index].break_label;
        self.builder.jump(target)
    }

    pub(super) fn compile_continue(&mut self, label: Option<&Identifier>, span: Span) -> Result<()> {
        let index = self.continue_target(label, span)?;
        self.unwind(Exit::Continue(index))?;
        match self.control.targets[index].continue_label {
            Some(target) => self.builder.jump(target),
            None => bail!(InternalError::UnbalancedContext { what: "loop continue" }),
        }
    }

    /// Returns acc from the function, running crossed finalizers first.
    pub(super) fn compile_return_value(&mut self) -> Result<()> {
        if !self.exit_needs_cleanup(Exit::Return) {
            return self.builder.return_value();
        }
        let value = self.builder.acquire();
        self.builder.store(value)?;
        self.unwind(Exit::Return)?;
        self.builder.load(value)?;
        self.builder.release(&[value])?;
        self.builder.return_value()
    }
}
