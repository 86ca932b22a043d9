// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The closure compiler.
//!
//! A block body is lowered once into a shared template. Each calling convention gets its own
//! entry: the one matching how the closure was written is built up front, and the other is
//! deferred until a runtime conversion (`lambda(&blk)`, `&`-passing a lambda) first asks for it.
//! Every entry owns an independent copy of the body so rewriting `return`s for one convention
//! never leaks into the other.

use std::sync::Arc;

use garnet_common::{CompileError, InternalError};
use garnet_ir::visit::{invalidate_module_body_returns, retarget_invalid_returns};
use garnet_ir::{
    BreakId, CallTargets, CallingConvention, ClosureDefinition, ClosureKind, FrameLayout,
    FrameRef, LazyEntry, Node, ReturnId, RootNode, ScopeKind, Slot, Symbol,
};
use garnet_syntax::{BlockLiteral, Target};
use tracing::debug;

use crate::arguments::{LoaderMode, LoweredDefaults};
use crate::env::Environment;
use crate::lower::{ControlState, Lowerer};
use crate::parameters::{BoundParam, ParameterNames, arity_of, descriptors_of};
use crate::session::LowerSession;

/// Everything needed to build one entry after lowering has finished.
#[derive(Clone)]
struct EntryTemplate {
    return_id: ReturnId,
    break_id: BreakId,
    body: Arc<Node>,
}

struct LoweredBlock {
    lambda_prelude: Node,
    proc_prelude: Option<Node>,
    body: Arc<Node>,
    frame: Arc<FrameLayout>,
}

impl EntryTemplate {
    fn root(&self, convention: CallingConvention, prelude: Node, body: Arc<Node>) -> RootNode {
        RootNode {
            convention,
            return_id: self.return_id.clone(),
            break_id: self.break_id.clone(),
            prelude,
            body,
        }
    }

    /// Run as a lambda, a proc-only invalid `return` returns from the lambda itself.
    fn lambda_root(&self, mut prelude: Node) -> RootNode {
        let mut body = Node::clone(&self.body);
        retarget_invalid_returns(&mut prelude, &self.return_id);
        retarget_invalid_returns(&mut body, &self.return_id);
        self.root(CallingConvention::Lambda, prelude, Arc::new(body))
    }

    fn proc_root(&self, mut prelude: Node) -> RootNode {
        let mut body = Node::clone(&self.body);
        invalidate_module_body_returns(&mut prelude);
        invalidate_module_body_returns(&mut body);
        self.root(CallingConvention::Proc, prelude, Arc::new(body))
    }
}

impl Lowerer<'_> {
    /// Compiles a block or lambda literal in a new scope below the current one.
    ///
    /// `call_name` is the method the block was passed to, `marker` the caller slot that flags
    /// the call site as live. A `for` loop passes its index target; the body then shares the
    /// enclosing scope's variables and starts by assigning the iterated value to the target.
    pub(crate) fn lower_block(
        &mut self,
        literal: &BlockLiteral,
        kind: ClosureKind,
        call_name: Option<&str>,
        marker: Option<Slot>,
        for_index: Option<&Target>,
    ) -> Result<Arc<ClosureDefinition>, CompileError> {
        let (scope_kind, return_id) = match kind {
            ClosureKind::StabbyLambda => (ScopeKind::Lambda, self.session.control_ids.return_id()),
            ClosureKind::Proc | ClosureKind::LambdaCall => {
                (ScopeKind::Block, self.env.current().return_id.clone())
            }
        };
        let method_name = self.env.current().method_name.clone();
        let break_id = self.session.control_ids.break_id();
        self.env.enter(scope_kind, return_id.clone(), method_name.clone());
        {
            let scope = self.env.current_mut();
            scope.break_id = Some(break_id.clone());
            scope.block_call_name = call_name.map(str::to_string);
            scope.own_scope_for_assignments = for_index.is_none();
        }
        let saved_control = std::mem::replace(
            &mut self.control,
            ControlState {
                in_closure: true,
                ..ControlState::default()
            },
        );

        let lowered = self.lower_block_contents(literal, kind, for_index);
        let left = self.env.leave();
        self.control = saved_control;
        let LoweredBlock {
            lambda_prelude,
            proc_prelude,
            body,
            frame,
        } = lowered?;
        left?;

        let template = EntryTemplate {
            return_id: return_id.clone(),
            break_id: break_id.clone(),
            body,
        };
        let targets = match (kind, proc_prelude) {
            (ClosureKind::Proc, Some(proc_prelude)) => {
                let eager = template.root(
                    CallingConvention::Proc,
                    proc_prelude,
                    template.body.clone(),
                );
                let deferred = template.clone();
                CallTargets {
                    proc_entry: LazyEntry::built(eager),
                    lambda_entry: LazyEntry::deferred(Box::new(move || {
                        deferred.lambda_root(lambda_prelude.clone())
                    })),
                }
            }
            (ClosureKind::LambdaCall, Some(proc_prelude)) => {
                let deferred = template.clone();
                CallTargets {
                    proc_entry: LazyEntry::deferred(Box::new(move || {
                        deferred.proc_root(proc_prelude.clone())
                    })),
                    lambda_entry: LazyEntry::built(template.lambda_root(lambda_prelude)),
                }
            }
            _ => CallTargets {
                proc_entry: LazyEntry::unavailable(),
                lambda_entry: LazyEntry::built(template.root(
                    CallingConvention::Lambda,
                    lambda_prelude,
                    template.body.clone(),
                )),
            },
        };

        debug!(%kind, method = %method_name, width = frame.width(), "lowered closure");
        Ok(Arc::new(ClosureDefinition {
            kind,
            name: method_name,
            frame,
            arity: arity_of(literal.parameters.as_ref()),
            parameters: descriptors_of(literal.parameters.as_ref()),
            return_id,
            break_id,
            frame_on_stack_marker: marker,
            targets,
        }))
    }

    fn lower_block_contents(
        &mut self,
        literal: &BlockLiteral,
        kind: ClosureKind,
        for_index: Option<&Target>,
    ) -> Result<LoweredBlock, CompileError> {
        self.declare_locals(&literal.locals)?;
        let params = literal.parameters.as_ref();
        let names = params
            .map(ParameterNames::new)
            .unwrap_or_else(ParameterNames::empty);
        let mut defaults = LoweredDefaults::default();
        let lambda_prelude =
            self.load_arguments(params, &names, &mut defaults, LoaderMode::Lambda)?;
        let proc_prelude = match kind {
            ClosureKind::StabbyLambda => None,
            ClosureKind::Proc | ClosureKind::LambdaCall => {
                Some(self.load_arguments(params, &names, &mut defaults, LoaderMode::Proc)?)
            }
        };

        let mut body = vec![];
        if let Some(target) = for_index {
            let index = self.for_index_parameter(&names)?;
            body.push(self.assign_target(target, Node::read(index))?);
        }
        body.push(self.lower_body(literal.body.as_deref())?);
        Ok(LoweredBlock {
            lambda_prelude,
            proc_prelude,
            body: Arc::new(Node::sequence(body)),
            frame: self.env.compute_frame_layout()?,
        })
    }

    /// The hidden parameter a `for` loop's block receives each element in.
    fn for_index_parameter(&mut self, names: &ParameterNames) -> Result<FrameRef, CompileError> {
        match names.requireds.first() {
            Some(BoundParam::Named(name)) => Ok(FrameRef::local(self.env.declare_var(name)?)),
            _ => Err(InternalError::MissingSlot {
                name: "for loop index".to_string(),
            }
            .into()),
        }
    }
}

/// Compiles a block or lambda literal outside any enclosing script, as though written at the
/// top level after `captured` locals were assigned.
pub fn lower_closure(
    session: &mut LowerSession,
    literal: &BlockLiteral,
    kind: ClosureKind,
    captured: &[&str],
) -> Result<Arc<ClosureDefinition>, CompileError> {
    let return_id = session.control_ids.return_id();
    let env = Environment::new(ScopeKind::TopLevel, return_id, Symbol::new("<main>"));
    let mut lowerer = Lowerer::new(session, env);
    for name in captured {
        lowerer.env.declare_var(name)?;
    }
    lowerer.lower_block(literal, kind, None, None, None)
}
