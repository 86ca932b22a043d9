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

//! The recursive driver: statements, expressions and units.
//!
//! A `Lowerer` owns the scope chain for one compilation and borrows the session. Each surface
//! construct is handled by one arm of `lower_node`; the larger families live in submodules, and
//! the argument loader, closure compiler, super reloader and pattern matcher extend `Lowerer`
//! from their own modules.

mod assign;
mod calls;
mod control;
mod defs;
mod expr;

pub(crate) use calls::BlockSite;

use std::sync::Arc;

use garnet_common::{CompileContext, CompileError, InternalError, WarningKind};
use garnet_ir::{
    BreakId, CompiledUnit, DeferredWarnings, FrameLayout, FrameRef, Node, ReturnId, SELF_SLOT,
    ScopeKind, Symbol, UnitKind,
};
use garnet_syntax::{DefNode, NodeKind, Span, SyntaxNode};
use tracing::debug;

use crate::arguments::{LoaderMode, LoweredDefaults};
use crate::env::Environment;
use crate::parameters::{ParameterNames, arity_of, descriptors_of};
use crate::session::LowerSession;

/// What `break`, `next`, `redo` and `retry` may currently target.
#[derive(Debug, Clone, Default)]
pub(crate) struct ControlState {
    /// The innermost `while` loop's break target, while lowering its condition or body.
    pub while_break: Option<BreakId>,
    /// Directly inside a block or lambda body (possibly inside loops within it).
    pub in_closure: bool,
    pub in_rescue: bool,
}

pub struct Lowerer<'s> {
    pub(crate) session: &'s mut LowerSession,
    pub(crate) env: Environment,
    pub(crate) control: ControlState,
}

pub(crate) fn context(span: Span) -> CompileContext {
    CompileContext::new(span)
}

impl<'s> Lowerer<'s> {
    pub(crate) fn new(session: &'s mut LowerSession, env: Environment) -> Self {
        Self {
            session,
            env,
            control: ControlState::default(),
        }
    }

    /// A fresh hidden slot in the current scope.
    pub(crate) fn temp(&mut self, category: &str) -> Result<FrameRef, CompileError> {
        let slot = self.env.declare_local_temp(self.session, category)?;
        Ok(FrameRef::local(slot))
    }

    pub(crate) fn declare_locals(&mut self, locals: &[String]) -> Result<(), CompileError> {
        for local in locals {
            self.env.declare_var(local)?;
        }
        Ok(())
    }

    pub(crate) fn lower_optional(
        &mut self,
        node: Option<&SyntaxNode>,
    ) -> Result<Node, CompileError> {
        match node {
            Some(node) => self.lower_node(node),
            None => Ok(Node::nil()),
        }
    }

    /// A statement list. Cancellation is checked before each statement.
    pub(crate) fn lower_statements(
        &mut self,
        statements: &[SyntaxNode],
    ) -> Result<Node, CompileError> {
        let mut nodes = Vec::with_capacity(statements.len());
        let last = statements.len().saturating_sub(1);
        for (index, statement) in statements.iter().enumerate() {
            self.session.check_cancelled()?;
            if index != last && statement.is_static_literal() {
                self.warn_literal(
                    WarningKind::UselessLiteralInVoidContext,
                    statement.span,
                    "possibly useless use of a literal in void context",
                );
            }
            nodes.push(self.lower_statement(statement)?);
        }
        Ok(Node::sequence(nodes))
    }

    /// One statement, tagged with its line when it starts one.
    pub(crate) fn lower_statement(&mut self, statement: &SyntaxNode) -> Result<Node, CompileError> {
        let node = self.lower_node(statement)?;
        if statement.newline {
            return Ok(Node::Line {
                line: statement.span.line,
                body: Box::new(node),
            });
        }
        Ok(node)
    }

    /// A unit or closure body: a statement list or a single node, as a statement.
    pub(crate) fn lower_body(&mut self, body: Option<&SyntaxNode>) -> Result<Node, CompileError> {
        match body {
            Some(SyntaxNode {
                kind: NodeKind::Statements(statements),
                ..
            }) => self.lower_statements(statements),
            Some(node) => {
                self.session.check_cancelled()?;
                self.lower_statement(node)
            }
            None => Ok(Node::nil()),
        }
    }

    pub(crate) fn warn_literal(&mut self, kind: WarningKind, span: Span, message: &str) {
        if self.session.options.warn_useless_literals {
            self.session.warn(kind, span, message);
        }
    }

    /// Prelude, then body; units with flip-flops first reset their states.
    pub(crate) fn compose_body(&self, prelude: Node, body: Node) -> Node {
        let states = &self.env.current().flip_flop_states;
        let mut nodes = vec![];
        if !states.is_empty() {
            nodes.push(Node::InitFlipFlopStates(states.clone()));
        }
        nodes.push(prelude);
        nodes.push(body);
        Node::sequence(nodes)
    }

    /// A method body as its own unit, in a new scope below the current one.
    pub(crate) fn lower_method_unit(
        &mut self,
        def: &DefNode,
    ) -> Result<CompiledUnit, CompileError> {
        let return_id = self.session.control_ids.return_id();
        self.env
            .enter(ScopeKind::Method, return_id.clone(), Symbol::new(&def.name));
        let saved_control = std::mem::take(&mut self.control);
        let outer_warnings = self.session.begin_unit_warnings();

        let lowered = self.lower_method_contents(def);
        let left = self.env.leave();
        self.control = saved_control;
        let warnings = self.session.end_unit_warnings(outer_warnings);
        let (body, frame) = lowered?;
        left?;

        debug!(name = def.name, width = frame.width(), "lowered method");
        let parameters = def.parameters.as_ref();
        Ok(CompiledUnit {
            kind: UnitKind::Method,
            name: Symbol::new(&def.name),
            frame,
            arity: arity_of(parameters),
            parameters: descriptors_of(parameters),
            return_id,
            body,
            warnings: DeferredWarnings::new(warnings),
        })
    }

    fn lower_method_contents(
        &mut self,
        def: &DefNode,
    ) -> Result<(Node, Arc<FrameLayout>), CompileError> {
        self.declare_locals(&def.locals)?;
        let parameters = def.parameters.as_ref();
        let names = Arc::new(
            parameters
                .map(ParameterNames::new)
                .unwrap_or_else(ParameterNames::empty),
        );
        self.env.current_mut().parameters = Some(names.clone());
        let mut defaults = LoweredDefaults::default();
        let prelude = self.load_arguments(parameters, &names, &mut defaults, LoaderMode::Method)?;
        let body = self.lower_body(def.body.as_deref())?;
        let body = self.compose_body(prelude, body);
        Ok((body, self.env.compute_frame_layout()?))
    }

    /// A class, module or singleton class body, run with the module as receiver.
    pub(crate) fn lower_module_unit(
        &mut self,
        name: &str,
        body: Option<&SyntaxNode>,
        locals: &[String],
        dynamic_constant_lookup: bool,
    ) -> Result<CompiledUnit, CompileError> {
        self.env
            .enter(ScopeKind::ModuleBody, ReturnId::MODULE_BODY, Symbol::new(name));
        if dynamic_constant_lookup {
            self.env.set_dynamic_constant_lookup();
            if self.session.options.log_dynamic_constant_lookup {
                tracing::info!(module = name, "module body uses dynamic constant lookup");
            }
        }
        let saved_control = std::mem::take(&mut self.control);
        let outer_warnings = self.session.begin_unit_warnings();

        let lowered = self.lower_module_contents(body, locals);
        let left = self.env.leave();
        self.control = saved_control;
        let warnings = self.session.end_unit_warnings(outer_warnings);
        let (body, frame) = lowered?;
        left?;

        debug!(module = name, width = frame.width(), "lowered module body");
        Ok(CompiledUnit {
            kind: UnitKind::ModuleBody,
            name: Symbol::new(name),
            frame,
            arity: garnet_ir::Arity::no_arguments(),
            parameters: vec![],
            return_id: ReturnId::MODULE_BODY,
            body,
            warnings: DeferredWarnings::new(warnings),
        })
    }

    fn lower_module_contents(
        &mut self,
        body: Option<&SyntaxNode>,
        locals: &[String],
    ) -> Result<(Node, Arc<FrameLayout>), CompileError> {
        self.declare_locals(locals)?;
        let prelude = Node::write(FrameRef::local(SELF_SLOT), Node::ReadReceiver);
        let body = self.lower_body(body)?;
        let body = self.compose_body(prelude, body);
        Ok((body, self.env.compute_frame_layout()?))
    }

    pub(crate) fn unhandled(&self, node: &SyntaxNode) -> CompileError {
        tracing::error!(kind = node.kind_name(), line = node.span.line, "unhandled node");
        InternalError::UnhandledNode {
            kind: node.kind_name().to_string(),
        }
        .into()
    }
}

/// Lowers a whole script. `argument_names` become top-level locals bound, in order, from the
/// positional arguments the evaluator runs the unit with.
pub fn lower_top_level(
    session: &mut LowerSession,
    tree: &SyntaxNode,
    argument_names: &[&str],
) -> Result<CompiledUnit, CompileError> {
    let return_id = session.control_ids.return_id();
    let env = Environment::new(ScopeKind::TopLevel, return_id.clone(), Symbol::new("<main>"));
    let mut lowerer = Lowerer::new(session, env);
    let outer_warnings = lowerer.session.begin_unit_warnings();
    let lowered = lower_script(&mut lowerer, tree, argument_names);
    let warnings = lowerer.session.end_unit_warnings(outer_warnings);
    let (body, frame) = lowered?;
    debug!(width = frame.width(), "lowered top level");
    Ok(CompiledUnit {
        kind: UnitKind::TopLevel,
        name: Symbol::new("<main>"),
        frame,
        arity: garnet_ir::Arity::no_arguments(),
        parameters: vec![],
        return_id,
        body,
        warnings: DeferredWarnings::new(warnings),
    })
}

fn lower_script(
    lowerer: &mut Lowerer<'_>,
    tree: &SyntaxNode,
    argument_names: &[&str],
) -> Result<(Node, Arc<FrameLayout>), CompileError> {
    let mut prelude = vec![Node::write(FrameRef::local(SELF_SLOT), Node::ReadReceiver)];
    for (index, name) in argument_names.iter().enumerate() {
        let slot = lowerer.env.declare_var(name)?;
        prelude.push(Node::write(
            FrameRef::local(slot),
            Node::ReadPreArgument {
                source: garnet_ir::ArgumentSource::Arguments,
                index,
                missing: garnet_ir::MissingArgument::Nil,
            },
        ));
    }
    let body = lowerer.lower_body(Some(tree))?;
    let body = lowerer.compose_body(Node::sequence(prelude), body);
    Ok((body, lowerer.env.compute_frame_layout()?))
}

/// Lowers one method definition on its own, outside any enclosing script.
pub fn lower_method_body(
    session: &mut LowerSession,
    def: &DefNode,
) -> Result<CompiledUnit, CompileError> {
    let return_id = session.control_ids.return_id();
    let env = Environment::new(ScopeKind::TopLevel, return_id, Symbol::new("<main>"));
    let mut lowerer = Lowerer::new(session, env);
    lowerer.lower_method_unit(def)
}
