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

use std::sync::Arc;

use garnet_common::CompileError;
use garnet_ir::{ClosureKind, ConstantScope, ModuleKind, Node, ScopeKind, Symbol};
use garnet_syntax::{BlockLiteral, ConstRef, DefNode, NodeKind, Span, SyntaxNode};

use super::Lowerer;

impl Lowerer<'_> {
    pub(crate) fn lower_def(&mut self, def: &DefNode) -> Result<Node, CompileError> {
        let singleton = match &def.receiver {
            Some(receiver) => Some(Box::new(self.lower_node(receiver)?)),
            None => None,
        };
        let unit = self.lower_method_unit(def)?;
        Ok(Node::MethodDefinition {
            name: Symbol::new(&def.name),
            singleton,
            unit: Arc::new(unit),
        })
    }

    /// `-> (params) { body }`
    pub(crate) fn lower_lambda(&mut self, literal: &BlockLiteral) -> Result<Node, CompileError> {
        let closure = self.lower_block(literal, ClosureKind::StabbyLambda, None, None, None)?;
        Ok(Node::Closure(closure))
    }

    /// A module opened inside a method or block can be reopened under different nestings at run
    /// time, so its constants resolve dynamically. The decision is inherited by nested bodies.
    fn module_body_is_dynamic(&self) -> bool {
        let current = self.env.current();
        current.dynamic_constant_lookup()
            || matches!(
                current.kind,
                ScopeKind::Method | ScopeKind::Block | ScopeKind::Lambda
            )
    }

    pub(crate) fn lower_class(
        &mut self,
        path: &ConstRef,
        superclass: Option<&SyntaxNode>,
        body: Option<&SyntaxNode>,
        locals: &[String],
    ) -> Result<Node, CompileError> {
        let scope = self.constant_scope(&path.scope)?;
        let superclass = match superclass {
            Some(superclass) => Some(Box::new(self.lower_node(superclass)?)),
            None => None,
        };
        let dynamic = self.module_body_is_dynamic();
        let unit = self.lower_module_unit(&path.name, body, locals, dynamic)?;
        Ok(Node::ModuleDefinition {
            kind: ModuleKind::Class { superclass },
            scope,
            name: Some(Symbol::new(&path.name)),
            body: Arc::new(unit),
        })
    }

    pub(crate) fn lower_module(
        &mut self,
        path: &ConstRef,
        body: Option<&SyntaxNode>,
        locals: &[String],
    ) -> Result<Node, CompileError> {
        let scope = self.constant_scope(&path.scope)?;
        let dynamic = self.module_body_is_dynamic();
        let unit = self.lower_module_unit(&path.name, body, locals, dynamic)?;
        Ok(Node::ModuleDefinition {
            kind: ModuleKind::Module,
            scope,
            name: Some(Symbol::new(&path.name)),
            body: Arc::new(unit),
        })
    }

    /// `class << expression`. Only `class << self` directly in a module body, or any singleton
    /// class at the top level, keeps static constant lookup.
    pub(crate) fn lower_singleton_class(
        &mut self,
        expression: &SyntaxNode,
        body: Option<&SyntaxNode>,
        locals: &[String],
    ) -> Result<Node, CompileError> {
        let of = self.lower_node(expression)?;
        let current = self.env.current();
        let static_nesting = match current.kind {
            ScopeKind::ModuleBody => matches!(expression.kind, NodeKind::SelfRef),
            ScopeKind::TopLevel => true,
            ScopeKind::Method | ScopeKind::Block | ScopeKind::Lambda => false,
        };
        let dynamic = current.dynamic_constant_lookup() || !static_nesting;
        let scope = ConstantScope::Lexical {
            dynamic: current.dynamic_constant_lookup(),
        };
        let unit = self.lower_module_unit("singleton class", body, locals, dynamic)?;
        Ok(Node::ModuleDefinition {
            kind: ModuleKind::SingletonClass { of: Box::new(of) },
            scope,
            name: None,
            body: Arc::new(unit),
        })
    }

    /// `END { ... }`: registers the block with `at_exit` the first time it is reached.
    pub(crate) fn lower_post_execution(
        &mut self,
        body: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let literal = BlockLiteral {
            parameters: None,
            body: body.map(|b| Box::new(b.clone())),
            locals: vec![],
            span,
        };
        let (block, site) = self.lower_literal_block(&literal, "at_exit")?;
        let call = self.private_call_with_block("at_exit", vec![], Some(block));
        Ok(Node::Once(Box::new(site.wrap(call))))
    }
}
