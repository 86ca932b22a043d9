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

//! `super` call lowering.
//!
//! A bare `super` passes the enclosing method's parameters along, re-read from their slots at the
//! time of the call so that reassignments are seen. From inside blocks the slots are reached
//! through the closure depth.

use std::sync::Arc;

use garnet_common::{CompileError, InternalError};
use garnet_ir::{FrameRef, METHOD_BLOCK_NAME, Node, ScopeKind, SuperArguments};
use garnet_syntax::{BlockArgument, BlockLiteral, Span, SyntaxNode};

use crate::env::ScopeId;
use crate::lower::{BlockSite, Lowerer, context};
use crate::parameters::{BoundParam, KeywordRestBinding, ParameterNames};

/// The method scope a `super` belongs to, and how it was reached.
struct MethodScope {
    id: ScopeId,
    depth: u16,
    inside_define_method: bool,
}

impl Lowerer<'_> {
    fn enclosing_method(&self, span: Span) -> Result<MethodScope, CompileError> {
        let mut id = self.env.current_id();
        let mut depth = 0u16;
        let mut inside_define_method = false;
        loop {
            let scope = self.env.scope(id);
            match scope.kind {
                ScopeKind::Method => {
                    return Ok(MethodScope {
                        id,
                        depth,
                        inside_define_method,
                    });
                }
                ScopeKind::Block | ScopeKind::Lambda => {
                    if scope.block_call_name.as_deref() == Some("define_method") {
                        inside_define_method = true;
                    }
                    match scope.parent {
                        Some(parent) => {
                            id = parent;
                            depth += 1;
                        }
                        None => break,
                    }
                }
                ScopeKind::ModuleBody | ScopeKind::TopLevel => break,
            }
        }
        Err(CompileError::SuperOutsideMethod {
            context: context(span),
            inside_define_method,
        })
    }

    fn read_method_slot(&self, method: &MethodScope, name: &str) -> Result<Node, CompileError> {
        match self.env.scope(method.id).slot(name) {
            Some(slot) => Ok(Node::read(FrameRef::new(method.depth, slot))),
            None => Err(InternalError::MissingSlot {
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn reload_required(
        &self,
        method: &MethodScope,
        param: &BoundParam,
    ) -> Result<Node, CompileError> {
        match param {
            BoundParam::Named(name) => self.read_method_slot(method, name),
            BoundParam::Destructure(group) => self.read_method_slot(method, &group.array),
        }
    }

    /// Bare `super`.
    pub(crate) fn lower_zsuper(
        &mut self,
        block: Option<&BlockLiteral>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let method = self.enclosing_method(span)?;
        let names = self
            .env
            .scope(method.id)
            .parameters
            .clone()
            .unwrap_or_else(|| Arc::new(ParameterNames::empty()));

        let mut arguments = vec![];
        let mut rest_index = None;
        for required in &names.requireds {
            arguments.push(self.reload_required(&method, required)?);
        }
        for optional in &names.optionals {
            arguments.push(self.read_method_slot(&method, optional)?);
        }
        if let Some(rest) = &names.rest {
            rest_index = Some(arguments.len());
            arguments.push(self.read_method_slot(&method, rest)?);
        }
        for post in &names.posts {
            arguments.push(self.reload_required(&method, post)?);
        }

        let mut pairs = vec![];
        for keyword in &names.keywords {
            pairs.push((
                Node::symbol(&keyword.name),
                self.read_method_slot(&method, &keyword.slot_name)?,
            ));
        }
        let keywords = match &names.keyword_rest {
            KeywordRestBinding::Named(rest) => Some(Node::HashConcat(vec![
                Node::HashLiteral(pairs),
                self.read_method_slot(&method, rest)?,
            ])),
            KeywordRestBinding::Absent | KeywordRestBinding::NoKeywords if pairs.is_empty() => None,
            KeywordRestBinding::Absent | KeywordRestBinding::NoKeywords => {
                Some(Node::HashLiteral(pairs))
            }
        };

        let (block, site) = match block {
            Some(literal) => {
                let (block, site) = self.lower_literal_block(literal, "super")?;
                (block, Some(site))
            }
            None => (self.read_method_slot(&method, METHOD_BLOCK_NAME)?, None),
        };

        let node = Node::Super {
            arguments: SuperArguments::Reload {
                arguments,
                rest_index,
                keywords: keywords.map(Box::new),
                inside_define_method: method.inside_define_method,
            },
            block: Some(Box::new(block)),
        };
        Ok(wrap_site(site, node))
    }

    /// `super(...)` with explicit arguments. Without a block argument the method's own block is
    /// passed on.
    pub(crate) fn lower_super(
        &mut self,
        arguments: &[SyntaxNode],
        block: Option<&BlockArgument>,
    ) -> Result<Node, CompileError> {
        let arguments = self.lower_arguments(arguments)?;
        let (block, site) =
            self.lower_block_argument(block, "super", false, arguments.forwarded)?;
        let block = match block {
            Some(block) => Some(block),
            None => self.env.find_local_var(METHOD_BLOCK_NAME).map(Node::read),
        };
        let node = Node::Super {
            arguments: SuperArguments::Explicit {
                arguments: arguments.nodes,
                splatted: arguments.splatted,
                keywords: arguments.keywords,
            },
            block: block.map(Box::new),
        };
        Ok(wrap_site(site, node))
    }
}

fn wrap_site(site: Option<BlockSite>, node: Node) -> Node {
    match site {
        Some(site) => site.wrap(node),
        None => node,
    }
}
