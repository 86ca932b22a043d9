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

use garnet_common::CompileError;
use garnet_ir::{
    ANONYMOUS_BLOCK_NAME, ANONYMOUS_KEYWORD_REST_NAME, ANONYMOUS_REST_NAME, BreakId, CallSite,
    ClosureKind, KeywordArguments, METHOD_BLOCK_NAME, Node, SplatBehavior, Slot, Symbol,
};
use garnet_syntax::{
    BlockArgument, BlockLiteral, CallNode, HashElement, NodeKind, Span, SyntaxNode,
};

use super::{Lowerer, context};

/// Lowered positional and keyword arguments of a call, `super` or `yield`.
pub(crate) struct Arguments {
    /// When `splatted`, a single node building the whole positional array.
    pub nodes: Vec<Node>,
    pub splatted: bool,
    pub keywords: KeywordArguments,
    /// `...` was forwarded, so the block defaults to the forwarded one.
    pub forwarded: bool,
}

/// A literal block's call site: the closure's break target and the caller's liveness marker.
pub(crate) struct BlockSite {
    pub break_id: BreakId,
    pub marker: Slot,
}

impl BlockSite {
    pub fn wrap(self, call: Node) -> Node {
        Node::CatchBreak {
            id: self.break_id,
            in_while: false,
            body: Box::new(Node::FrameOnStack {
                marker: self.marker,
                body: Box::new(call),
            }),
        }
    }
}

fn keyword_names(elements: &[HashElement]) -> KeywordArguments {
    let mut names = vec![];
    for element in elements {
        match element {
            HashElement::Pair {
                key:
                    SyntaxNode {
                        kind: NodeKind::Sym { name },
                        ..
                    },
                ..
            } => names.push(Symbol::new(name)),
            _ => return KeywordArguments::Splat,
        }
    }
    KeywordArguments::Literal(names)
}

impl Lowerer<'_> {
    pub(crate) fn lower_arguments(
        &mut self,
        arguments: &[SyntaxNode],
    ) -> Result<Arguments, CompileError> {
        let mut keywords = KeywordArguments::None;
        let mut positional: &[SyntaxNode] = arguments;
        let mut keyword_hash = None;
        if let Some((last, rest)) = arguments.split_last()
            && let NodeKind::KeywordHash { elements } = &last.kind
        {
            keywords = keyword_names(elements);
            keyword_hash = Some(elements);
            positional = rest;
        }
        let forwarded = positional
            .iter()
            .any(|a| matches!(a.kind, NodeKind::ForwardedArguments));
        let splatted = forwarded
            || positional
                .iter()
                .any(|a| matches!(a.kind, NodeKind::Splat(_)));

        if !splatted {
            let mut nodes = self.lower_each(positional)?;
            if let Some(elements) = keyword_hash {
                nodes.push(self.lower_hash(elements)?);
            }
            return Ok(Arguments {
                nodes,
                splatted: false,
                keywords,
                forwarded: false,
            });
        }

        let mut pieces = vec![];
        let mut run = vec![];
        for argument in positional {
            match &argument.kind {
                NodeKind::Splat(value) => {
                    if !run.is_empty() {
                        pieces.push(Node::ArrayLiteral(std::mem::take(&mut run)));
                    }
                    let value = match value {
                        Some(value) => self.lower_node(value)?,
                        None => Node::read(self.env.expect_local_var(ANONYMOUS_REST_NAME)?),
                    };
                    pieces.push(Node::SplatCast {
                        value: Box::new(value),
                        behavior: SplatBehavior::ToArray,
                    });
                }
                NodeKind::ForwardedArguments => {
                    if !run.is_empty() {
                        pieces.push(Node::ArrayLiteral(std::mem::take(&mut run)));
                    }
                    pieces.push(Node::read(self.env.expect_local_var(ANONYMOUS_REST_NAME)?));
                }
                _ => run.push(self.lower_node(argument)?),
            }
        }
        if let Some(elements) = keyword_hash {
            run.push(self.lower_hash(elements)?);
        } else if forwarded {
            run.push(Node::read(
                self.env.expect_local_var(ANONYMOUS_KEYWORD_REST_NAME)?,
            ));
            keywords = KeywordArguments::Splat;
        }
        if !run.is_empty() {
            pieces.push(Node::ArrayLiteral(run));
        }
        Ok(Arguments {
            nodes: vec![Node::ArrayConcat(pieces)],
            splatted: true,
            keywords,
            forwarded,
        })
    }

    /// The block passed at a call site. A literal block also yields the site its `break` unwinds
    /// to.
    pub(crate) fn lower_block_argument(
        &mut self,
        block: Option<&BlockArgument>,
        call_name: &str,
        lambda_call: bool,
        forwarded: bool,
    ) -> Result<(Option<Node>, Option<BlockSite>), CompileError> {
        match block {
            Some(BlockArgument::Literal(literal)) if lambda_call => {
                let closure =
                    self.lower_block(
                        literal,
                        ClosureKind::LambdaCall,
                        Some(call_name),
                        None,
                        None,
                    )?;
                Ok((Some(Node::Closure(closure)), None))
            }
            Some(BlockArgument::Literal(literal)) => {
                let (closure, site) = self.lower_literal_block(literal, call_name)?;
                Ok((Some(closure), Some(site)))
            }
            Some(BlockArgument::Pass(Some(value))) => {
                Ok((Some(Node::ToProc(Box::new(self.lower_node(value)?))), None))
            }
            Some(BlockArgument::Pass(None)) => Ok((
                Some(Node::read(self.env.expect_local_var(ANONYMOUS_BLOCK_NAME)?)),
                None,
            )),
            None if forwarded => Ok((
                Some(Node::read(self.env.expect_local_var(ANONYMOUS_BLOCK_NAME)?)),
                None,
            )),
            None => Ok((None, None)),
        }
    }

    /// A `{ ... }` block given to `call_name`, compiled as a proc.
    pub(crate) fn lower_literal_block(
        &mut self,
        literal: &BlockLiteral,
        call_name: &str,
    ) -> Result<(Node, BlockSite), CompileError> {
        let marker = self.temp("frame_on_stack")?.slot;
        let closure = self.lower_block(
            literal,
            ClosureKind::Proc,
            Some(call_name),
            Some(marker),
            None,
        )?;
        let site = BlockSite {
            break_id: closure.break_id.clone(),
            marker,
        };
        Ok((Node::Closure(closure), site))
    }

    pub(crate) fn lower_call(&mut self, call: &CallNode) -> Result<Node, CompileError> {
        let private = match &call.receiver {
            None => true,
            Some(receiver) => matches!(receiver.kind, NodeKind::SelfRef),
        };
        let receiver = match &call.receiver {
            Some(receiver) => self.lower_node(receiver)?,
            None => Node::read_self(),
        };
        // `recv&.m`: the receiver is evaluated once, into a temp tested for nil.
        let (receiver, guard) = if call.safe_navigation {
            let temp = self.temp("safe_nav")?;
            (Node::read(temp), Some((temp, receiver)))
        } else {
            (receiver, None)
        };
        let arguments = self.lower_arguments(&call.arguments)?;
        let lambda_call = call.receiver.is_none() && call.name == "lambda";
        let (block, site) = self.lower_block_argument(
            call.block.as_ref(),
            &call.name,
            lambda_call,
            arguments.forwarded,
        )?;

        let mut node = Node::Call(Box::new(CallSite {
            receiver,
            method: Symbol::new(&call.name),
            arguments: arguments.nodes,
            splatted: arguments.splatted,
            keywords: arguments.keywords,
            block,
            private,
            variable_call: call.variable_call,
            attribute_write: call.attribute_write,
        }));
        if let Some(site) = site {
            node = site.wrap(node);
        }
        match guard {
            Some((temp, receiver)) => Ok(Node::Sequence(vec![
                Node::write(temp, receiver),
                Node::if_else(Node::IsNil(Box::new(Node::read(temp))), Node::nil(), node),
            ])),
            None => Ok(node),
        }
    }

    /// A receiverless call that may see private methods.
    pub(crate) fn private_call(&self, name: &str, arguments: Vec<Node>) -> Node {
        self.private_call_with_block(name, arguments, None)
    }

    pub(crate) fn private_call_with_block(
        &self,
        name: &str,
        arguments: Vec<Node>,
        block: Option<Node>,
    ) -> Node {
        Node::Call(Box::new(CallSite {
            receiver: Node::read_self(),
            method: Symbol::new(name),
            arguments,
            splatted: false,
            keywords: KeywordArguments::None,
            block,
            private: true,
            variable_call: false,
            attribute_write: false,
        }))
    }

    pub(crate) fn lower_yield(
        &mut self,
        arguments: &[SyntaxNode],
        span: Span,
    ) -> Result<Node, CompileError> {
        let Some(block) = self.env.find_local_var(METHOD_BLOCK_NAME) else {
            return Err(CompileError::InvalidYield(context(span)));
        };
        let arguments = self.lower_arguments(arguments)?;
        Ok(Node::Yield {
            block,
            arguments: arguments.nodes,
            splatted: arguments.splatted,
            keywords: arguments.keywords,
        })
    }

    /// `/(?<name>.)/ =~ s` assigns each named capture, or nil to all of them on failure.
    pub(crate) fn lower_match_write(
        &mut self,
        call: &SyntaxNode,
        targets: &[String],
    ) -> Result<Node, CompileError> {
        let matched = self.lower_node(call)?;
        let result = self.temp("match")?;
        let cell = self.env.special_variables_cell()?;
        let mut on_success = vec![];
        let mut on_failure = vec![];
        for name in targets {
            let target = self.env.find_or_declare(name)?;
            let capture = Node::call(
                Node::ReadSpecialVariable {
                    cell,
                    name: Symbol::new("$~"),
                },
                "[]",
                vec![Node::symbol(name)],
            );
            on_success.push(Node::write(target, capture));
            on_failure.push(Node::write(target, Node::nil()));
        }
        Ok(Node::Sequence(vec![
            Node::write(result, matched),
            Node::if_else(
                Node::IsNil(Box::new(Node::read(result))),
                Node::sequence(on_failure),
                Node::sequence(on_success),
            ),
            Node::read(result),
        ]))
    }
}
