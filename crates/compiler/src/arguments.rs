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

//! The argument loader: the prelude that moves a call's arguments into parameter slots.
//!
//! Methods and lambdas check arity first and treat a missing pre-required argument as an error
//! (unreachable once the check passes). Procs skip the positional check, read missing values as
//! nil, and may auto-splat a single array argument across their parameters. A proc that declares
//! keywords still checks them.

use std::collections::HashMap;

use garnet_common::CompileError;
use garnet_ir::{
    ArgumentSource, FrameRef, METHOD_BLOCK_NAME, MissingArgument, Node, PostShape, SELF_SLOT,
    SplatBehavior, Symbol,
};
use garnet_syntax::{Parameters, SyntaxNode};

use crate::lower::Lowerer;
use crate::parameters::{
    BoundParam, DestructureNames, KeywordRestBinding, ParameterNames, arity_of,
    should_consider_destructuring,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoaderMode {
    Method,
    Proc,
    Lambda,
}

impl LoaderMode {
    fn missing(&self) -> MissingArgument {
        match self {
            LoaderMode::Proc => MissingArgument::Nil,
            LoaderMode::Method | LoaderMode::Lambda => MissingArgument::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DefaultKey {
    Optional(usize),
    Keyword(usize),
}

/// Default values lowered once per parameter list. Every prelude built from the same list (both
/// calling conventions, both auto-splat branches) gets a copy of the same lowered node.
#[derive(Debug, Default)]
pub(crate) struct LoweredDefaults {
    nodes: HashMap<DefaultKey, Node>,
}

impl Lowerer<'_> {
    /// Builds the prelude for one calling convention. Parameter slots are declared in the current
    /// scope as they are bound.
    pub(crate) fn load_arguments(
        &mut self,
        params: Option<&Parameters>,
        names: &ParameterNames,
        defaults: &mut LoweredDefaults,
        mode: LoaderMode,
    ) -> Result<Node, CompileError> {
        let empty = Parameters::default();
        let params = params.unwrap_or(&empty);
        let mut nodes = vec![Node::write(FrameRef::local(SELF_SLOT), Node::ReadReceiver)];
        if matches!(names.keyword_rest, KeywordRestBinding::NoKeywords) {
            nodes.push(Node::CheckNoKeywords);
        }
        if mode != LoaderMode::Proc {
            nodes.push(Node::CheckArity(arity_of(Some(params))));
        } else if !params.keywords.is_empty() {
            nodes.push(Node::CheckKeywords(arity_of(Some(params))));
        }

        if mode == LoaderMode::Method {
            let method_block = self.env.declare_var(METHOD_BLOCK_NAME)?;
            nodes.push(Node::SaveMethodBlock(method_block));
            if let Some(block) = &names.block {
                let slot = self.env.declare_var(block)?;
                nodes.push(Node::write(
                    FrameRef::local(slot),
                    Node::read(FrameRef::local(method_block)),
                ));
            }
        } else if let Some(block) = &names.block {
            let slot = self.env.declare_var(block)?;
            nodes.push(Node::SaveMethodBlock(slot));
        }

        if mode == LoaderMode::Proc && should_consider_destructuring(params) {
            nodes.push(self.load_auto_splat(params, names, defaults)?);
        } else {
            let source = ArgumentSource::Arguments;
            let positional =
                self.load_positional(params, names, defaults, source, mode.missing())?;
            nodes.extend(positional);
        }

        self.load_keywords(params, names, defaults, &mut nodes)?;
        Ok(Node::sequence(nodes))
    }

    fn lower_default(
        &mut self,
        defaults: &mut LoweredDefaults,
        key: DefaultKey,
        value: &SyntaxNode,
    ) -> Result<Node, CompileError> {
        if let Some(node) = defaults.nodes.get(&key) {
            return Ok(node.clone());
        }
        let node = self.lower_node(value)?;
        defaults.nodes.insert(key, node.clone());
        Ok(node)
    }

    /// `proc { |a, b| }.call([1, 2])` binds `a = 1, b = 2`: a lone argument that converts to an
    /// array is spread over the parameters instead.
    fn load_auto_splat(
        &mut self,
        params: &Parameters,
        names: &ParameterNames,
        defaults: &mut LoweredDefaults,
    ) -> Result<Node, CompileError> {
        let array = self.temp("destructure")?;
        let probe = Node::and(
            Node::ShouldDestructure,
            Node::Sequence(vec![
                Node::write(
                    array,
                    Node::SplatCast {
                        value: Box::new(Node::ReadPreArgument {
                            source: ArgumentSource::Arguments,
                            index: 0,
                            missing: MissingArgument::Nil,
                        }),
                        behavior: SplatBehavior::ToAryOrNil,
                    },
                ),
                Node::not(Node::IsNil(Box::new(Node::read(array)))),
            ]),
        );
        let splatted = self.load_positional(
            params,
            names,
            defaults,
            ArgumentSource::Array(array),
            MissingArgument::Nil,
        )?;
        let direct = self.load_positional(
            params,
            names,
            defaults,
            ArgumentSource::Arguments,
            MissingArgument::Nil,
        )?;
        Ok(Node::if_else(
            probe,
            Node::sequence(splatted),
            Node::sequence(direct),
        ))
    }

    fn load_positional(
        &mut self,
        params: &Parameters,
        names: &ParameterNames,
        defaults: &mut LoweredDefaults,
        source: ArgumentSource,
        missing: MissingArgument,
    ) -> Result<Vec<Node>, CompileError> {
        let pre = names.requireds.len();
        let optional = names.optionals.len();
        let post = names.posts.len();
        let mut nodes = vec![];

        for (index, required) in names.requireds.iter().enumerate() {
            let value = Node::ReadPreArgument {
                source,
                index,
                missing,
            };
            self.bind_parameter(required, value, &mut nodes)?;
        }

        for (i, (name, param)) in names.optionals.iter().zip(&params.optionals).enumerate() {
            let slot = self.env.declare_var(name)?;
            let default = self.lower_default(defaults, DefaultKey::Optional(i), &param.value)?;
            nodes.push(Node::write(
                FrameRef::local(slot),
                Node::ReadOptionalArgument {
                    source,
                    index: pre + i,
                    minimum: pre + i + 1 + post,
                    default: Box::new(default),
                },
            ));
        }

        if let Some(rest) = &names.rest {
            let slot = self.env.declare_var(rest)?;
            nodes.push(Node::write(
                FrameRef::local(slot),
                Node::ReadRestArgument {
                    source,
                    from: pre + optional,
                    post,
                },
            ));
        }

        let shape = PostShape {
            pre,
            optional,
            post,
            has_rest: names.rest.is_some() || names.implicit_rest,
        };
        for (j, param) in names.posts.iter().enumerate() {
            let value = Node::ReadPostArgument {
                source,
                shape,
                index_from_end: post - j,
            };
            self.bind_parameter(param, value, &mut nodes)?;
        }
        Ok(nodes)
    }

    fn bind_parameter(
        &mut self,
        param: &BoundParam,
        value: Node,
        nodes: &mut Vec<Node>,
    ) -> Result<(), CompileError> {
        match param {
            BoundParam::Named(name) => {
                let slot = self.env.declare_var(name)?;
                nodes.push(Node::write(FrameRef::local(slot), value));
                Ok(())
            }
            BoundParam::Destructure(group) => self.bind_destructure(group, value, nodes),
        }
    }

    /// `(a, *b, c)`: the value is splatted (nil becomes `[nil]`) into a hidden slot, then read
    /// like a proc's positional arguments.
    fn bind_destructure(
        &mut self,
        group: &DestructureNames,
        value: Node,
        nodes: &mut Vec<Node>,
    ) -> Result<(), CompileError> {
        let array = FrameRef::local(self.env.declare_var(&group.array)?);
        nodes.push(Node::write(
            array,
            Node::SplatCast {
                value: Box::new(value),
                behavior: SplatBehavior::WrapWithNil,
            },
        ));
        let source = ArgumentSource::Array(array);
        let pre = group.lefts.len();
        let post = group.rights.len();
        for (index, left) in group.lefts.iter().enumerate() {
            let value = Node::ReadPreArgument {
                source,
                index,
                missing: MissingArgument::Nil,
            };
            self.bind_parameter(left, value, nodes)?;
        }
        if let Some(Some(rest)) = &group.rest {
            let slot = self.env.declare_var(rest)?;
            nodes.push(Node::write(
                FrameRef::local(slot),
                Node::ReadRestArgument {
                    source,
                    from: pre,
                    post,
                },
            ));
        }
        let shape = PostShape {
            pre,
            optional: 0,
            post,
            has_rest: group.rest.is_some(),
        };
        for (j, right) in group.rights.iter().enumerate() {
            let value = Node::ReadPostArgument {
                source,
                shape,
                index_from_end: post - j,
            };
            self.bind_parameter(right, value, nodes)?;
        }
        Ok(())
    }

    fn load_keywords(
        &mut self,
        params: &Parameters,
        names: &ParameterNames,
        defaults: &mut LoweredDefaults,
        nodes: &mut Vec<Node>,
    ) -> Result<(), CompileError> {
        let keywords = names.keywords.iter().zip(&params.keywords).enumerate();
        for (i, (binding, param)) in keywords {
            let slot = self.env.declare_var(&binding.slot_name)?;
            let default = match &param.value {
                Some(value) => {
                    let node = self.lower_default(defaults, DefaultKey::Keyword(i), value)?;
                    Some(Box::new(node))
                }
                None => None,
            };
            nodes.push(Node::write(
                FrameRef::local(slot),
                Node::ReadKeywordArgument {
                    name: Symbol::new(&binding.name),
                    default,
                },
            ));
        }
        match &names.keyword_rest {
            KeywordRestBinding::Absent | KeywordRestBinding::NoKeywords => {}
            KeywordRestBinding::Named(name) => {
                let slot = self.env.declare_var(name)?;
                let known = names.keywords.iter().map(|k| Symbol::new(&k.name)).collect();
                nodes.push(Node::write(
                    FrameRef::local(slot),
                    Node::ReadKeywordRest { known },
                ));
            }
        }
        Ok(())
    }
}
