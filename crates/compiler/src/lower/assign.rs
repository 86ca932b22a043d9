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
    ArgumentSource, CallSite, ConstantScope, FrameRef, KeywordArguments, MissingArgument, Node,
    PostShape, SplatBehavior, Symbol,
};
use garnet_syntax::{
    AssignOperator, ConstScope, MultiTarget, NodeKind, OpTarget, RestTarget, SyntaxNode, Target,
};

use super::Lowerer;

/// A multiple-assignment target whose receiver and index arguments have already been evaluated
/// into temps.
enum PreparedTarget<'a> {
    Plain(&'a Target),
    Attribute {
        receiver: FrameRef,
        name: &'a str,
        safe_navigation: bool,
        private: bool,
    },
    Index {
        receiver: FrameRef,
        arguments: Vec<FrameRef>,
        private: bool,
    },
    Nested(PreparedMulti<'a>),
}

struct PreparedMulti<'a> {
    lefts: Vec<PreparedTarget<'a>>,
    /// `Some(None)` for `*` and the implicit rest of `a, = v`.
    rest: Option<Option<Box<PreparedTarget<'a>>>>,
    rights: Vec<PreparedTarget<'a>>,
}

fn is_self(node: &SyntaxNode) -> bool {
    matches!(node.kind, NodeKind::SelfRef)
}

/// `recv.name(args)` or, for `attribute_write`, `recv.name = v` whose value is `v`.
fn accessor_call(
    receiver: Node,
    method: &str,
    arguments: Vec<Node>,
    private: bool,
    attribute_write: bool,
) -> Node {
    Node::Call(Box::new(CallSite {
        receiver,
        method: Symbol::new(method),
        arguments,
        splatted: false,
        keywords: KeywordArguments::None,
        block: None,
        private,
        variable_call: false,
        attribute_write,
    }))
}

fn guard_nil(receiver: FrameRef, node: Node) -> Node {
    Node::if_else(Node::IsNil(Box::new(Node::read(receiver))), Node::nil(), node)
}

impl Lowerer<'_> {
    /// Assigns `value` to a single target, evaluating any receiver now.
    pub(crate) fn assign_target(
        &mut self,
        target: &Target,
        value: Node,
    ) -> Result<Node, CompileError> {
        match target {
            Target::Local { name } => {
                let slot = self.env.find_or_declare(name)?;
                Ok(Node::write(slot, value))
            }
            Target::Instance { name } => Ok(Node::WriteInstanceVariable {
                name: Symbol::new(name),
                value: Box::new(value),
            }),
            Target::ClassVar { name } => Ok(Node::WriteClassVariable {
                name: Symbol::new(name),
                value: Box::new(value),
            }),
            Target::Global { name } => self.write_global(name, value),
            Target::Constant(constant) => self.write_constant(constant, value),
            Target::Attribute { .. } | Target::Index { .. } | Target::Nested(_) => {
                let mut nodes = vec![];
                let prepared = self.prepare_target(target, &mut nodes)?;
                let assigned = self.assign_prepared(&prepared, value, &mut nodes)?;
                nodes.push(assigned);
                Ok(Node::sequence(nodes))
            }
        }
    }

    /// `a, (b, *c), d.e = rhs`. Receivers and index arguments are evaluated left to right before
    /// the right-hand side; the whole expression's value is the right-hand side.
    pub(crate) fn lower_multi_write(
        &mut self,
        targets: &MultiTarget,
        value: &SyntaxNode,
    ) -> Result<Node, CompileError> {
        let mut nodes = vec![];
        let prepared = self.prepare_multi(targets, &mut nodes)?;
        let value = self.lower_node(value)?;
        let rhs = self.temp("masgn_value")?;
        nodes.push(Node::write(rhs, value));
        self.destructure(&prepared, Node::read(rhs), &mut nodes)?;
        nodes.push(Node::read(rhs));
        Ok(Node::Sequence(nodes))
    }

    fn prepare_multi<'a>(
        &mut self,
        targets: &'a MultiTarget,
        nodes: &mut Vec<Node>,
    ) -> Result<PreparedMulti<'a>, CompileError> {
        let mut lefts = vec![];
        for target in &targets.lefts {
            lefts.push(self.prepare_target(target, nodes)?);
        }
        let rest = match &targets.rest {
            None => None,
            Some(RestTarget::Named(target)) => {
                Some(Some(Box::new(self.prepare_target(target, nodes)?)))
            }
            Some(RestTarget::Anonymous) | Some(RestTarget::Implicit) => Some(None),
        };
        let mut rights = vec![];
        for target in &targets.rights {
            rights.push(self.prepare_target(target, nodes)?);
        }
        Ok(PreparedMulti {
            lefts,
            rest,
            rights,
        })
    }

    fn prepare_target<'a>(
        &mut self,
        target: &'a Target,
        nodes: &mut Vec<Node>,
    ) -> Result<PreparedTarget<'a>, CompileError> {
        Ok(match target {
            Target::Attribute {
                receiver,
                name,
                safe_navigation,
            } => {
                let temp = self.temp("masgn_receiver")?;
                nodes.push(Node::write(temp, self.lower_node(receiver)?));
                PreparedTarget::Attribute {
                    receiver: temp,
                    name,
                    safe_navigation: *safe_navigation,
                    private: is_self(receiver),
                }
            }
            Target::Index {
                receiver,
                arguments,
            } => {
                let temp = self.temp("masgn_receiver")?;
                nodes.push(Node::write(temp, self.lower_node(receiver)?));
                let mut temps = vec![];
                for argument in arguments {
                    let argument_temp = self.temp("masgn_index")?;
                    nodes.push(Node::write(argument_temp, self.lower_node(argument)?));
                    temps.push(argument_temp);
                }
                PreparedTarget::Index {
                    receiver: temp,
                    arguments: temps,
                    private: is_self(receiver),
                }
            }
            Target::Nested(multi) => PreparedTarget::Nested(self.prepare_multi(multi, nodes)?),
            _ => PreparedTarget::Plain(target),
        })
    }

    /// Splats `value` (nil becomes `[nil]`) and hands each target its element.
    fn destructure(
        &mut self,
        targets: &PreparedMulti<'_>,
        value: Node,
        nodes: &mut Vec<Node>,
    ) -> Result<(), CompileError> {
        let array = self.temp("masgn_array")?;
        nodes.push(Node::write(
            array,
            Node::SplatCast {
                value: Box::new(value),
                behavior: SplatBehavior::WrapWithNil,
            },
        ));
        let source = ArgumentSource::Array(array);
        let pre = targets.lefts.len();
        let post = targets.rights.len();

        for (index, target) in targets.lefts.iter().enumerate() {
            let element = Node::ReadPreArgument {
                source,
                index,
                missing: MissingArgument::Nil,
            };
            let assigned = self.assign_prepared(target, element, nodes)?;
            nodes.push(assigned);
        }
        if let Some(Some(target)) = &targets.rest {
            let middle = Node::ReadRestArgument {
                source,
                from: pre,
                post,
            };
            let assigned = self.assign_prepared(target, middle, nodes)?;
            nodes.push(assigned);
        }
        let shape = PostShape {
            pre,
            optional: 0,
            post,
            has_rest: targets.rest.is_some(),
        };
        for (j, target) in targets.rights.iter().enumerate() {
            let element = Node::ReadPostArgument {
                source,
                shape,
                index_from_end: post - j,
            };
            let assigned = self.assign_prepared(target, element, nodes)?;
            nodes.push(assigned);
        }
        Ok(())
    }

    /// The write for one prepared target. Nested groups push their own writes into `nodes` and
    /// yield nil.
    fn assign_prepared(
        &mut self,
        target: &PreparedTarget<'_>,
        value: Node,
        nodes: &mut Vec<Node>,
    ) -> Result<Node, CompileError> {
        match target {
            PreparedTarget::Plain(target) => self.assign_target(target, value),
            PreparedTarget::Attribute {
                receiver,
                name,
                safe_navigation,
                private,
            } => {
                let call = accessor_call(
                    Node::read(*receiver),
                    &format!("{name}="),
                    vec![value],
                    *private,
                    true,
                );
                if *safe_navigation {
                    return Ok(guard_nil(*receiver, call));
                }
                Ok(call)
            }
            PreparedTarget::Index {
                receiver,
                arguments,
                private,
            } => {
                let mut arguments: Vec<Node> = arguments.iter().map(|a| Node::read(*a)).collect();
                arguments.push(value);
                Ok(accessor_call(
                    Node::read(*receiver),
                    "[]=",
                    arguments,
                    *private,
                    true,
                ))
            }
            PreparedTarget::Nested(multi) => {
                self.destructure(multi, value, nodes)?;
                Ok(Node::nil())
            }
        }
    }

    /// `target op= value`. Receivers, index arguments and constant parents are evaluated once.
    /// For globals, class variables and constants `||=` checks definedness before reading.
    pub(crate) fn lower_op_assign(
        &mut self,
        target: &OpTarget,
        operator: &AssignOperator,
        value: &SyntaxNode,
    ) -> Result<Node, CompileError> {
        match target {
            OpTarget::Local { name } => {
                let slot = self.env.find_or_declare(name)?;
                let value = self.lower_node(value)?;
                self.combine_op_assign(operator, Node::read(slot), value, false, |_, v| {
                    Ok(Node::write(slot, v))
                })
            }
            OpTarget::Instance { name } => {
                let value = self.lower_node(value)?;
                let read = Node::ReadInstanceVariable(Symbol::new(name));
                self.combine_op_assign(operator, read, value, false, |_, v| {
                    Ok(Node::WriteInstanceVariable {
                        name: Symbol::new(name),
                        value: Box::new(v),
                    })
                })
            }
            OpTarget::ClassVar { name } => {
                let value = self.lower_node(value)?;
                let read = Node::ReadClassVariable(Symbol::new(name));
                self.combine_op_assign(operator, read, value, true, |_, v| {
                    Ok(Node::WriteClassVariable {
                        name: Symbol::new(name),
                        value: Box::new(v),
                    })
                })
            }
            OpTarget::Global { name } => {
                let read = self.read_global(name)?;
                let value = self.lower_node(value)?;
                self.combine_op_assign(operator, read, value, true, |this, v| {
                    this.write_global(name, v)
                })
            }
            OpTarget::Constant(constant) => {
                let mut nodes = vec![];
                let scope = match &constant.scope {
                    ConstScope::Within(parent) => {
                        let temp = self.temp("const_parent")?;
                        nodes.push(Node::write(temp, self.lower_node(parent)?));
                        ConstantScope::Within(Box::new(Node::read(temp)))
                    }
                    other => self.constant_scope(other)?,
                };
                let value = self.lower_node(value)?;
                let name = Symbol::new(&constant.name);
                let read = Node::ReadConstant {
                    scope: scope.clone(),
                    name: name.clone(),
                };
                let assigned = self.combine_op_assign(operator, read, value, true, |_, v| {
                    Ok(Node::WriteConstant {
                        scope,
                        name,
                        value: Box::new(v),
                    })
                })?;
                nodes.push(assigned);
                Ok(Node::sequence(nodes))
            }
            OpTarget::Attribute {
                receiver,
                name,
                safe_navigation,
            } => {
                let private = is_self(receiver);
                let temp = self.temp("opassign_receiver")?;
                let evaluated = Node::write(temp, self.lower_node(receiver)?);
                let value = self.lower_node(value)?;
                let read = accessor_call(Node::read(temp), name, vec![], private, false);
                let writer = format!("{name}=");
                let assigned = self.combine_op_assign(operator, read, value, false, |_, v| {
                    Ok(accessor_call(Node::read(temp), &writer, vec![v], private, true))
                })?;
                let assigned = if *safe_navigation {
                    guard_nil(temp, assigned)
                } else {
                    assigned
                };
                Ok(Node::Sequence(vec![evaluated, assigned]))
            }
            OpTarget::Index {
                receiver,
                arguments,
            } => {
                let private = is_self(receiver);
                let temp = self.temp("opassign_receiver")?;
                let mut nodes = vec![Node::write(temp, self.lower_node(receiver)?)];
                let mut indices = vec![];
                for argument in arguments {
                    let index = self.temp("opassign_index")?;
                    nodes.push(Node::write(index, self.lower_node(argument)?));
                    indices.push(index);
                }
                let value = self.lower_node(value)?;
                let reads = || indices.iter().map(|i| Node::read(*i)).collect::<Vec<_>>();
                let read = accessor_call(Node::read(temp), "[]", reads(), private, false);
                let assigned = self.combine_op_assign(operator, read, value, false, |_, v| {
                    let mut arguments = reads();
                    arguments.push(v);
                    Ok(accessor_call(Node::read(temp), "[]=", arguments, private, true))
                })?;
                nodes.push(assigned);
                Ok(Node::Sequence(nodes))
            }
        }
    }

    /// `||=` on a target that may be undefined first checks definedness, so it never raises.
    fn combine_op_assign(
        &mut self,
        operator: &AssignOperator,
        read: Node,
        value: Node,
        guard_defined: bool,
        write: impl FnOnce(&mut Self, Node) -> Result<Node, CompileError>,
    ) -> Result<Node, CompileError> {
        Ok(match operator {
            AssignOperator::And => Node::and(read, write(self, value)?),
            AssignOperator::Or if guard_defined => Node::or(
                Node::and(Node::IsDefined(Box::new(read.clone())), read),
                write(self, value)?,
            ),
            AssignOperator::Or => Node::or(read, write(self, value)?),
            AssignOperator::Binary(operator) => {
                write(self, Node::call(read, operator, vec![value]))?
            }
        })
    }
}
