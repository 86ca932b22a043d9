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
use garnet_ir::{ConstantScope, Literal, Node, SplatBehavior, Symbol};
use garnet_syntax::{ConstRef, ConstScope, HashElement, NodeKind, SyntaxNode};

use super::Lowerer;

const SPECIAL_GLOBALS: [&str; 2] = ["$~", "$_"];

impl Lowerer<'_> {
    pub(crate) fn lower_node(&mut self, node: &SyntaxNode) -> Result<Node, CompileError> {
        match &node.kind {
            NodeKind::Nil => Ok(Node::nil()),
            NodeKind::True => Ok(Node::boolean(true)),
            NodeKind::False => Ok(Node::boolean(false)),
            NodeKind::SelfRef => Ok(Node::read_self()),
            NodeKind::Integer(i) => Ok(Node::integer(*i)),
            NodeKind::Float(f) => Ok(Node::Literal(Literal::Float(*f))),
            NodeKind::Str { value } => Ok(self.string_literal(value)),
            NodeKind::XStr { value } => {
                let command = self.string_literal(value);
                Ok(self.private_call("`", vec![command]))
            }
            NodeKind::InterpolatedStr { parts } => {
                Ok(Node::Interpolation(self.lower_each(parts)?))
            }
            NodeKind::Sym { name } => Ok(Node::symbol(name)),
            NodeKind::InterpolatedSym { parts } => Ok(Node::DynamicSymbol(self.lower_each(parts)?)),
            NodeKind::Regex { source, options } => Ok(Node::Literal(Literal::Regex {
                source: Symbol::new(source),
                options: Symbol::new(options),
            })),
            NodeKind::InterpolatedRegex {
                parts,
                options,
                once,
            } => {
                let regex = Node::DynamicRegex {
                    parts: self.lower_each(parts)?,
                    options: Symbol::new(options),
                };
                if *once {
                    return Ok(Node::Once(Box::new(regex)));
                }
                Ok(regex)
            }
            NodeKind::Array { elements } => self.lower_array(elements),
            NodeKind::Hash { elements } | NodeKind::KeywordHash { elements } => {
                self.lower_hash(elements)
            }
            NodeKind::Range {
                left,
                right,
                exclusive,
            } => Ok(Node::Range {
                from: Box::new(self.lower_optional(left.as_deref())?),
                to: Box::new(self.lower_optional(right.as_deref())?),
                exclusive: *exclusive,
            }),
            NodeKind::SourceFile => {
                let file = self.session.pragmas.file.clone();
                Ok(self.string_literal(&file))
            }
            NodeKind::SourceLine => Ok(Node::integer(node.span.line as i64)),
            NodeKind::SourceEncoding => Ok(Node::Literal(Literal::Encoding(Symbol::new(
                &self.session.pragmas.encoding,
            )))),

            NodeKind::LocalRead { name } => Ok(Node::read(self.env.expect_local_var(name)?)),
            NodeKind::LocalWrite { name, value } => {
                let value = self.lower_node(value)?;
                let target = self.env.find_or_declare(name)?;
                Ok(Node::write(target, value))
            }
            NodeKind::InstanceRead { name } => Ok(Node::ReadInstanceVariable(Symbol::new(name))),
            NodeKind::InstanceWrite { name, value } => Ok(Node::WriteInstanceVariable {
                name: Symbol::new(name),
                value: Box::new(self.lower_node(value)?),
            }),
            NodeKind::ClassVarRead { name } => Ok(Node::ReadClassVariable(Symbol::new(name))),
            NodeKind::ClassVarWrite { name, value } => Ok(Node::WriteClassVariable {
                name: Symbol::new(name),
                value: Box::new(self.lower_node(value)?),
            }),
            NodeKind::GlobalRead { name } => self.read_global(name),
            NodeKind::GlobalWrite { name, value } => {
                let value = self.lower_node(value)?;
                self.write_global(name, value)
            }
            NodeKind::BackReference { name } => Ok(Node::ReadBackReference {
                cell: self.env.special_variables_cell()?,
                kind: *name,
            }),
            NodeKind::NthReference { number } => Ok(Node::ReadNthReference {
                cell: self.env.special_variables_cell()?,
                number: *number,
            }),
            NodeKind::ConstRead(constant) => Ok(Node::ReadConstant {
                scope: self.constant_scope(&constant.scope)?,
                name: Symbol::new(&constant.name),
            }),
            NodeKind::ConstWrite { target, value } => {
                let value = self.lower_node(value)?;
                self.write_constant(target, value)
            }
            NodeKind::OpAssign {
                target,
                operator,
                value,
            } => self.lower_op_assign(target, operator, value),
            NodeKind::MultiWrite { targets, value } => self.lower_multi_write(targets, value),
            NodeKind::Splat(Some(value)) => Ok(Node::SplatCast {
                value: Box::new(self.lower_node(value)?),
                behavior: SplatBehavior::ToArray,
            }),
            NodeKind::Splat(None) | NodeKind::ForwardedArguments => Err(self.unhandled(node)),
            NodeKind::Defined(expression) => {
                Ok(Node::Defined(Box::new(self.lower_node(expression)?)))
            }

            NodeKind::Call(call) => self.lower_call(call),
            NodeKind::Super { arguments, block } => self.lower_super(arguments, block.as_ref()),
            NodeKind::ForwardingSuper { block } => self.lower_zsuper(block.as_ref(), node.span),
            NodeKind::Yield { arguments } => self.lower_yield(arguments, node.span),

            NodeKind::Not(value) => Ok(Node::not(self.lower_node(value)?)),
            NodeKind::And { left, right } => {
                Ok(Node::and(self.lower_node(left)?, self.lower_node(right)?))
            }
            NodeKind::Or { left, right } => {
                Ok(Node::or(self.lower_node(left)?, self.lower_node(right)?))
            }
            NodeKind::If {
                predicate,
                then,
                otherwise,
            } => self.lower_if(predicate, then.as_deref(), otherwise.as_deref()),
            NodeKind::Unless {
                predicate,
                then,
                otherwise,
            } => self.lower_if(predicate, otherwise.as_deref(), then.as_deref()),
            NodeKind::While {
                predicate,
                body,
                do_while,
            } => self.lower_while(predicate, body.as_deref(), *do_while, false),
            NodeKind::Until {
                predicate,
                body,
                do_while,
            } => self.lower_while(predicate, body.as_deref(), *do_while, true),
            NodeKind::For {
                index,
                collection,
                body,
            } => self.lower_for(index, collection, body.as_deref(), node.span),
            NodeKind::Case {
                predicate,
                whens,
                otherwise,
            } => self.lower_case(predicate.as_deref(), whens, otherwise.as_deref()),
            NodeKind::CaseMatch {
                predicate,
                clauses,
                otherwise,
            } => self.lower_case_match(predicate, clauses, otherwise.as_deref(), node.span),
            NodeKind::MatchPredicate { value, pattern } => {
                self.lower_match_predicate(value, pattern, node.span)
            }
            NodeKind::MatchRequired { value, pattern } => {
                self.lower_match_required(value, pattern, node.span)
            }
            NodeKind::MatchWrite { call, targets } => self.lower_match_write(call, targets),
            NodeKind::Begin {
                body,
                rescues,
                otherwise,
                ensure,
            } => self.lower_begin(
                body.as_deref(),
                rescues,
                otherwise.as_deref(),
                ensure.as_deref(),
                node.span,
            ),
            NodeKind::RescueModifier { expression, rescue } => {
                self.lower_rescue_modifier(expression, rescue)
            }
            NodeKind::Statements(statements) => self.lower_statements(statements),
            NodeKind::Parentheses(body) => self.lower_optional(body.as_deref()),
            NodeKind::Break(value) => self.lower_break(value.as_deref(), node.span),
            NodeKind::Next(value) => self.lower_next(value.as_deref(), node.span),
            NodeKind::Redo => self.lower_redo(node.span),
            NodeKind::Retry => self.lower_retry(node.span),
            NodeKind::Return(value) => self.lower_return(value.as_deref(), node.span),
            NodeKind::FlipFlop {
                left,
                right,
                exclusive,
            } => self.lower_flip_flop(left.as_deref(), right.as_deref(), *exclusive),

            NodeKind::Def(def) => self.lower_def(def),
            NodeKind::Lambda(literal) => self.lower_lambda(literal),
            NodeKind::ClassDef {
                path,
                superclass,
                body,
                locals,
            } => self.lower_class(path, superclass.as_deref(), body.as_deref(), locals),
            NodeKind::ModuleDef { path, body, locals } => {
                self.lower_module(path, body.as_deref(), locals)
            }
            NodeKind::SingletonClass {
                expression,
                body,
                locals,
            } => self.lower_singleton_class(expression, body.as_deref(), locals),
            NodeKind::Alias { new_name, old_name } => Ok(Node::Alias {
                new_name: Box::new(self.lower_node(new_name)?),
                old_name: Box::new(self.lower_node(old_name)?),
            }),
            NodeKind::GlobalAlias { new_name, old_name } => Ok(Node::AliasGlobal {
                new_name: Symbol::new(new_name),
                old_name: Symbol::new(old_name),
            }),
            NodeKind::Undef { names } => Ok(Node::Undef(self.lower_each(names)?)),
            NodeKind::PreExecution(body) => self.lower_body(body.as_deref()),
            NodeKind::PostExecution(body) => self.lower_post_execution(body.as_deref(), node.span),
        }
    }

    pub(crate) fn lower_each(&mut self, nodes: &[SyntaxNode]) -> Result<Vec<Node>, CompileError> {
        nodes.iter().map(|n| self.lower_node(n)).collect()
    }

    pub(crate) fn string_literal(&self, value: &str) -> Node {
        Node::StringLiteral {
            value: Arc::from(value),
            frozen: self.session.freeze_string_literals(),
        }
    }

    /// `[a, *b, c]`: a plain literal, or a concatenation of literal runs and splats.
    pub(crate) fn lower_array(&mut self, elements: &[SyntaxNode]) -> Result<Node, CompileError> {
        if !elements
            .iter()
            .any(|e| matches!(e.kind, NodeKind::Splat(_)))
        {
            return Ok(Node::ArrayLiteral(self.lower_each(elements)?));
        }
        let mut pieces = vec![];
        let mut run = vec![];
        for element in elements {
            match &element.kind {
                NodeKind::Splat(value) => {
                    if !run.is_empty() {
                        pieces.push(Node::ArrayLiteral(std::mem::take(&mut run)));
                    }
                    let value = match value {
                        Some(value) => self.lower_node(value)?,
                        None => Node::read(
                            self.env.expect_local_var(garnet_ir::ANONYMOUS_REST_NAME)?,
                        ),
                    };
                    pieces.push(Node::SplatCast {
                        value: Box::new(value),
                        behavior: SplatBehavior::ToArray,
                    });
                }
                _ => run.push(self.lower_node(element)?),
            }
        }
        if !run.is_empty() {
            pieces.push(Node::ArrayLiteral(run));
        }
        Ok(Node::ArrayConcat(pieces))
    }

    /// `{k => v, **h}`: a plain literal, or a merge of literal runs and double splats.
    pub(crate) fn lower_hash(&mut self, elements: &[HashElement]) -> Result<Node, CompileError> {
        let mut pieces = vec![];
        let mut run = vec![];
        let mut splatted = false;
        for element in elements {
            match element {
                HashElement::Pair { key, value } => {
                    run.push((self.lower_node(key)?, self.lower_node(value)?));
                }
                HashElement::DoubleSplat(value) => {
                    splatted = true;
                    if !run.is_empty() {
                        pieces.push(Node::HashLiteral(std::mem::take(&mut run)));
                    }
                    pieces.push(match value {
                        Some(value) => self.lower_node(value)?,
                        None => Node::read(
                            self.env
                                .expect_local_var(garnet_ir::ANONYMOUS_KEYWORD_REST_NAME)?,
                        ),
                    });
                }
            }
        }
        if !splatted {
            return Ok(Node::HashLiteral(run));
        }
        if !run.is_empty() {
            pieces.push(Node::HashLiteral(run));
        }
        Ok(Node::HashConcat(pieces))
    }

    pub(crate) fn read_global(&mut self, name: &str) -> Result<Node, CompileError> {
        if SPECIAL_GLOBALS.contains(&name) {
            return Ok(Node::ReadSpecialVariable {
                cell: self.env.special_variables_cell()?,
                name: Symbol::new(name),
            });
        }
        if name == "$!" {
            return Ok(Node::CurrentException);
        }
        Ok(Node::ReadGlobal(Symbol::new(name)))
    }

    pub(crate) fn write_global(&mut self, name: &str, value: Node) -> Result<Node, CompileError> {
        if SPECIAL_GLOBALS.contains(&name) {
            return Ok(Node::WriteSpecialVariable {
                cell: self.env.special_variables_cell()?,
                name: Symbol::new(name),
                value: Box::new(value),
            });
        }
        Ok(Node::WriteGlobal {
            name: Symbol::new(name),
            value: Box::new(value),
        })
    }

    pub(crate) fn constant_scope(
        &mut self,
        scope: &ConstScope,
    ) -> Result<ConstantScope, CompileError> {
        Ok(match scope {
            ConstScope::Lexical => ConstantScope::Lexical {
                dynamic: self.env.current().dynamic_constant_lookup(),
            },
            ConstScope::TopLevel => ConstantScope::TopLevel,
            ConstScope::Within(parent) => ConstantScope::Within(Box::new(self.lower_node(parent)?)),
        })
    }

    pub(crate) fn write_constant(
        &mut self,
        target: &ConstRef,
        value: Node,
    ) -> Result<Node, CompileError> {
        Ok(Node::WriteConstant {
            scope: self.constant_scope(&target.scope)?,
            name: Symbol::new(&target.name),
            value: Box::new(value),
        })
    }
}
