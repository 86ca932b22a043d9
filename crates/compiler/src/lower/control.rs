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

use garnet_common::{CompileError, WarningKind};
use garnet_ir::{
    CallSite, ClosureKind, FrameRef, KeywordArguments, Node, RescueClause, RescueMatcher,
    ReturnTarget, ScopeKind, SplatBehavior, Symbol,
};
use garnet_syntax::{
    BlockLiteral, InClause, NodeKind, Parameters, Pattern, RequiredParam, Span, SyntaxNode, Target,
    WhenClause,
};

use super::calls::BlockSite;
use super::{Lowerer, context};

fn is_literal_condition(node: &SyntaxNode) -> bool {
    matches!(
        node.kind,
        NodeKind::Str { .. }
            | NodeKind::Sym { .. }
            | NodeKind::Integer(_)
            | NodeKind::Float(_)
            | NodeKind::Regex { .. }
    )
}

impl Lowerer<'_> {
    pub(crate) fn lower_condition(&mut self, predicate: &SyntaxNode) -> Result<Node, CompileError> {
        if is_literal_condition(predicate) {
            self.warn_literal(
                WarningKind::LiteralInCondition,
                predicate.span,
                "literal in condition",
            );
        }
        self.lower_node(predicate)
    }

    pub(crate) fn lower_if(
        &mut self,
        predicate: &SyntaxNode,
        then: Option<&SyntaxNode>,
        otherwise: Option<&SyntaxNode>,
    ) -> Result<Node, CompileError> {
        let condition = self.lower_condition(predicate)?;
        let then = self.lower_optional(then)?;
        let otherwise = self.lower_optional(otherwise)?;
        Ok(Node::if_else(condition, then, otherwise))
    }

    /// `while`/`until`, caught by a fresh break target.
    pub(crate) fn lower_while(
        &mut self,
        predicate: &SyntaxNode,
        body: Option<&SyntaxNode>,
        do_while: bool,
        until: bool,
    ) -> Result<Node, CompileError> {
        let id = self.session.control_ids.break_id();
        let outer = self.control.while_break.replace(id.clone());
        let lowered = self.lower_condition(predicate).and_then(|condition| {
            let body = self.lower_optional(body)?;
            Ok((condition, body))
        });
        self.control.while_break = outer;
        let (condition, body) = lowered?;
        let condition = if until { Node::not(condition) } else { condition };
        Ok(Node::CatchBreak {
            id,
            in_while: true,
            body: Box::new(Node::While {
                condition: Box::new(condition),
                body: Box::new(body),
                do_while,
            }),
        })
    }

    /// `for x in xs` is `xs.each { |%for| x = %for; ... }`, with the block writing straight into
    /// the enclosing scope.
    pub(crate) fn lower_for(
        &mut self,
        index: &Target,
        collection: &SyntaxNode,
        body: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let collection = self.lower_node(collection)?;
        let parameter = self.session.next_temp_name("for");
        let literal = BlockLiteral {
            parameters: Some(Parameters {
                requireds: vec![RequiredParam::Named(parameter)],
                ..Parameters::default()
            }),
            body: body.map(|b| Box::new(b.clone())),
            locals: vec![],
            span,
        };
        let marker = self.temp("frame_on_stack")?.slot;
        let closure =
            self.lower_block(&literal, ClosureKind::Proc, Some("each"), Some(marker), Some(index))?;
        let site = BlockSite {
            break_id: closure.break_id.clone(),
            marker,
        };
        let call = Node::Call(Box::new(CallSite {
            receiver: collection,
            method: Symbol::new("each"),
            arguments: vec![],
            splatted: false,
            keywords: KeywordArguments::None,
            block: Some(Node::Closure(closure)),
            private: false,
            variable_call: false,
            attribute_write: false,
        }));
        Ok(site.wrap(call))
    }

    pub(crate) fn lower_break(
        &mut self,
        value: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let (id, in_while) = match (&self.control.while_break, self.control.in_closure) {
            (Some(id), _) => (id.clone(), true),
            (None, true) => match &self.env.current().break_id {
                Some(id) => (id.clone(), false),
                None => return Err(CompileError::InvalidBreak(context(span))),
            },
            (None, false) => return Err(CompileError::InvalidBreak(context(span))),
        };
        let value = self.lower_optional(value)?;
        Ok(Node::Break {
            id,
            value: Box::new(value),
            in_while,
        })
    }

    fn in_loop_or_closure(&self) -> bool {
        self.control.while_break.is_some() || self.control.in_closure
    }

    pub(crate) fn lower_next(
        &mut self,
        value: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        if !self.in_loop_or_closure() {
            return Err(CompileError::InvalidNext(context(span)));
        }
        Ok(Node::Next(Box::new(self.lower_optional(value)?)))
    }

    pub(crate) fn lower_redo(&mut self, span: Span) -> Result<Node, CompileError> {
        if !self.in_loop_or_closure() {
            return Err(CompileError::InvalidRedo(context(span)));
        }
        Ok(Node::Redo)
    }

    pub(crate) fn lower_retry(&mut self, span: Span) -> Result<Node, CompileError> {
        if !self.control.in_rescue {
            return Err(CompileError::InvalidRetry(context(span)));
        }
        Ok(Node::Retry)
    }

    pub(crate) fn lower_return(
        &mut self,
        value: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let scope = self.env.current();
        let target = match scope.kind {
            ScopeKind::Method | ScopeKind::TopLevel => ReturnTarget::Local,
            ScopeKind::ModuleBody => return Err(CompileError::InvalidReturn(context(span))),
            ScopeKind::Block | ScopeKind::Lambda if scope.return_id.is_module_body() => {
                ReturnTarget::Invalid
            }
            ScopeKind::Block | ScopeKind::Lambda => ReturnTarget::Dynamic(scope.return_id.clone()),
        };
        let value = self.lower_optional(value)?;
        Ok(Node::Return {
            target,
            value: Box::new(value),
        })
    }

    /// The state lives in the nearest method-like frame, so it survives between block calls.
    pub(crate) fn lower_flip_flop(
        &mut self,
        left: Option<&SyntaxNode>,
        right: Option<&SyntaxNode>,
        exclusive: bool,
    ) -> Result<Node, CompileError> {
        let (owner, depth) = self.env.nearest_frame_owner();
        let name = self.session.next_temp_name("flip_flop");
        let slot = self.env.declare_var_in(owner, &name)?;
        self.env.scope_mut(owner).flip_flop_states.push(slot);
        let begin = self.lower_optional(left)?;
        let end = self.lower_optional(right)?;
        Ok(Node::FlipFlop {
            begin: Box::new(begin),
            end: Box::new(end),
            state: FrameRef::new(depth, slot),
            exclusive,
        })
    }

    /// `case/when`, chained right to left. With a subject, each condition is `cond === subject`;
    /// without one, each condition is tested for truth.
    pub(crate) fn lower_case(
        &mut self,
        predicate: Option<&SyntaxNode>,
        whens: &[WhenClause],
        otherwise: Option<&SyntaxNode>,
    ) -> Result<Node, CompileError> {
        let subject = match predicate {
            Some(predicate) => {
                let value = self.lower_node(predicate)?;
                Some((self.temp("case")?, value))
            }
            None => None,
        };
        let subject_ref = subject.as_ref().map(|(temp, _)| *temp);

        let mut seen: Vec<&NodeKind> = vec![];
        let mut branches = vec![];
        for clause in whens {
            let mut tests = vec![];
            for condition in &clause.conditions {
                if condition.is_static_literal() {
                    if seen.contains(&&condition.kind) {
                        self.warn_literal(
                            WarningKind::DuplicatedWhenClause,
                            condition.span,
                            "duplicated 'when' clause with the same literal",
                        );
                    }
                    seen.push(&condition.kind);
                }
                tests.push(self.lower_when_condition(condition, subject_ref)?);
            }
            let test = tests
                .into_iter()
                .reduce(Node::or)
                .unwrap_or_else(|| Node::boolean(false));
            branches.push((test, self.lower_optional(clause.body.as_ref())?));
        }

        let mut chain = self.lower_optional(otherwise)?;
        for (test, body) in branches.into_iter().rev() {
            chain = Node::if_else(test, body, chain);
        }
        match subject {
            Some((temp, value)) => Ok(Node::Sequence(vec![Node::write(temp, value), chain])),
            None => Ok(chain),
        }
    }

    fn lower_when_condition(
        &mut self,
        condition: &SyntaxNode,
        subject: Option<FrameRef>,
    ) -> Result<Node, CompileError> {
        if let NodeKind::Splat(Some(cases)) = &condition.kind {
            let cases = self.lower_node(cases)?;
            return Ok(Node::WhenSplat {
                cases: Box::new(Node::SplatCast {
                    value: Box::new(cases),
                    behavior: SplatBehavior::ToArray,
                }),
                value: subject.map(|s| Box::new(Node::read(s))),
            });
        }
        let condition = self.lower_node(condition)?;
        Ok(match subject {
            Some(subject) => Node::case_equal(condition, Node::read(subject)),
            None => condition,
        })
    }

    fn check_pattern_matching(&self, span: Span) -> Result<(), CompileError> {
        if self.session.options.pattern_matching {
            Ok(())
        } else {
            Err(CompileError::PatternMatchingDisabled(context(span)))
        }
    }

    /// The pattern's condition, then its guard. The guard sees the pattern's bindings.
    fn lower_in_clause_test(
        &mut self,
        clause: &InClause,
        subject: FrameRef,
    ) -> Result<Node, CompileError> {
        let matched = self.lower_pattern(&clause.pattern, Node::read(subject))?;
        let Some(guard) = &clause.guard else {
            return Ok(matched);
        };
        let condition = self.lower_node(&guard.condition)?;
        let condition = if guard.negated {
            Node::not(condition)
        } else {
            condition
        };
        Ok(Node::and(matched, condition))
    }

    /// `case/in`. Without an `else`, falling off the end raises.
    pub(crate) fn lower_case_match(
        &mut self,
        predicate: &SyntaxNode,
        clauses: &[InClause],
        otherwise: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        self.check_pattern_matching(span)?;
        let value = self.lower_node(predicate)?;
        let subject = self.temp("case_in")?;
        let mut branches = vec![];
        for clause in clauses {
            let test = self.lower_in_clause_test(clause, subject)?;
            branches.push((test, self.lower_optional(clause.body.as_ref())?));
        }
        let mut chain = match otherwise {
            Some(otherwise) => self.lower_node(otherwise)?,
            None => Node::RaiseNoMatchingPattern(Box::new(Node::read(subject))),
        };
        for (test, body) in branches.into_iter().rev() {
            chain = Node::if_else(test, body, chain);
        }
        Ok(Node::Sequence(vec![Node::write(subject, value), chain]))
    }

    /// `value in pattern`
    pub(crate) fn lower_match_predicate(
        &mut self,
        value: &SyntaxNode,
        pattern: &Pattern,
        span: Span,
    ) -> Result<Node, CompileError> {
        self.check_pattern_matching(span)?;
        let value = self.lower_node(value)?;
        let subject = self.temp("match")?;
        let test = self.lower_pattern(pattern, Node::read(subject))?;
        Ok(Node::Sequence(vec![Node::write(subject, value), test]))
    }

    /// `value => pattern`
    pub(crate) fn lower_match_required(
        &mut self,
        value: &SyntaxNode,
        pattern: &Pattern,
        span: Span,
    ) -> Result<Node, CompileError> {
        self.check_pattern_matching(span)?;
        let value = self.lower_node(value)?;
        let subject = self.temp("match")?;
        let test = self.lower_pattern(pattern, Node::read(subject))?;
        Ok(Node::Sequence(vec![
            Node::write(subject, value),
            Node::if_else(
                test,
                Node::nil(),
                Node::RaiseNoMatchingPattern(Box::new(Node::read(subject))),
            ),
        ]))
    }

    pub(crate) fn lower_begin(
        &mut self,
        body: Option<&SyntaxNode>,
        rescues: &[garnet_syntax::RescueClause],
        otherwise: Option<&SyntaxNode>,
        ensure: Option<&SyntaxNode>,
        span: Span,
    ) -> Result<Node, CompileError> {
        let mut node = self.lower_optional(body)?;
        if !rescues.is_empty() {
            let mut clauses = Vec::with_capacity(rescues.len());
            for rescue in rescues {
                clauses.push(self.lower_rescue_clause(rescue)?);
            }
            let otherwise = match otherwise {
                Some(otherwise) => Some(Box::new(self.lower_node(otherwise)?)),
                None => None,
            };
            node = Node::TryRescue {
                body: Box::new(node),
                clauses,
                otherwise,
            };
        } else if let Some(otherwise) = otherwise {
            self.session.warn(
                WarningKind::ElseWithoutRescue,
                span,
                "else without rescue is useless",
            );
            node = Node::Sequence(vec![node, self.lower_node(otherwise)?]);
        }
        if let Some(ensure) = ensure {
            node = Node::Ensure {
                body: Box::new(node),
                ensure: Box::new(self.lower_node(ensure)?),
            };
        }
        Ok(node)
    }

    fn lower_rescue_clause(
        &mut self,
        rescue: &garnet_syntax::RescueClause,
    ) -> Result<RescueClause, CompileError> {
        let matcher = if rescue.exceptions.is_empty() {
            RescueMatcher::StandardError
        } else if rescue
            .exceptions
            .iter()
            .any(|e| matches!(e.kind, NodeKind::Splat(_)))
        {
            RescueMatcher::Splat(Box::new(self.lower_array(&rescue.exceptions)?))
        } else {
            RescueMatcher::Classes(self.lower_each(&rescue.exceptions)?)
        };

        let in_rescue = std::mem::replace(&mut self.control.in_rescue, true);
        let lowered = self.lower_rescue_body(rescue);
        self.control.in_rescue = in_rescue;
        Ok(RescueClause {
            matcher,
            body: lowered?,
        })
    }

    fn lower_rescue_body(
        &mut self,
        rescue: &garnet_syntax::RescueClause,
    ) -> Result<Node, CompileError> {
        let mut nodes = vec![];
        if let Some(reference) = &rescue.reference {
            nodes.push(self.assign_target(reference, Node::CurrentException)?);
        }
        nodes.push(self.lower_optional(rescue.body.as_ref())?);
        Ok(Node::sequence(nodes))
    }

    /// `expression rescue fallback`
    pub(crate) fn lower_rescue_modifier(
        &mut self,
        expression: &SyntaxNode,
        fallback: &SyntaxNode,
    ) -> Result<Node, CompileError> {
        let body = self.lower_node(expression)?;
        let fallback = self.lower_node(fallback)?;
        Ok(Node::TryRescue {
            body: Box::new(body),
            clauses: vec![RescueClause {
                matcher: RescueMatcher::StandardError,
                body: fallback,
            }],
            otherwise: None,
        })
    }
}
