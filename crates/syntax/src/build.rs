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

//! Terse constructors for syntax trees, for drivers that synthesise code and for tests.
//! Every node gets a default span; use [`at`] to place one on a line.

use crate::node::{
    BlockArgument, BlockLiteral, CallNode, ConstRef, ConstScope, DefNode, HashElement, InClause,
    NodeKind, RescueClause, SyntaxNode, WhenClause,
};
use crate::params::{
    BlockParam, KeywordParam, KeywordRestParam, OptionalParam, ParamTarget, Parameters,
    RequiredParam, RestParam,
};
use crate::pattern::{
    Guard, HashPatternElement, HashPatternRest, Pattern, PatternKind, PatternRest,
};
use crate::span::Span;
use crate::target::{AssignOperator, MultiTarget, OpTarget, RestTarget, Target};

fn node(kind: NodeKind) -> SyntaxNode {
    SyntaxNode::new(kind, Span::default())
}

fn boxed(node: SyntaxNode) -> Box<SyntaxNode> {
    Box::new(node)
}

/// Places `node` on `line` and marks it as starting that line.
pub fn at(mut node: SyntaxNode, line: u32) -> SyntaxNode {
    node.span = Span::at_line(line);
    node.newline = true;
    node
}

pub fn nil() -> SyntaxNode {
    node(NodeKind::Nil)
}

pub fn true_() -> SyntaxNode {
    node(NodeKind::True)
}

pub fn false_() -> SyntaxNode {
    node(NodeKind::False)
}

pub fn self_() -> SyntaxNode {
    node(NodeKind::SelfRef)
}

pub fn int(value: i64) -> SyntaxNode {
    node(NodeKind::Integer(value))
}

pub fn str(value: &str) -> SyntaxNode {
    node(NodeKind::Str {
        value: value.to_string(),
    })
}

pub fn sym(name: &str) -> SyntaxNode {
    node(NodeKind::Sym {
        name: name.to_string(),
    })
}

pub fn regex(source: &str) -> SyntaxNode {
    node(NodeKind::Regex {
        source: source.to_string(),
        options: String::new(),
    })
}

pub fn array(elements: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Array { elements })
}

pub fn hash(pairs: Vec<(SyntaxNode, SyntaxNode)>) -> SyntaxNode {
    node(NodeKind::Hash {
        elements: pairs
            .into_iter()
            .map(|(key, value)| HashElement::Pair { key, value })
            .collect(),
    })
}

/// `key: value, ...` passed without braces.
pub fn keywords(pairs: Vec<(&str, SyntaxNode)>) -> SyntaxNode {
    node(NodeKind::KeywordHash {
        elements: pairs
            .into_iter()
            .map(|(key, value)| HashElement::Pair {
                key: sym(key),
                value,
            })
            .collect(),
    })
}

pub fn splat(value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::Splat(Some(boxed(value))))
}

pub fn range(left: SyntaxNode, right: SyntaxNode, exclusive: bool) -> SyntaxNode {
    node(NodeKind::Range {
        left: Some(boxed(left)),
        right: Some(boxed(right)),
        exclusive,
    })
}

pub fn interpolated(parts: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::InterpolatedStr { parts })
}

pub fn lvar(name: &str) -> SyntaxNode {
    node(NodeKind::LocalRead {
        name: name.to_string(),
    })
}

pub fn lasgn(name: &str, value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::LocalWrite {
        name: name.to_string(),
        value: boxed(value),
    })
}

pub fn ivar(name: &str) -> SyntaxNode {
    node(NodeKind::InstanceRead {
        name: name.to_string(),
    })
}

pub fn iasgn(name: &str, value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::InstanceWrite {
        name: name.to_string(),
        value: boxed(value),
    })
}

pub fn cvar(name: &str) -> SyntaxNode {
    node(NodeKind::ClassVarRead {
        name: name.to_string(),
    })
}

pub fn gvar(name: &str) -> SyntaxNode {
    node(NodeKind::GlobalRead {
        name: name.to_string(),
    })
}

pub fn gasgn(name: &str, value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::GlobalWrite {
        name: name.to_string(),
        value: boxed(value),
    })
}

pub fn const_ref(name: &str) -> ConstRef {
    ConstRef {
        scope: ConstScope::Lexical,
        name: name.to_string(),
    }
}

pub fn constant(name: &str) -> SyntaxNode {
    node(NodeKind::ConstRead(const_ref(name)))
}

pub fn const_path(parent: SyntaxNode, name: &str) -> SyntaxNode {
    node(NodeKind::ConstRead(ConstRef {
        scope: ConstScope::Within(boxed(parent)),
        name: name.to_string(),
    }))
}

pub fn call(receiver: SyntaxNode, name: &str, arguments: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Call(Box::new(CallNode {
        receiver: Some(receiver),
        name: name.to_string(),
        arguments,
        block: None,
        safe_navigation: false,
        variable_call: false,
        attribute_write: false,
    })))
}

/// A receiverless call: `name(args)`.
pub fn fcall(name: &str, arguments: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Call(Box::new(CallNode {
        receiver: None,
        name: name.to_string(),
        arguments,
        block: None,
        safe_navigation: false,
        variable_call: false,
        attribute_write: false,
    })))
}

/// A bare identifier that the parser could not resolve to a local.
pub fn vcall(name: &str) -> SyntaxNode {
    node(NodeKind::Call(Box::new(CallNode {
        receiver: None,
        name: name.to_string(),
        arguments: vec![],
        block: None,
        safe_navigation: false,
        variable_call: true,
        attribute_write: false,
    })))
}

/// Attaches a literal block to a call node. Anything other than a call is returned unchanged.
pub fn with_block(mut call: SyntaxNode, block: BlockLiteral) -> SyntaxNode {
    if let NodeKind::Call(c) = &mut call.kind {
        c.block = Some(BlockArgument::Literal(block));
    }
    call
}

pub fn with_block_pass(mut call: SyntaxNode, value: SyntaxNode) -> SyntaxNode {
    if let NodeKind::Call(c) = &mut call.kind {
        c.block = Some(BlockArgument::Pass(Some(boxed(value))));
    }
    call
}

pub fn safe_call(receiver: SyntaxNode, name: &str, arguments: Vec<SyntaxNode>) -> SyntaxNode {
    let mut call = call(receiver, name, arguments);
    if let NodeKind::Call(c) = &mut call.kind {
        c.safe_navigation = true;
    }
    call
}

pub fn block(
    parameters: Option<Parameters>,
    body: Option<SyntaxNode>,
    locals: &[&str],
) -> BlockLiteral {
    BlockLiteral {
        parameters,
        body: body.map(boxed),
        locals: locals.iter().map(|l| l.to_string()).collect(),
        span: Span::default(),
    }
}

pub fn lambda(literal: BlockLiteral) -> SyntaxNode {
    node(NodeKind::Lambda(Box::new(literal)))
}

pub fn def_node(
    name: &str,
    parameters: Option<Parameters>,
    body: Option<SyntaxNode>,
    locals: &[&str],
) -> DefNode {
    DefNode {
        name: name.to_string(),
        receiver: None,
        parameters,
        body: body.map(boxed),
        locals: locals.iter().map(|l| l.to_string()).collect(),
        span: Span::default(),
    }
}

pub fn def(
    name: &str,
    parameters: Option<Parameters>,
    body: Option<SyntaxNode>,
    locals: &[&str],
) -> SyntaxNode {
    node(NodeKind::Def(Box::new(def_node(name, parameters, body, locals))))
}

/// A statement list; each statement is marked as starting a line.
pub fn seq(statements: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Statements(
        statements
            .into_iter()
            .map(|mut s| {
                s.newline = true;
                s
            })
            .collect(),
    ))
}

pub fn not(value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::Not(boxed(value)))
}

pub fn and(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
    node(NodeKind::And {
        left: boxed(left),
        right: boxed(right),
    })
}

pub fn or(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
    node(NodeKind::Or {
        left: boxed(left),
        right: boxed(right),
    })
}

pub fn if_(
    predicate: SyntaxNode,
    then: Option<SyntaxNode>,
    otherwise: Option<SyntaxNode>,
) -> SyntaxNode {
    node(NodeKind::If {
        predicate: boxed(predicate),
        then: then.map(boxed),
        otherwise: otherwise.map(boxed),
    })
}

pub fn unless(
    predicate: SyntaxNode,
    then: Option<SyntaxNode>,
    otherwise: Option<SyntaxNode>,
) -> SyntaxNode {
    node(NodeKind::Unless {
        predicate: boxed(predicate),
        then: then.map(boxed),
        otherwise: otherwise.map(boxed),
    })
}

pub fn while_(predicate: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    node(NodeKind::While {
        predicate: boxed(predicate),
        body: Some(boxed(body)),
        do_while: false,
    })
}

pub fn until(predicate: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    node(NodeKind::Until {
        predicate: boxed(predicate),
        body: Some(boxed(body)),
        do_while: false,
    })
}

pub fn for_(index: Target, collection: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    node(NodeKind::For {
        index: Box::new(index),
        collection: boxed(collection),
        body: Some(boxed(body)),
    })
}

pub fn break_(value: Option<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Break(value.map(boxed)))
}

pub fn next(value: Option<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Next(value.map(boxed)))
}

pub fn redo() -> SyntaxNode {
    node(NodeKind::Redo)
}

pub fn retry() -> SyntaxNode {
    node(NodeKind::Retry)
}

pub fn return_(value: Option<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Return(value.map(boxed)))
}

pub fn yield_(arguments: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Yield { arguments })
}

pub fn super_(arguments: Vec<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::Super {
        arguments,
        block: None,
    })
}

/// Bare `super`.
pub fn zsuper() -> SyntaxNode {
    node(NodeKind::ForwardingSuper { block: None })
}

pub fn op_assign(target: OpTarget, operator: AssignOperator, value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::OpAssign {
        target,
        operator,
        value: boxed(value),
    })
}

pub fn masgn(targets: MultiTarget, value: SyntaxNode) -> SyntaxNode {
    node(NodeKind::MultiWrite {
        targets,
        value: boxed(value),
    })
}

pub fn local_target(name: &str) -> Target {
    Target::Local {
        name: name.to_string(),
    }
}

/// `lefts, *rest, rights` over plain locals. An empty `rest` name means an anonymous `*`.
pub fn locals_target(lefts: &[&str], rest: Option<&str>, rights: &[&str]) -> MultiTarget {
    MultiTarget {
        lefts: lefts.iter().map(|n| local_target(n)).collect(),
        rest: rest.map(|r| {
            if r.is_empty() {
                RestTarget::Anonymous
            } else {
                RestTarget::Named(Box::new(local_target(r)))
            }
        }),
        rights: rights.iter().map(|n| local_target(n)).collect(),
    }
}

pub fn case(
    predicate: Option<SyntaxNode>,
    whens: Vec<(Vec<SyntaxNode>, SyntaxNode)>,
    otherwise: Option<SyntaxNode>,
) -> SyntaxNode {
    node(NodeKind::Case {
        predicate: predicate.map(boxed),
        whens: whens
            .into_iter()
            .map(|(conditions, body)| WhenClause {
                conditions,
                body: Some(body),
                span: Span::default(),
            })
            .collect(),
        otherwise: otherwise.map(boxed),
    })
}

pub fn case_in(
    predicate: SyntaxNode,
    clauses: Vec<InClause>,
    otherwise: Option<SyntaxNode>,
) -> SyntaxNode {
    node(NodeKind::CaseMatch {
        predicate: boxed(predicate),
        clauses,
        otherwise: otherwise.map(boxed),
    })
}

pub fn in_clause(
    pattern: Pattern,
    guard: Option<(SyntaxNode, bool)>,
    body: SyntaxNode,
) -> InClause {
    InClause {
        pattern,
        guard: guard.map(|(condition, negated)| Guard {
            condition: boxed(condition),
            negated,
        }),
        body: Some(body),
        span: Span::default(),
    }
}

pub fn rescue_clause(
    exceptions: Vec<SyntaxNode>,
    reference: Option<&str>,
    body: SyntaxNode,
) -> RescueClause {
    RescueClause {
        exceptions,
        reference: reference.map(local_target),
        body: Some(body),
        span: Span::default(),
    }
}

pub fn begin(
    body: SyntaxNode,
    rescues: Vec<RescueClause>,
    otherwise: Option<SyntaxNode>,
    ensure: Option<SyntaxNode>,
) -> SyntaxNode {
    node(NodeKind::Begin {
        body: Some(boxed(body)),
        rescues,
        otherwise: otherwise.map(boxed),
        ensure: ensure.map(boxed),
    })
}

pub fn class_def(
    name: &str,
    superclass: Option<SyntaxNode>,
    body: Option<SyntaxNode>,
    locals: &[&str],
) -> SyntaxNode {
    node(NodeKind::ClassDef {
        path: const_ref(name),
        superclass: superclass.map(boxed),
        body: body.map(boxed),
        locals: locals.iter().map(|l| l.to_string()).collect(),
    })
}

pub fn module_def(name: &str, body: Option<SyntaxNode>, locals: &[&str]) -> SyntaxNode {
    node(NodeKind::ModuleDef {
        path: const_ref(name),
        body: body.map(boxed),
        locals: locals.iter().map(|l| l.to_string()).collect(),
    })
}

pub fn singleton_class(expression: SyntaxNode, body: Option<SyntaxNode>) -> SyntaxNode {
    node(NodeKind::SingletonClass {
        expression: boxed(expression),
        body: body.map(boxed),
        locals: vec![],
    })
}

pub fn flip_flop(left: SyntaxNode, right: SyntaxNode, exclusive: bool) -> SyntaxNode {
    node(NodeKind::FlipFlop {
        left: Some(boxed(left)),
        right: Some(boxed(right)),
        exclusive,
    })
}

/// Accumulates a [`Parameters`] list group by group.
#[derive(Default)]
pub struct ParamsBuilder {
    params: Parameters,
}

pub fn params() -> ParamsBuilder {
    ParamsBuilder::default()
}

impl ParamsBuilder {
    pub fn req(mut self, name: &str) -> Self {
        self.params
            .requireds
            .push(RequiredParam::Named(name.to_string()));
        self
    }

    pub fn destructure(mut self, target: ParamTarget) -> Self {
        self.params
            .requireds
            .push(RequiredParam::Destructure(target));
        self
    }

    pub fn opt(mut self, name: &str, value: SyntaxNode) -> Self {
        self.params.optionals.push(OptionalParam {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn rest(mut self, name: &str) -> Self {
        self.params.rest = Some(RestParam::Named(name.to_string()));
        self
    }

    pub fn anonymous_rest(mut self) -> Self {
        self.params.rest = Some(RestParam::Anonymous);
        self
    }

    pub fn implicit_rest(mut self) -> Self {
        self.params.rest = Some(RestParam::Implicit);
        self
    }

    pub fn post(mut self, name: &str) -> Self {
        self.params.posts.push(RequiredParam::Named(name.to_string()));
        self
    }

    pub fn key(mut self, name: &str) -> Self {
        self.params.keywords.push(KeywordParam {
            name: name.to_string(),
            value: None,
        });
        self
    }

    pub fn key_opt(mut self, name: &str, value: SyntaxNode) -> Self {
        self.params.keywords.push(KeywordParam {
            name: name.to_string(),
            value: Some(value),
        });
        self
    }

    pub fn kwrest(mut self, name: &str) -> Self {
        self.params.keyword_rest = Some(KeywordRestParam::Named(name.to_string()));
        self
    }

    pub fn anonymous_kwrest(mut self) -> Self {
        self.params.keyword_rest = Some(KeywordRestParam::Anonymous);
        self
    }

    pub fn no_keywords(mut self) -> Self {
        self.params.keyword_rest = Some(KeywordRestParam::NoKeywords);
        self
    }

    pub fn forwarding(mut self) -> Self {
        self.params.keyword_rest = Some(KeywordRestParam::Forwarding);
        self
    }

    pub fn block(mut self, name: &str) -> Self {
        self.params.block = Some(BlockParam::Named(name.to_string()));
        self
    }

    pub fn anonymous_block(mut self) -> Self {
        self.params.block = Some(BlockParam::Anonymous);
        self
    }

    pub fn build(self) -> Parameters {
        self.params
    }
}

fn pattern(kind: PatternKind) -> Pattern {
    Pattern::new(kind, Span::default())
}

pub fn pat_value(value: SyntaxNode) -> Pattern {
    pattern(PatternKind::Value(boxed(value)))
}

pub fn pat_bind(name: &str) -> Pattern {
    pattern(PatternKind::Bind {
        name: name.to_string(),
    })
}

pub fn pat_pin(value: SyntaxNode) -> Pattern {
    pattern(PatternKind::Pin(boxed(value)))
}

/// `[pre..., *rest, post...]`; an empty rest name is an anonymous `*`.
pub fn pat_array(requireds: Vec<Pattern>, rest: Option<&str>, posts: Vec<Pattern>) -> Pattern {
    pattern(PatternKind::Array {
        constant: None,
        requireds,
        rest: rest.map(pattern_rest),
        posts,
    })
}

pub fn pat_find(left: &str, requireds: Vec<Pattern>, right: &str) -> Pattern {
    pattern(PatternKind::Find {
        constant: None,
        left: pattern_rest(left),
        requireds,
        right: pattern_rest(right),
    })
}

pub fn pat_hash(elements: Vec<(&str, Option<Pattern>)>, rest: Option<HashPatternRest>) -> Pattern {
    pattern(PatternKind::Hash {
        constant: None,
        elements: elements
            .into_iter()
            .map(|(key, pattern)| HashPatternElement {
                key: key.to_string(),
                pattern,
            })
            .collect(),
        rest,
    })
}

pub fn pat_alt(left: Pattern, right: Pattern) -> Pattern {
    pattern(PatternKind::Alternation {
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn pat_capture(inner: Pattern, name: &str) -> Pattern {
    pattern(PatternKind::Capture {
        pattern: Box::new(inner),
        name: name.to_string(),
    })
}

fn pattern_rest(name: &str) -> PatternRest {
    if name.is_empty() {
        PatternRest::Anonymous
    } else {
        PatternRest::Named(name.to_string())
    }
}
