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

//! The executable node vocabulary.
//!
//! Lowering reduces every surface construct to these primitives. Each variant's comment states
//! what an evaluator must do with it; anything not stated (method dispatch, conversions, string
//! and regex behaviour) belongs to the runtime.

use std::sync::Arc;

use crate::arity::Arity;
use crate::control::{BreakId, ReturnTarget};
use crate::frame::{FrameRef, Slot};
use crate::symbol::Symbol;
use crate::unit::{ClosureDefinition, CompiledUnit};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    True,
    False,
    Integer(i64),
    Float(f64),
    Symbol(Symbol),
    Regex { source: Symbol, options: Symbol },
    Encoding(Symbol),
}

/// Where positional argument reads take their values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSource {
    /// The positional arguments of the current call.
    Arguments,
    /// An array held in a slot: an auto-splatted block argument, a destructuring group, or the
    /// right-hand side of a multiple assignment.
    Array(FrameRef),
}

/// What a missing pre-required argument reads as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingArgument {
    /// Procs and destructuring: missing values are nil.
    Nil,
    /// Methods and lambdas: unreachable after the arity check, an error if reached anyway.
    Error,
}

/// The counts a post-required read needs to find its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostShape {
    pub pre: usize,
    pub optional: usize,
    pub post: usize,
    pub has_rest: bool,
}

/// How `*value` turns a value into an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplatBehavior {
    /// Splat in an argument list or array literal: nil becomes `[]`, arrays stay, anything else
    /// goes through `to_a` or is wrapped.
    ToArray,
    /// Destructuring: nil becomes `[nil]`, arrays stay, anything else goes through `to_ary` or
    /// is wrapped.
    WrapWithNil,
    /// Auto-splat probe: arrays stay, `to_ary` is honoured, anything else yields nil.
    ToAryOrNil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantScope {
    /// The lexical module nesting, or the caller's live nesting when `dynamic`.
    Lexical { dynamic: bool },
    TopLevel,
    Within(Box<Node>),
}

/// Whether (and how) the last argument of a call carries keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordArguments {
    None,
    /// The last argument is a hash literal built from these literal keys.
    Literal(Vec<Symbol>),
    /// The last argument is a hash built at least partly from `**` splats.
    Splat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RescueMatcher {
    /// `rescue` with no classes.
    StandardError,
    Classes(Vec<Node>),
    /// The class list is computed at run time; the node evaluates to an array of classes.
    Splat(Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    pub matcher: RescueMatcher,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    Class { superclass: Option<Box<Node>> },
    Module,
    SingletonClass { of: Box<Node> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindRestSide {
    /// Everything before the matched window.
    Before,
    /// Everything after a window of `width` elements.
    After { width: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuperArguments {
    Explicit {
        arguments: Vec<Node>,
        splatted: bool,
        keywords: KeywordArguments,
    },
    /// Bare `super`: the enclosing method's parameters, read from their slots now.
    Reload {
        arguments: Vec<Node>,
        /// The position in `arguments` holding the rest array, to be spliced in.
        rest_index: Option<usize>,
        keywords: Option<Box<Node>>,
        /// The walk to the method passed through a `define_method` block; the evaluator must
        /// reject the call.
        inside_define_method: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub receiver: Node,
    pub method: Symbol,
    /// When `splatted`, a single array node holding every positional argument.
    pub arguments: Vec<Node>,
    pub splatted: bool,
    pub keywords: KeywordArguments,
    pub block: Option<Node>,
    /// Receiverless or `self.` call: private methods are visible.
    pub private: bool,
    pub variable_call: bool,
    /// `recv.name = v`: the call's value is `v`, not the method's result.
    pub attribute_write: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Literal),
    /// A fresh string per evaluation unless `frozen`.
    StringLiteral {
        value: Arc<str>,
        frozen: bool,
    },
    /// Concatenates the parts, converting non-strings with `to_s`.
    Interpolation(Vec<Node>),
    DynamicSymbol(Vec<Node>),
    DynamicRegex {
        parts: Vec<Node>,
        options: Symbol,
    },
    /// Evaluates the body the first time only; afterwards yields the cached value.
    Once(Box<Node>),
    ArrayLiteral(Vec<Node>),
    /// Concatenates the arrays produced by each piece.
    ArrayConcat(Vec<Node>),
    SplatCast {
        value: Box<Node>,
        behavior: SplatBehavior,
    },
    HashLiteral(Vec<(Node, Node)>),
    /// Merges the hashes produced by each piece, converting with `to_hash`.
    HashConcat(Vec<Node>),
    Range {
        from: Box<Node>,
        to: Box<Node>,
        exclusive: bool,
    },

    ReadLocal(FrameRef),
    WriteLocal {
        target: FrameRef,
        value: Box<Node>,
    },
    /// The receiver of the current call; only appears in preludes, which store it in slot 0.
    ReadReceiver,
    ReadInstanceVariable(Symbol),
    WriteInstanceVariable {
        name: Symbol,
        value: Box<Node>,
    },
    ReadClassVariable(Symbol),
    WriteClassVariable {
        name: Symbol,
        value: Box<Node>,
    },
    ReadGlobal(Symbol),
    WriteGlobal {
        name: Symbol,
        value: Box<Node>,
    },
    AliasGlobal {
        new_name: Symbol,
        old_name: Symbol,
    },
    /// `$~` or `$_`, stored in the frame's special-variables cell.
    ReadSpecialVariable {
        cell: FrameRef,
        name: Symbol,
    },
    WriteSpecialVariable {
        cell: FrameRef,
        name: Symbol,
        value: Box<Node>,
    },
    /// `$&` and friends, derived from the `$~` in `cell`.
    ReadBackReference {
        cell: FrameRef,
        kind: char,
    },
    ReadNthReference {
        cell: FrameRef,
        number: u32,
    },
    /// `$!` while a rescue clause runs.
    CurrentException,
    ReadConstant {
        scope: ConstantScope,
        name: Symbol,
    },
    WriteConstant {
        scope: ConstantScope,
        name: Symbol,
        value: Box<Node>,
    },
    /// True when the wrapped read (a class variable, global or constant) would find a value.
    IsDefined(Box<Node>),
    /// `defined?(expr)`: a description string or nil, decided by the wrapped node's kind.
    Defined(Box<Node>),

    Sequence(Vec<Node>),
    If {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    IsNil(Box<Node>),
    While {
        condition: Box<Node>,
        body: Box<Node>,
        do_while: bool,
    },
    /// Runs `body`; a `Break` carrying `id` stops it and supplies the value.
    CatchBreak {
        id: BreakId,
        body: Box<Node>,
        in_while: bool,
    },
    Break {
        id: BreakId,
        value: Box<Node>,
        in_while: bool,
    },
    Next(Box<Node>),
    Redo,
    Retry,
    Return {
        target: ReturnTarget,
        value: Box<Node>,
    },
    /// Clauses are tried in order; `otherwise` runs when the body raised nothing.
    TryRescue {
        body: Box<Node>,
        clauses: Vec<RescueClause>,
        otherwise: Option<Box<Node>>,
    },
    /// `ensure` runs on every exit from `body`, including unwinding.
    Ensure {
        body: Box<Node>,
        ensure: Box<Node>,
    },
    Line {
        line: u32,
        body: Box<Node>,
    },
    FlipFlop {
        begin: Box<Node>,
        end: Box<Node>,
        state: FrameRef,
        exclusive: bool,
    },
    /// Sets each flip-flop state slot to false.
    InitFlipFlopStates(Vec<Slot>),
    /// Marks `marker` as live while `body` (a call with a literal block) runs, so a later
    /// `break` from the block can tell whether its call site is still on the stack.
    FrameOnStack {
        marker: Slot,
        body: Box<Node>,
    },
    /// `when *cases`: true if any element `=== value`, or (without a value) is truthy.
    WhenSplat {
        cases: Box<Node>,
        value: Option<Box<Node>>,
    },
    RaiseNoMatchingPattern(Box<Node>),

    Call(Box<CallSite>),
    /// `&value` at a call site: converts with `to_proc`.
    ToProc(Box<Node>),
    Super {
        arguments: SuperArguments,
        block: Option<Box<Node>>,
    },
    /// Calls the block stored in `block`.
    Yield {
        block: FrameRef,
        arguments: Vec<Node>,
        splatted: bool,
        keywords: KeywordArguments,
    },
    Closure(Arc<ClosureDefinition>),
    MethodDefinition {
        name: Symbol,
        singleton: Option<Box<Node>>,
        unit: Arc<CompiledUnit>,
    },
    /// Opens (creating if needed) a class or module, then runs `body` with it as receiver.
    ModuleDefinition {
        kind: ModuleKind,
        scope: ConstantScope,
        name: Option<Symbol>,
        body: Arc<CompiledUnit>,
    },
    Alias {
        new_name: Box<Node>,
        old_name: Box<Node>,
    },
    Undef(Vec<Node>),

    /// Raises an argument error unless the call's positional count and keywords fit.
    CheckArity(Arity),
    /// The keyword half of `CheckArity` alone: raises if a required keyword is missing or, with
    /// no keyword rest, if an undeclared keyword was passed. Procs that declare keywords use it.
    CheckKeywords(Arity),
    /// `**nil`: raises if any keyword was passed.
    CheckNoKeywords,
    /// True when the call passed exactly one positional argument and no keywords.
    ShouldDestructure,
    /// Stores the call's block (or nil) into the slot.
    SaveMethodBlock(Slot),
    ReadPreArgument {
        source: ArgumentSource,
        index: usize,
        missing: MissingArgument,
    },
    /// The element at `index` if at least `minimum` positional values exist, else `default`.
    ReadOptionalArgument {
        source: ArgumentSource,
        index: usize,
        minimum: usize,
        default: Box<Node>,
    },
    /// A new array of the values from `from` up to `post` before the end.
    ReadRestArgument {
        source: ArgumentSource,
        from: usize,
        post: usize,
    },
    /// Let `n` be the positional count, capped at `pre + optional + post` without a rest. If
    /// `n >= pre + post` this reads position `n - index_from_end`; otherwise it reads
    /// `pre + post - index_from_end`, or nil when that is past the end.
    ReadPostArgument {
        source: ArgumentSource,
        shape: PostShape,
        index_from_end: usize,
    },
    /// The keyword's value, or `default` when absent. A required keyword (no default) has already
    /// been checked by `CheckArity` or `CheckKeywords`.
    ReadKeywordArgument {
        name: Symbol,
        default: Option<Box<Node>>,
    },
    /// A new hash of the passed keywords not in `known`.
    ReadKeywordRest {
        known: Vec<Symbol>,
    },

    /// Negative indices count from the end; out of range reads nil.
    ArrayIndex {
        array: Box<Node>,
        index: i64,
    },
    ArrayIsAtLeast {
        array: Box<Node>,
        length: usize,
    },
    /// False for nil; otherwise compares the length with `length`, exactly or as a minimum.
    ArrayPatternLengthCheck {
        array: Box<Node>,
        length: usize,
        exact: bool,
    },
    /// `value.deconstruct` when the value responds to it (raising unless it returns an array);
    /// nil otherwise.
    DeconstructArray(Box<Node>),
    /// `value.deconstruct_keys(keys)` (nil keys means all) when supported, else nil.
    DeconstructKeys {
        value: Box<Node>,
        keys: Option<Vec<Symbol>>,
    },
    /// The value under `key`, or the absent sentinel. Reading from nil yields absent.
    HashPatternValue {
        hash: Box<Node>,
        key: Symbol,
    },
    IsAbsent(Box<Node>),
    HashExcept {
        hash: Box<Node>,
        keys: Vec<Symbol>,
    },
    HashIsEmpty(Box<Node>),
    /// Slides `cursor` from 0 to `len - width`; true at the first position where `matcher` is.
    FindPattern {
        array: Box<Node>,
        width: usize,
        cursor: FrameRef,
        matcher: Box<Node>,
    },
    /// `array[cursor + offset]`
    ArrayIndexAt {
        array: Box<Node>,
        cursor: FrameRef,
        offset: usize,
    },
    FindPatternRest {
        array: Box<Node>,
        cursor: FrameRef,
        side: FindRestSide,
    },
    /// Runs the node for its effect, then yields true.
    ExecuteAndReturnTrue(Box<Node>),
}

impl Node {
    pub fn nil() -> Node {
        Node::Literal(Literal::Nil)
    }

    pub fn boolean(value: bool) -> Node {
        Node::Literal(if value { Literal::True } else { Literal::False })
    }

    pub fn integer(value: i64) -> Node {
        Node::Literal(Literal::Integer(value))
    }

    pub fn symbol(name: &str) -> Node {
        Node::Literal(Literal::Symbol(Symbol::new(name)))
    }

    pub fn read_self() -> Node {
        Node::ReadLocal(FrameRef::SELF)
    }

    pub fn read(frame_ref: FrameRef) -> Node {
        Node::ReadLocal(frame_ref)
    }

    pub fn write(target: FrameRef, value: Node) -> Node {
        Node::WriteLocal {
            target,
            value: Box::new(value),
        }
    }

    pub fn is_nil_literal(&self) -> bool {
        matches!(self, Node::Literal(Literal::Nil))
    }

    /// A sequence, flattened when it has a single element.
    pub fn sequence(mut nodes: Vec<Node>) -> Node {
        match nodes.len() {
            0 => Node::nil(),
            1 => nodes.pop().unwrap_or_else(Node::nil),
            _ => Node::Sequence(nodes),
        }
    }

    pub fn if_else(condition: Node, then: Node, otherwise: Node) -> Node {
        Node::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn and(left: Node, right: Node) -> Node {
        Node::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Node, right: Node) -> Node {
        Node::Or(Box::new(left), Box::new(right))
    }

    pub fn not(value: Node) -> Node {
        Node::Not(Box::new(value))
    }

    pub fn call(receiver: Node, method: &str, arguments: Vec<Node>) -> Node {
        Node::Call(Box::new(CallSite {
            receiver,
            method: Symbol::new(method),
            arguments,
            splatted: false,
            keywords: KeywordArguments::None,
            block: None,
            private: false,
            variable_call: false,
            attribute_write: false,
        }))
    }

    /// `pattern === value`
    pub fn case_equal(pattern: Node, value: Node) -> Node {
        Node::call(pattern, "===", vec![value])
    }

    pub fn execute_and_return_true(node: Node) -> Node {
        Node::ExecuteAndReturnTrue(Box::new(node))
    }
}
