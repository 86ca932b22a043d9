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

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::params::Parameters;
use crate::pattern::{Guard, Pattern};
use crate::span::Span;
use crate::target::{AssignOperator, MultiTarget, OpTarget, Target};

/// One surface construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub span: Span,
    /// Whether this node begins a new source line (drives line markers in the output tree).
    #[serde(default)]
    pub newline: bool,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            newline: false,
        }
    }

    pub fn on_new_line(mut self) -> Self {
        self.newline = true;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        (&self.kind).into()
    }

    /// Literals whose value is fixed at parse time. Used for void-context and condition warnings.
    pub fn is_static_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Nil
                | NodeKind::True
                | NodeKind::False
                | NodeKind::Integer(_)
                | NodeKind::Float(_)
                | NodeKind::Str { .. }
                | NodeKind::Sym { .. }
                | NodeKind::Regex { .. }
        )
    }
}

/// A constant reference: `Foo`, `::Foo`, or `expr::Foo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstRef {
    pub scope: ConstScope,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstScope {
    /// Resolved through the lexical module nesting.
    Lexical,
    /// `::Foo`
    TopLevel,
    /// `expr::Foo`
    Within(Box<SyntaxNode>),
}

/// A call with an optional receiver. Arguments may contain `Splat`, `KeywordHash`,
/// `BlockPass`-free positional nodes and `ForwardedArguments`; the block, if any, is separate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNode {
    pub receiver: Option<SyntaxNode>,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<SyntaxNode>,
    #[serde(default)]
    pub block: Option<BlockArgument>,
    /// `recv&.name`
    #[serde(default)]
    pub safe_navigation: bool,
    /// A bare identifier that might have been a local variable.
    #[serde(default)]
    pub variable_call: bool,
    /// `recv.name = value`
    #[serde(default)]
    pub attribute_write: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockArgument {
    /// `{ |x| ... }` / `do ... end`
    Literal(BlockLiteral),
    /// `&expr`, or bare `&` when forwarding an anonymous block parameter.
    Pass(Option<Box<SyntaxNode>>),
}

/// The body and parameters of a block or lambda literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLiteral {
    #[serde(default)]
    pub parameters: Option<Parameters>,
    #[serde(default)]
    pub body: Option<Box<SyntaxNode>>,
    /// Every local the parser saw declared in this block, including block-locals (`|;x|`).
    #[serde(default)]
    pub locals: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

/// `def name(params) ... end` and `def recv.name ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefNode {
    pub name: String,
    #[serde(default)]
    pub receiver: Option<SyntaxNode>,
    #[serde(default)]
    pub parameters: Option<Parameters>,
    #[serde(default)]
    pub body: Option<Box<SyntaxNode>>,
    #[serde(default)]
    pub locals: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub conditions: Vec<SyntaxNode>,
    #[serde(default)]
    pub body: Option<SyntaxNode>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InClause {
    pub pattern: Pattern,
    #[serde(default)]
    pub guard: Option<Guard>,
    #[serde(default)]
    pub body: Option<SyntaxNode>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueClause {
    /// Exception class expressions; may contain `Splat`. Empty means `StandardError`.
    #[serde(default)]
    pub exceptions: Vec<SyntaxNode>,
    /// `rescue => target`
    #[serde(default)]
    pub reference: Option<Target>,
    #[serde(default)]
    pub body: Option<SyntaxNode>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashElement {
    Pair { key: SyntaxNode, value: SyntaxNode },
    /// `**expr`, or bare `**` forwarding an anonymous keyword-rest parameter.
    DoubleSplat(Option<SyntaxNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    // Literals
    Nil,
    True,
    False,
    SelfRef,
    Integer(i64),
    Float(f64),
    Str {
        value: String,
    },
    /// Backtick command string.
    XStr {
        value: String,
    },
    InterpolatedStr {
        parts: Vec<SyntaxNode>,
    },
    Sym {
        name: String,
    },
    InterpolatedSym {
        parts: Vec<SyntaxNode>,
    },
    Regex {
        source: String,
        #[serde(default)]
        options: String,
    },
    InterpolatedRegex {
        parts: Vec<SyntaxNode>,
        #[serde(default)]
        options: String,
        /// `/.../o`
        #[serde(default)]
        once: bool,
    },
    Array {
        elements: Vec<SyntaxNode>,
    },
    Hash {
        elements: Vec<HashElement>,
    },
    /// Keyword arguments written without braces at a call site.
    KeywordHash {
        elements: Vec<HashElement>,
    },
    Range {
        left: Option<Box<SyntaxNode>>,
        right: Option<Box<SyntaxNode>>,
        exclusive: bool,
    },
    SourceFile,
    SourceLine,
    SourceEncoding,

    // Variables
    LocalRead {
        name: String,
    },
    LocalWrite {
        name: String,
        value: Box<SyntaxNode>,
    },
    InstanceRead {
        name: String,
    },
    InstanceWrite {
        name: String,
        value: Box<SyntaxNode>,
    },
    ClassVarRead {
        name: String,
    },
    ClassVarWrite {
        name: String,
        value: Box<SyntaxNode>,
    },
    GlobalRead {
        name: String,
    },
    GlobalWrite {
        name: String,
        value: Box<SyntaxNode>,
    },
    /// `$&`, `` $` ``, `$'`, `$+`
    BackReference {
        name: char,
    },
    /// `$1`, `$2`, ...
    NthReference {
        number: u32,
    },
    ConstRead(ConstRef),
    ConstWrite {
        target: ConstRef,
        value: Box<SyntaxNode>,
    },
    OpAssign {
        target: OpTarget,
        operator: AssignOperator,
        value: Box<SyntaxNode>,
    },
    MultiWrite {
        targets: MultiTarget,
        value: Box<SyntaxNode>,
    },
    /// `*expr` in an array literal, argument list or `when`/`rescue` list. `None` is the bare
    /// `*` forwarding an anonymous rest parameter.
    Splat(Option<Box<SyntaxNode>>),
    /// `...` at a call site.
    ForwardedArguments,
    Defined(Box<SyntaxNode>),

    // Calls
    Call(Box<CallNode>),
    Super {
        arguments: Vec<SyntaxNode>,
        #[serde(default)]
        block: Option<BlockArgument>,
    },
    /// Bare `super` without parentheses: reuses the method's current parameter values.
    ForwardingSuper {
        #[serde(default)]
        block: Option<BlockLiteral>,
    },
    Yield {
        #[serde(default)]
        arguments: Vec<SyntaxNode>,
    },

    // Control flow
    Not(Box<SyntaxNode>),
    And {
        left: Box<SyntaxNode>,
        right: Box<SyntaxNode>,
    },
    Or {
        left: Box<SyntaxNode>,
        right: Box<SyntaxNode>,
    },
    If {
        predicate: Box<SyntaxNode>,
        #[serde(default)]
        then: Option<Box<SyntaxNode>>,
        #[serde(default)]
        otherwise: Option<Box<SyntaxNode>>,
    },
    Unless {
        predicate: Box<SyntaxNode>,
        #[serde(default)]
        then: Option<Box<SyntaxNode>>,
        #[serde(default)]
        otherwise: Option<Box<SyntaxNode>>,
    },
    While {
        predicate: Box<SyntaxNode>,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        /// `begin ... end while cond`: body runs before the first test.
        #[serde(default)]
        do_while: bool,
    },
    Until {
        predicate: Box<SyntaxNode>,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        #[serde(default)]
        do_while: bool,
    },
    For {
        index: Box<Target>,
        collection: Box<SyntaxNode>,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
    },
    Case {
        #[serde(default)]
        predicate: Option<Box<SyntaxNode>>,
        whens: Vec<WhenClause>,
        #[serde(default)]
        otherwise: Option<Box<SyntaxNode>>,
    },
    CaseMatch {
        predicate: Box<SyntaxNode>,
        clauses: Vec<InClause>,
        #[serde(default)]
        otherwise: Option<Box<SyntaxNode>>,
    },
    /// `value in pattern`
    MatchPredicate {
        value: Box<SyntaxNode>,
        pattern: Pattern,
    },
    /// `value => pattern`
    MatchRequired {
        value: Box<SyntaxNode>,
        pattern: Pattern,
    },
    /// `regex =~ string` where the regex literal has named captures.
    MatchWrite {
        call: Box<SyntaxNode>,
        targets: Vec<String>,
    },
    Begin {
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        #[serde(default)]
        rescues: Vec<RescueClause>,
        #[serde(default)]
        otherwise: Option<Box<SyntaxNode>>,
        #[serde(default)]
        ensure: Option<Box<SyntaxNode>>,
    },
    RescueModifier {
        expression: Box<SyntaxNode>,
        rescue: Box<SyntaxNode>,
    },
    Statements(Vec<SyntaxNode>),
    Parentheses(Option<Box<SyntaxNode>>),
    Break(Option<Box<SyntaxNode>>),
    Next(Option<Box<SyntaxNode>>),
    Redo,
    Retry,
    Return(Option<Box<SyntaxNode>>),
    FlipFlop {
        left: Option<Box<SyntaxNode>>,
        right: Option<Box<SyntaxNode>>,
        exclusive: bool,
    },

    // Definitions
    Def(Box<DefNode>),
    /// `-> (params) { body }`
    Lambda(Box<BlockLiteral>),
    ClassDef {
        path: ConstRef,
        #[serde(default)]
        superclass: Option<Box<SyntaxNode>>,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        #[serde(default)]
        locals: Vec<String>,
    },
    ModuleDef {
        path: ConstRef,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        #[serde(default)]
        locals: Vec<String>,
    },
    /// `class << expression`
    SingletonClass {
        expression: Box<SyntaxNode>,
        #[serde(default)]
        body: Option<Box<SyntaxNode>>,
        #[serde(default)]
        locals: Vec<String>,
    },
    Alias {
        new_name: Box<SyntaxNode>,
        old_name: Box<SyntaxNode>,
    },
    GlobalAlias {
        new_name: String,
        old_name: String,
    },
    Undef {
        names: Vec<SyntaxNode>,
    },
    /// `BEGIN { ... }`
    PreExecution(Option<Box<SyntaxNode>>),
    /// `END { ... }`
    PostExecution(Option<Box<SyntaxNode>>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::*;
    use crate::params::{ParamTarget, RequiredParam, RestParam};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_json_tree() {
        let json = r#"{
            "kind": {"statements": [
                {"kind": {"local_write": {"name": "a", "value": {"kind": {"integer": 1}}}},
                 "span": {"start": 0, "end": 5, "line": 1}, "newline": true},
                {"kind": {"call": {"receiver": {"kind": {"local_read": {"name": "a"}}},
                                   "name": "+", "arguments": [{"kind": {"integer": 2}}]}},
                 "span": {"start": 6, "end": 11, "line": 2}, "newline": true}
            ]}
        }"#;
        let tree: SyntaxNode = serde_json::from_str(json).unwrap();
        let NodeKind::Statements(statements) = &tree.kind else {
            panic!("expected statements, got {:?}", tree.kind);
        };
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, lasgn("a", int(1)).kind);
        assert_eq!(statements[1].span, Span::new(6, 11, 2));
        assert!(statements[1].newline);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(lvar("a").kind_name(), "local_read");
        assert_eq!(zsuper().kind_name(), "forwarding_super");
        assert_eq!(seq(vec![]).kind_name(), "statements");
    }

    #[test]
    fn test_bound_names_include_destructured() {
        let params = params()
            .req("a")
            .destructure(ParamTarget {
                lefts: vec![RequiredParam::Named("b".into())],
                rest: Some(RestParam::Named("c".into())),
                rights: vec![],
            })
            .opt("d", int(1))
            .rest("e")
            .post("f")
            .key("g")
            .kwrest("h")
            .block("i")
            .build();
        assert_eq!(
            params.bound_names(),
            vec!["a", "b", "c", "d", "e", "f", "g", "h", "i"]
        );
        assert!(!params.is_forwarding());
    }
}
